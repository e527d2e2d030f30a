//! Response parsing
//!
//! Extracts the A record from a provider response body. Parsing never
//! panics and never errors outward: anything that does not yield a valid
//! IPv4 address becomes a [`ResolveFailure`].

use regex::Regex;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::sync::LazyLock;

use super::ResolveFailure;
use super::provider::ResponseFormat;

/// DNS record type code of an A record
const A_RECORD_TYPE: u16 = 1;

static DOTTED_QUAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+$").expect("valid regex"));

static DOTTED_QUAD_ANYWHERE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").expect("valid regex")
});

static DNS_CONTAINER_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<([a-z][a-z0-9]*)\b[^>]*\bid\s*=\s*["']dns["'][^>]*>"#)
        .expect("valid regex")
});

static TABLE_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>").expect("valid regex"));

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Answer")]
    answer: Option<Vec<DohAnswer>>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    #[serde(default)]
    data: String,
}

/// Parse a response body according to the provider format
pub fn parse_response(format: ResponseFormat, body: &str) -> Result<Ipv4Addr, ResolveFailure> {
    match format {
        ResponseFormat::DohJson => parse_doh_json(body),
        ResponseFormat::Html => scrape_html(body),
    }
}

/// Strict dotted-quad validation
///
/// The value must be four dot-separated digit groups and a valid IPv4
/// address (octets above 255 are rejected).
pub fn validate_ipv4(value: &str) -> Result<Ipv4Addr, ResolveFailure> {
    if !DOTTED_QUAD.is_match(value) {
        return Err(ResolveFailure::InvalidAddress(value.to_string()));
    }
    value
        .parse()
        .map_err(|_| ResolveFailure::InvalidAddress(value.to_string()))
}

/// Extract the first A record from a DNS-over-HTTPS JSON document
///
/// The first answer with type 1 wins, whatever its position among other
/// answer types. Its data must pass strict validation; later A records are
/// not consulted when it doesn't.
pub fn parse_doh_json(body: &str) -> Result<Ipv4Addr, ResolveFailure> {
    let response: DohResponse =
        serde_json::from_str(body).map_err(|e| ResolveFailure::Malformed(e.to_string()))?;

    let answers = match response.answer {
        Some(answers) if !answers.is_empty() => answers,
        _ => return Err(ResolveFailure::MissingAnswer),
    };

    let record = answers
        .iter()
        .find(|answer| answer.record_type == A_RECORD_TYPE)
        .ok_or(ResolveFailure::NoAddressRecord)?;

    validate_ipv4(&record.data)
}

/// Scrape an IPv4 address out of an HTML lookup page
///
/// Looks for the element with `id="dns"` and returns the first table cell
/// inside it holding a valid address. Without such a cell, the first valid
/// dotted quad anywhere in the document is used. Candidates that look like
/// an address but fail validation are skipped.
pub fn scrape_html(body: &str) -> Result<Ipv4Addr, ResolveFailure> {
    let mut rejected = None;

    if let Some(section) = dns_section(body) {
        let cells = TABLE_CELL
            .captures_iter(section)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|text| DOTTED_QUAD.is_match(text));

        for text in cells {
            match validate_ipv4(text) {
                Ok(ip) => return Ok(ip),
                Err(failure) => {
                    rejected.get_or_insert(failure);
                }
            }
        }
    }

    for m in DOTTED_QUAD_ANYWHERE.find_iter(body) {
        match validate_ipv4(m.as_str()) {
            Ok(ip) => return Ok(ip),
            Err(failure) => {
                rejected.get_or_insert(failure);
            }
        }
    }

    Err(rejected.unwrap_or(ResolveFailure::NoAddressRecord))
}

/// Inner HTML of the `id="dns"` container, if present
///
/// The container ends at the matching close tag; nested elements with the
/// same tag name are balanced. An unterminated container runs to the end of
/// the document.
fn dns_section(body: &str) -> Option<&str> {
    let caps = DNS_CONTAINER_OPEN.captures(body)?;
    let open = caps.get(0)?;
    let tag = caps.get(1)?.as_str();
    let rest = &body[open.end()..];

    let Ok(tags) = Regex::new(&format!(r"(?i)<(/?){}\b", regex::escape(tag))) else {
        return Some(rest);
    };

    let mut depth = 1usize;
    for caps in tags.captures_iter(rest) {
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        if closing {
            depth -= 1;
            if depth == 0 {
                let end = caps.get(0).map_or(rest.len(), |m| m.start());
                return Some(&rest[..end]);
            }
        } else {
            depth += 1;
        }
    }

    Some(rest)
}
