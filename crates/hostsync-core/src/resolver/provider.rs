//! Lookup providers
//!
//! A closed set of external sources that can answer "what is the current
//! A record of this domain". Each provider knows its URL template, its fixed
//! header set and the shape of its response.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::traits::LookupRequest;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// How a provider's response body is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// DNS-over-HTTPS JSON (`{"Answer": [{"type": 1, "data": "..."}]}`)
    DohJson,
    /// HTML page scraped for a dotted-quad address
    Html,
}

/// External lookup provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Cloudflare DNS-over-HTTPS JSON API
    Cloudflare,
    /// Google Public DNS JSON API
    Google,
    /// sites.ipaddress.com lookup page
    IpAddress,
}

impl Provider {
    /// Every provider, in default preference order
    pub const ALL: [Provider; 3] = [Provider::Cloudflare, Provider::Google, Provider::IpAddress];

    /// Stable provider name (config, logs)
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Cloudflare => "cloudflare",
            Provider::Google => "google",
            Provider::IpAddress => "ip_address",
        }
    }

    /// Lookup URL for a domain
    pub fn url(&self, domain: &str) -> String {
        match self {
            Provider::Cloudflare => {
                format!("https://cloudflare-dns.com/dns-query?name={}&type=A", domain)
            }
            Provider::Google => format!("https://dns.google/resolve?name={}&type=A", domain),
            Provider::IpAddress => format!("https://sites.ipaddress.com/{}", domain),
        }
    }

    /// Fixed header set sent with every request
    pub fn headers(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Provider::Cloudflare | Provider::Google => &[("Accept", "application/dns-json")],
            Provider::IpAddress => &[
                ("User-Agent", BROWSER_USER_AGENT),
                ("Accept", "text/html,application/xhtml+xml"),
            ],
        }
    }

    /// Shape of the response body
    pub fn format(&self) -> ResponseFormat {
        match self {
            Provider::Cloudflare | Provider::Google => ResponseFormat::DohJson,
            Provider::IpAddress => ResponseFormat::Html,
        }
    }

    /// Build the outbound request for a domain
    pub fn request(&self, domain: &str) -> LookupRequest {
        LookupRequest {
            url: self.url(domain),
            headers: self.headers().to_vec(),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cloudflare" => Ok(Provider::Cloudflare),
            "google" => Ok(Provider::Google),
            "ip_address" | "ipaddress" => Ok(Provider::IpAddress),
            other => Err(crate::Error::config(format!(
                "Unknown lookup provider '{}'. Supported: cloudflare, google, ip_address",
                other
            ))),
        }
    }
}
