//! Hosts file rendering
//!
//! Turns resolved entries into a hosts block, and splices that block into an
//! existing hosts file between the start and end markers. Lines outside the
//! markers are never touched.

use chrono::{DateTime, FixedOffset, Utc};
use std::net::Ipv4Addr;

use crate::dataset::HostEntry;

/// First line of the managed block
pub const START_MARKER: &str = "# ===== GitHub Hosts Start =====";

/// Last line of the managed block
pub const END_MARKER: &str = "# ===== GitHub Hosts End =====";

/// Default hosts template, with `{content}` and `{updateTime}` placeholders
pub const DEFAULT_TEMPLATE: &str = "# ===== GitHub Hosts Start =====
{content}

# Update time: {updateTime}
# ===== GitHub Hosts End =====
";

/// Served instead of a hosts block when no entries are available
pub const FAILURE_MESSAGE: &str =
    "# Failed to fetch hosts data. Please try again later.\n";

/// Column the domain starts at
const IP_COLUMN_WIDTH: usize = 30;

/// Asia/Shanghai has no DST, a fixed +08:00 offset is exact
const SHANGHAI_OFFSET_SECS: i32 = 8 * 3600;

/// Render entries into `template`
///
/// Each entry becomes one line: the address left-aligned in a 30 column
/// field, then the domain. An empty entry list renders [`FAILURE_MESSAGE`].
pub fn render_hosts(entries: &[HostEntry], template: &str, now: DateTime<Utc>) -> String {
    if entries.is_empty() {
        return FAILURE_MESSAGE.to_string();
    }

    let content = entries
        .iter()
        .map(|entry| {
            format!(
                "{:<width$}{}",
                entry.ip.to_string(),
                entry.domain,
                width = IP_COLUMN_WIDTH
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    template
        .replacen("{content}", &content, 1)
        .replacen("{updateTime}", &format_update_time(now), 1)
}

/// Format `now` as Shanghai wall-clock time, `M/D/YYYY, HH:MM:SS`
pub fn format_update_time(now: DateTime<Utc>) -> String {
    const FORMAT: &str = "%-m/%-d/%Y, %H:%M:%S";
    match FixedOffset::east_opt(SHANGHAI_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset).format(FORMAT).to_string(),
        None => now.format(FORMAT).to_string(),
    }
}

/// Replace the managed block inside `existing`, or append it
///
/// An unterminated block is replaced up to the end of the file.
pub fn splice_hosts_block(existing: &str, block: &str) -> String {
    let lines: Vec<&str> = existing.lines().collect();
    let block = block.trim_end_matches('\n');

    let start = lines.iter().position(|line| line.trim() == START_MARKER);
    let mut out = String::with_capacity(existing.len() + block.len() + 2);

    match start {
        Some(start) => {
            let end = lines[start..]
                .iter()
                .position(|line| line.trim() == END_MARKER)
                .map(|offset| start + offset + 1)
                .unwrap_or(lines.len());

            for line in &lines[..start] {
                out.push_str(line);
                out.push('\n');
            }
            out.push_str(block);
            out.push('\n');
            for line in &lines[end..] {
                out.push_str(line);
                out.push('\n');
            }
        }
        None => {
            out.push_str(existing);
            if !existing.is_empty() {
                if !existing.ends_with('\n') {
                    out.push('\n');
                }
                out.push('\n');
            }
            out.push_str(block);
            out.push('\n');
        }
    }

    out
}

/// Entries inside the managed block of a hosts file
///
/// Comments, blank lines and lines whose first field is not an IPv4 address
/// are skipped.
pub fn block_entries(content: &str) -> Vec<HostEntry> {
    let mut in_block = false;
    let mut entries = Vec::new();

    for line in content.lines().map(str::trim) {
        if line == START_MARKER {
            in_block = true;
            continue;
        }
        if line == END_MARKER {
            in_block = false;
            continue;
        }
        if !in_block || line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        if let (Some(ip), Some(domain)) = (fields.next(), fields.next())
            && let Ok(ip) = ip.parse::<Ipv4Addr>()
        {
            entries.push(HostEntry::new(ip, domain));
        }
    }

    entries
}

/// Number of entries inside the managed block of a hosts file
pub fn count_block_entries(content: &str) -> usize {
    block_entries(content).len()
}
