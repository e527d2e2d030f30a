//! Dataset model
//!
//! The persisted mapping from domain to its last resolved address, plus the
//! freshness timestamps the refresh policy runs on.
//!
//! ## Stored Format
//!
//! ```json
//! {
//!   "domain_data": {
//!     "github.com": {
//!       "ip": "140.82.114.25",
//!       "lastUpdated": "2025-01-09T12:00:00Z",
//!       "lastChecked": "2025-01-09T13:00:00Z"
//!     }
//!   },
//!   "lastUpdated": "2025-01-09T13:00:00Z"
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

/// A resolved `(ip, domain)` pair, before it is merged into the dataset
///
/// Serialized as a two-element array `["140.82.114.25", "github.com"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "(Ipv4Addr, String)", from = "(Ipv4Addr, String)")]
pub struct HostEntry {
    /// Resolved address
    pub ip: Ipv4Addr,
    /// Domain it belongs to
    pub domain: String,
}

impl HostEntry {
    /// Create a new entry
    pub fn new(ip: Ipv4Addr, domain: impl Into<String>) -> Self {
        Self {
            ip,
            domain: domain.into(),
        }
    }
}

impl From<HostEntry> for (Ipv4Addr, String) {
    fn from(entry: HostEntry) -> Self {
        (entry.ip, entry.domain)
    }
}

impl From<(Ipv4Addr, String)> for HostEntry {
    fn from((ip, domain): (Ipv4Addr, String)) -> Self {
        Self { ip, domain }
    }
}

impl fmt::Display for HostEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ip, self.domain)
    }
}

/// Last known state of one domain
///
/// The domain itself is the key of [`Dataset::records`].
///
/// Invariant: `last_checked >= last_updated`. Checking a domain does not
/// imply that its address changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRecord {
    /// Last resolved address
    pub ip: Ipv4Addr,
    /// When the address last changed
    pub last_updated: DateTime<Utc>,
    /// When the address was last confirmed
    pub last_checked: DateTime<Utc>,
}

impl DomainRecord {
    /// A record freshly resolved at `now`
    pub fn new(ip: Ipv4Addr, now: DateTime<Utc>) -> Self {
        Self {
            ip,
            last_updated: now,
            last_checked: now,
        }
    }
}

/// Per-merge counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Records created or whose address changed
    pub changed: usize,
    /// Records confirmed with the same address
    pub unchanged: usize,
}

/// The whole persisted mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// Records keyed by domain
    #[serde(rename = "domain_data", default)]
    pub records: BTreeMap<String, DomainRecord>,

    /// Last write of the dataset as a whole
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

impl Dataset {
    /// An initialized dataset with zero records
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            records: BTreeMap::new(),
            last_updated: now,
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record of one domain
    pub fn get(&self, domain: &str) -> Option<&DomainRecord> {
        self.records.get(domain)
    }

    /// Whether the dataset must be re-resolved before it is served
    ///
    /// True when it has no records, or when it is older than `window`
    /// (strictly: an age of exactly `window` is still fresh).
    pub fn needs_refresh(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        self.records.is_empty() || now.signed_duration_since(self.last_updated) > window
    }

    /// Project the dataset into host entries in `domains` order
    ///
    /// Domains without a record are skipped.
    pub fn entries_for(&self, domains: &[String]) -> Vec<HostEntry> {
        domains
            .iter()
            .filter_map(|domain| {
                self.records
                    .get(domain)
                    .map(|record| HostEntry::new(record.ip, domain.clone()))
            })
            .collect()
    }

    /// Merge freshly resolved entries
    ///
    /// For each entry, `last_checked` becomes `now`; `last_updated` becomes
    /// `now` only when the address changed or the domain is new. Domains not
    /// in `entries` are left untouched. The dataset timestamp is bumped.
    pub fn merge(&mut self, entries: &[HostEntry], now: DateTime<Utc>) -> MergeSummary {
        let mut summary = MergeSummary::default();

        for entry in entries {
            let last_updated = match self.records.get(&entry.domain) {
                Some(previous) if previous.ip == entry.ip => {
                    summary.unchanged += 1;
                    previous.last_updated
                }
                _ => {
                    summary.changed += 1;
                    now
                }
            };

            self.records.insert(
                entry.domain.clone(),
                DomainRecord {
                    ip: entry.ip,
                    last_updated,
                    last_checked: now,
                },
            );
        }

        self.last_updated = now;
        summary
    }

    /// Mark every record as checked at `now` without changing addresses
    ///
    /// Returns the number of records touched. The dataset timestamp is bumped.
    pub fn touch(&mut self, now: DateTime<Utc>) -> usize {
        for record in self.records.values_mut() {
            record.last_checked = now;
        }
        self.last_updated = now;
        self.records.len()
    }

    /// Overwrite one domain with a live lookup result
    pub fn overwrite(&mut self, domain: &str, ip: Ipv4Addr, now: DateTime<Utc>) -> DomainRecord {
        let record = DomainRecord::new(ip, now);
        self.records.insert(domain.to_string(), record.clone());
        self.last_updated = now;
        record
    }
}
