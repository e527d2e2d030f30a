//! Refresh coordinator
//!
//! The only writer of the dataset. Decides whether reads are served from the
//! cache or trigger a full re-resolution, and merges resolution results into
//! the persisted dataset without discarding unaffected records.
//!
//! ## Read Path
//!
//! ```text
//! get_hosts_data
//!   ├─ cache fresh ──────────────▶ project cached records (configured order)
//!   └─ absent / stale / empty ──▶ batch resolve ─▶ merge ─▶ return fresh entries
//! ```
//!
//! ## Failure Policy
//!
//! Nothing here returns an error. Store failures are logged and degrade to an
//! empty list, `None`, or [`UpdateOutcome::Failed`]. A dataset that no longer
//! decodes is treated as absent and rebuilt.
//!
//! Read-modify-write cycles are serialized by an in-process mutex, so
//! concurrent merges from the same process cannot lose each other's updates.
//! Writers in other processes sharing the store still race (last write wins).

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::batch::BatchResolver;
use crate::cache::CacheStore;
use crate::config::SyncConfig;
use crate::dataset::{Dataset, DomainRecord, HostEntry};
use crate::error::Error;
use crate::resolver::{IpResolver, ResolveOutcome};
use crate::traits::{KvStore, LookupTransport};

/// Result of a merge-update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// New entries were merged and persisted
    Merged {
        /// Records created or whose address changed
        changed: usize,
        /// Records confirmed with the same address
        unchanged: usize,
        /// Entries ignored because their domain is not configured
        skipped: usize,
    },

    /// Every record was marked as checked and persisted
    Touched {
        /// Records touched
        records: usize,
    },

    /// Nothing was persisted
    Failed {
        /// Why the update did not happen
        reason: String,
    },
}

impl UpdateOutcome {
    /// Whether the dataset was persisted
    pub fn is_persisted(&self) -> bool {
        !matches!(self, UpdateOutcome::Failed { .. })
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::Merged {
                changed,
                unchanged,
                skipped,
            } => write!(
                f,
                "merged ({} changed, {} unchanged, {} skipped)",
                changed, unchanged, skipped
            ),
            UpdateOutcome::Touched { records } => write!(f, "touched {} record(s)", records),
            UpdateOutcome::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// Serves hosts data and keeps the persisted dataset up to date
pub struct RefreshCoordinator {
    resolver: Arc<IpResolver>,
    batch: BatchResolver,
    cache: CacheStore,
    domains: Vec<String>,
    staleness: chrono::Duration,
    write_lock: Mutex<()>,
}

impl RefreshCoordinator {
    /// Create a coordinator
    ///
    /// # Parameters
    ///
    /// - `resolver`: Single-domain resolver, shared with `batch`
    /// - `batch`: Batch orchestrator used for full re-resolutions
    /// - `cache`: Dataset persistence
    /// - `domains`: Configured domain list, in rendering order
    /// - `staleness`: Age after which the dataset is re-resolved on read
    pub fn new(
        resolver: Arc<IpResolver>,
        batch: BatchResolver,
        cache: CacheStore,
        domains: Vec<String>,
        staleness: chrono::Duration,
    ) -> Self {
        Self {
            resolver,
            batch,
            cache,
            domains,
            staleness,
            write_lock: Mutex::new(()),
        }
    }

    /// Wire a coordinator from configuration
    pub fn from_config(
        transport: Arc<dyn LookupTransport>,
        kv: Arc<dyn KvStore>,
        config: &SyncConfig,
    ) -> Self {
        let resolver = Arc::new(IpResolver::from_config(transport, config));
        let batch = BatchResolver::from_config(resolver.clone(), &config.batch);
        let cache = CacheStore::new(kv, config.cache.key.clone());

        Self::new(
            resolver,
            batch,
            cache,
            config.domains.clone(),
            config.cache.staleness_window(),
        )
    }

    /// Configured domain list
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Current hosts entries
    ///
    /// Served from the cache when it is fresh. When the dataset is absent,
    /// empty, undecodable or older than the staleness window, every configured
    /// domain is re-resolved, the result is merged and persisted, and the
    /// freshly resolved entries are returned. Empty when the store cannot be
    /// read at all.
    pub async fn get_hosts_data(&self) -> Vec<HostEntry> {
        let now = Utc::now();

        let cached = match self.cache.load().await {
            Ok(dataset) => dataset,
            Err(Error::Corrupted(reason)) => {
                warn!("Cached dataset is undecodable, re-resolving: {}", reason);
                None
            }
            Err(e) => {
                error!("Error getting hosts data: {}", e);
                return Vec::new();
            }
        };

        match cached {
            Some(dataset) if !dataset.needs_refresh(now, self.staleness) => {
                debug!(
                    "Serving {} cached record(s), dataset updated at {}",
                    dataset.len(),
                    dataset.last_updated
                );
                dataset.entries_for(&self.domains)
            }
            _ => {
                info!("Dataset absent, empty or stale, resolving all domains");
                let entries = self.fetch_latest_hosts_data().await;
                let outcome = self.update_hosts_data(Some(&entries)).await;
                debug!("Refresh on read: {}", outcome);
                entries
            }
        }
    }

    /// Merge results into the persisted dataset
    ///
    /// With `None`, every existing record is only marked as checked. With
    /// entries, each one is merged: `last_updated` moves only when the address
    /// changed, `last_checked` always moves. Records not in `entries` are kept
    /// as they are. The dataset timestamp is always bumped.
    pub async fn update_hosts_data(&self, new_entries: Option<&[HostEntry]>) -> UpdateOutcome {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();

        let mut dataset = match self.load_for_write(now).await {
            Ok(dataset) => dataset,
            Err(e) => {
                error!("Error updating hosts data: {}", e);
                return UpdateOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let outcome = match new_entries {
            None => UpdateOutcome::Touched {
                records: dataset.touch(now),
            },
            Some(entries) => {
                let (known, skipped) = self.known_entries(entries);
                let summary = dataset.merge(&known, now);
                UpdateOutcome::Merged {
                    changed: summary.changed,
                    unchanged: summary.unchanged,
                    skipped,
                }
            }
        };

        if let Err(e) = self.cache.save(&dataset).await {
            error!("Error updating hosts data: {}", e);
            return UpdateOutcome::Failed {
                reason: e.to_string(),
            };
        }

        info!("Hosts data updated: {}", outcome);
        outcome
    }

    /// Live lookup of one domain
    ///
    /// Ignores the cache freshness entirely. On success the domain's record is
    /// overwritten with the new address and returned; `None` when the lookup
    /// failed. Domains outside the configured list are resolved and returned
    /// but not persisted.
    pub async fn get_domain_data(&self, domain: &str) -> Option<DomainRecord> {
        let ip = match self.resolver.resolve(domain, None).await {
            ResolveOutcome::Resolved(ip) => ip,
            ResolveOutcome::Failed(reason) => {
                info!("Live lookup of {} failed: {}", domain, reason);
                return None;
            }
        };

        let now = Utc::now();
        if !self.is_configured(domain) {
            warn!("Domain {} is not configured, result not persisted", domain);
            return Some(DomainRecord::new(ip, now));
        }

        let _guard = self.write_lock.lock().await;
        let mut dataset = match self.load_for_write(now).await {
            Ok(dataset) => dataset,
            Err(e) => {
                error!("Error getting data for domain {}: {}", domain, e);
                return None;
            }
        };

        let record = dataset.overwrite(domain, ip, now);
        if let Err(e) = self.cache.save(&dataset).await {
            error!("Error getting data for domain {}: {}", domain, e);
            return None;
        }

        Some(record)
    }

    /// Drop the dataset and rebuild it from a full resolution
    ///
    /// Returns the freshly resolved entries; domains that no longer resolve
    /// are absent. Empty when the dataset could not be cleared.
    pub async fn reset_hosts_data(&self) -> Vec<HostEntry> {
        {
            let _guard = self.write_lock.lock().await;
            info!("Clearing dataset...");
            if let Err(e) = self.cache.clear().await {
                error!("Error resetting hosts data: {}", e);
                return Vec::new();
            }
        }

        info!("Dataset cleared, fetching new data...");
        let entries = self.fetch_latest_hosts_data().await;

        let outcome = self.update_hosts_data(Some(&entries)).await;
        if !outcome.is_persisted() {
            warn!("Reset resolved {} entries but did not persist them", entries.len());
        }

        entries
    }

    /// Full resolution over every configured domain
    ///
    /// Does not touch the store.
    pub async fn fetch_latest_hosts_data(&self) -> Vec<HostEntry> {
        self.batch.resolve_all(&self.domains).await
    }

    /// One scheduled cycle: full resolution followed by a merge-update
    pub async fn run_scheduled_refresh(&self) -> UpdateOutcome {
        info!("Running scheduled refresh of {} domain(s)", self.domains.len());
        let entries = self.fetch_latest_hosts_data().await;
        let outcome = self.update_hosts_data(Some(&entries)).await;

        match &outcome {
            UpdateOutcome::Failed { reason } => error!("Scheduled refresh failed: {}", reason),
            _ => info!("Scheduled refresh completed: {}", outcome),
        }
        outcome
    }

    /// Load the dataset for a read-modify-write cycle
    ///
    /// Absent and undecodable datasets start over empty; any other store
    /// failure is returned.
    async fn load_for_write(&self, now: DateTime<Utc>) -> Result<Dataset, Error> {
        match self.cache.load().await {
            Ok(Some(dataset)) => Ok(dataset),
            Ok(None) => Ok(Dataset::empty(now)),
            Err(Error::Corrupted(reason)) => {
                warn!("Discarding undecodable dataset: {}", reason);
                Ok(Dataset::empty(now))
            }
            Err(e) => Err(e),
        }
    }

    fn is_configured(&self, domain: &str) -> bool {
        self.domains.iter().any(|d| d == domain)
    }

    /// Split entries into configured ones and a count of the rest
    fn known_entries(&self, entries: &[HostEntry]) -> (Vec<HostEntry>, usize) {
        let (known, unknown): (Vec<_>, Vec<_>) = entries
            .iter()
            .cloned()
            .partition(|entry| self.is_configured(&entry.domain));

        for entry in &unknown {
            warn!("Ignoring entry for unconfigured domain {}", entry.domain);
        }
        (known, unknown.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{Provider, RetryPolicy};
    use crate::state::MemoryKvStore;
    use crate::traits::{LookupRequest, LookupResponse};
    use async_trait::async_trait;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    /// Every domain resolves to the same address
    struct FixedTransport(&'static str);

    #[async_trait]
    impl LookupTransport for FixedTransport {
        async fn fetch(&self, _request: &LookupRequest) -> crate::Result<LookupResponse> {
            Ok(LookupResponse::new(
                200,
                format!(r#"{{"Answer":[{{"type":1,"data":"{}"}}]}}"#, self.0),
            ))
        }

        fn transport_name(&self) -> &'static str {
            "fixed"
        }
    }

    fn coordinator(kv: &MemoryKvStore, domains: &[&str]) -> RefreshCoordinator {
        let resolver = Arc::new(IpResolver::new(
            Arc::new(FixedTransport("140.82.114.4")),
            vec![Provider::Cloudflare],
            RetryPolicy::no_retry(),
        ));
        let batch = BatchResolver::new(resolver.clone(), 5, Duration::ZERO);
        RefreshCoordinator::new(
            resolver,
            batch,
            CacheStore::new(Arc::new(kv.clone()), "domain_data"),
            domains.iter().map(|d| d.to_string()).collect(),
            chrono::Duration::hours(1),
        )
    }

    fn entry(domain: &str) -> HostEntry {
        HostEntry::new(Ipv4Addr::new(140, 82, 114, 4), domain)
    }

    #[tokio::test]
    async fn test_touch_on_absent_dataset_creates_it() {
        let kv = MemoryKvStore::new();
        let coordinator = coordinator(&kv, &["github.com"]);

        let outcome = coordinator.update_hosts_data(None).await;

        assert_eq!(outcome, UpdateOutcome::Touched { records: 0 });
        assert!(kv.raw("domain_data").await.is_some());
    }

    #[tokio::test]
    async fn test_merge_skips_unconfigured_domains() {
        let kv = MemoryKvStore::new();
        let coordinator = coordinator(&kv, &["github.com"]);

        let outcome = coordinator
            .update_hosts_data(Some(&[entry("github.com"), entry("example.org")]))
            .await;

        assert_eq!(
            outcome,
            UpdateOutcome::Merged {
                changed: 1,
                unchanged: 0,
                skipped: 1
            }
        );
        let raw = kv.raw("domain_data").await.unwrap();
        assert!(!raw.contains("example.org"));
    }

    #[tokio::test]
    async fn test_corrupted_dataset_is_rebuilt_on_update() {
        let kv = MemoryKvStore::new();
        kv.put("domain_data", "{not json".to_string()).await.unwrap();
        let coordinator = coordinator(&kv, &["github.com"]);

        let outcome = coordinator.update_hosts_data(Some(&[entry("github.com")])).await;

        assert!(outcome.is_persisted());
        let cache = CacheStore::new(Arc::new(kv.clone()), "domain_data");
        let dataset = cache.load().await.unwrap().unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_live_lookup_is_not_persisted() {
        let kv = MemoryKvStore::new();
        let coordinator = coordinator(&kv, &["github.com"]);

        let record = coordinator.get_domain_data("example.org").await.unwrap();

        assert_eq!(record.ip, Ipv4Addr::new(140, 82, 114, 4));
        assert!(kv.raw("domain_data").await.is_none());
    }

    #[test]
    fn test_outcome_display() {
        let merged = UpdateOutcome::Merged {
            changed: 2,
            unchanged: 1,
            skipped: 0,
        };
        assert_eq!(merged.to_string(), "merged (2 changed, 1 unchanged, 0 skipped)");
        assert!(merged.is_persisted());

        let failed = UpdateOutcome::Failed {
            reason: "store offline".to_string(),
        };
        assert!(!failed.is_persisted());
    }
}
