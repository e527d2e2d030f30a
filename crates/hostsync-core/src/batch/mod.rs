//! Batch orchestration
//!
//! Drives the resolver over a whole domain list: fixed-size batches resolved
//! concurrently, batches run strictly one after another with a pacing delay
//! in between.
//!
//! ```text
//! batch 1: [d1 d2 d3 d4 d5] ── join ──▶ pace ──▶ batch 2: [d6 d7] ── join ──▶ done
//! ```
//!
//! A slow or failing domain never blocks its siblings, but the next batch
//! waits for the whole current one. Failed domains are dropped from the
//! result; they are not retried at this layer.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::BatchConfig;
use crate::dataset::HostEntry;
use crate::resolver::{IpResolver, ResolveFailure, ResolveOutcome};

/// Result of a full batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Resolved entries, in input order
    pub entries: Vec<HostEntry>,
    /// Domains that did not resolve, with the reason
    pub failures: Vec<(String, ResolveFailure)>,
    /// Number of batches executed
    pub batches: usize,
}

/// Resolves domain lists in paced, concurrent batches
#[derive(Clone)]
pub struct BatchResolver {
    resolver: Arc<IpResolver>,
    batch_size: usize,
    pacing: Duration,
}

impl BatchResolver {
    /// Create a batch resolver
    pub fn new(resolver: Arc<IpResolver>, batch_size: usize, pacing: Duration) -> Self {
        Self {
            resolver,
            batch_size: batch_size.max(1),
            pacing,
        }
    }

    /// Create a batch resolver from configuration
    pub fn from_config(resolver: Arc<IpResolver>, config: &BatchConfig) -> Self {
        Self::new(resolver, config.batch_size, config.pacing())
    }

    /// Resolve every domain, keeping only the successes
    pub async fn resolve_all(&self, domains: &[String]) -> Vec<HostEntry> {
        self.run(domains).await.entries
    }

    /// Resolve every domain and report successes and failures
    pub async fn run(&self, domains: &[String]) -> BatchReport {
        let mut report = BatchReport::default();
        let total = domains.len().div_ceil(self.batch_size);

        for (index, batch) in domains.chunks(self.batch_size).enumerate() {
            info!("Processing batch {}/{}", index + 1, total);

            let outcomes = join_all(batch.iter().map(|domain| async move {
                let outcome = self.resolver.resolve(domain, None).await;
                info!("Domain: {}, IP: {}", domain, outcome);
                (domain, outcome)
            }))
            .await;

            for (domain, outcome) in outcomes {
                match outcome {
                    ResolveOutcome::Resolved(ip) => {
                        report.entries.push(HostEntry::new(ip, domain.clone()));
                    }
                    ResolveOutcome::Failed(reason) => {
                        report.failures.push((domain.clone(), reason));
                    }
                }
            }
            report.batches += 1;

            if index + 1 < total && !self.pacing.is_zero() {
                debug!("Pacing {:?} before next batch", self.pacing);
                tokio::time::sleep(self.pacing).await;
            }
        }

        info!(
            "Total entries found: {} ({} unresolved)",
            report.entries.len(),
            report.failures.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{Provider, RetryPolicy};
    use crate::traits::{LookupRequest, LookupResponse, LookupTransport};
    use async_trait::async_trait;

    /// Resolves `hostN.test` to `10.0.0.N`; names containing "bad" fail
    struct IndexTransport;

    #[async_trait]
    impl LookupTransport for IndexTransport {
        async fn fetch(&self, request: &LookupRequest) -> crate::Result<LookupResponse> {
            if request.url.contains("bad") {
                return Ok(LookupResponse::new(404, ""));
            }
            let n: u8 = request
                .url
                .split("name=host")
                .nth(1)
                .and_then(|rest| rest.split('.').next())
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            Ok(LookupResponse::new(
                200,
                format!(r#"{{"Answer":[{{"type":1,"data":"10.0.0.{}"}}]}}"#, n),
            ))
        }

        fn transport_name(&self) -> &'static str {
            "index"
        }
    }

    fn batcher(batch_size: usize) -> BatchResolver {
        let resolver = IpResolver::new(
            Arc::new(IndexTransport),
            vec![Provider::Cloudflare],
            RetryPolicy::no_retry(),
        );
        BatchResolver::new(Arc::new(resolver), batch_size, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_order_and_failures() {
        let domains: Vec<String> = ["host1.test", "bad.test", "host3.test", "host4.test"]
            .iter()
            .map(|d| d.to_string())
            .collect();

        let report = batcher(2).run(&domains).await;

        assert_eq!(report.batches, 2);
        assert_eq!(
            report.entries,
            vec![
                HostEntry::new("10.0.0.1".parse().unwrap(), "host1.test"),
                HostEntry::new("10.0.0.3".parse().unwrap(), "host3.test"),
                HostEntry::new("10.0.0.4".parse().unwrap(), "host4.test"),
            ]
        );
        assert_eq!(
            report.failures,
            vec![("bad.test".to_string(), ResolveFailure::HttpStatus(404))]
        );
    }

    #[tokio::test]
    async fn test_empty_domain_list() {
        let report = batcher(5).run(&[]).await;
        assert_eq!(report, BatchReport::default());
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_clamped() {
        let domains = vec!["host1.test".to_string(), "host2.test".to_string()];
        let report = batcher(0).run(&domains).await;
        assert_eq!(report.batches, 2);
        assert_eq!(report.entries.len(), 2);
    }
}
