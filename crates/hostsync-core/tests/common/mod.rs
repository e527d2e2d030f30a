//! Test doubles and common utilities for contract tests
//!
//! These doubles stand in for the two external collaborators: the lookup
//! provider (behind `LookupTransport`) and the key-value store (behind
//! `KvStore`). They count calls so tests can assert on retry and caching
//! behavior.

#![allow(dead_code)]

use hostsync_core::config::SyncConfig;
use hostsync_core::error::{Error, Result};
use hostsync_core::traits::{KvStore, LookupRequest, LookupResponse, LookupTransport};
use hostsync_core::{Dataset, Provider, RefreshCoordinator};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the scripted provider does for one domain
#[derive(Debug, Clone)]
pub enum Script {
    /// 200 with a DoH answer holding one A record
    Address(&'static str),
    /// Respond with this status and body
    Respond(u16, &'static str),
    /// Fail the request at the transport level
    TransportError,
}

/// A lookup transport answering from a per-domain script
///
/// Domains without a script fail at the transport level.
#[derive(Clone)]
pub struct ScriptedTransport {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    calls: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    delay: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    /// Hold every response for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Script a domain (replaces any previous script)
    pub fn script(&self, domain: &str, script: Script) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(domain.to_string(), script);
        self
    }

    /// Total number of requests made
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of requests made for one domain
    pub fn calls_for(&self, domain: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.as_str() == domain)
            .count()
    }

    /// Highest number of requests observed in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Forget recorded calls
    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn domain_of(url: &str) -> String {
        url.split("name=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap_or(url)
            .to_string()
    }
}

#[async_trait::async_trait]
impl LookupTransport for ScriptedTransport {
    async fn fetch(&self, request: &LookupRequest) -> Result<LookupResponse> {
        let domain = Self::domain_of(&request.url);
        self.calls.lock().unwrap().push(domain.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let script = self.scripts.lock().unwrap().get(&domain).cloned();
        match script {
            Some(Script::Address(ip)) => Ok(LookupResponse::new(200, doh_answer(ip))),
            Some(Script::Respond(status, body)) => Ok(LookupResponse::new(status, body)),
            Some(Script::TransportError) | None => {
                Err(Error::transport(format!("connection refused for {}", domain)))
            }
        }
    }

    fn transport_name(&self) -> &'static str {
        "scripted"
    }
}

/// DoH JSON body with a single A record
pub fn doh_answer(ip: &str) -> String {
    format!(
        r#"{{"Status":0,"Answer":[{{"name":"x","type":1,"TTL":60,"data":"{}"}}]}}"#,
        ip
    )
}

/// A key-value store whose operations fail on demand
#[derive(Clone, Default)]
pub struct FailingKvStore {
    inner: hostsync_core::MemoryKvStore,
    pub fail_get: bool,
    pub fail_put: bool,
    pub fail_delete: bool,
    put_attempts: Arc<AtomicUsize>,
}

impl FailingKvStore {
    /// A store where every operation fails
    pub fn broken() -> Self {
        Self {
            fail_get: true,
            fail_put: true,
            fail_delete: true,
            ..Self::default()
        }
    }

    /// A store that rejects reads but accepts writes
    pub fn unreadable() -> Self {
        Self {
            fail_get: true,
            ..Self::default()
        }
    }

    /// A store that reads fine but rejects writes
    pub fn read_only() -> Self {
        Self {
            fail_put: true,
            ..Self::default()
        }
    }

    pub fn put_attempts(&self) -> usize {
        self.put_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl KvStore for FailingKvStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        if self.fail_get {
            return Err(Error::store("get rejected"));
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_put {
            return Err(Error::store("put rejected"));
        }
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.fail_delete {
            return Err(Error::store("delete rejected"));
        }
        self.inner.delete(key).await
    }
}

/// Configuration with test-sized delays
pub fn fast_config(domains: &[&str]) -> SyncConfig {
    let mut config = SyncConfig::with_domains(domains.iter().copied());
    config.providers = vec![Provider::Cloudflare];
    config.retry.initial_delay_ms = 1;
    config.batch.pacing_ms = 0;
    config
}

/// Coordinator over the given doubles
pub fn coordinator(
    transport: &ScriptedTransport,
    kv: Arc<dyn KvStore>,
    config: &SyncConfig,
) -> RefreshCoordinator {
    RefreshCoordinator::from_config(Arc::new(transport.clone()), kv, config)
}

/// Write a dataset straight into the store under the default key
pub async fn seed(kv: &dyn KvStore, dataset: &Dataset) {
    kv.put("domain_data", serde_json::to_string(dataset).unwrap())
        .await
        .unwrap();
}

/// Read the dataset straight from the store under the default key
pub async fn stored(kv: &dyn KvStore) -> Option<Dataset> {
    kv.get("domain_data")
        .await
        .unwrap()
        .map(|value| serde_json::from_value(value).unwrap())
}
