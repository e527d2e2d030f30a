// # Memory KV Store
//
// In-memory implementation of KvStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and for deployments where a cold start simply
// triggers a full re-resolution.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - First read after a restart finds no dataset and resolves everything

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use async_trait::async_trait;

use crate::traits::KvStore;
use crate::Error;

/// In-memory key-value store
///
/// Values are kept as the serialized strings handed to `put`, and parsed on
/// every `get`, so the store behaves like a remote blob store.
///
/// # Example
///
/// ```rust,no_run
/// use hostsync_core::state::MemoryKvStore;
/// use hostsync_core::traits::KvStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryKvStore::new();
///
///     store.put("domain_data", r#"{"lastUpdated":"2025-01-09T12:00:00Z"}"#.to_string()).await?;
///     assert!(store.get("domain_data").await?.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryKvStore {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryKvStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the number of keys in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Get the raw serialized value of a key
    pub async fn raw(&self, key: &str) -> Option<String> {
        self.inner.read().await.get(key).cloned()
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, Error> {
        let guard = self.inner.read().await;
        match guard.get(key) {
            Some(raw) => {
                let value = serde_json::from_str(raw).map_err(|e| {
                    Error::corrupted(format!("Value under key {} is not JSON: {}", key, e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: String) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.remove(key);
        Ok(())
    }
}
