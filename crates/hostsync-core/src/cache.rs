//! Cache store adapter
//!
//! Thin pass-through between the [`Dataset`] and the key-value store: one
//! key, full-document reads and writes. Errors are returned to the caller
//! unlogged; the refresh coordinator decides how to degrade.

use std::sync::Arc;

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::traits::KvStore;

/// Reads and writes the dataset under a single store key
#[derive(Clone)]
pub struct CacheStore {
    kv: Arc<dyn KvStore>,
    key: String,
}

impl CacheStore {
    /// Create an adapter over `kv`, using `key` for the dataset
    pub fn new(kv: Arc<dyn KvStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    /// Store key of the dataset
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the dataset
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Dataset))`: Initialized dataset (possibly with zero records)
    /// - `Ok(None)`: Never initialized
    /// - `Err(Error)`: Store failure, or a document that doesn't decode
    pub async fn load(&self) -> Result<Option<Dataset>> {
        match self.kv.get(&self.key).await? {
            Some(value) => {
                let dataset = serde_json::from_value(value).map_err(|e| {
                    Error::corrupted(format!("Dataset under key {} does not decode: {}", self.key, e))
                })?;
                Ok(Some(dataset))
            }
            None => Ok(None),
        }
    }

    /// Persist the whole dataset
    pub async fn save(&self, dataset: &Dataset) -> Result<()> {
        let json = serde_json::to_string(dataset)?;
        self.kv.put(&self.key, json).await
    }

    /// Delete the dataset
    pub async fn clear(&self) -> Result<()> {
        self.kv.delete(&self.key).await
    }
}
