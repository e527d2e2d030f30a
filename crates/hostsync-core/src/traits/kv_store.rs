// # Key-Value Store Trait
//
// Defines the interface to the external key-value store that persists the
// dataset as a single JSON document.
//
// ## Purpose
//
// The store is a dumb container: one key, one JSON document, full-document
// reads and writes. It has no knowledge of records, staleness or merging.
//
// ## Implementations
//
// - In-memory: `MemoryKvStore` (tests, ephemeral deployments)
// - File-based: `FileKvStore` (one JSON file per key, atomic writes)

use async_trait::async_trait;

/// Trait for key-value store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks. The
/// store gives no read-modify-write atomicity: two writers racing on one key
/// resolve as last-write-wins.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get the parsed JSON value stored under a key
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Value))`: The stored document
    /// - `Ok(None)`: Nothing stored under this key
    /// - `Err(Error)`: Storage error or undecodable document
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, crate::Error>;

    /// Store a serialized document under a key, replacing any previous value
    async fn put(&self, key: &str, value: String) -> Result<(), crate::Error>;

    /// Delete a key
    ///
    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), crate::Error>;
}
