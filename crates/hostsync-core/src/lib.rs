// # hostsync-core
//
// Core library for the hosts-data synchronization engine.
//
// Keeps a periodically refreshed mapping from a fixed list of domains to
// their current IPv4 addresses, used to generate a hosts-file override.
//
// ## Architecture Overview
//
// - **IpResolver**: Resolves one domain through a lookup provider, with retry
// - **BatchResolver**: Resolves the whole domain list in paced batches
// - **CacheStore**: Reads and writes the persisted dataset
// - **RefreshCoordinator**: Serves cached data or triggers re-resolution, merges results
// - **SyncEngine**: Scheduled trigger running the refresh on an interval
// - **LookupTransport** / **KvStore**: Traits at the network and storage seams
//
// ## Data Flow
//
// RefreshCoordinator consults CacheStore → if stale or empty, BatchResolver
// fans out to IpResolver per domain → results are merged back into the
// dataset through CacheStore.

pub mod batch;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod render;
pub mod resolver;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use batch::{BatchReport, BatchResolver};
pub use cache::CacheStore;
pub use config::{SyncConfig, StoreConfig, DEFAULT_DOMAINS};
pub use coordinator::{RefreshCoordinator, UpdateOutcome};
pub use dataset::{Dataset, DomainRecord, HostEntry};
pub use engine::{SyncEngine, SyncEvent};
pub use error::{Error, Result};
pub use resolver::{IpResolver, Provider, ResolveFailure, ResolveOutcome, RetryPolicy};
pub use state::{FileKvStore, MemoryKvStore};
pub use traits::{KvStore, LookupRequest, LookupResponse, LookupTransport};
