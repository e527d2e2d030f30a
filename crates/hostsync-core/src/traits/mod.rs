//! Core traits for the hostsync system
//!
//! This module defines the seams to the external collaborators.
//!
//! - [`LookupTransport`]: Perform one outbound lookup request
//! - [`KvStore`]: Persistent key-value storage for the dataset

pub mod lookup_transport;
pub mod kv_store;

pub use lookup_transport::{LookupTransport, LookupRequest, LookupResponse};
pub use kv_store::KvStore;
