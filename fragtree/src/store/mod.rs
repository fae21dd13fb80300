//! Node storage: a byte-addressed backend behind an LRU node cache.
//!
//! This module provides:
//! - [`KvStore`], the interface to the persistent key-value engine
//! - [`MemoryStore`], an in-process backend for tests and scratch trees
//! - [`NodeStore`], which allocates node ids, caches nodes and writes evicted
//!   nodes back to the backend
//! - the JSON record [`codec`] shared by all backends

pub mod cache;
pub mod codec;
pub mod memory;
pub mod meta;
pub mod node_store;

pub use cache::{EvictionSink, NodeCache, DEFAULT_CACHE_TTL};
pub use memory::MemoryStore;
pub use meta::{TreeMeta, TREE_INFO_KEY};
pub use node_store::{NodeStore, StoreStats};

use crate::errors::FragTreeResult;

/// A persistent byte-addressed key-value store.
///
/// Keys are opaque identifiers: decimal node ids and the reserved
/// [`TREE_INFO_KEY`]. Implementations report failures as
/// [`crate::FragTreeError::Backend`] naming the operation and the key.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> FragTreeResult<Option<Vec<u8>>>;

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> FragTreeResult<()>;

    fn delete(&mut self, key: &[u8]) -> FragTreeResult<()>;

    /// Makes every write so far durable.
    fn flush(&mut self) -> FragTreeResult<()>;

    /// Flushes and releases the store. Further calls fail.
    fn close(&mut self) -> FragTreeResult<()>;
}
