//! LRU cache for tree nodes.
//!
//! Every node counts as one unit regardless of its size. Whenever an entry
//! leaves the cache because of capacity or age, it is handed to an
//! [`EvictionSink`] exactly once; explicit removal never reaches the sink.
//!
//! Entries older than the cache TTL are still served (stale-while-revalidate):
//! the read that finds a stale entry returns it and drops it from the cache
//! through the sink, so the next read goes to the backend.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::errors::FragTreeResult;
use crate::node::{Node, NodeId};

/// Age after which a cached node is considered stale.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Receives nodes leaving the cache.
pub trait EvictionSink {
    fn evicted(&mut self, id: NodeId, node: Node) -> FragTreeResult<()>;
}

impl<F> EvictionSink for F
where
    F: FnMut(NodeId, Node) -> FragTreeResult<()>,
{
    fn evicted(&mut self, id: NodeId, node: Node) -> FragTreeResult<()> {
        self(id, node)
    }
}

struct CachedNode {
    node: Node,
    cached_at: Instant,
}

pub struct NodeCache {
    entries: LruCache<NodeId, CachedNode>,
    ttl: Duration,
}

impl NodeCache {
    /// Creates a cache holding at most `capacity` nodes (at least one).
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Looks up a node, marking it most recently used.
    ///
    /// A stale entry is returned and then evicted through `sink`.
    pub fn get(&mut self, id: NodeId, sink: &mut impl EvictionSink) -> FragTreeResult<Option<Node>> {
        let stale = match self.entries.get(&id) {
            None => return Ok(None),
            Some(entry) => entry.cached_at.elapsed() > self.ttl,
        };

        if !stale {
            return Ok(self.entries.peek(&id).map(|entry| entry.node.clone()));
        }

        match self.entries.pop(&id) {
            Some(entry) => {
                log::trace!("Serving stale node {} and dropping it from cache", id);
                sink.evicted(id, entry.node.clone())?;
                Ok(Some(entry.node))
            }
            None => Ok(None),
        }
    }

    /// Caches a node, evicting the least recently used entry when full.
    pub fn insert(&mut self, node: Node, sink: &mut impl EvictionSink) -> FragTreeResult<()> {
        let id = node.id();
        let entry = CachedNode {
            node,
            cached_at: Instant::now(),
        };

        if let Some((evicted_id, evicted)) = self.entries.push(id, entry) {
            // push hands back the old value when the key was already cached
            if evicted_id != id {
                log::trace!("Evicting node {} from cache", evicted_id);
                sink.evicted(evicted_id, evicted.node)?;
            }
        }
        Ok(())
    }

    /// Replaces a resident node in place. Returns the node back when it is
    /// not cached.
    pub fn update(&mut self, node: Node) -> Option<Node> {
        match self.entries.get_mut(&node.id()) {
            Some(entry) => {
                entry.node = node;
                None
            }
            None => Some(node),
        }
    }

    /// Drops a node without notifying the eviction sink.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        self.entries.pop(&id).map(|entry| entry.node)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.contains(&id)
    }

    /// Resident nodes, most recently used first.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.entries.iter().map(|(id, entry)| (*id, &entry.node))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
