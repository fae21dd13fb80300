use std::time::Duration;

use super::cache::{EvictionSink, NodeCache};
use super::codec::{decode_node, encode_node, node_key};
use super::meta::{TreeMeta, TREE_INFO_KEY};
use super::KvStore;
use crate::errors::{FragTreeError, FragTreeResult};
use crate::node::{Branch, DataNode, Node, NodeId};

/// Counters describing how node traffic was served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub node_reads: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub backend_reads: u64,
    pub backend_writes: u64,
    pub backend_deletes: u64,
    pub evictions: u64,
}

/// Writes nodes leaving the cache to the backend.
struct WriteBack<'a, S: KvStore> {
    backend: &'a mut S,
    stats: &'a mut StoreStats,
}

impl<S: KvStore> EvictionSink for WriteBack<'_, S> {
    fn evicted(&mut self, id: NodeId, node: Node) -> FragTreeResult<()> {
        let bytes = encode_node(&node)?;
        self.backend.put(&node_key(id), bytes)?;
        self.stats.evictions += 1;
        self.stats.backend_writes += 1;
        Ok(())
    }
}

/// Gives every node a stable id and makes its residency transparent.
///
/// A node lives either in the LRU cache, where the cached copy is
/// authoritative, or in the backend. Reads check the cache first and fall
/// back to the backend without promoting the node into the cache; only
/// freshly created nodes enter the cache.
pub struct NodeStore<S: KvStore> {
    backend: S,
    cache: NodeCache,
    next_id: NodeId,
    stats: StoreStats,
}

impl<S: KvStore> NodeStore<S> {
    /// Wraps `backend`, handing out ids starting at `next_id`.
    pub fn new(backend: S, cache_size: usize, cache_ttl: Duration, next_id: NodeId) -> Self {
        Self {
            backend,
            cache: NodeCache::new(cache_size, cache_ttl),
            next_id,
            stats: StoreStats::default(),
        }
    }

    /// Returns a fresh id. Ids are never handed out twice.
    pub fn allocate(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// The id the next [`NodeStore::allocate`] call returns.
    pub fn next_id(&self) -> NodeId {
        self.next_id
    }

    pub fn get(&mut self, id: NodeId) -> FragTreeResult<Node> {
        self.stats.node_reads += 1;

        let mut sink = WriteBack {
            backend: &mut self.backend,
            stats: &mut self.stats,
        };
        if let Some(node) = self.cache.get(id, &mut sink)? {
            self.stats.cache_hits += 1;
            return Ok(node);
        }

        self.stats.cache_misses += 1;
        self.stats.backend_reads += 1;
        match self.backend.get(&node_key(id))? {
            Some(bytes) => decode_node(&bytes),
            None => Err(FragTreeError::NodeNotFound(id)),
        }
    }

    pub fn get_branch(&mut self, id: NodeId) -> FragTreeResult<Branch> {
        self.get(id)?.into_branch()
    }

    pub fn get_data(&mut self, id: NodeId) -> FragTreeResult<DataNode> {
        self.get(id)?.into_data()
    }

    /// Places a newly created node in the cache, possibly evicting another.
    pub fn insert(&mut self, node: impl Into<Node>) -> FragTreeResult<()> {
        let mut sink = WriteBack {
            backend: &mut self.backend,
            stats: &mut self.stats,
        };
        self.cache.insert(node.into(), &mut sink)
    }

    /// Persists a mutated node: in place when cached, straight to the
    /// backend otherwise.
    pub fn put(&mut self, node: impl Into<Node>) -> FragTreeResult<()> {
        if let Some(node) = self.cache.update(node.into()) {
            let bytes = encode_node(&node)?;
            self.backend.put(&node_key(node.id()), bytes)?;
            self.stats.backend_writes += 1;
        }
        Ok(())
    }

    /// Destroys a node. A cached node is dropped without write-back.
    pub fn delete(&mut self, id: NodeId) -> FragTreeResult<()> {
        if self.cache.remove(id).is_none() {
            self.backend.delete(&node_key(id))?;
            self.stats.backend_deletes += 1;
        }
        Ok(())
    }

    pub fn write_meta(&mut self, meta: &TreeMeta) -> FragTreeResult<()> {
        self.backend.put(TREE_INFO_KEY, meta.encode()?)
    }

    /// Writes every resident node to the backend and makes it durable.
    /// Nodes stay cached.
    pub fn flush(&mut self) -> FragTreeResult<()> {
        for (id, node) in self.cache.iter() {
            let bytes = encode_node(node)?;
            self.backend.put(&node_key(id), bytes)?;
            self.stats.backend_writes += 1;
        }
        self.backend.flush()
    }

    /// Flushes and closes the backend.
    pub fn close(&mut self) -> FragTreeResult<()> {
        self.flush()?;
        self.backend.close()
    }

    pub fn is_cached(&self, id: NodeId) -> bool {
        self.cache.contains(id)
    }

    pub fn cached_nodes(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache.capacity()
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::node::Payload;
    use crate::store::{MemoryStore, DEFAULT_CACHE_TTL};

    fn store(capacity: usize) -> (NodeStore<MemoryStore>, MemoryStore) {
        let backend = MemoryStore::new();
        let observer = backend.clone();
        (NodeStore::new(backend, capacity, DEFAULT_CACHE_TTL, 0), observer)
    }

    fn data(id: NodeId) -> DataNode {
        DataNode {
            id,
            bbox: BBox::point(id as f64, id as f64),
            payload: Payload::new(),
        }
    }

    #[test]
    fn test_allocate_is_monotonic() {
        let (mut nodes, _) = store(4);
        assert_eq!(nodes.allocate(), 0);
        assert_eq!(nodes.allocate(), 1);
        assert_eq!(nodes.next_id(), 2);
    }

    #[test]
    fn test_eviction_writes_back() {
        let (mut nodes, observer) = store(2);
        for id in 0..3 {
            nodes.insert(data(id)).unwrap();
        }

        assert!(observer.contains_key(b"0"));
        assert!(!observer.contains_key(b"1"));
        assert_eq!(nodes.cached_nodes(), 2);
        assert_eq!(nodes.stats().evictions, 1);

        // miss reads the backend and does not re-cache
        let node = nodes.get_data(0).unwrap();
        assert_eq!(node, data(0));
        assert!(!nodes.is_cached(0));
        assert_eq!(nodes.stats().cache_misses, 1);
    }

    #[test]
    fn test_put_writes_through_when_not_resident() {
        let (mut nodes, observer) = store(1);
        nodes.insert(data(0)).unwrap();
        nodes.insert(data(1)).unwrap();

        let mut changed = data(0);
        changed.bbox = BBox::new(0.0, 0.0, 9.0, 9.0);
        nodes.put(changed.clone()).unwrap();

        assert!(!nodes.is_cached(0));
        assert_eq!(nodes.get_data(0).unwrap(), changed);
        assert_eq!(observer.len(), 1);
    }

    #[test]
    fn test_put_updates_resident_without_backend_write() {
        let (mut nodes, observer) = store(4);
        nodes.insert(Branch::empty(0)).unwrap();

        let mut root = Branch::empty(0);
        root.children.push(7);
        nodes.put(root.clone()).unwrap();

        assert!(observer.is_empty());
        assert_eq!(nodes.get_branch(0).unwrap(), root);
    }

    #[test]
    fn test_delete_resident_skips_backend() {
        let (mut nodes, observer) = store(4);
        nodes.insert(data(0)).unwrap();
        nodes.delete(0).unwrap();

        assert!(observer.is_empty());
        assert_eq!(nodes.stats().backend_deletes, 0);
        assert!(matches!(
            nodes.get(0),
            Err(FragTreeError::NodeNotFound(0))
        ));
    }

    #[test]
    fn test_delete_persisted_node() {
        let (mut nodes, observer) = store(1);
        nodes.insert(data(0)).unwrap();
        nodes.insert(data(1)).unwrap();
        assert!(observer.contains_key(b"0"));

        nodes.delete(0).unwrap();
        assert!(!observer.contains_key(b"0"));
        assert_eq!(nodes.stats().backend_deletes, 1);
    }

    #[test]
    fn test_flush_keeps_nodes_cached() {
        let (mut nodes, observer) = store(4);
        nodes.insert(data(0)).unwrap();
        nodes.insert(Branch::empty(1)).unwrap();
        nodes.flush().unwrap();

        assert_eq!(observer.len(), 2);
        assert_eq!(nodes.cached_nodes(), 2);
    }

    #[test]
    fn test_close_persists_meta_and_nodes() {
        let (mut nodes, observer) = store(4);
        let id = nodes.allocate();
        nodes.insert(Branch::empty(id)).unwrap();
        let meta = TreeMeta {
            max_entries: 9,
            min_entries: 4,
            id_counter: nodes.next_id(),
            total_items: 0,
            cache_size: 4,
            root_id: id,
        };
        nodes.write_meta(&meta).unwrap();
        nodes.close().unwrap();

        assert_eq!(TreeMeta::load(&observer).unwrap(), Some(meta));
        assert!(observer.contains_key(b"0"));
        assert!(nodes.get(5).is_err());
    }

    #[test]
    fn test_get_unknown_id() {
        let (mut nodes, _) = store(4);
        assert!(matches!(
            nodes.get(42),
            Err(FragTreeError::NodeNotFound(42))
        ));
    }
}
