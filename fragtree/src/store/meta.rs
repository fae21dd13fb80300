use serde::{Deserialize, Serialize};

use super::KvStore;
use crate::errors::FragTreeResult;
use crate::node::NodeId;

/// Reserved store key of the metadata record.
pub const TREE_INFO_KEY: &[u8] = b"TREE_INFO";

/// Tree-wide settings and counters, persisted as one record next to the nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeMeta {
    pub max_entries: usize,
    pub min_entries: usize,
    /// Next node id to hand out.
    pub id_counter: NodeId,
    pub total_items: u64,
    pub cache_size: usize,
    pub root_id: NodeId,
}

impl TreeMeta {
    pub fn encode(&self) -> FragTreeResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> FragTreeResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Reads the metadata record, `None` when the store holds no tree.
    pub fn load(store: &impl KvStore) -> FragTreeResult<Option<Self>> {
        store
            .get(TREE_INFO_KEY)?
            .map(|bytes| Self::decode(&bytes))
            .transpose()
    }
}
