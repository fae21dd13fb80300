//! # Fragtree - Disk-Backed R-Tree with Linked-Data Export
//!
//! An R-tree over axis-aligned bounding boxes whose nodes live in a
//! key-value store, with only the recently used ones kept in memory. A
//! finished tree can be exported as a set of linked JSON-LD pages that a
//! client walks from the root down to the items it needs.
//!
//! ## Features
//!
//! - **Pluggable Storage**: any [`KvStore`] holds the nodes; an in-memory
//!   store ships with the crate and `fragtree-fjall-adapter` adds a
//!   persistent one
//! - **LRU Node Cache**: bounded, with write-back on eviction
//! - **R\*-style Splits**: split axis by margin, split index by overlap
//! - **Resumable**: tree metadata is persisted next to the nodes
//! - **Fragment Export**: tree pages of uniform height and size-bounded data
//!   pages
//!
//! ## Quick Start
//!
//! ```rust
//! use fragtree::{BBox, Item, MemoryStore, RTree, RTreeConfig};
//! use fragtree::export::{ExportOptions, MemorySink};
//!
//! # fn main() -> fragtree::FragTreeResult<()> {
//! let config = RTreeConfig::builder().max_entries(9).cache_size(1000).build();
//! let mut tree = RTree::with_store(&config, MemoryStore::new())?;
//!
//! tree.insert(Item::new(BBox::point(3.72, 51.05)).with("name", "Gent"))?;
//! tree.insert(Item::new(BBox::point(4.40, 51.22)).with("name", "Antwerpen"))?;
//!
//! let hits = tree.search(&BBox::new(3.0, 50.0, 4.0, 52.0))?;
//! assert_eq!(hits.len(), 1);
//!
//! let options = ExportOptions::builder("stations", "gtfs:Station").build();
//! let mut sink = MemorySink::new();
//! let report = tree.to_fragments(&options, &mut sink)?;
//! assert_eq!(report.data_items, 2);
//! # Ok(())
//! # }
//! ```

pub mod bbox;
pub mod config;
pub mod errors;
pub mod export;
pub mod node;
pub mod rtree;
pub mod store;

pub use bbox::BBox;
pub use config::{RTreeConfig, RTreeConfigBuilder};
pub use errors::{FragTreeError, FragTreeResult};
pub use node::{Branch, DataNode, Item, Node, NodeId, Payload};
pub use rtree::{RTree, RTreeStats};
pub use store::{KvStore, MemoryStore, NodeStore, StoreStats};
