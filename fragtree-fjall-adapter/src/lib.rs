//! Fjall storage for fragtree.
//!
//! [`FjallStore`] keeps node records in one partition of a Fjall keyspace
//! and [`FjallRTree`] opens a tree on it from an [`fragtree::RTreeConfig`].

mod config;
mod store;
mod tree;

pub use config::*;
pub use store::FjallStore;
pub use tree::FjallRTree;
