//! Error and result types shared by every layer of the tree.

use std::io;
use thiserror::Error;

use crate::node::NodeId;

/// Errors that can occur while storing, querying or exporting a tree.
#[derive(Debug, Error)]
pub enum FragTreeError {
    /// The tree was configured with missing or invalid settings.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The backing key-value store could not be opened.
    #[error("Failed to open backing store: {0}")]
    StoreOpen(String),

    /// A node id was neither cache-resident nor present in the store.
    #[error("Node {0} not found in cache or store")]
    NodeNotFound(NodeId),

    /// Persisted tree state is absent or unreadable and resuming was required.
    #[error("Malformed persisted state: {0}")]
    MalformedState(String),

    /// The backing store failed while performing `operation` on `key`.
    #[error("Store {operation} failed for key {key}: {message}")]
    Backend {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An item cannot be indexed as given.
    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Tree is closed")]
    Closed,
}

impl FragTreeError {
    /// Builds a [`FragTreeError::Backend`] from any displayable backend error.
    pub fn backend(operation: &'static str, key: &[u8], err: impl std::fmt::Display) -> Self {
        FragTreeError::Backend {
            operation,
            key: String::from_utf8_lossy(key).into_owned(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for FragTreeError {
    fn from(err: serde_json::Error) -> Self {
        FragTreeError::Serialization(err.to_string())
    }
}

/// Result type for tree operations
pub type FragTreeResult<T> = Result<T, FragTreeError>;
