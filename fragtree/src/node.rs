//! Tree node types.
//!
//! A tree is an arena of nodes addressed by [`NodeId`]. Branches refer to
//! their children by id only, so every node can be evicted from the cache and
//! persisted on its own.

use serde_json::{Map, Value};

use crate::bbox::BBox;
use crate::errors::{FragTreeError, FragTreeResult};

/// Unique, never reused, identifier of a node.
pub type NodeId = u64;

/// Caller-supplied properties carried by a data node.
pub type Payload = Map<String, Value>;

/// Record field names that payload properties may not shadow.
pub const RESERVED_KEYS: [&str; 8] = [
    "id", "minX", "minY", "maxX", "maxY", "children", "height", "leaf",
];

/// An internal node of the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub id: NodeId,
    pub bbox: BBox,
    /// Child ids; data nodes when `leaf` is set, branches otherwise.
    pub children: Vec<NodeId>,
    /// Distance to the data level, `1` for a leaf-of-branches.
    pub height: u32,
    pub leaf: bool,
}

impl Branch {
    /// A childless leaf-of-branches, the shape of a fresh root.
    pub fn empty(id: NodeId) -> Self {
        Self {
            id,
            bbox: BBox::empty(),
            children: Vec::new(),
            height: 1,
            leaf: true,
        }
    }
}

/// A terminal node holding one indexed item.
#[derive(Debug, Clone, PartialEq)]
pub struct DataNode {
    pub id: NodeId,
    pub bbox: BBox,
    pub payload: Payload,
}

impl DataNode {
    /// Drops the id, giving back the item as it was inserted.
    pub fn to_item(&self) -> Item {
        Item {
            bbox: self.bbox,
            payload: self.payload.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Branch(Branch),
    Data(DataNode),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Branch(branch) => branch.id,
            Node::Data(data) => data.id,
        }
    }

    pub fn bbox(&self) -> &BBox {
        match self {
            Node::Branch(branch) => &branch.bbox,
            Node::Data(data) => &data.bbox,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Node::Branch(_))
    }

    pub fn into_branch(self) -> FragTreeResult<Branch> {
        match self {
            Node::Branch(branch) => Ok(branch),
            Node::Data(data) => Err(FragTreeError::InvalidOperation(format!(
                "Expected branch node, found data node {}",
                data.id
            ))),
        }
    }

    pub fn into_data(self) -> FragTreeResult<DataNode> {
        match self {
            Node::Data(data) => Ok(data),
            Node::Branch(branch) => Err(FragTreeError::InvalidOperation(format!(
                "Expected data node, found branch {}",
                branch.id
            ))),
        }
    }
}

impl From<Branch> for Node {
    fn from(branch: Branch) -> Self {
        Node::Branch(branch)
    }
}

impl From<DataNode> for Node {
    fn from(data: DataNode) -> Self {
        Node::Data(data)
    }
}

/// An item to index: a box plus arbitrary properties.
///
/// ```rust
/// use fragtree::{BBox, Item};
///
/// let station = Item::new(BBox::point(4.35, 50.85))
///     .with("name", "Brussel-Centraal")
///     .with("type", "http://vocab.gtfs.org/terms#station");
/// assert_eq!(station.payload["name"], "Brussel-Centraal");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Item {
    pub bbox: BBox,
    pub payload: Payload,
}

impl Item {
    pub fn new(bbox: BBox) -> Self {
        Self {
            bbox,
            payload: Payload::new(),
        }
    }

    /// Adds a payload property.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Rejects payloads whose keys would collide with the stored record layout.
    pub(crate) fn validate(&self) -> FragTreeResult<()> {
        match self
            .payload
            .keys()
            .find(|key| RESERVED_KEYS.contains(&key.as_str()))
        {
            Some(key) => Err(FragTreeError::InvalidItem(format!(
                "payload property '{}' is reserved",
                key
            ))),
            None => Ok(()),
        }
    }

    /// Structural equality ignoring node ids; the default matcher of `remove`.
    pub fn matches(&self, node: &DataNode) -> bool {
        self.bbox == node.bbox && self.payload == node.payload
    }
}
