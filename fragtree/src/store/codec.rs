//! JSON record format for nodes and tree metadata.
//!
//! JSON has no representation for infinities, yet the empty box uses them as
//! sentinels. Coordinates therefore go through [`coord`], which writes
//! non-finite values as the string tokens `"Infinity"`, `"-Infinity"` and
//! `"NaN"` and reads them back.
//!
//! A node record is a flat JSON object. Branch records carry a `children`
//! array; data records never do, which is how [`decode_node`] tells them apart.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bbox::BBox;
use crate::errors::{FragTreeError, FragTreeResult};
use crate::node::{Branch, DataNode, Node, NodeId, Payload};

pub const POSITIVE_INFINITY: &str = "Infinity";
pub const NEGATIVE_INFINITY: &str = "-Infinity";
pub const NOT_A_NUMBER: &str = "NaN";

/// Serde adapter for `f64` fields that may hold infinities.
pub mod coord {
    use super::{NEGATIVE_INFINITY, NOT_A_NUMBER, POSITIVE_INFINITY};
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_nan() {
            serializer.serialize_str(NOT_A_NUMBER)
        } else if *value == f64::INFINITY {
            serializer.serialize_str(POSITIVE_INFINITY)
        } else if *value == f64::NEG_INFINITY {
            serializer.serialize_str(NEGATIVE_INFINITY)
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(CoordVisitor)
    }

    struct CoordVisitor;

    impl<'de> Visitor<'de> for CoordVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number or one of \"Infinity\", \"-Infinity\", \"NaN\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                POSITIVE_INFINITY => Ok(f64::INFINITY),
                NEGATIVE_INFINITY => Ok(f64::NEG_INFINITY),
                NOT_A_NUMBER => Ok(f64::NAN),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct BranchRecord {
    id: NodeId,
    #[serde(flatten)]
    bbox: BBox,
    children: Vec<NodeId>,
    height: u32,
    leaf: bool,
}

#[derive(Serialize, Deserialize)]
struct DataRecord {
    id: NodeId,
    #[serde(flatten)]
    bbox: BBox,
    #[serde(flatten)]
    payload: Payload,
}

pub fn encode_node(node: &Node) -> FragTreeResult<Vec<u8>> {
    let bytes = match node {
        Node::Branch(branch) => serde_json::to_vec(&BranchRecord {
            id: branch.id,
            bbox: branch.bbox,
            children: branch.children.clone(),
            height: branch.height,
            leaf: branch.leaf,
        })?,
        Node::Data(data) => serde_json::to_vec(&DataRecord {
            id: data.id,
            bbox: data.bbox,
            payload: data.payload.clone(),
        })?,
    };
    Ok(bytes)
}

pub fn decode_node(bytes: &[u8]) -> FragTreeResult<Node> {
    let value: Value = serde_json::from_slice(bytes)?;
    let is_branch = match &value {
        Value::Object(fields) => fields.contains_key("children"),
        other => {
            return Err(FragTreeError::Serialization(format!(
                "node record must be a JSON object, found {}",
                other
            )))
        }
    };

    if is_branch {
        let record: BranchRecord = serde_json::from_value(value)?;
        Ok(Node::Branch(Branch {
            id: record.id,
            bbox: record.bbox,
            children: record.children,
            height: record.height,
            leaf: record.leaf,
        }))
    } else {
        let record: DataRecord = serde_json::from_value(value)?;
        Ok(Node::Data(DataNode {
            id: record.id,
            bbox: record.bbox,
            payload: record.payload,
        }))
    }
}

/// Store key of a node record.
pub fn node_key(id: NodeId) -> Vec<u8> {
    id.to_string().into_bytes()
}
