//! Linked-data vocabulary of exported documents.

use serde_json::{json, Map, Value};

use crate::node::{Branch, DataNode};

pub const CHILD_RELATION_KEY: &str = "tree:hasChildRelation";
pub const CHILD_KEY: &str = "tree:child";
pub const MEMBER_KEY: &str = "hydra:member";
pub const IDENTIFIER_KEY: &str = "dcterms:identifier";
pub const VALUE_KEY: &str = "value";

/// Contexts and type names written into every fragment.
///
/// The default is the TREE / Hydra / WGS84 vocabulary:
///
/// ```rust
/// use fragtree::export::FragmentSchema;
///
/// let schema = FragmentSchema::default();
/// assert_eq!(schema.node_type, "tree:Node");
/// assert_eq!(schema.tree_context["tree"], "https://w3id.org/tree#");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSchema {
    pub data_context: Map<String, Value>,
    pub tree_context: Map<String, Value>,
    pub collection_context: Map<String, Value>,
    pub node_type: String,
    pub relation_type: String,
    pub collection_type: String,
    pub latitude_property: String,
    pub longitude_property: String,
}

impl Default for FragmentSchema {
    fn default() -> Self {
        Self {
            data_context: object(json!({
                "geo": "http://www.w3.org/2003/01/geo/wgs84_pos#",
                "dcterms": "http://dublincore.org/2012/06/14/dcterms"
            })),
            tree_context: object(json!({
                "tree": "https://w3id.org/tree#",
                "value": {
                    "@id": "tree:value",
                    "@type": "http://www.opengis.net/ont/geosparql#wktLiteral"
                },
                "dcterms": "http://dublincore.org/2012/06/14/dcterms",
                "hydra": "http://www.w3.org/ns/hydra/core#"
            })),
            collection_context: object(json!({
                "hydra": "http://www.w3.org/ns/hydra/core#",
                "tree": "https://w3id.org/tree#"
            })),
            node_type: "tree:Node".into(),
            relation_type: "tree:GeospatiallyContainsRelation".into(),
            collection_type: "hydra:Collection".into(),
            latitude_property: "geo:lat".into(),
            longitude_property: "geo:long".into(),
        }
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn document(context: &Map<String, Value>, graph: Vec<Value>) -> Value {
    let mut doc = Map::new();
    doc.insert("@context".into(), Value::Object(context.clone()));
    doc.insert("@graph".into(), Value::Array(graph));
    Value::Object(doc)
}

impl FragmentSchema {
    /// The document describing the whole collection and its entry point.
    pub fn collection_document(
        &self,
        collection: &str,
        manages: &str,
        total_items: u64,
        view: &str,
    ) -> Value {
        let mut description = Map::new();
        description.insert("@id".into(), Value::from(collection));
        description.insert("@type".into(), Value::from(self.collection_type.as_str()));
        description.insert("hydra:manages".into(), Value::from(manages));
        description.insert("hydra:totalItems".into(), Value::from(total_items));
        description.insert(
            "hydra:view".into(),
            json!({ "@id": view, "@type": self.node_type }),
        );
        document(&self.collection_context, vec![Value::Object(description)])
    }

    pub fn tree_document(&self, root: Value) -> Value {
        document(&self.tree_context, vec![root])
    }

    pub fn data_document(&self, records: Vec<Value>) -> Value {
        document(&self.data_context, records)
    }

    /// Head of a branch fragment: type, id, identifier and WKT outline.
    pub fn node_fields(&self, branch: &Branch, page: &str) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("@type".into(), Value::from(self.node_type.as_str()));
        fields.insert("@id".into(), Value::from(format!("{}#{}", page, branch.id)));
        fields.insert(IDENTIFIER_KEY.into(), Value::from(branch.id));
        fields.insert(VALUE_KEY.into(), Value::from(branch.bbox.to_wkt()));
        fields
    }

    pub fn relation(&self, children: Vec<Value>) -> Value {
        let mut relation = Map::new();
        relation.insert("@type".into(), Value::from(self.relation_type.as_str()));
        relation.insert(CHILD_KEY.into(), Value::Array(children));
        Value::Object(relation)
    }

    /// Reference to a branch rendered on another tree page.
    pub fn node_reference(&self, reference: String) -> Value {
        json!({ "@id": reference, "@type": self.node_type })
    }

    /// A data node as published in a data page. Payload first, then the
    /// fragment id and the coordinates of its lower-left corner.
    pub fn data_record(&self, data: &DataNode, page: &str) -> Value {
        let mut record = data.payload.clone();
        record.insert("@id".into(), Value::from(format!("{}#{}", page, data.id)));
        record.insert(self.latitude_property.clone(), Value::from(data.bbox.min_y));
        record.insert(self.longitude_property.clone(), Value::from(data.bbox.min_x));
        Value::Object(record)
    }

    /// Member entry pointing at a data record, typed like its payload.
    pub fn member_reference(&self, data: &DataNode, reference: String) -> Value {
        let mut member = Map::new();
        member.insert("@id".into(), Value::from(reference));
        if let Some(kind) = data.payload.get("type") {
            member.insert("@type".into(), kind.clone());
        }
        Value::Object(member)
    }
}
