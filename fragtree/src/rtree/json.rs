use serde_json::{Map, Value};

use super::RTree;
use crate::errors::FragTreeResult;
use crate::node::{Branch, DataNode, Node};
use crate::store::KvStore;

/// A dumped node waiting for its children to be attached.
struct Slot {
    fields: Map<String, Value>,
    branch: Option<(u32, bool)>,
    children: Vec<usize>,
}

impl Slot {
    fn branch(branch: &Branch) -> FragTreeResult<Self> {
        Ok(Self {
            fields: bbox_fields(branch.bbox)?,
            branch: Some((branch.height, branch.leaf)),
            children: Vec::new(),
        })
    }

    fn data(data: &DataNode) -> FragTreeResult<Self> {
        let mut fields = bbox_fields(data.bbox)?;
        fields.extend(data.payload.clone());
        Ok(Self {
            fields,
            branch: None,
            children: Vec::new(),
        })
    }
}

fn bbox_fields(bbox: crate::bbox::BBox) -> FragTreeResult<Map<String, Value>> {
    match serde_json::to_value(bbox)? {
        Value::Object(fields) => Ok(fields),
        _ => Ok(Map::new()),
    }
}

impl<S: KvStore> RTree<S> {
    /// Dumps the tree as nested JSON without node ids.
    ///
    /// Two trees holding the same items in the same shape produce equal
    /// dumps, whatever ids their nodes were given.
    pub fn to_json(&mut self) -> FragTreeResult<Value> {
        self.check_closed()?;

        let root = self.root()?;
        let mut slots = vec![Slot::branch(&root)?];
        let mut stack = vec![(0usize, root)];

        while let Some((slot, branch)) = stack.pop() {
            for &child_id in &branch.children {
                let child_slot = slots.len();
                slots[slot].children.push(child_slot);
                match self.store.get(child_id)? {
                    Node::Branch(child) => {
                        slots.push(Slot::branch(&child)?);
                        stack.push((child_slot, child));
                    }
                    Node::Data(data) => slots.push(Slot::data(&data)?),
                }
            }
        }

        Ok(assemble(slots))
    }
}

/// Nests the slots bottom-up. Children always come after their parent.
fn assemble(slots: Vec<Slot>) -> Value {
    let mut built: Vec<Option<Value>> = vec![None; slots.len()];

    for (index, slot) in slots.into_iter().enumerate().rev() {
        let Slot {
            mut fields,
            branch,
            children,
        } = slot;

        if let Some((height, leaf)) = branch {
            let children: Vec<Value> = children
                .iter()
                .filter_map(|child| built[*child].take())
                .collect();
            fields.insert("children".into(), Value::Array(children));
            fields.insert("height".into(), Value::from(height));
            fields.insert("leaf".into(), Value::Bool(leaf));
        }
        built[index] = Some(Value::Object(fields));
    }

    built
        .into_iter()
        .next()
        .flatten()
        .unwrap_or(Value::Null)
}
