use super::RTree;
use crate::bbox::BBox;
use crate::errors::FragTreeResult;
use crate::node::{Branch, DataNode, NodeId};
use crate::store::KvStore;

impl<S: KvStore> RTree<S> {
    /// Returns every data node whose box intersects `bbox`.
    ///
    /// Subtrees whose box lies entirely inside `bbox` are collected without
    /// testing their items one by one.
    pub fn search(&mut self, bbox: &BBox) -> FragTreeResult<Vec<DataNode>> {
        self.check_closed()?;

        let mut result = Vec::new();
        let root = self.root()?;
        if !bbox.intersects(&root.bbox) {
            return Ok(result);
        }

        let mut to_search: Vec<Branch> = Vec::new();
        let mut node = Some(root);

        while let Some(current) = node {
            for &child_id in &current.children {
                let child = self.store.get(child_id)?;
                if !bbox.intersects(child.bbox()) {
                    continue;
                }

                if current.leaf {
                    result.push(child.into_data()?);
                } else if bbox.contains(child.bbox()) {
                    self.collect_all(child.into_branch()?, &mut result)?;
                } else {
                    to_search.push(child.into_branch()?);
                }
            }
            node = to_search.pop();
        }

        Ok(result)
    }

    /// True when at least one data node intersects `bbox`.
    pub fn collides(&mut self, bbox: &BBox) -> FragTreeResult<bool> {
        self.check_closed()?;

        let root = self.root()?;
        if !bbox.intersects(&root.bbox) {
            return Ok(false);
        }

        let mut to_search: Vec<Branch> = Vec::new();
        let mut node = Some(root);

        while let Some(current) = node {
            for &child_id in &current.children {
                let child = self.store.get(child_id)?;
                if bbox.intersects(child.bbox()) {
                    if current.leaf || bbox.contains(child.bbox()) {
                        return Ok(true);
                    }
                    to_search.push(child.into_branch()?);
                }
            }
            node = to_search.pop();
        }

        Ok(false)
    }

    /// Every data node in the tree.
    pub fn all(&mut self) -> FragTreeResult<Vec<DataNode>> {
        self.check_closed()?;

        let mut result = Vec::new();
        let root = self.root()?;
        self.collect_all(root, &mut result)?;
        Ok(result)
    }

    fn collect_all(&mut self, node: Branch, result: &mut Vec<DataNode>) -> FragTreeResult<()> {
        let mut to_search: Vec<NodeId> = Vec::new();
        let mut node = Some(node);

        while let Some(current) = node {
            if current.leaf {
                for &child_id in &current.children {
                    result.push(self.store.get_data(child_id)?);
                }
            } else {
                to_search.extend_from_slice(&current.children);
            }

            node = match to_search.pop() {
                Some(id) => Some(self.store.get_branch(id)?),
                None => None,
            };
        }
        Ok(())
    }
}
