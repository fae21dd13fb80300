use super::RTree;
use crate::errors::FragTreeResult;
use crate::node::{Branch, DataNode, Item};
use crate::store::KvStore;

impl<S: KvStore> RTree<S> {
    /// Removes one data node equal to `item` (same box, same payload).
    ///
    /// Returns `false` and leaves the tree untouched when nothing matches.
    pub fn remove(&mut self, item: &Item) -> FragTreeResult<bool> {
        self.remove_with(item, |item, data| item.matches(data))
    }

    /// Removes the first data node for which `equals` holds.
    ///
    /// Only branches whose box contains the item box are visited, so
    /// `equals` never sees data nodes outside of it.
    pub fn remove_with<F>(&mut self, item: &Item, mut equals: F) -> FragTreeResult<bool>
    where
        F: FnMut(&Item, &DataNode) -> bool,
    {
        self.check_closed()?;

        let bbox = item.bbox;
        let mut path: Vec<Branch> = Vec::new();
        let mut indexes: Vec<usize> = Vec::new();
        let mut node = Some(self.root()?);
        let mut index = 0;
        let mut going_up = false;

        // depth-first traversal, the parent of `node` is the last entry of `path`
        loop {
            let current = match node.take() {
                Some(current) => current,
                None => match path.pop() {
                    Some(current) => {
                        index = indexes.pop().unwrap_or(0);
                        going_up = true;
                        current
                    }
                    None => break,
                },
            };

            if current.leaf {
                let mut found = None;
                for (position, &child_id) in current.children.iter().enumerate() {
                    let data = self.store.get_data(child_id)?;
                    if equals(item, &data) {
                        found = Some(position);
                        break;
                    }
                }

                if let Some(position) = found {
                    let mut leaf = current;
                    let removed = leaf.children.remove(position);
                    self.store.delete(removed)?;
                    self.store.put(leaf.clone())?;
                    self.total_items = self.total_items.saturating_sub(1);

                    path.push(leaf);
                    self.condense(path)?;
                    return Ok(true);
                }
            }

            if !going_up && !current.leaf && current.bbox.contains(&bbox) {
                // go down
                let first = current.children.first().copied();
                path.push(current);
                indexes.push(index);
                index = 0;
                node = match first {
                    Some(id) => Some(self.store.get_branch(id)?),
                    None => None,
                };
            } else if let Some(parent) = path.last() {
                // go right
                index += 1;
                let next = parent.children.get(index).copied();
                node = match next {
                    Some(id) => Some(self.store.get_branch(id)?),
                    None => None,
                };
                going_up = false;
            }
        }

        Ok(false)
    }

    /// Walks `path` from the leaf back to the root, unlinking and deleting
    /// emptied branches and recomputing the boxes of the others.
    fn condense(&mut self, mut path: Vec<Branch>) -> FragTreeResult<()> {
        for level in (0..path.len()).rev() {
            if !path[level].children.is_empty() {
                self.calc_bbox(&mut path[level])?;
                continue;
            }

            let empty_id = path[level].id;
            if level > 0 {
                let parent = &mut path[level - 1];
                if let Some(position) = parent.children.iter().position(|&id| id == empty_id) {
                    parent.children.remove(position);
                }
                self.store.put(parent.clone())?;
                self.store.delete(empty_id)?;
            } else {
                self.reset_root()?;
            }
        }
        Ok(())
    }

    /// Deletes every node and starts over with an empty root.
    pub fn clear(&mut self) -> FragTreeResult<()> {
        self.check_closed()?;
        self.reset_root()?;
        self.total_items = 0;
        Ok(())
    }

    fn reset_root(&mut self) -> FragTreeResult<()> {
        let mut to_delete = vec![self.root_id];
        while let Some(id) = to_delete.pop() {
            let node = self.store.get(id)?;
            if let Ok(branch) = node.into_branch() {
                to_delete.extend_from_slice(&branch.children);
            }
            self.store.delete(id)?;
        }

        let old_root = self.root_id;
        self.root_id = self.create_root()?;
        log::debug!("Replaced root {} with empty root {}", old_root, self.root_id);
        Ok(())
    }
}
