use std::cmp::Ordering;

use super::RTree;
use crate::bbox::BBox;
use crate::errors::{FragTreeError, FragTreeResult};
use crate::node::{Branch, DataNode, Item, NodeId};
use crate::store::KvStore;

#[derive(Debug, Clone, Copy)]
enum Axis {
    X,
    Y,
}

impl Axis {
    fn compare(self, a: &BBox, b: &BBox) -> Ordering {
        let (a, b) = match self {
            Axis::X => (a.min_x, b.min_x),
            Axis::Y => (a.min_y, b.min_y),
        };
        a.partial_cmp(&b).unwrap_or(Ordering::Equal)
    }
}

impl<S: KvStore> RTree<S> {
    /// Indexes one item.
    ///
    /// The item gets a data node of its own. Payload properties named like
    /// the stored record fields are rejected with
    /// [`FragTreeError::InvalidItem`].
    pub fn insert(&mut self, item: Item) -> FragTreeResult<()> {
        self.check_closed()?;
        item.validate()?;

        let id = self.store.allocate();
        let bbox = item.bbox;
        self.store.insert(DataNode {
            id,
            bbox,
            payload: item.payload,
        })?;

        let level = self.root()?.height.saturating_sub(1) as usize;
        self.insert_at(id, &bbox, level)?;
        self.total_items += 1;
        Ok(())
    }

    /// Indexes every item in order, one insertion at a time.
    ///
    /// No packing takes place: the result is the same tree a sequence of
    /// [`RTree::insert`] calls produces.
    pub fn load<I>(&mut self, items: I) -> FragTreeResult<()>
    where
        I: IntoIterator<Item = Item>,
    {
        for item in items {
            self.insert(item)?;
        }
        Ok(())
    }

    fn insert_at(&mut self, child_id: NodeId, bbox: &BBox, level: usize) -> FragTreeResult<()> {
        let mut path = self.choose_subtree(bbox, level)?;

        let last = path.len() - 1;
        let node = &mut path[last];
        node.children.push(child_id);
        node.bbox.extend(bbox);
        self.store.put(node.clone())?;

        // split on overflow, propagating upwards
        let mut level = Some(last);
        while let Some(current) = level {
            if path[current].children.len() <= self.max_entries() {
                break;
            }
            self.split(&mut path, current)?;
            level = current.checked_sub(1);
        }

        if let Some(current) = level {
            self.adjust_parent_bboxes(bbox, &mut path[..=current])?;
        }
        Ok(())
    }

    /// Descends from the root to the branch that should receive `bbox`,
    /// returning every branch visited, root first.
    fn choose_subtree(&mut self, bbox: &BBox, level: usize) -> FragTreeResult<Vec<Branch>> {
        let mut path = vec![self.root()?];

        loop {
            let node = &path[path.len() - 1];
            if node.leaf || path.len() - 1 == level {
                break;
            }

            let children = node.children.clone();
            let first = *children.first().ok_or_else(|| {
                FragTreeError::MalformedState(format!("branch {} has no children", node.id))
            })?;

            let mut target: Option<Branch> = None;
            let mut min_area = f64::INFINITY;
            let mut min_enlargement = f64::INFINITY;

            for &child_id in &children {
                let child = self.store.get_branch(child_id)?;
                let area = child.bbox.area();
                let enlargement = bbox.enlarged_area(&child.bbox) - area;

                // least enlargement first, smaller area on ties
                if enlargement < min_enlargement {
                    min_enlargement = enlargement;
                    min_area = area.min(min_area);
                    target = Some(child);
                } else if enlargement == min_enlargement && area < min_area {
                    min_area = area;
                    target = Some(child);
                }
            }

            let next = match target {
                Some(child) => child,
                None => self.store.get_branch(first)?,
            };
            path.push(next);
        }

        Ok(path)
    }

    /// Splits the overflowing branch at `path[level]` into two siblings.
    fn split(&mut self, path: &mut [Branch], level: usize) -> FragTreeResult<()> {
        let m = self.min_entries();
        let count = path[level].children.len();

        let boxes = self.choose_split_axis(&mut path[level], m, count)?;
        let index = choose_split_index(&boxes, m, count);

        let node = &mut path[level];
        let mut sibling = Branch {
            id: self.store.allocate(),
            bbox: BBox::empty(),
            children: node.children.split_off(index),
            height: node.height,
            leaf: node.leaf,
        };
        self.store.insert(sibling.clone())?;

        self.calc_bbox(&mut path[level])?;
        self.calc_bbox(&mut sibling)?;

        if level > 0 {
            let parent = &mut path[level - 1];
            parent.children.push(sibling.id);
            self.store.put(parent.clone())?;
        } else {
            let node = path[level].clone();
            self.split_root(&node, &sibling)?;
        }
        Ok(())
    }

    fn split_root(&mut self, node: &Branch, sibling: &Branch) -> FragTreeResult<()> {
        let mut root = Branch {
            id: self.store.allocate(),
            bbox: BBox::empty(),
            children: vec![node.id, sibling.id],
            height: node.height + 1,
            leaf: false,
        };
        self.store.insert(root.clone())?;
        self.calc_bbox(&mut root)?;
        self.root_id = root.id;

        log::debug!("Split root {}, new root {} at height {}", node.id, root.id, root.height);
        Ok(())
    }

    /// Sorts the children of `node` along the axis with the smaller total
    /// margin and returns their boxes in the new order.
    fn choose_split_axis(
        &mut self,
        node: &mut Branch,
        m: usize,
        count: usize,
    ) -> FragTreeResult<Vec<BBox>> {
        let x_boxes = self.sort_children(node, Axis::X)?;
        let x_margin = all_dist_margin(&x_boxes, m, count);

        let y_boxes = self.sort_children(node, Axis::Y)?;
        let y_margin = all_dist_margin(&y_boxes, m, count);

        // children are left sorted by Y unless X is strictly better
        if x_margin < y_margin {
            self.sort_children(node, Axis::X)
        } else {
            Ok(y_boxes)
        }
    }

    fn sort_children(&mut self, node: &mut Branch, axis: Axis) -> FragTreeResult<Vec<BBox>> {
        let mut children = Vec::with_capacity(node.children.len());
        for &child_id in &node.children {
            children.push((child_id, *self.store.get(child_id)?.bbox()));
        }
        children.sort_by(|a, b| axis.compare(&a.1, &b.1));

        node.children = children.iter().map(|(id, _)| *id).collect();
        self.store.put(node.clone())?;
        Ok(children.into_iter().map(|(_, bbox)| bbox).collect())
    }

    fn adjust_parent_bboxes(&mut self, bbox: &BBox, path: &mut [Branch]) -> FragTreeResult<()> {
        for node in path.iter_mut().rev() {
            node.bbox.extend(bbox);
            self.store.put(node.clone())?;
        }
        Ok(())
    }

    /// Recomputes the box of `node` from its children and persists it.
    pub(crate) fn calc_bbox(&mut self, node: &mut Branch) -> FragTreeResult<()> {
        node.bbox = self.dist_bbox(&node.children, 0, node.children.len())?;
        self.store.put(node.clone())
    }

    /// Union of the boxes of `children[from..to]`.
    pub(crate) fn dist_bbox(
        &mut self,
        children: &[NodeId],
        from: usize,
        to: usize,
    ) -> FragTreeResult<BBox> {
        let mut bbox = BBox::empty();
        for &child_id in &children[from..to] {
            bbox.extend(self.store.get(child_id)?.bbox());
        }
        Ok(bbox)
    }
}

fn union_of(boxes: &[BBox]) -> BBox {
    boxes.iter().fold(BBox::empty(), |acc, bbox| acc.union(bbox))
}

/// Total margin of every distribution that leaves at least `m` entries on
/// each side.
fn all_dist_margin(boxes: &[BBox], m: usize, count: usize) -> f64 {
    let mut left = union_of(&boxes[..m]);
    let mut right = union_of(&boxes[count - m..count]);
    let mut margin = left.margin() + right.margin();

    for bbox in &boxes[m..count - m] {
        left.extend(bbox);
        margin += left.margin();
    }

    for bbox in boxes[m..count - m].iter().rev() {
        right.extend(bbox);
        margin += right.margin();
    }

    margin
}

/// Split index with the least overlap between both halves, then the least
/// summed area. The first index wins ties.
fn choose_split_index(boxes: &[BBox], m: usize, count: usize) -> usize {
    let mut index = m;
    let mut min_overlap = f64::INFINITY;
    let mut min_area = f64::INFINITY;

    for i in m..=count - m {
        let left = union_of(&boxes[..i]);
        let right = union_of(&boxes[i..count]);

        let overlap = left.intersection_area(&right);
        let area = left.area() + right.area();

        if overlap < min_overlap {
            min_overlap = overlap;
            index = i;
            min_area = area.min(min_area);
        } else if overlap == min_overlap && area < min_area {
            min_area = area;
            index = i;
        }
    }

    index
}
