use serde::{Deserialize, Serialize};

use crate::store::codec::coord;

/// An axis-aligned 2D bounding box.
///
/// `BBox` is the unit of indexing: every node in the tree carries one. The
/// [`BBox::empty`] box (`+inf` minimums, `-inf` maximums) is the identity
/// of [`BBox::union`], which is why coordinates are serialized through the
/// infinity-preserving [`coord`] codec.
///
/// # Examples
///
/// ```rust
/// use fragtree::BBox;
///
/// let a = BBox::new(0.0, 0.0, 10.0, 10.0);
/// let b = BBox::new(5.0, 5.0, 15.0, 15.0);
///
/// assert!(a.intersects(&b));
/// assert_eq!(a.intersection_area(&b), 25.0);
/// assert_eq!(BBox::empty().union(&a), a);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BBox {
    #[serde(with = "coord")]
    pub min_x: f64,
    #[serde(with = "coord")]
    pub min_y: f64,
    #[serde(with = "coord")]
    pub max_x: f64,
    #[serde(with = "coord")]
    pub max_y: f64,
}

impl Default for BBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Display for BBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BBox({}, {}, {}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl BBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// A degenerate box covering a single point.
    pub fn point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// The identity box under union.
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Grows this box in place so that it also covers `other`.
    pub fn extend(&mut self, other: &BBox) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    pub fn union(&self, other: &BBox) -> BBox {
        let mut merged = *self;
        merged.extend(other);
        merged
    }

    pub fn area(&self) -> f64 {
        (self.max_x - self.min_x) * (self.max_y - self.min_y)
    }

    /// Half perimeter, the "margin" of the R*-tree split heuristics.
    pub fn margin(&self) -> f64 {
        (self.max_x - self.min_x) + (self.max_y - self.min_y)
    }

    /// Area of the union of `self` and `other`.
    pub fn enlarged_area(&self, other: &BBox) -> f64 {
        (other.max_x.max(self.max_x) - other.min_x.min(self.min_x))
            * (other.max_y.max(self.max_y) - other.min_y.min(self.min_y))
    }

    /// Area of the overlap of both boxes, `0.0` when they are disjoint.
    pub fn intersection_area(&self, other: &BBox) -> f64 {
        let min_x = self.min_x.max(other.min_x);
        let min_y = self.min_y.max(other.min_y);
        let max_x = self.max_x.min(other.max_x);
        let max_y = self.max_y.min(other.max_y);

        (max_x - min_x).max(0.0) * (max_y - min_y).max(0.0)
    }

    /// True when `other` lies entirely inside `self` (edges included).
    pub fn contains(&self, other: &BBox) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }

    /// True when the boxes share at least one point (touching edges count).
    pub fn intersects(&self, other: &BBox) -> bool {
        other.min_x <= self.max_x
            && other.min_y <= self.max_y
            && other.max_x >= self.min_x
            && other.max_y >= self.min_y
    }

    /// Well-known-text polygon outlining the box.
    pub fn to_wkt(&self) -> String {
        format!(
            "POLYGON (({} {}, {} {}, {} {}, {} {}))",
            self.max_x,
            self.min_y,
            self.max_x,
            self.max_y,
            self.min_x,
            self.max_y,
            self.min_x,
            self.min_y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_union_identity() {
        let b = BBox::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(BBox::empty().union(&b), b);
        assert_eq!(b.union(&BBox::empty()), b);
        assert!(BBox::empty().is_empty());
        assert!(!b.is_empty());
    }

    #[test]
    fn test_area_and_margin() {
        let b = BBox::new(0.0, 0.0, 4.0, 2.0);
        assert_eq!(b.area(), 8.0);
        assert_eq!(b.margin(), 6.0);
        assert_eq!(BBox::point(3.0, 3.0).area(), 0.0);
    }

    #[test]
    fn test_enlarged_area() {
        let a = BBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BBox::new(2.0, 2.0, 3.0, 3.0);
        assert_eq!(a.enlarged_area(&b), 9.0);
        assert_eq!(a.enlarged_area(&a), 1.0);
    }

    #[test]
    fn test_intersection_area_disjoint_is_zero() {
        let a = BBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BBox::new(5.0, 5.0, 6.0, 6.0);
        assert_eq!(a.intersection_area(&b), 0.0);
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_touching_edges_intersect() {
        let a = BBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BBox::new(1.0, 0.0, 2.0, 1.0);
        assert!(a.intersects(&b));
        assert_eq!(a.intersection_area(&b), 0.0);
    }

    #[test]
    fn test_contains() {
        let outer = BBox::new(0.0, 0.0, 10.0, 10.0);
        let inner = BBox::new(2.0, 2.0, 3.0, 3.0);
        assert!(outer.contains(&inner));
        assert!(outer.contains(&outer));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn test_empty_box_never_intersects() {
        let b = BBox::new(-1e9, -1e9, 1e9, 1e9);
        assert!(!BBox::empty().intersects(&b));
        assert!(!b.intersects(&BBox::empty()));
    }

    #[test]
    fn test_to_wkt() {
        let b = BBox::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(b.to_wkt(), "POLYGON ((3 2, 3 4, 1 4, 1 2))");
    }
}
