//! Spatial building blocks: the simulation box and its decomposition into per-rank
//! sub-boxes, lattices, regions and rotations.

use nalgebra::{Point3, Vector3};

pub mod domain;
pub mod lattice;
pub mod region;
pub mod rotation;
pub mod subbox;

/// An axis-aligned box given by its two extreme corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point; `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point3<f64>>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::new(first, first), |acc, p| Self {
            min: acc.min.inf(&p),
            max: acc.max.sup(&p),
        }))
    }

    /// The eight corners, x varying fastest.
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Point3::new(lo.x, lo.y, lo.z),
            Point3::new(hi.x, lo.y, lo.z),
            Point3::new(lo.x, hi.y, lo.z),
            Point3::new(hi.x, hi.y, lo.z),
            Point3::new(lo.x, lo.y, hi.z),
            Point3::new(hi.x, lo.y, hi.z),
            Point3::new(lo.x, hi.y, hi.z),
            Point3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Overlap of two boxes. The result may be empty, see [`Aabb::is_empty`].
    pub fn intersect(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.sup(&other.min),
            max: self.max.inf(&other.max),
        }
    }

    /// Narrows this box towards `other` without ever inverting it.
    ///
    /// Each bound of `other` that lies inside this box replaces the corresponding bound;
    /// bounds outside are clamped to this box's range.
    pub fn narrow_to(&self, other: &Aabb) -> Aabb {
        let mut out = *self;
        for axis in 0..3 {
            if other.min[axis] > out.min[axis] {
                out.min[axis] = other.min[axis].min(self.max[axis]);
            }
            if other.max[axis] < out.max[axis] {
                out.max[axis] = other.max[axis].max(out.min[axis]);
            }
        }
        out
    }

    /// True when the box has no volume along some axis, i.e. `min >= max`.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] >= self.max[axis])
    }

    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Aabb {
        Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn from_points_spans_all_points() {
        let aabb = Aabb::from_points(vec![
            Point3::new(1.0, -2.0, 0.5),
            Point3::new(-1.0, 3.0, 0.0),
            Point3::new(0.0, 0.0, 2.0),
        ])
        .unwrap();
        assert_eq!(aabb.min, Point3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Point3::new(1.0, 3.0, 2.0));
        assert!(Aabb::from_points(Vec::new()).is_none());
    }

    #[test]
    fn corners_cover_both_extremes() {
        let corners = unit().corners();
        assert_eq!(corners[0], Point3::origin());
        assert_eq!(corners[7], Point3::new(1.0, 1.0, 1.0));
        assert_eq!(Aabb::from_points(corners).unwrap(), unit());
    }

    #[test]
    fn disjoint_boxes_intersect_to_empty() {
        let far = Aabb::new(Point3::new(2.0, 2.0, 2.0), Point3::new(3.0, 3.0, 3.0));
        assert!(unit().intersect(&far).is_empty());
        let half = Aabb::new(Point3::new(0.5, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        let overlap = unit().intersect(&half);
        assert!(!overlap.is_empty());
        assert_eq!(overlap.min.x, 0.5);
        assert_eq!(overlap.max.x, 1.0);
    }

    #[test]
    fn narrow_to_clamps_without_inverting() {
        let far = Aabb::new(Point3::new(5.0, 0.2, -3.0), Point3::new(6.0, 0.8, -2.0));
        let narrowed = unit().narrow_to(&far);
        assert_eq!(narrowed.min, Point3::new(1.0, 0.2, 0.0));
        assert_eq!(narrowed.max, Point3::new(1.0, 0.8, 0.0));
        assert!(narrowed.min.x <= narrowed.max.x);
    }
}
