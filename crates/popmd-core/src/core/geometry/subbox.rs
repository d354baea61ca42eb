use super::Aabb;
use super::domain::{Decomposition, SimulationBox};
use nalgebra::Point3;

/// Relative shrink applied at periodic seams for lattice placement.
pub const SEAM_EPSILON: f64 = 1.0e-6;

/// How the sub-box treats the global box edges on periodic axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePolicy {
    /// The exact half-open slice of the box.
    Exact,
    /// Shift the slice away from periodic seams so that a lattice site lying on a seam,
    /// whose two periodic images may both round to "inside", is created exactly once.
    ///
    /// The rank at the low edge lowers its bound by `eps`, the rank at the high edge lowers
    /// its bound by `2 eps`. `eps` is `1e-6` of the box length for orthogonal boxes and
    /// `1e-6` in fractional units for sheared ones.
    ShrinkPeriodic,
}

/// The part of the box a rank owns.
///
/// Bounds are in real coordinates for orthogonal boxes and fractional coordinates for
/// sheared ones; [`SubBox::owns_position`] converts as needed.
#[derive(Debug, Clone, PartialEq)]
pub struct SubBox {
    lo: [f64; 3],
    hi: [f64; 3],
    fractional: bool,
    real_bounds: Aabb,
}

impl SubBox {
    pub fn new(
        domain: &SimulationBox,
        decomposition: &Decomposition,
        rank: usize,
        policy: EdgePolicy,
    ) -> Self {
        let grid = decomposition.grid();
        let location = decomposition.location(rank);
        let fractional = domain.is_triclinic();
        let prd = domain.prd();
        let periodic = domain.periodic();

        let mut lo = [0.0; 3];
        let mut hi = [0.0; 3];
        for axis in 0..3 {
            let p = grid[axis];
            let at = location[axis];
            let (s_lo, s_hi) = (
                at as f64 / p as f64,
                if at + 1 == p {
                    1.0
                } else {
                    (at + 1) as f64 / p as f64
                },
            );
            if fractional {
                lo[axis] = s_lo;
                hi[axis] = s_hi;
            } else {
                let base = domain.lo()[axis];
                lo[axis] = base + s_lo * prd[axis];
                hi[axis] = if at + 1 == p {
                    domain.hi()[axis]
                } else {
                    base + s_hi * prd[axis]
                };
            }
        }

        let real_bounds = if fractional {
            domain.bounding_box_of_fractional(&Point3::from(lo), &Point3::from(hi))
        } else {
            Aabb::new(Point3::from(lo), Point3::from(hi))
        };

        if policy == EdgePolicy::ShrinkPeriodic {
            for axis in 0..3 {
                if !periodic[axis] {
                    continue;
                }
                let eps = if fractional {
                    SEAM_EPSILON
                } else {
                    SEAM_EPSILON * prd[axis]
                };
                if location[axis] == 0 {
                    lo[axis] -= eps;
                }
                if location[axis] + 1 == grid[axis] {
                    hi[axis] -= 2.0 * eps;
                }
            }
        }

        Self {
            lo,
            hi,
            fractional,
            real_bounds,
        }
    }

    /// Half-open membership test of a coordinate already in the sub-box's system.
    pub fn owns(&self, coord: &Point3<f64>) -> bool {
        (0..3).all(|axis| coord[axis] >= self.lo[axis] && coord[axis] < self.hi[axis])
    }

    /// Membership test of a real-space position.
    pub fn owns_position(&self, domain: &SimulationBox, position: &Point3<f64>) -> bool {
        if self.fractional {
            self.owns(&domain.to_fractional(position))
        } else {
            self.owns(position)
        }
    }

    /// Whether bounds are fractional coordinates.
    pub fn is_fractional(&self) -> bool {
        self.fractional
    }

    pub fn lo(&self) -> [f64; 3] {
        self.lo
    }

    pub fn hi(&self) -> [f64; 3] {
        self.hi
    }

    /// Real-space bounding box of the unshrunk sub-box.
    pub fn real_bounds(&self) -> &Aabb {
        &self.real_bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::domain::Dimension;

    fn cube() -> SimulationBox {
        SimulationBox::orthogonal(
            Point3::origin(),
            Point3::new(10.0, 10.0, 10.0),
            [true; 3],
            Dimension::Three,
        )
        .unwrap()
    }

    #[test]
    fn exact_slices_tile_the_box() {
        let b = cube();
        let d = Decomposition::new([2, 1, 1]).unwrap();
        let left = SubBox::new(&b, &d, 0, EdgePolicy::Exact);
        let right = SubBox::new(&b, &d, 1, EdgePolicy::Exact);
        let seam = Point3::new(5.0, 1.0, 1.0);
        assert!(!left.owns(&seam));
        assert!(right.owns(&seam));
        assert!(left.owns(&Point3::new(0.0, 0.0, 0.0)));
        assert!(!right.owns(&Point3::new(10.0, 0.0, 0.0)));
        assert_eq!(right.hi()[0], 10.0);
    }

    #[test]
    fn shrink_moves_periodic_seam_inward_once() {
        let b = cube();
        let d = Decomposition::new([2, 1, 1]).unwrap();
        let left = SubBox::new(&b, &d, 0, EdgePolicy::ShrinkPeriodic);
        let right = SubBox::new(&b, &d, 1, EdgePolicy::ShrinkPeriodic);

        assert!((left.lo()[0] + 1e-5).abs() < 1e-15);
        assert!((right.hi()[0] - (10.0 - 2e-5)).abs() < 1e-12);
        // The interior seam between ranks is not adjusted.
        assert_eq!(left.hi()[0], 5.0);
        assert_eq!(right.lo()[0], 5.0);

        // A site a hair below zero belongs to the low rank; its image a hair below the top
        // edge belongs to nobody.
        assert!(left.owns(&Point3::new(-1e-9, 0.0, 0.0)));
        assert!(!right.owns(&Point3::new(10.0 - 1e-9, 0.0, 0.0)));
    }

    #[test]
    fn shrink_skips_non_periodic_axes() {
        let b = SimulationBox::orthogonal(
            Point3::origin(),
            Point3::new(10.0, 10.0, 10.0),
            [false, true, true],
            Dimension::Three,
        )
        .unwrap();
        let d = Decomposition::new([1, 1, 1]).unwrap();
        let s = SubBox::new(&b, &d, 0, EdgePolicy::ShrinkPeriodic);
        assert_eq!(s.lo()[0], 0.0);
        assert_eq!(s.hi()[0], 10.0);
        assert!(s.lo()[1] < 0.0);
    }

    #[test]
    fn sheared_box_uses_fractional_bounds() {
        let b = SimulationBox::triclinic(
            Point3::origin(),
            Point3::new(10.0, 10.0, 10.0),
            [5.0, 0.0, 0.0],
            [true; 3],
            Dimension::Three,
        )
        .unwrap();
        let d = Decomposition::new([2, 1, 1]).unwrap();
        let right = SubBox::new(&b, &d, 1, EdgePolicy::ShrinkPeriodic);
        assert!(right.is_fractional());
        assert!((right.hi()[0] - (1.0 - 2e-6)).abs() < 1e-15);
        // (12, 9, 1) is at fractional x = (12 - 0.5 * 9) / 10 = 0.75.
        assert!(right.owns_position(&b, &Point3::new(12.0, 9.0, 1.0)));
        assert!(!right.owns_position(&b, &Point3::new(2.0, 1.0, 1.0)));
        assert!((right.real_bounds().max.x - 15.0).abs() < 1e-12);
    }
}
