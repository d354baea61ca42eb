use super::Aabb;
use nalgebra::{Matrix3, Point3, Vector3};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum DomainError {
    #[error("Box extent along axis {axis} must be positive (lo = {lo}, hi = {hi})")]
    InvalidExtent { axis: usize, lo: f64, hi: f64 },

    #[error("A 2d box cannot have xz or yz tilt and must be periodic in z")]
    NotPlanar,

    #[error("Processor grid {grid:?} is invalid: {reason}")]
    InvalidGrid { grid: [usize; 3], reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u8")]
pub enum Dimension {
    Two,
    Three,
}

impl TryFrom<u8> for Dimension {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Dimension::Two),
            3 => Ok(Dimension::Three),
            other => Err(format!("dimension must be 2 or 3, got {}", other)),
        }
    }
}

impl Dimension {
    pub fn is_2d(self) -> bool {
        self == Dimension::Two
    }

    /// Number of spatial dimensions, 2 or 3.
    pub fn count(self) -> u8 {
        match self {
            Dimension::Two => 2,
            Dimension::Three => 3,
        }
    }
}

/// The global, possibly sheared, periodic simulation box.
///
/// The box is the parallelepiped spanned by the columns of `h` from `lo`:
/// `x = lo + h * s` for fractional coordinates `s` in `[0, 1)^3`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationBox {
    lo: Point3<f64>,
    hi: Point3<f64>,
    /// `[xy, xz, yz]`
    tilt: [f64; 3],
    periodic: [bool; 3],
    dimension: Dimension,
    triclinic: bool,
    h: Matrix3<f64>,
    h_inv: Matrix3<f64>,
}

impl SimulationBox {
    pub fn orthogonal(
        lo: Point3<f64>,
        hi: Point3<f64>,
        periodic: [bool; 3],
        dimension: Dimension,
    ) -> Result<Self, DomainError> {
        Self::build(lo, hi, [0.0; 3], periodic, dimension, false)
    }

    /// A sheared box with tilt factors `[xy, xz, yz]`.
    pub fn triclinic(
        lo: Point3<f64>,
        hi: Point3<f64>,
        tilt: [f64; 3],
        periodic: [bool; 3],
        dimension: Dimension,
    ) -> Result<Self, DomainError> {
        Self::build(lo, hi, tilt, periodic, dimension, true)
    }

    fn build(
        lo: Point3<f64>,
        hi: Point3<f64>,
        tilt: [f64; 3],
        periodic: [bool; 3],
        dimension: Dimension,
        triclinic: bool,
    ) -> Result<Self, DomainError> {
        for axis in 0..3 {
            if !(hi[axis] > lo[axis]) {
                return Err(DomainError::InvalidExtent {
                    axis,
                    lo: lo[axis],
                    hi: hi[axis],
                });
            }
        }
        if dimension.is_2d() && (tilt[1] != 0.0 || tilt[2] != 0.0 || !periodic[2]) {
            return Err(DomainError::NotPlanar);
        }

        let prd = hi - lo;
        let [xy, xz, yz] = tilt;
        #[rustfmt::skip]
        let h = Matrix3::new(
            prd.x, xy,    xz,
            0.0,   prd.y, yz,
            0.0,   0.0,   prd.z,
        );
        // Upper triangular with a positive diagonal, always invertible.
        #[rustfmt::skip]
        let h_inv = Matrix3::new(
            1.0 / prd.x, -xy / (prd.x * prd.y), (xy * yz - prd.y * xz) / (prd.x * prd.y * prd.z),
            0.0,         1.0 / prd.y,           -yz / (prd.y * prd.z),
            0.0,         0.0,                   1.0 / prd.z,
        );

        Ok(Self {
            lo,
            hi,
            tilt,
            periodic,
            dimension,
            triclinic,
            h,
            h_inv,
        })
    }

    pub fn lo(&self) -> &Point3<f64> {
        &self.lo
    }

    pub fn hi(&self) -> &Point3<f64> {
        &self.hi
    }

    /// Edge lengths of the box along each axis.
    pub fn prd(&self) -> Vector3<f64> {
        self.hi - self.lo
    }

    pub fn tilt(&self) -> [f64; 3] {
        self.tilt
    }

    pub fn periodic(&self) -> [bool; 3] {
        self.periodic
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn is_triclinic(&self) -> bool {
        self.triclinic
    }

    pub fn to_fractional(&self, x: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.h_inv * (x - self.lo))
    }

    pub fn from_fractional(&self, s: &Point3<f64>) -> Point3<f64> {
        self.lo + self.h * s.coords
    }

    /// Real-space bounding box of the fractional sub-box `[s_lo, s_hi]`.
    pub fn bounding_box_of_fractional(&self, s_lo: &Point3<f64>, s_hi: &Point3<f64>) -> Aabb {
        let corners = Aabb::new(*s_lo, *s_hi).corners();
        Aabb::from_points(corners.iter().map(|s| self.from_fractional(s)))
            .unwrap_or_else(|| Aabb::new(self.lo, self.hi))
    }

    /// Real-space bounding box of the whole box.
    pub fn bounds(&self) -> Aabb {
        if self.triclinic {
            self.bounding_box_of_fractional(&Point3::origin(), &Point3::new(1.0, 1.0, 1.0))
        } else {
            Aabb::new(self.lo, self.hi)
        }
    }

    /// Whether fractional coordinate `s` lies in `[0, 1)` on every axis.
    pub fn fractional_inside(&self, s: &Point3<f64>) -> bool {
        (0..3).all(|axis| s[axis] >= 0.0 && s[axis] < 1.0)
    }

    /// Wraps `x` back into the box along periodic axes and updates the image counters.
    ///
    /// Positions already inside the box are left bit-for-bit unchanged. Non-finite
    /// coordinates are left as they are.
    pub fn remap(&self, x: &mut Point3<f64>, image: &mut [i32; 3]) {
        if !self.triclinic {
            let prd = self.prd();
            for axis in 0..3 {
                if self.periodic[axis] {
                    let periods = wrap_periodic(&mut x[axis], self.lo[axis], prd[axis]);
                    image[axis] = image[axis].saturating_add(periods);
                }
            }
            return;
        }

        let mut s = self.to_fractional(x);
        let mut moved = false;
        for axis in 0..3 {
            if self.periodic[axis] {
                let periods = wrap_periodic(&mut s[axis], 0.0, 1.0);
                image[axis] = image[axis].saturating_add(periods);
                moved |= periods != 0;
            }
        }
        if moved {
            *x = self.from_fractional(&s);
        }
    }

    /// Shortest periodic image of a displacement vector.
    pub fn minimum_image(&self, delta: &Vector3<f64>) -> Vector3<f64> {
        let prd = self.prd();
        let [xy, xz, yz] = self.tilt;
        let mut d = *delta;

        if self.periodic[2] {
            let n = nearest_periods(d.z, prd.z);
            d.z -= n * prd.z;
            d.y -= n * yz;
            d.x -= n * xz;
        }
        if self.periodic[1] {
            let n = nearest_periods(d.y, prd.y);
            d.y -= n * prd.y;
            d.x -= n * xy;
        }
        if self.periodic[0] {
            d.x -= nearest_periods(d.x, prd.x) * prd.x;
        }
        d
    }

    /// The z coordinate 2d particles are placed at.
    pub fn mid_plane_z(&self) -> f64 {
        self.lo.z + 0.5 * (self.hi.z - self.lo.z)
    }
}

/// Moves `value` into `[lo, lo + len)` by whole periods and returns how many were removed.
fn wrap_periodic(value: &mut f64, lo: f64, len: f64) -> i32 {
    let hi = lo + len;
    if !value.is_finite() || (*value >= lo && *value < hi) {
        return 0;
    }
    let periods = ((*value - lo) / len).floor();
    let mut wrapped = *value - periods * len;
    // Round-off can leave the result on `hi` or just below `lo`.
    if !(lo..hi).contains(&wrapped) {
        wrapped = lo;
    }
    *value = wrapped;
    periods as i32
}

/// Whole periods to subtract from `d` so that `|d| <= len / 2`.
fn nearest_periods(d: f64, len: f64) -> f64 {
    if !d.is_finite() || d.abs() <= 0.5 * len {
        0.0
    } else {
        (d / len).round()
    }
}

/// A regular grid of ranks over the simulation box.
///
/// Rank `r` sits at grid location `(r mod px, (r / px) mod py, r / (px * py))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decomposition {
    grid: [usize; 3],
}

impl Decomposition {
    pub fn new(grid: [usize; 3]) -> Result<Self, DomainError> {
        if grid.iter().any(|&p| p == 0) {
            return Err(DomainError::InvalidGrid {
                grid,
                reason: "every axis needs at least one rank".to_string(),
            });
        }
        Ok(Self { grid })
    }

    /// A grid of `size` ranks that minimizes the total sub-box surface area.
    ///
    /// 2d boxes are never split along z. Ties go to the first candidate with the fewest
    /// ranks along x, then y.
    pub fn for_ranks(size: usize, domain: &SimulationBox) -> Result<Self, DomainError> {
        if size == 0 {
            return Err(DomainError::InvalidGrid {
                grid: [0; 3],
                reason: "a run needs at least one rank".to_string(),
            });
        }
        let prd = domain.prd();
        let (xprd, yprd, zprd) = (prd.x, prd.y, prd.z);
        let mut best: Option<([usize; 3], f64)> = None;

        for px in (1..=size).filter(|px| size % px == 0) {
            let rest = size / px;
            for py in (1..=rest).filter(|py| rest % py == 0) {
                let pz = rest / py;
                if domain.dimension().is_2d() && pz != 1 {
                    continue;
                }
                let (fx, fy, fz) = (px as f64, py as f64, pz as f64);
                let surface = if domain.dimension().is_2d() {
                    xprd / fx + yprd / fy
                } else {
                    xprd * yprd / (fx * fy) + xprd * zprd / (fx * fz) + yprd * zprd / (fy * fz)
                };
                if best.is_none_or(|(_, s)| surface < s - 1e-12 * s.abs()) {
                    best = Some(([px, py, pz], surface));
                }
            }
        }

        best.map(|(grid, _)| Self { grid })
            .ok_or_else(|| DomainError::InvalidGrid {
                grid: [size, 1, 1],
                reason: "no factorization fits the box dimension".to_string(),
            })
    }

    pub fn grid(&self) -> [usize; 3] {
        self.grid
    }

    pub fn size(&self) -> usize {
        self.grid.iter().product()
    }

    pub fn location(&self, rank: usize) -> [usize; 3] {
        let [px, py, _] = self.grid;
        [rank % px, (rank / px) % py, rank / (px * py)]
    }

    pub fn rank_at(&self, location: [usize; 3]) -> usize {
        let [px, py, _] = self.grid;
        location[0] + px * (location[1] + py * location[2])
    }

    /// Rank whose slice contains fractional coordinate `s`.
    ///
    /// Coordinates outside `[0, 1)` are attributed to the nearest edge rank.
    pub fn owner_of(&self, s: &Point3<f64>) -> usize {
        let mut location = [0; 3];
        for axis in 0..3 {
            let p = self.grid[axis];
            let cell = (s[axis] * p as f64).floor();
            location[axis] = if cell <= 0.0 {
                0
            } else {
                (cell as usize).min(p - 1)
            };
        }
        self.rank_at(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(l: f64) -> SimulationBox {
        SimulationBox::orthogonal(
            Point3::origin(),
            Point3::new(l, l, l),
            [true; 3],
            Dimension::Three,
        )
        .unwrap()
    }

    fn sheared() -> SimulationBox {
        SimulationBox::triclinic(
            Point3::origin(),
            Point3::new(10.0, 10.0, 10.0),
            [2.0, 1.0, 3.0],
            [true; 3],
            Dimension::Three,
        )
        .unwrap()
    }

    #[test]
    fn rejects_inverted_extent() {
        let err = SimulationBox::orthogonal(
            Point3::origin(),
            Point3::new(1.0, -1.0, 1.0),
            [true; 3],
            Dimension::Three,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidExtent { axis: 1, .. }));
    }

    #[test]
    fn rejects_tilted_2d_box() {
        let err = SimulationBox::triclinic(
            Point3::new(0.0, 0.0, -0.5),
            Point3::new(1.0, 1.0, 0.5),
            [0.0, 0.2, 0.0],
            [true; 3],
            Dimension::Two,
        )
        .unwrap_err();
        assert_eq!(err, DomainError::NotPlanar);
    }

    #[test]
    fn fractional_round_trip_on_sheared_box() {
        let b = sheared();
        let x = Point3::new(3.3, 4.4, 5.5);
        let back = b.from_fractional(&b.to_fractional(&x));
        assert!((back - x).norm() < 1e-12);
        let corner = b.from_fractional(&Point3::new(1.0, 1.0, 1.0));
        assert!((corner - Point3::new(13.0, 13.0, 10.0)).norm() < 1e-12);
    }

    #[test]
    fn bounds_of_sheared_box_cover_tilted_corners() {
        let bounds = sheared().bounds();
        assert_eq!(bounds.min, Point3::origin());
        assert!((bounds.max.x - 13.0).abs() < 1e-12);
        assert!((bounds.max.y - 13.0).abs() < 1e-12);
    }

    #[test]
    fn remap_wraps_and_counts_images() {
        let b = cube(10.0);
        let mut x = Point3::new(-1.0, 25.0, 5.0);
        let mut image = [0; 3];
        b.remap(&mut x, &mut image);
        assert!((x - Point3::new(9.0, 5.0, 5.0)).norm() < 1e-12);
        assert_eq!(image, [-1, 2, 0]);
    }

    #[test]
    fn remap_leaves_inside_positions_untouched() {
        let b = sheared();
        let original = Point3::new(5.123456789, 4.2, 7.7);
        let mut x = original;
        let mut image = [0; 3];
        b.remap(&mut x, &mut image);
        assert_eq!(x, original);
        assert_eq!(image, [0; 3]);
    }

    #[test]
    fn remap_ignores_non_periodic_axes() {
        let b = SimulationBox::orthogonal(
            Point3::origin(),
            Point3::new(10.0, 10.0, 10.0),
            [true, false, true],
            Dimension::Three,
        )
        .unwrap();
        let mut x = Point3::new(5.0, 12.0, 5.0);
        let mut image = [0; 3];
        b.remap(&mut x, &mut image);
        assert_eq!(x.y, 12.0);
        assert_eq!(image, [0; 3]);
    }

    #[test]
    fn remap_of_far_away_positions_finishes_inside_the_box() {
        let b = cube(10.0);
        let mut x = Point3::new(1e17, -1e17, 123.0);
        let mut image = [0; 3];
        b.remap(&mut x, &mut image);
        assert!((0..3).all(|axis| x[axis] >= 0.0 && x[axis] < 10.0));
        assert_eq!(image[0], i32::MAX);
        assert_eq!(image[1], i32::MIN);
        assert_eq!(image[2], 12);
        assert!((x.z - 3.0).abs() < 1e-9);

        let sheared = sheared();
        let mut far = Point3::new(1e300, 5.0, 5.0);
        let mut image = [0; 3];
        sheared.remap(&mut far, &mut image);
        let bounds = sheared.bounds();
        assert!((0..3).all(|axis| {
            far[axis] >= bounds.min[axis] - 1e-9 && far[axis] <= bounds.max[axis] + 1e-9
        }));
        assert_eq!(image[0], i32::MAX);
    }

    #[test]
    fn remap_leaves_non_finite_values_alone() {
        let b = cube(10.0);
        let mut x = Point3::new(f64::INFINITY, f64::NAN, -35.0);
        let mut image = [0; 3];
        b.remap(&mut x, &mut image);
        assert_eq!(x.x, f64::INFINITY);
        assert!(x.y.is_nan());
        assert!((x.z - 5.0).abs() < 1e-12);
        assert_eq!(image, [0, 0, -4]);
    }

    #[test]
    fn remap_of_sheared_box_counts_several_images() {
        let b = sheared();
        let inside = Point3::new(4.0, 3.0, 2.0);
        let s = b.to_fractional(&inside);
        let mut x = b.from_fractional(&Point3::new(s.x + 3.0, s.y - 2.0, s.z + 1.0));
        let mut image = [0; 3];
        b.remap(&mut x, &mut image);
        assert!((x - inside).norm() < 1e-9);
        assert_eq!(image, [3, -2, 1]);
    }

    #[test]
    fn minimum_image_of_far_displacement_is_short() {
        let b = cube(10.0);
        let d = b.minimum_image(&Vector3::new(1e6 + 3.0, -1e6 - 4.0, f64::INFINITY));
        assert!((d.x - 3.0).abs() < 1e-6);
        assert!((d.y + 4.0).abs() < 1e-6);
        assert_eq!(d.z, f64::INFINITY);
    }

    #[test]
    fn minimum_image_picks_nearest_copy() {
        let b = cube(10.0);
        let d = b.minimum_image(&Vector3::new(9.0, -6.0, 4.0));
        assert!((d - Vector3::new(-1.0, 4.0, 4.0)).norm() < 1e-12);
    }

    #[test]
    fn minimum_image_applies_tilt_corrections() {
        let b = sheared();
        let d = b.minimum_image(&Vector3::new(0.0, 0.0, 9.0));
        assert!((d - Vector3::new(-1.0, -3.0, -1.0)).norm() < 1e-12);
    }

    #[test]
    fn decomposition_locations_round_trip() {
        let d = Decomposition::new([2, 3, 4]).unwrap();
        assert_eq!(d.size(), 24);
        for rank in 0..24 {
            assert_eq!(d.rank_at(d.location(rank)), rank);
        }
        assert_eq!(d.location(7), [1, 0, 1]);
    }

    #[test]
    fn owner_of_clamps_to_grid() {
        let d = Decomposition::new([2, 1, 1]).unwrap();
        assert_eq!(d.owner_of(&Point3::new(0.25, 0.5, 0.5)), 0);
        assert_eq!(d.owner_of(&Point3::new(0.75, 0.5, 0.5)), 1);
        assert_eq!(d.owner_of(&Point3::new(1.0, 0.5, 0.5)), 1);
        assert_eq!(d.owner_of(&Point3::new(-0.1, 0.5, 0.5)), 0);
    }

    #[test]
    fn for_ranks_splits_longest_axis() {
        let b = SimulationBox::orthogonal(
            Point3::origin(),
            Point3::new(40.0, 10.0, 10.0),
            [true; 3],
            Dimension::Three,
        )
        .unwrap();
        assert_eq!(Decomposition::for_ranks(4, &b).unwrap().grid(), [4, 1, 1]);
        assert_eq!(Decomposition::for_ranks(1, &b).unwrap().grid(), [1, 1, 1]);
        assert!(Decomposition::for_ranks(0, &b).is_err());
    }

    #[test]
    fn for_ranks_never_splits_z_in_2d() {
        let b = SimulationBox::orthogonal(
            Point3::new(0.0, 0.0, -0.5),
            Point3::new(10.0, 10.0, 0.5),
            [true; 3],
            Dimension::Two,
        )
        .unwrap();
        let grid = Decomposition::for_ranks(4, &b).unwrap().grid();
        assert_eq!(grid, [2, 2, 1]);
    }

    #[test]
    fn dimension_parses_from_integer() {
        assert_eq!(Dimension::try_from(2), Ok(Dimension::Two));
        assert!(Dimension::try_from(4).is_err());
    }
}
