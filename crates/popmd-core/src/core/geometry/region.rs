use super::Aabb;
use nalgebra::Point3;
use std::fmt::Debug;

/// A geometric volume candidate positions can be tested against.
///
/// Membership is closed: points on the surface are inside.
pub trait Region: Send + Sync + Debug {
    fn contains(&self, x: &Point3<f64>) -> bool;

    /// Bounding box of the region, if it is finite.
    fn extent(&self) -> Option<Aabb>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockRegion {
    bounds: Aabb,
}

impl BlockRegion {
    pub fn new(lo: Point3<f64>, hi: Point3<f64>) -> Self {
        Self {
            bounds: Aabb::new(lo, hi),
        }
    }
}

impl Region for BlockRegion {
    fn contains(&self, x: &Point3<f64>) -> bool {
        (0..3).all(|axis| x[axis] >= self.bounds.min[axis] && x[axis] <= self.bounds.max[axis])
    }

    fn extent(&self) -> Option<Aabb> {
        Some(self.bounds)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SphereRegion {
    center: Point3<f64>,
    radius: f64,
}

impl SphereRegion {
    pub fn new(center: Point3<f64>, radius: f64) -> Self {
        Self { center, radius }
    }
}

impl Region for SphereRegion {
    fn contains(&self, x: &Point3<f64>) -> bool {
        (x - self.center).norm_squared() <= self.radius * self.radius
    }

    fn extent(&self) -> Option<Aabb> {
        let r = nalgebra::Vector3::repeat(self.radius);
        Some(Aabb::new(self.center - r, self.center + r))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// A finite circular cylinder aligned with a box axis.
#[derive(Debug, Clone, PartialEq)]
pub struct CylinderRegion {
    axis: Axis,
    /// Center in the two remaining axes, in increasing axis order.
    center: [f64; 2],
    radius: f64,
    lo: f64,
    hi: f64,
}

impl CylinderRegion {
    pub fn new(axis: Axis, center: [f64; 2], radius: f64, lo: f64, hi: f64) -> Self {
        Self {
            axis,
            center,
            radius,
            lo,
            hi,
        }
    }

    fn cross_axes(&self) -> [usize; 2] {
        match self.axis {
            Axis::X => [1, 2],
            Axis::Y => [0, 2],
            Axis::Z => [0, 1],
        }
    }
}

impl Region for CylinderRegion {
    fn contains(&self, x: &Point3<f64>) -> bool {
        let along = x[self.axis.index()];
        if along < self.lo || along > self.hi {
            return false;
        }
        let [a, b] = self.cross_axes();
        let da = x[a] - self.center[0];
        let db = x[b] - self.center[1];
        da * da + db * db <= self.radius * self.radius
    }

    fn extent(&self) -> Option<Aabb> {
        let mut min = Point3::origin();
        let mut max = Point3::origin();
        let [a, b] = self.cross_axes();
        let along = self.axis.index();
        min[along] = self.lo;
        max[along] = self.hi;
        min[a] = self.center[0] - self.radius;
        max[a] = self.center[0] + self.radius;
        min[b] = self.center[1] - self.radius;
        max[b] = self.center[1] + self.radius;
        Some(Aabb::new(min, max))
    }
}

/// The complement of another region. Unbounded, so it has no extent.
#[derive(Debug, Clone, PartialEq)]
pub struct Outside<R> {
    inner: R,
}

impl<R: Region> Outside<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Region> Region for Outside<R> {
    fn contains(&self, x: &Point3<f64>) -> bool {
        !self.inner.contains(x)
    }

    fn extent(&self) -> Option<Aabb> {
        None
    }
}
