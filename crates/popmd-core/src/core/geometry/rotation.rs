use super::domain::Dimension;
use crate::core::random::SeededRandom;
use nalgebra::{Unit, UnitQuaternion, Vector3};
use std::f64::consts::PI;

/// Rotation by `angle_degrees` about `axis`; `None` for a zero axis.
pub fn from_axis_angle_degrees(
    axis: &Vector3<f64>,
    angle_degrees: f64,
) -> Option<UnitQuaternion<f64>> {
    let axis = Unit::try_new(*axis, 1e-12)?;
    Some(UnitQuaternion::from_axis_angle(
        &axis,
        angle_degrees.to_radians(),
    ))
}

/// A random orientation drawn from `rng`.
///
/// In 3d the axis comes from three uniforms shifted to `[-0.5, 0.5)`, in 2d it is the z
/// axis; the angle is uniform on `[0, 2 pi)`. Four draws are consumed in 3d, one in 2d.
pub fn random_orientation(rng: &mut SeededRandom, dimension: Dimension) -> UnitQuaternion<f64> {
    let axis = if dimension.is_2d() {
        Vector3::z()
    } else {
        let v = Vector3::new(
            rng.uniform() - 0.5,
            rng.uniform() - 0.5,
            rng.uniform() - 0.5,
        );
        if v.norm_squared() > 0.0 {
            v
        } else {
            Vector3::z()
        }
    };
    let angle = rng.uniform() * 2.0 * PI;
    UnitQuaternion::from_axis_angle(&Unit::new_normalize(axis), angle)
}
