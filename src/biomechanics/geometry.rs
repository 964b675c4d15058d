//! Vector primitives shared by the exercise analyzers.
//!
//! All functions are total: degenerate input resolves to a defined value.

use crate::pose::Vec3;

/// Below this squared length a reference axis is treated as degenerate.
pub const AXIS_EPSILON: f32 = 1e-3;

/// Below this length an angle arm is treated as degenerate.
const ARM_EPSILON: f32 = 1e-6;

/// Angle at `center` between the arms to `p1` and `p2`, in degrees.
///
/// The cosine is clamped to [-1, 1] before `acos`, so collinear points give
/// exactly 0 or 180 rather than NaN. A zero-length arm is read as a straight
/// joint (180).
pub fn joint_angle(center: Vec3, p1: Vec3, p2: Vec3) -> f32 {
    let v1 = p1 - center;
    let v2 = p2 - center;
    let n1 = v1.norm();
    let n2 = v2.norm();
    if !(n1 > ARM_EPSILON && n2 > ARM_EPSILON) {
        return 180.0;
    }
    let cos = (v1 / n1).dot(&(v2 / n2)).clamp(-1.0, 1.0);
    cos.acos().to_degrees().clamp(0.0, 180.0)
}

/// Offset of `point` from its projection onto the line `start`→`end`.
/// Zero for a degenerate axis.
pub fn perpendicular_offset(point: Vec3, start: Vec3, end: Vec3) -> Vec3 {
    let axis = end - start;
    let len2 = axis.norm_squared();
    if !(len2 >= AXIS_EPSILON) {
        return Vec3::zeros();
    }
    let t = (point - start).dot(&axis) / len2;
    point - (start + axis * t)
}

/// Perpendicular distance of `point` from the line `start`→`end`.
///
/// Positive when the offset points along `side`, negative otherwise.
/// Returns 0 for a degenerate axis.
pub fn axial_deviation(point: Vec3, start: Vec3, end: Vec3, side: Vec3) -> f32 {
    let offset = perpendicular_offset(point, start, end);
    let magnitude = offset.norm();
    if offset.dot(&side) < 0.0 {
        -magnitude
    } else {
        magnitude
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Direction toward the body midline in anatomical space. The subject's
    /// left limb sits on the -X side, so inward is +X for it.
    pub fn medial(&self) -> Vec3 {
        match self {
            Side::Left => Vec3::new(1.0, 0.0, 0.0),
            Side::Right => Vec3::new(-1.0, 0.0, 0.0),
        }
    }
}

/// Knee valgus in meters: positive = inward collapse, negative = varus.
///
/// Measured in the frontal plane (Z dropped) so sagittal knee flexion does
/// not read as collapse.
pub fn knee_valgus(hip: Vec3, knee: Vec3, ankle: Vec3, side: Side) -> f32 {
    axial_deviation(frontal(knee), frontal(hip), frontal(ankle), side.medial())
}

/// Distance between two points on the horizontal (X-Z) plane.
pub fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    (dx * dx + dz * dz).sqrt()
}

pub fn midpoint(a: Vec3, b: Vec3) -> Vec3 {
    (a + b) / 2.0
}

fn frontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.y, 0.0)
}
