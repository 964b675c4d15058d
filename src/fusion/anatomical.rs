//! Camera space → anatomical space.
//!
//! Camera: X right(+), Y up(+), Z toward the camera(+).
//! Anatomical: X lateral right(+), Y vertical up(+), Z anterior(+).
//! For a front-facing sensor the subject's right is the camera's left and
//! the subject faces the camera, so X and Z flip.

use crate::pose::Vec3;

/// `(x, y, z) -> (-x, y, -z)`. Applying it twice is the identity.
pub fn to_anatomical(camera: Vec3) -> Vec3 {
    Vec3::new(-camera.x, camera.y, -camera.z)
}
