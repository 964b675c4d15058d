pub mod frame;
pub mod joint;

pub use frame::{JointPositions, JointSample, PoseFrame};
pub use joint::{JointId, PoseEstimate, RawJointSample};

/// Metric 3D vector used throughout the pipeline.
pub type Vec3 = nalgebra::Vector3<f32>;
