pub mod anatomical;
pub mod depth;
pub mod sensor;

pub use anatomical::to_anatomical;
pub use depth::{DepthMap, DepthSampler};
pub use sensor::{DepthSource, SensorFusion};
