use std::collections::BTreeMap;

use tracing::trace;

use super::anatomical::to_anatomical;
use super::depth::{DepthMap, DepthSampler};
use crate::capability::DeviceMode;
use crate::config::FusionConfig;
use crate::pose::{JointSample, PoseEstimate, PoseFrame, RawJointSample, Vec3};

/// Where a fused joint's depth came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthSource {
    /// Metric 3D coordinates supplied by the detector.
    Detector,
    /// Sampled from the depth map.
    Sensor,
    /// Constant estimate.
    Estimated,
}

/// Combines detector output and optional depth into anatomical-space joints.
#[derive(Debug, Clone)]
pub struct SensorFusion {
    sampler: DepthSampler,
    confidence_threshold: f32,
    estimated_depth: f32,
}

impl SensorFusion {
    pub const CONFIDENCE_THRESHOLD: f32 = 0.3;

    pub fn new(sampler: DepthSampler, confidence_threshold: f32, estimated_depth: f32) -> Self {
        Self {
            sampler,
            confidence_threshold,
            estimated_depth,
        }
    }

    pub fn from_config(config: &FusionConfig) -> Self {
        Self::new(
            DepthSampler::from_config(config),
            config.confidence_threshold,
            config.estimated_depth,
        )
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Fuse one frame. `mode` is the caller's snapshot and is used for every
    /// joint of the frame.
    pub fn fuse(
        &self,
        estimate: &PoseEstimate,
        depth_map: Option<&DepthMap>,
        mode: DeviceMode,
        timestamp: f64,
    ) -> PoseFrame {
        let depth_map = match mode {
            DeviceMode::Pro => depth_map,
            DeviceMode::Standard => None,
        };

        let mut joints = BTreeMap::new();
        for (id, raw) in estimate.iter() {
            if !self.is_usable(raw) {
                trace!(joint = id.name(), confidence = raw.confidence, "joint dropped");
                continue;
            }
            let (camera, source) = self.camera_position(raw, depth_map);
            trace!(joint = id.name(), ?source, "joint fused");
            joints.insert(id, JointSample::new(to_anatomical(camera), raw.confidence));
        }

        PoseFrame::new(joints, timestamp, mode)
    }

    /// Camera-space position of a single joint.
    pub fn camera_position(
        &self,
        raw: &RawJointSample,
        depth_map: Option<&DepthMap>,
    ) -> (Vec3, DepthSource) {
        if let Some(position) = raw.position {
            return (position, DepthSource::Detector);
        }
        match depth_map {
            Some(map) => {
                let (px, py) = raw.to_pixel(map.width(), map.height());
                let depth = self
                    .sampler
                    .sample(Some(map), px, py, map.width(), map.height());
                (Self::unproject(raw, depth), DepthSource::Sensor)
            }
            None => (Self::unproject(raw, self.estimated_depth), DepthSource::Estimated),
        }
    }

    /// Normalized image coordinates (origin top-left) to a camera-space
    /// point with X, Y in [-1, 1] and the given depth as Z.
    fn unproject(raw: &RawJointSample, depth: f32) -> Vec3 {
        Vec3::new((raw.x - 0.5) * 2.0, (0.5 - raw.y) * 2.0, depth)
    }

    fn is_usable(&self, raw: &RawJointSample) -> bool {
        if !raw.is_valid(self.confidence_threshold) {
            return false;
        }
        let finite_2d = raw.x.is_finite() && raw.y.is_finite();
        match raw.position {
            Some(p) => p.iter().all(|v| v.is_finite()),
            None => finite_2d,
        }
    }
}

impl Default for SensorFusion {
    fn default() -> Self {
        Self::new(
            DepthSampler::default(),
            Self::CONFIDENCE_THRESHOLD,
            DepthSampler::DEFAULT_DEPTH,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::JointId;

    fn estimate_with(id: JointId, sample: RawJointSample) -> PoseEstimate {
        PoseEstimate::new().with(id, sample)
    }

    #[test]
    fn test_confidence_gate_boundary() {
        let fusion = SensorFusion::default();
        let estimate = PoseEstimate::new()
            .with(JointId::LeftHip, RawJointSample::new(0.4, 0.5, 0.29))
            .with(JointId::RightHip, RawJointSample::new(0.6, 0.5, 0.3));
        let frame = fusion.fuse(&estimate, None, DeviceMode::Standard, 0.0);
        assert!(!frame.contains(JointId::LeftHip));
        assert!(frame.contains(JointId::RightHip));
    }

    #[test]
    fn test_standard_uses_estimated_depth() {
        let fusion = SensorFusion::default();
        let estimate = estimate_with(JointId::Neck, RawJointSample::new(0.75, 0.25, 0.9));
        let depth = DepthMap::filled(4, 4, 3.0);
        let frame = fusion.fuse(&estimate, Some(&depth), DeviceMode::Standard, 0.5);
        // camera (0.5, 0.5, 1.5) -> anatomical (-0.5, 0.5, -1.5)
        assert_eq!(frame.position(JointId::Neck), Some(Vec3::new(-0.5, 0.5, -1.5)));
        assert_eq!(frame.mode(), DeviceMode::Standard);
        assert_eq!(frame.timestamp(), 0.5);
    }

    #[test]
    fn test_pro_samples_depth_map() {
        let fusion = SensorFusion::default();
        let mut depth = DepthMap::filled(4, 4, 2.0);
        depth.set(3, 1, 2.5);
        let raw = RawJointSample::new(0.75, 0.25, 0.9);
        let (camera, source) = fusion.camera_position(&raw, Some(&depth));
        assert_eq!(source, DepthSource::Sensor);
        assert_eq!(camera, Vec3::new(0.5, 0.5, 2.5));

        let frame = fusion.fuse(&estimate_with(JointId::Neck, raw), Some(&depth), DeviceMode::Pro, 0.0);
        assert_eq!(frame.position(JointId::Neck), Some(Vec3::new(-0.5, 0.5, -2.5)));
    }

    #[test]
    fn test_pro_without_depth_map_falls_back() {
        let fusion = SensorFusion::default();
        let frame = fusion.fuse(
            &estimate_with(JointId::Neck, RawJointSample::new(0.5, 0.5, 0.9)),
            None,
            DeviceMode::Pro,
            0.0,
        );
        assert_eq!(frame.position(JointId::Neck), Some(Vec3::new(-0.0, 0.0, -1.5)));
    }

    #[test]
    fn test_pro_invalid_depth_uses_default() {
        let fusion = SensorFusion::default();
        let depth = DepthMap::filled(2, 2, f32::NAN);
        let raw = RawJointSample::new(0.5, 0.5, 0.9);
        let (camera, _) = fusion.camera_position(&raw, Some(&depth));
        assert_eq!(camera.z, 1.5);
    }

    #[test]
    fn test_detector_metric_position_skips_depth() {
        let fusion = SensorFusion::default();
        let raw = RawJointSample::metric(0.5, 0.5, Vec3::new(0.1, 0.9, 2.2), 0.8);
        let depth = DepthMap::filled(2, 2, 4.0);
        let (camera, source) = fusion.camera_position(&raw, Some(&depth));
        assert_eq!(source, DepthSource::Detector);
        assert_eq!(camera, Vec3::new(0.1, 0.9, 2.2));

        let frame = fusion.fuse(&estimate_with(JointId::Nose, raw), Some(&depth), DeviceMode::Pro, 0.0);
        assert_eq!(frame.position(JointId::Nose), Some(Vec3::new(-0.1, 0.9, -2.2)));
    }

    #[test]
    fn test_non_finite_coordinates_are_absent() {
        let fusion = SensorFusion::default();
        let estimate = PoseEstimate::new()
            .with(JointId::Nose, RawJointSample::new(f32::NAN, 0.5, 0.9))
            .with(JointId::Neck, RawJointSample::metric(0.5, 0.5, Vec3::new(0.0, f32::INFINITY, 1.0), 0.9));
        let frame = fusion.fuse(&estimate, None, DeviceMode::Standard, 0.0);
        assert!(frame.is_empty());
    }
}
