use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{JointId, Vec3};
use crate::capability::DeviceMode;

/// Fused joint in anatomical space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointSample {
    pub position: Vec3,
    pub confidence: f32,
}

impl JointSample {
    pub fn new(position: Vec3, confidence: f32) -> Self {
        Self {
            position,
            confidence,
        }
    }
}

/// Joint positions handed to the analyzers.
pub type JointPositions = BTreeMap<JointId, Vec3>;

/// One fused instant. Immutable once built; joints below the confidence
/// threshold are absent rather than zeroed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    joints: BTreeMap<JointId, JointSample>,
    timestamp: f64,
    mode: DeviceMode,
}

impl PoseFrame {
    pub fn new(joints: BTreeMap<JointId, JointSample>, timestamp: f64, mode: DeviceMode) -> Self {
        Self {
            joints,
            timestamp,
            mode,
        }
    }

    pub fn get(&self, id: JointId) -> Option<&JointSample> {
        self.joints.get(&id)
    }

    pub fn position(&self, id: JointId) -> Option<Vec3> {
        self.joints.get(&id).map(|s| s.position)
    }

    pub fn contains(&self, id: JointId) -> bool {
        self.joints.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointId, &JointSample)> {
        self.joints.iter().map(|(id, s)| (*id, s))
    }

    pub fn positions(&self) -> JointPositions {
        self.joints.iter().map(|(id, s)| (*id, s.position)).collect()
    }
}
