//! Deterministic synthetic poses for the offline demo and tests.
//!
//! Bodies are built in anatomical space around the origin (knees of a
//! squatting subject at 0.5 m) and handed to the pipeline as detector output
//! with metric camera-space coordinates, so fusion runs its usual path.

use std::f32::consts::TAU;
use std::str::FromStr;

use anyhow::{anyhow, Error};

use crate::biomechanics::ExerciseKind;
use crate::fusion::to_anatomical;
use crate::pipeline::FrameInput;
use crate::pose::{JointId, JointPositions, PoseEstimate, RawJointSample, Vec3};

const CONFIDENCE: f32 = 0.9;
/// One repetition cycle, in frames.
const CYCLE: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoScenario {
    PerfectSquat,
    ShallowSquat,
    Plank,
    PushUp,
    Lunge,
    /// Upright subject seen by a 2D-only detector.
    Standing,
}

impl DemoScenario {
    pub const ALL: [DemoScenario; 6] = [
        DemoScenario::PerfectSquat,
        DemoScenario::ShallowSquat,
        DemoScenario::Plank,
        DemoScenario::PushUp,
        DemoScenario::Lunge,
        DemoScenario::Standing,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DemoScenario::PerfectSquat => "perfect-squat",
            DemoScenario::ShallowSquat => "shallow-squat",
            DemoScenario::Plank => "plank",
            DemoScenario::PushUp => "push-up",
            DemoScenario::Lunge => "lunge",
            DemoScenario::Standing => "standing",
        }
    }

    pub fn exercise(&self) -> ExerciseKind {
        match self {
            DemoScenario::PerfectSquat | DemoScenario::ShallowSquat | DemoScenario::Standing => {
                ExerciseKind::Squat
            }
            DemoScenario::Plank => ExerciseKind::Plank,
            DemoScenario::PushUp => ExerciseKind::PushUp,
            DemoScenario::Lunge => ExerciseKind::Lunge,
        }
    }

    /// Detector output for frame `index`.
    pub fn pose(&self, index: usize) -> PoseEstimate {
        let wave = (index as f32 / CYCLE * TAU).sin();
        match self {
            DemoScenario::PerfectSquat => metric(&squat(0.02 + 0.005 * wave, 95.0 + 2.0 * wave, 0.01)),
            DemoScenario::ShallowSquat => metric(&squat(-0.1 + 0.01 * wave, 120.0 + 5.0 * wave, 0.0)),
            DemoScenario::Plank => metric(&plank(0.02 * wave)),
            DemoScenario::PushUp => metric(&push_up(95.0 + 10.0 * wave)),
            DemoScenario::Lunge => metric(&lunge(0.1 + 0.03 * wave)),
            DemoScenario::Standing => standing(),
        }
    }

    /// `count` frames at `fps`, starting at t = 0.
    pub fn frames(&self, count: usize, fps: f32) -> Vec<FrameInput> {
        (0..count)
            .map(|i| FrameInput::new(i as f64 / fps as f64, self.pose(i)))
            .collect()
    }
}

impl FromStr for DemoScenario {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|sc| sc.name() == key)
            .ok_or_else(|| anyhow!("unknown demo scenario: {:?}", s))
    }
}

fn metric(joints: &JointPositions) -> PoseEstimate {
    joints
        .iter()
        .map(|(id, anatomical)| {
            let camera = to_anatomical(*anatomical);
            let sample = RawJointSample::metric(
                camera.x / 2.0 + 0.5,
                0.5 - camera.y / 2.0,
                camera,
                CONFIDENCE,
            );
            (*id, sample)
        })
        .collect()
}

fn insert_pair(joints: &mut JointPositions, left: JointId, right: JointId, half_width: f32, at: Vec3) {
    joints.insert(left, at + Vec3::new(-half_width, 0.0, 0.0));
    joints.insert(right, at + Vec3::new(half_width, 0.0, 0.0));
}

/// Side-on squat with short segments so a 95° knee keeps the hips over the
/// feet.
fn squat(hip_drop: f32, knee_angle: f32, valgus: f32) -> JointPositions {
    const THIGH: f32 = 0.2;
    const SHIN: f32 = 0.38;
    let phi = (hip_drop / THIGH).clamp(-1.0, 1.0).asin();
    let beta = (knee_angle - 90.0).to_radians() + phi;

    let hip = Vec3::new(0.0, 0.5 - hip_drop, -THIGH * phi.cos());
    let ankle = Vec3::new(0.0, 0.5 - SHIN * beta.cos(), SHIN * beta.sin());
    let mut j = JointPositions::new();
    insert_pair(&mut j, JointId::LeftHip, JointId::RightHip, 0.15, hip);
    insert_pair(&mut j, JointId::LeftAnkle, JointId::RightAnkle, 0.15, ankle);
    insert_pair(&mut j, JointId::LeftKnee, JointId::RightKnee, 0.15 - valgus, Vec3::new(0.0, 0.5, 0.0));

    let shoulder = hip + Vec3::new(0.0, 0.45, 0.2);
    insert_pair(&mut j, JointId::LeftShoulder, JointId::RightShoulder, 0.18, shoulder);
    insert_pair(&mut j, JointId::LeftWrist, JointId::RightWrist, 0.2, shoulder + Vec3::new(0.0, 0.0, 0.5));
    insert_pair(&mut j, JointId::LeftElbow, JointId::RightElbow, 0.19, shoulder + Vec3::new(0.0, 0.0, 0.25));
    j.insert(JointId::Neck, shoulder + Vec3::new(0.0, 0.05, 0.0));
    j.insert(JointId::Nose, shoulder + Vec3::new(0.0, 0.2, 0.08));
    j.insert(JointId::Root, hip);
    j
}

/// Prone plank along Z; `lift` raises the hips off the shoulder-ankle line.
fn plank(lift: f32) -> JointPositions {
    let shoulder = Vec3::new(0.0, 0.5, 0.6);
    let ankle = Vec3::new(0.0, 0.1, -0.9);
    let hip = (shoulder + ankle) / 2.0 + Vec3::new(0.0, lift, 0.0);
    let mut j = JointPositions::new();
    insert_pair(&mut j, JointId::LeftShoulder, JointId::RightShoulder, 0.18, shoulder);
    insert_pair(&mut j, JointId::LeftElbow, JointId::RightElbow, 0.18, Vec3::new(0.0, 0.0, 0.6));
    insert_pair(&mut j, JointId::LeftWrist, JointId::RightWrist, 0.15, Vec3::new(0.0, 0.0, 0.85));
    insert_pair(&mut j, JointId::LeftHip, JointId::RightHip, 0.12, hip);
    insert_pair(&mut j, JointId::LeftKnee, JointId::RightKnee, 0.11, (hip + ankle) / 2.0);
    insert_pair(&mut j, JointId::LeftAnkle, JointId::RightAnkle, 0.1, ankle);
    j.insert(JointId::Neck, shoulder + Vec3::new(0.0, 0.02, 0.08));
    j.insert(JointId::Nose, shoulder + Vec3::new(0.0, 0.0, 0.25));
    j.insert(JointId::Root, hip);
    j
}

/// Push-up with wrists under the shoulders and elbows flared sideways.
fn push_up(elbow_angle: f32) -> JointPositions {
    const ARM: f32 = 0.27;
    let reach = 2.0 * ARM * (elbow_angle.to_radians() / 2.0).sin();
    let flare = (ARM * ARM - reach * reach / 4.0).max(0.0).sqrt();
    let shoulder = Vec3::new(0.0, reach, 0.5);
    let hip = Vec3::new(0.0, reach * 0.85, -0.2);
    let ankle = Vec3::new(0.0, 0.08, -1.0);
    let mut j = JointPositions::new();
    insert_pair(&mut j, JointId::LeftShoulder, JointId::RightShoulder, 0.18, shoulder);
    insert_pair(&mut j, JointId::LeftElbow, JointId::RightElbow, 0.18 + flare, Vec3::new(0.0, reach / 2.0, 0.5));
    insert_pair(&mut j, JointId::LeftWrist, JointId::RightWrist, 0.18, Vec3::new(0.0, 0.0, 0.5));
    insert_pair(&mut j, JointId::LeftHip, JointId::RightHip, 0.12, hip);
    insert_pair(&mut j, JointId::LeftKnee, JointId::RightKnee, 0.11, (hip + ankle) / 2.0);
    insert_pair(&mut j, JointId::LeftAnkle, JointId::RightAnkle, 0.1, ankle);
    j.insert(JointId::Neck, shoulder + Vec3::new(0.0, 0.02, 0.08));
    j.insert(JointId::Root, hip);
    j
}

/// Left leg forward; `back_knee_height` is how far the rear knee hovers.
fn lunge(back_knee_height: f32) -> JointPositions {
    let mut j = JointPositions::new();
    j.insert(JointId::LeftHip, Vec3::new(-0.12, 0.55, 0.0));
    j.insert(JointId::LeftKnee, Vec3::new(-0.12, 0.52, 0.42));
    j.insert(JointId::LeftAnkle, Vec3::new(-0.12, 0.08, 0.45));
    j.insert(JointId::RightHip, Vec3::new(0.12, 0.55, 0.0));
    j.insert(JointId::RightKnee, Vec3::new(0.12, back_knee_height, -0.2));
    j.insert(JointId::RightAnkle, Vec3::new(0.12, 0.12, -0.6));
    let shoulder = Vec3::new(0.0, 1.05, 0.02);
    insert_pair(&mut j, JointId::LeftShoulder, JointId::RightShoulder, 0.18, shoulder);
    j.insert(JointId::Neck, shoulder + Vec3::new(0.0, 0.05, 0.0));
    j.insert(JointId::Root, Vec3::new(0.0, 0.55, 0.0));
    j
}

/// Upright front view in normalized image coordinates (origin top-left).
fn standing() -> PoseEstimate {
    const POINTS: [(JointId, f32, f32); 14] = [
        (JointId::Nose, 0.5, 0.2),
        (JointId::Neck, 0.5, 0.3),
        (JointId::LeftShoulder, 0.6, 0.3),
        (JointId::RightShoulder, 0.4, 0.3),
        (JointId::LeftElbow, 0.65, 0.45),
        (JointId::RightElbow, 0.35, 0.45),
        (JointId::LeftWrist, 0.68, 0.6),
        (JointId::RightWrist, 0.32, 0.6),
        (JointId::LeftHip, 0.55, 0.55),
        (JointId::RightHip, 0.45, 0.55),
        (JointId::LeftKnee, 0.57, 0.75),
        (JointId::RightKnee, 0.43, 0.75),
        (JointId::LeftAnkle, 0.58, 0.95),
        (JointId::RightAnkle, 0.42, 0.95),
    ];
    POINTS
        .iter()
        .map(|&(id, x, y)| (id, RawJointSample::new(x, y, CONFIDENCE)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biomechanics::BiomechanicsAnalyzer;
    use crate::capability::DeviceMode;
    use crate::fusion::SensorFusion;

    fn analyze(scenario: DemoScenario, index: usize) -> crate::biomechanics::BiometricResult {
        let fusion = SensorFusion::default();
        let frame = fusion.fuse(&scenario.pose(index), None, DeviceMode::Standard, 0.0);
        BiomechanicsAnalyzer::new().analyze(scenario.exercise(), &frame.positions(), 0.0)
    }

    #[test]
    fn test_metric_round_trip_through_fusion() {
        let fusion = SensorFusion::default();
        let joints = squat(0.02, 95.0, 0.01);
        let frame = fusion.fuse(&metric(&joints), None, DeviceMode::Standard, 0.0);
        for (id, pos) in &joints {
            assert_eq!(frame.position(*id), Some(*pos));
        }
    }

    #[test]
    fn test_scenarios_give_expected_feedback() {
        for i in [0, 15, 30, 45] {
            assert_eq!(analyze(DemoScenario::PerfectSquat, i).feedback, "Perfect squat form!");
            assert_eq!(
                analyze(DemoScenario::ShallowSquat, i).feedback,
                "Go deeper! Lower your hips below knee level."
            );
            assert_eq!(analyze(DemoScenario::Plank, i).feedback, "Excellent plank form!");
            assert_eq!(analyze(DemoScenario::PushUp, i).feedback, "Great push-up form!");
            assert_eq!(analyze(DemoScenario::Lunge, i).feedback, "Perfect lunge form!");
        }
    }

    #[test]
    fn test_standing_reads_as_shallow_squat() {
        let result = analyze(DemoScenario::Standing, 0);
        assert!(!result.is_correct);
        assert_eq!(result.feedback, "Go deeper! Lower your hips below knee level.");
    }

    #[test]
    fn test_frames_timestamps() {
        let frames = DemoScenario::Plank.frames(4, 30.0);
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0].timestamp, 0.0);
        assert!((frames[3].timestamp - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_scenario_names_parse() {
        for sc in DemoScenario::ALL {
            assert_eq!(sc.name().parse::<DemoScenario>().unwrap(), sc);
        }
        assert_eq!("PUSH_UP".parse::<DemoScenario>().unwrap(), DemoScenario::PushUp);
        assert!("burpee".parse::<DemoScenario>().is_err());
    }
}
