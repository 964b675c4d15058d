use super::geometry::{horizontal_distance, joint_angle, midpoint};
use super::rules::{first_failure, Check, Verdict};
use super::{joint, Evaluation, ExerciseAnalyzer, ExerciseKind};
use crate::pose::{JointId, JointPositions};

const REQUIRED: &[JointId] = &[
    JointId::LeftShoulder,
    JointId::RightShoulder,
    JointId::LeftElbow,
    JointId::RightElbow,
    JointId::LeftWrist,
    JointId::RightWrist,
    JointId::LeftHip,
    JointId::RightHip,
];

const MAX_ELBOW_ANGLE: f32 = 120.0;
const MAX_ALIGNMENT_RATIO: f32 = 0.3;
const MAX_HAND_OFFSET: f32 = 0.15;

const DEPTH: Check = Check::fault("depth", "Go lower! Bend your elbows more.", 0.75);
const ALIGNMENT: Check = Check::advisory(
    "alignment",
    "Keep your body straight! Engage your core.",
    0.78,
);
const HANDS: Check = Check::advisory(
    "hands",
    "Adjust hand position! Hands should be under shoulders.",
    0.72,
);
const GOOD: Verdict = Verdict::good("Great push-up form!", 0.85);

#[derive(Debug, Clone, Copy, Default)]
pub struct PushUpAnalyzer;

impl ExerciseAnalyzer for PushUpAnalyzer {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::PushUp
    }

    fn required_joints(&self) -> &'static [JointId] {
        REQUIRED
    }

    fn evaluate(&self, joints: &JointPositions) -> Option<Evaluation> {
        let left_shoulder = joint(joints, JointId::LeftShoulder)?;
        let right_shoulder = joint(joints, JointId::RightShoulder)?;
        let left_elbow = joint(joints, JointId::LeftElbow)?;
        let right_elbow = joint(joints, JointId::RightElbow)?;
        let left_wrist = joint(joints, JointId::LeftWrist)?;
        let right_wrist = joint(joints, JointId::RightWrist)?;
        let hip = midpoint(
            joint(joints, JointId::LeftHip)?,
            joint(joints, JointId::RightHip)?,
        );
        let shoulder = midpoint(left_shoulder, right_shoulder);
        let wrist = midpoint(left_wrist, right_wrist);

        let left_angle = joint_angle(left_elbow, left_shoulder, left_wrist);
        let right_angle = joint_angle(right_elbow, right_shoulder, right_wrist);
        let elbow_angle = (left_angle + right_angle) / 2.0;

        let torso = (shoulder - hip).norm();
        let alignment_ratio = if torso > f32::EPSILON {
            (shoulder.y - hip.y).abs() / torso
        } else {
            0.0
        };

        let hand_offset = horizontal_distance(wrist, shoulder);

        let verdict = first_failure(
            [
                (&DEPTH, elbow_angle > MAX_ELBOW_ANGLE),
                (&ALIGNMENT, alignment_ratio > MAX_ALIGNMENT_RATIO),
                (&HANDS, hand_offset > MAX_HAND_OFFSET),
            ],
            GOOD,
        );

        let mut eval = Evaluation::new(verdict);
        eval.angles.insert("elbow_angle_deg".into(), elbow_angle);
        eval.angles.insert("left_elbow_angle_deg".into(), left_angle);
        eval.angles.insert("right_elbow_angle_deg".into(), right_angle);
        eval.measurements.insert("shoulder_height_meters".into(), shoulder.y);
        eval.measurements.insert("body_alignment_ratio".into(), alignment_ratio);
        eval.measurements.insert("hand_shoulder_offset_meters".into(), hand_offset);
        Some(eval)
    }
}
