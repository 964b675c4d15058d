use super::geometry::{joint_angle, midpoint, perpendicular_offset};
use super::rules::{first_failure, Check, Verdict};
use super::{joint, Evaluation, ExerciseAnalyzer, ExerciseKind};
use crate::pose::{JointId, JointPositions};

const REQUIRED: &[JointId] = &[
    JointId::LeftShoulder,
    JointId::RightShoulder,
    JointId::LeftHip,
    JointId::RightHip,
    JointId::LeftAnkle,
    JointId::RightAnkle,
];

const MAX_HIP_OFFSET: f32 = 0.08;
const MIN_BODY_ANGLE: f32 = 165.0;

const SAG: Check = Check::fault("sag", "Raise your hips! Engage your core.", 0.78);
const PIKE: Check = Check::fault("pike", "Lower your hips to form a straight line.", 0.78);
const BODY_LINE: Check = Check::fault(
    "body_line",
    "Straighten your body! Maintain a straight line.",
    0.75,
);
const GOOD: Verdict = Verdict::good("Excellent plank form!", 0.85);

/// Hip height against the shoulder-ankle line.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlankAnalyzer;

impl ExerciseAnalyzer for PlankAnalyzer {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::Plank
    }

    fn required_joints(&self) -> &'static [JointId] {
        REQUIRED
    }

    fn evaluate(&self, joints: &JointPositions) -> Option<Evaluation> {
        let shoulder = midpoint(
            joint(joints, JointId::LeftShoulder)?,
            joint(joints, JointId::RightShoulder)?,
        );
        let hip = midpoint(
            joint(joints, JointId::LeftHip)?,
            joint(joints, JointId::RightHip)?,
        );
        let ankle = midpoint(
            joint(joints, JointId::LeftAnkle)?,
            joint(joints, JointId::RightAnkle)?,
        );

        let body_length = (ankle - shoulder).norm();
        // 負 = 腰が落ちている
        let vertical = perpendicular_offset(hip, shoulder, ankle).y;
        let body_angle = joint_angle(hip, shoulder, ankle);

        let verdict = first_failure(
            [
                (&SAG, vertical < -MAX_HIP_OFFSET),
                (&PIKE, vertical > MAX_HIP_OFFSET),
                (&BODY_LINE, body_angle < MIN_BODY_ANGLE),
            ],
            GOOD,
        );

        let mut eval = Evaluation::new(verdict);
        eval.deviations
            .insert("hip_alignment_deviation_meters".into(), vertical.abs());
        eval.measurements.insert("body_line_length_meters".into(), body_length);
        eval.measurements.insert("body_angle_deg".into(), body_angle);
        Some(eval)
    }
}
