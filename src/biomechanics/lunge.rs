use super::geometry::{joint_angle, midpoint};
use super::rules::{first_failure, Check, Verdict};
use super::{joint, Evaluation, ExerciseAnalyzer, ExerciseKind};
use crate::pose::{JointId, JointPositions, Vec3};

const REQUIRED: &[JointId] = &[
    JointId::LeftHip,
    JointId::RightHip,
    JointId::LeftKnee,
    JointId::RightKnee,
    JointId::LeftAnkle,
    JointId::RightAnkle,
];

const FRONT_KNEE_RANGE: (f32, f32) = (70.0, 110.0);
const MAX_BACK_KNEE_HEIGHT: f32 = 0.3;
const MAX_KNEE_FORWARD: f32 = 0.15;

const FRONT_LEG: Check = Check::fault(
    "front_leg",
    "Adjust front leg! Aim for 90-degree knee angle.",
    0.75,
);
const BACK_KNEE: Check = Check::fault(
    "back_knee",
    "Lower down more! Back knee should be near the ground.",
    0.70,
);
const KNEE_OVER_ANKLE: Check = Check::advisory(
    "knee_over_ankle",
    "Good depth! Keep front knee aligned over ankle.",
    0.78,
);
const GOOD: Verdict = Verdict::good("Perfect lunge form!", 0.80);

struct Leg {
    hip: Vec3,
    knee: Vec3,
    ankle: Vec3,
}

impl Leg {
    fn knee_angle(&self) -> f32 {
        joint_angle(self.knee, self.hip, self.ankle)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LungeAnalyzer;

impl ExerciseAnalyzer for LungeAnalyzer {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::Lunge
    }

    fn required_joints(&self) -> &'static [JointId] {
        REQUIRED
    }

    fn evaluate(&self, joints: &JointPositions) -> Option<Evaluation> {
        let left = Leg {
            hip: joint(joints, JointId::LeftHip)?,
            knee: joint(joints, JointId::LeftKnee)?,
            ankle: joint(joints, JointId::LeftAnkle)?,
        };
        let right = Leg {
            hip: joint(joints, JointId::RightHip)?,
            knee: joint(joints, JointId::RightKnee)?,
            ankle: joint(joints, JointId::RightAnkle)?,
        };
        let hip = midpoint(left.hip, right.hip);

        // 後ろ脚の膝は床に近づくので、膝が高い方を前脚とする（同じ高さなら右）
        let (front, back) = if left.knee.y > right.knee.y {
            (&left, &right)
        } else {
            (&right, &left)
        };

        let front_angle = front.knee_angle();
        let back_angle = back.knee_angle();
        let back_knee_height = back.knee.y;
        let knee_forward = (front.knee.z - front.ankle.z).abs();

        let verdict = first_failure(
            [
                (
                    &FRONT_LEG,
                    front_angle < FRONT_KNEE_RANGE.0 || front_angle > FRONT_KNEE_RANGE.1,
                ),
                (&BACK_KNEE, back_knee_height > MAX_BACK_KNEE_HEIGHT),
                (&KNEE_OVER_ANKLE, knee_forward > MAX_KNEE_FORWARD),
            ],
            GOOD,
        );

        let mut eval = Evaluation::new(verdict);
        eval.angles.insert("front_knee_angle_deg".into(), front_angle);
        eval.angles.insert("back_knee_angle_deg".into(), back_angle);
        eval.measurements.insert("back_knee_height_meters".into(), back_knee_height);
        eval.measurements
            .insert("front_knee_forward_offset_meters".into(), knee_forward);
        eval.measurements.insert("torso_lean_meters".into(), hip.z.abs());
        Some(eval)
    }
}
