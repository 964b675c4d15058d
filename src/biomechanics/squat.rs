use super::geometry::{horizontal_distance, joint_angle, knee_valgus, midpoint, Side};
use super::rules::{first_failure, Check, Verdict};
use super::{joint, Evaluation, ExerciseAnalyzer, ExerciseKind};
use crate::pose::{JointId, JointPositions};

const REQUIRED: &[JointId] = &[
    JointId::LeftHip,
    JointId::RightHip,
    JointId::LeftKnee,
    JointId::RightKnee,
    JointId::LeftAnkle,
    JointId::RightAnkle,
];

// 閾値 (m / deg)
const MIN_HIP_DEPTH: f32 = -0.05;
const MAX_KNEE_ANGLE: f32 = 110.0;
const MAX_VALGUS: f32 = 0.02;
const MAX_HIP_ANKLE_DISTANCE: f32 = 0.3;

const DEPTH: Check = Check::fault("depth", "Go deeper! Lower your hips below knee level.", 0.75);
const KNEE_BEND: Check = Check::fault("knee_bend", "Squat deeper! Aim for 90-degree knee bend.", 0.70);
const VALGUS: Check = Check::fault("valgus", "Keep knees aligned! Avoid inward collapse.", 0.72);
const LEAN: Check = Check::advisory(
    "lean",
    "Good depth! Keep chest up and avoid excessive lean.",
    0.80,
);
const GOOD: Verdict = Verdict::good("Perfect squat form!", 0.85);

/// Depth, knee flexion, knee tracking and forward lean.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquatAnalyzer;

impl ExerciseAnalyzer for SquatAnalyzer {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::Squat
    }

    fn required_joints(&self) -> &'static [JointId] {
        REQUIRED
    }

    fn evaluate(&self, joints: &JointPositions) -> Option<Evaluation> {
        let left_hip = joint(joints, JointId::LeftHip)?;
        let right_hip = joint(joints, JointId::RightHip)?;
        let left_knee = joint(joints, JointId::LeftKnee)?;
        let right_knee = joint(joints, JointId::RightKnee)?;
        let left_ankle = joint(joints, JointId::LeftAnkle)?;
        let right_ankle = joint(joints, JointId::RightAnkle)?;

        let hip = midpoint(left_hip, right_hip);
        let knee = midpoint(left_knee, right_knee);
        let ankle = midpoint(left_ankle, right_ankle);

        // 正 = 股関節が膝より下
        let hip_depth = knee.y - hip.y;

        let left_angle = joint_angle(left_knee, left_hip, left_ankle);
        let right_angle = joint_angle(right_knee, right_hip, right_ankle);
        let knee_angle = (left_angle + right_angle) / 2.0;

        let left_valgus = knee_valgus(left_hip, left_knee, left_ankle, Side::Left);
        let right_valgus = knee_valgus(right_hip, right_knee, right_ankle, Side::Right);
        let max_valgus = left_valgus.abs().max(right_valgus.abs());

        let hip_ankle = horizontal_distance(hip, ankle);

        let verdict = first_failure(
            [
                (&DEPTH, hip_depth < MIN_HIP_DEPTH),
                (&KNEE_BEND, knee_angle > MAX_KNEE_ANGLE),
                (&VALGUS, max_valgus > MAX_VALGUS),
                (&LEAN, hip_ankle > MAX_HIP_ANKLE_DISTANCE),
            ],
            GOOD,
        );

        let mut eval = Evaluation::new(verdict);
        eval.measurements.insert("hip_depth_meters".into(), hip_depth);
        eval.measurements.insert("hip_ankle_horizontal_distance".into(), hip_ankle);
        eval.angles.insert("knee_angle_deg".into(), knee_angle);
        eval.angles.insert("left_knee_angle_deg".into(), left_angle);
        eval.angles.insert("right_knee_angle_deg".into(), right_angle);
        eval.deviations.insert("left_knee_valgus_meters".into(), left_valgus);
        eval.deviations.insert("right_knee_valgus_meters".into(), right_valgus);
        Some(eval)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::biomechanics::BiomechanicsAnalyzer;
    use crate::pose::Vec3;

    /// Side-on squat: knees at 0.5 m, feet 0.3 m apart. `hip_drop` is how far
    /// the hips sit below the knees, `valgus` shifts both knees inward.
    pub(crate) fn squat_pose(
        thigh: f32,
        shin: f32,
        hip_drop: f32,
        knee_angle: f32,
        valgus: f32,
    ) -> JointPositions {
        let phi_h = (hip_drop / thigh).asin();
        let beta = (knee_angle - 90.0).to_radians() + phi_h;
        let mut joints = JointPositions::new();
        for (side_x, inward, hip_id, knee_id, ankle_id) in [
            (-0.15f32, 1.0f32, JointId::LeftHip, JointId::LeftKnee, JointId::LeftAnkle),
            (0.15, -1.0, JointId::RightHip, JointId::RightKnee, JointId::RightAnkle),
        ] {
            joints.insert(knee_id, Vec3::new(side_x + inward * valgus, 0.5, 0.0));
            joints.insert(hip_id, Vec3::new(side_x, 0.5 - hip_drop, -thigh * phi_h.cos()));
            joints.insert(ankle_id, Vec3::new(side_x, 0.5 - shin * beta.cos(), shin * beta.sin()));
        }
        joints
    }

    fn analyze(joints: &JointPositions) -> crate::biomechanics::BiometricResult {
        BiomechanicsAnalyzer::new().analyze(ExerciseKind::Squat, joints, 1.0)
    }

    #[test]
    fn test_good_squat() {
        let result = analyze(&squat_pose(0.2, 0.38, 0.02, 95.0, 0.01));
        assert!(result.is_correct);
        assert_eq!(result.feedback, "Perfect squat form!");
        assert!((result.confidence - 0.85).abs() < 1e-6);
        assert!((result.metric_measurements["hip_depth_meters"] - 0.02).abs() < 1e-5);
        assert!((result.joint_angles["knee_angle_deg"] - 95.0).abs() < 0.5);
        assert!((result.deviation_metrics["left_knee_valgus_meters"] - 0.01).abs() < 1e-5);
        assert!((result.deviation_metrics["right_knee_valgus_meters"] - 0.01).abs() < 1e-5);
    }

    #[test]
    fn test_shallow_squat() {
        let result = analyze(&squat_pose(0.2, 0.38, -0.08, 95.0, 0.01));
        assert!(!result.is_correct);
        assert_eq!(result.feedback, "Go deeper! Lower your hips below knee level.");
        assert!((result.confidence - 0.75).abs() < 1e-6);
        assert!((result.metric_measurements["hip_depth_meters"] + 0.08).abs() < 1e-5);
    }

    #[test]
    fn test_straight_knees_fault() {
        let result = analyze(&squat_pose(0.2, 0.38, 0.02, 130.0, 0.0));
        assert!(!result.is_correct);
        assert_eq!(result.feedback, "Squat deeper! Aim for 90-degree knee bend.");
        assert!((result.confidence - 0.70).abs() < 1e-6);
    }

    #[test]
    fn test_knee_collapse_fault() {
        let result = analyze(&squat_pose(0.2, 0.38, 0.02, 95.0, 0.04));
        assert!(!result.is_correct);
        assert_eq!(result.feedback, "Keep knees aligned! Avoid inward collapse.");
        assert!((result.confidence - 0.72).abs() < 1e-6);
    }

    #[test]
    fn test_forward_lean_is_advisory() {
        let result = analyze(&squat_pose(0.45, 0.45, 0.02, 95.0, 0.0));
        assert!(result.is_correct);
        assert_eq!(result.feedback, "Good depth! Keep chest up and avoid excessive lean.");
        assert!((result.confidence - 0.80).abs() < 1e-6);
        assert!(result.metric_measurements["hip_ankle_horizontal_distance"] > 0.3);
    }

    #[test]
    fn test_missing_hips_neutral() {
        let mut joints = squat_pose(0.2, 0.38, 0.02, 95.0, 0.01);
        joints.remove(&JointId::LeftHip);
        joints.remove(&JointId::RightHip);
        let result = analyze(&joints);
        assert!(result.is_correct);
        assert_eq!(result.feedback, "");
        assert_eq!(result.confidence, 0.3);
    }
}
