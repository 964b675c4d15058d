use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Vec3;

/// 解析に使う 15 関節の識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum JointId {
    Root = 0,
    Neck = 1,
    Nose = 2,
    LeftShoulder = 3,
    LeftElbow = 4,
    LeftWrist = 5,
    RightShoulder = 6,
    RightElbow = 7,
    RightWrist = 8,
    LeftHip = 9,
    LeftKnee = 10,
    LeftAnkle = 11,
    RightHip = 12,
    RightKnee = 13,
    RightAnkle = 14,
}

impl JointId {
    pub const COUNT: usize = 15;

    pub const ALL: [JointId; JointId::COUNT] = [
        JointId::Root,
        JointId::Neck,
        JointId::Nose,
        JointId::LeftShoulder,
        JointId::LeftElbow,
        JointId::LeftWrist,
        JointId::RightShoulder,
        JointId::RightElbow,
        JointId::RightWrist,
        JointId::LeftHip,
        JointId::LeftKnee,
        JointId::LeftAnkle,
        JointId::RightHip,
        JointId::RightKnee,
        JointId::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// ログ・メトリクスキー用の名前
    pub fn name(&self) -> &'static str {
        match self {
            JointId::Root => "root",
            JointId::Neck => "neck",
            JointId::Nose => "nose",
            JointId::LeftShoulder => "left_shoulder",
            JointId::LeftElbow => "left_elbow",
            JointId::LeftWrist => "left_wrist",
            JointId::RightShoulder => "right_shoulder",
            JointId::RightElbow => "right_elbow",
            JointId::RightWrist => "right_wrist",
            JointId::LeftHip => "left_hip",
            JointId::LeftKnee => "left_knee",
            JointId::LeftAnkle => "left_ankle",
            JointId::RightHip => "right_hip",
            JointId::RightKnee => "right_knee",
            JointId::RightAnkle => "right_ankle",
        }
    }
}

/// 検出器から届いた単一関節の生データ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawJointSample {
    /// 正規化されたX座標 (0.0〜1.0、左端が0)
    pub x: f32,
    /// 正規化されたY座標 (0.0〜1.0、上端が0)
    pub y: f32,
    /// 3D検出器がメートル単位のカメラ座標を返した場合のみSome
    pub position: Option<Vec3>,
    /// 信頼度スコア (0.0〜1.0)
    pub confidence: f32,
}

impl RawJointSample {
    /// 2D検出結果
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            position: None,
            confidence,
        }
    }

    /// 3D検出結果（カメラ座標系、メートル）
    pub fn metric(x: f32, y: f32, position: Vec3, confidence: f32) -> Self {
        Self {
            x,
            y,
            position: Some(position),
            confidence,
        }
    }

    /// 信頼度が閾値以上か
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }

    /// ピクセル座標に変換（範囲外チェックは呼び出し側）
    pub fn to_pixel(&self, width: usize, height: usize) -> (i64, i64) {
        let px = (self.x * width as f32).floor() as i64;
        let py = (self.y * height as f32).floor() as i64;
        (px, py)
    }
}

impl Default for RawJointSample {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// 1フレーム分の検出器出力
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseEstimate {
    joints: BTreeMap<JointId, RawJointSample>,
}

impl PoseEstimate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: JointId, sample: RawJointSample) -> Self {
        self.joints.insert(id, sample);
        self
    }

    pub fn insert(&mut self, id: JointId, sample: RawJointSample) {
        self.joints.insert(id, sample);
    }

    pub fn get(&self, id: JointId) -> Option<&RawJointSample> {
        self.joints.get(&id)
    }

    pub fn remove(&mut self, id: JointId) -> Option<RawJointSample> {
        self.joints.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointId, &RawJointSample)> {
        self.joints.iter().map(|(id, s)| (*id, s))
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// 検出された関節の平均信頼度（空なら0）
    pub fn average_confidence(&self) -> f32 {
        if self.joints.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.joints.values().map(|s| s.confidence).sum();
        sum / self.joints.len() as f32
    }
}

impl FromIterator<(JointId, RawJointSample)> for PoseEstimate {
    fn from_iter<I: IntoIterator<Item = (JointId, RawJointSample)>>(iter: I) -> Self {
        Self {
            joints: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_id_count() {
        assert_eq!(JointId::COUNT, 15);
        assert_eq!(JointId::ALL.len(), JointId::COUNT);
    }

    #[test]
    fn test_joint_id_from_index() {
        assert_eq!(JointId::from_index(0), Some(JointId::Root));
        assert_eq!(JointId::from_index(14), Some(JointId::RightAnkle));
        assert_eq!(JointId::from_index(15), None);
        for (i, id) in JointId::ALL.iter().enumerate() {
            assert_eq!(*id as usize, i);
        }
    }

    #[test]
    fn test_raw_sample_is_valid_inclusive() {
        let kp = RawJointSample::new(0.5, 0.5, 0.3);
        assert!(kp.is_valid(0.3));
        assert!(!RawJointSample::new(0.5, 0.5, 0.29).is_valid(0.3));
    }

    #[test]
    fn test_raw_sample_to_pixel() {
        let kp = RawJointSample::new(0.5, 0.25, 1.0);
        assert_eq!(kp.to_pixel(640, 480), (320, 120));
        let outside = RawJointSample::new(-0.25, 1.5, 1.0);
        assert_eq!(outside.to_pixel(100, 100), (-25, 150));
    }

    #[test]
    fn test_pose_estimate_average_confidence() {
        let estimate: PoseEstimate = [
            (JointId::LeftHip, RawJointSample::new(0.4, 0.5, 0.4)),
            (JointId::RightHip, RawJointSample::new(0.6, 0.5, 0.8)),
        ]
        .into_iter()
        .collect();
        assert_eq!(estimate.len(), 2);
        assert!((estimate.average_confidence() - 0.6).abs() < 1e-6);
        assert_eq!(PoseEstimate::new().average_confidence(), 0.0);
    }
}
