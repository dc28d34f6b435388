use thiserror::Error;

use super::calibrate::Calibration;
use crate::pose::{LandmarkFrame, LandmarkId, LandmarkSet};

/// 判定に必要な点（両肩・両手首・両腰・両足首）
pub const CLASSIFY_REQUIRED: LandmarkSet = LandmarkSet::of(&[
    LandmarkId::LeftShoulder,
    LandmarkId::RightShoulder,
    LandmarkId::LeftWrist,
    LandmarkId::RightWrist,
    LandmarkId::LeftHip,
    LandmarkId::RightHip,
    LandmarkId::LeftAnkle,
    LandmarkId::RightAnkle,
]);

/// 腕上げ判定マージン（画像高さに対する比率）
pub const DEFAULT_ARM_RAISE_MARGIN: f32 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ClassifyError {
    #[error("classification needs landmarks {missing}")]
    InsufficientLandmarks { missing: LandmarkSet },
}

/// 1フレームの判定結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Predicates {
    pub arms_raised: bool,
    pub legs_apart: bool,
    pub ankle_width: f32,
    pub hip_width: f32,
}

/// 腕・脚の姿勢判定。純粋関数。
#[derive(Debug, Clone, Copy)]
pub struct MovementClassifier {
    arm_raise_margin: f32,
}

impl MovementClassifier {
    pub fn new(arm_raise_margin: f32) -> Self {
        Self { arm_raise_margin }
    }

    /// y は画像座標（小さいほど上）。
    ///
    /// 腕: 両手首が肩より frame_height * margin 以上高い。腕の自然な揺れでは
    /// 反応しない。
    /// 脚: 足首間距離 > 腰幅 * leg_factor
    pub fn classify(
        &self,
        frame: &LandmarkFrame,
        calib: &Calibration,
        frame_height: f32,
    ) -> Result<Predicates, ClassifyError> {
        let get = |id| {
            frame.get(id).ok_or_else(|| ClassifyError::InsufficientLandmarks {
                missing: frame.missing(CLASSIFY_REQUIRED),
            })
        };
        let shoulder_l = get(LandmarkId::LeftShoulder)?;
        let shoulder_r = get(LandmarkId::RightShoulder)?;
        let wrist_l = get(LandmarkId::LeftWrist)?;
        let wrist_r = get(LandmarkId::RightWrist)?;
        let hip_l = get(LandmarkId::LeftHip)?;
        let hip_r = get(LandmarkId::RightHip)?;
        let ankle_l = get(LandmarkId::LeftAnkle)?;
        let ankle_r = get(LandmarkId::RightAnkle)?;

        let margin = frame_height * self.arm_raise_margin;
        let arms_raised = wrist_l.y < shoulder_l.y - margin && wrist_r.y < shoulder_r.y - margin;

        let hip_width = hip_l.distance_to(hip_r);
        let ankle_width = ankle_l.distance_to(ankle_r);
        let legs_apart = ankle_width > hip_width * calib.leg_factor();

        Ok(Predicates {
            arms_raised,
            legs_apart,
            ankle_width,
            hip_width,
        })
    }
}

impl Default for MovementClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_ARM_RAISE_MARGIN)
    }
}
