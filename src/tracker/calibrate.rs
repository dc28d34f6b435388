use thiserror::Error;

use crate::pose::{LandmarkFrame, LandmarkId, LandmarkSet};

/// キャリブレーションに必要な点（両腰・両足首）
pub const CALIBRATION_REQUIRED: LandmarkSet = LandmarkSet::of(&[
    LandmarkId::LeftHip,
    LandmarkId::RightHip,
    LandmarkId::LeftAnkle,
    LandmarkId::RightAnkle,
]);

pub const DEFAULT_LEG_FACTOR: f32 = 1.5;
pub const DEFAULT_CALIBRATION_MARGIN: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationSource {
    /// 開始直後に仮定する既定値
    Default,
    /// 被験者の姿勢から計測した値
    Measured,
}

/// 「脚が開いている」判定の閾値係数。丸ごと置き換えるのみ。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    leg_factor: f32,
    source: CalibrationSource,
}

impl Calibration {
    pub fn default_with(leg_factor: f32) -> Self {
        Self {
            leg_factor,
            source: CalibrationSource::Default,
        }
    }

    pub fn leg_factor(&self) -> f32 {
        self.leg_factor
    }

    pub fn source(&self) -> CalibrationSource {
        self.source
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::default_with(DEFAULT_LEG_FACTOR)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CalibrationError {
    #[error("calibration needs landmarks {missing}")]
    InsufficientLandmarks { missing: LandmarkSet },
    #[error("degenerate reference geometry (hip width {hip_width}, ankle width {ankle_width})")]
    DegenerateGeometry { hip_width: f32, ankle_width: f32 },
}

/// 脚を閉じた基準姿勢から被験者ごとの脚係数を求める
#[derive(Debug, Clone, Copy)]
pub struct Calibrator {
    margin: f32,
    default_leg_factor: f32,
}

impl Calibrator {
    pub fn new(margin: f32, default_leg_factor: f32) -> Self {
        Self {
            margin,
            default_leg_factor,
        }
    }

    pub fn default_calibration(&self) -> Calibration {
        Calibration::default_with(self.default_leg_factor)
    }

    /// leg_factor = (足首間距離 / 腰幅) * margin
    ///
    /// margin により立位の自然な足幅より閾値が上に来る。
    pub fn calibrate(&self, frame: &LandmarkFrame) -> Result<Calibration, CalibrationError> {
        let missing = frame.missing(CALIBRATION_REQUIRED);
        let (Some(hip_l), Some(hip_r), Some(ankle_l), Some(ankle_r)) = (
            frame.get(LandmarkId::LeftHip),
            frame.get(LandmarkId::RightHip),
            frame.get(LandmarkId::LeftAnkle),
            frame.get(LandmarkId::RightAnkle),
        ) else {
            return Err(CalibrationError::InsufficientLandmarks { missing });
        };

        let hip_width = hip_l.distance_to(hip_r);
        let ankle_width = ankle_l.distance_to(ankle_r);
        let degenerate = CalibrationError::DegenerateGeometry { hip_width, ankle_width };
        if hip_width == 0.0 {
            return Err(degenerate);
        }

        let leg_factor = ankle_width / hip_width * self.margin;
        if !leg_factor.is_finite() || leg_factor <= 0.0 {
            return Err(degenerate);
        }

        Ok(Calibration {
            leg_factor,
            source: CalibrationSource::Measured,
        })
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new(DEFAULT_CALIBRATION_MARGIN, DEFAULT_LEG_FACTOR)
    }
}
