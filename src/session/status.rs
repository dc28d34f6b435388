use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::tracker::TrackerSnapshot;

/// 毎フレーム再計算される指標
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub fps: f32,
    pub calibration_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersonStatus {
    pub snapshot: TrackerSnapshot,
    /// 判定できなかったフレームの連続数
    pub missing_streak: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingStatus {
    Single(PersonStatus),
    Dual { left: PersonStatus, right: PersonStatus },
}

/// ループが公開する最新状態。読み手は常に複製を受け取る。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub frame_index: u64,
    pub metrics: SessionMetrics,
    pub tracking: TrackingStatus,
}

impl SessionStatus {
    /// Web 側が期待する形の JSON
    ///
    /// 一人: `{jumps, stage, fps, calibrated}`
    /// 二人: `{person1: {count, stage, calibrated}, person2: {..}, fps}`
    pub fn to_web_json(&self) -> Value {
        let fps = self.metrics.fps as u32;
        match &self.tracking {
            TrackingStatus::Single(person) => json!({
                "jumps": person.snapshot.count,
                "stage": person.snapshot.stage,
                "fps": fps,
                "calibrated": person.snapshot.calibrated,
            }),
            TrackingStatus::Dual { left, right } => json!({
                "person1": {
                    "count": left.snapshot.count,
                    "stage": left.snapshot.stage,
                    "calibrated": left.snapshot.calibrated,
                },
                "person2": {
                    "count": right.snapshot.count,
                    "stage": right.snapshot.stage,
                    "calibrated": right.snapshot.calibrated,
                },
                "fps": fps,
            }),
        }
    }

    pub fn people(&self) -> Vec<PersonStatus> {
        match self.tracking {
            TrackingStatus::Single(p) => vec![p],
            TrackingStatus::Dual { left, right } => vec![left, right],
        }
    }
}
