use super::single::{Observation, Tracker, TrackerSnapshot};
use crate::config::CounterConfig;
use crate::pose::LandmarkFrame;

/// 画面を左右に分けた二人分のトラッカー。互いに状態を共有しない。
pub struct DualTracker {
    left: Tracker,
    right: Tracker,
}

impl DualTracker {
    pub fn new(left: Tracker, right: Tracker) -> Self {
        Self { left, right }
    }

    pub fn from_config(config: &CounterConfig) -> Self {
        Self::new(Tracker::from_config(config), Tracker::from_config(config))
    }

    /// 左右それぞれの検出結果を対応するトラッカーへ渡す。
    /// x 座標は各半分の画像内の座標。
    pub fn observe_split(
        &mut self,
        left: &LandmarkFrame,
        right: &LandmarkFrame,
        image_height: f32,
        recalibrate: bool,
    ) -> (TrackerSnapshot, TrackerSnapshot) {
        (
            self.left.observe(left, image_height, recalibrate),
            self.right.observe(right, image_height, recalibrate),
        )
    }

    pub fn observe_split_detailed(
        &mut self,
        left: &LandmarkFrame,
        right: &LandmarkFrame,
        image_height: f32,
        recalibrate: bool,
    ) -> (Observation, Observation) {
        (
            self.left.observe_detailed(left, image_height, recalibrate),
            self.right.observe_detailed(right, image_height, recalibrate),
        )
    }

    pub fn snapshots(&self) -> (TrackerSnapshot, TrackerSnapshot) {
        (self.left.snapshot(), self.right.snapshot())
    }

    pub fn left(&self) -> &Tracker {
        &self.left
    }

    pub fn right(&self) -> &Tracker {
        &self.right
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

impl Default for DualTracker {
    fn default() -> Self {
        Self::new(Tracker::default(), Tracker::default())
    }
}
