use serde::{Deserialize, Serialize};

use super::calibrate::{Calibration, CalibrationError, Calibrator};
use super::classify::{ClassifyError, MovementClassifier, Predicates, CLASSIFY_REQUIRED};
use super::counter::{RepCounter, Stage};
use super::fallback::{self, FallbackSource};
use crate::config::CounterConfig;
use crate::pose::LandmarkFrame;

/// 外部に公開する読み取り専用の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub count: u32,
    pub stage: Stage,
    pub calibrated: bool,
}

/// 1フレーム分の処理結果
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub snapshot: TrackerSnapshot,
    /// キャリブレーション要求があったときの結果
    pub calibration: Option<Result<Calibration, CalibrationError>>,
    pub fallback: FallbackSource,
    pub classification: Result<Predicates, ClassifyError>,
    /// このフレームで 1 回分が完了した
    pub completed_rep: bool,
}

impl Observation {
    pub fn is_skipped(&self) -> bool {
        self.classification.is_err()
    }
}

/// 一人分のカウントパイプライン
///
/// キャリブレーション → ランドマーク補完 → 姿勢判定 → 状態機械
pub struct Tracker {
    calibrator: Calibrator,
    classifier: MovementClassifier,
    calibration: Option<Calibration>,
    counter: RepCounter,
    last_valid: Option<LandmarkFrame>,
}

impl Tracker {
    pub fn new(calibrator: Calibrator, classifier: MovementClassifier) -> Self {
        Self {
            calibrator,
            classifier,
            calibration: None,
            counter: RepCounter::new(),
            last_valid: None,
        }
    }

    pub fn from_config(config: &CounterConfig) -> Self {
        Self::new(
            Calibrator::new(config.calibration_margin, config.default_leg_factor),
            MovementClassifier::new(config.arm_raise_margin),
        )
    }

    pub fn observe(&mut self, frame: &LandmarkFrame, image_height: f32, recalibrate: bool) -> TrackerSnapshot {
        self.observe_detailed(frame, image_height, recalibrate).snapshot
    }

    pub fn observe_detailed(
        &mut self,
        frame: &LandmarkFrame,
        image_height: f32,
        recalibrate: bool,
    ) -> Observation {
        // 初回は既定値で即座に判定可能にする
        if self.calibration.is_none() {
            self.calibration = Some(self.calibrator.default_calibration());
        }

        // 失敗しても前の値を保持
        let calibration = recalibrate.then(|| self.calibrator.calibrate(frame));
        if let Some(Ok(measured)) = calibration {
            self.calibration = Some(measured);
        }
        let active = self.calibration.unwrap_or_else(|| self.calibrator.default_calibration());

        let resolved = fallback::resolve(frame, self.last_valid.as_ref(), CLASSIFY_REQUIRED);
        let source = resolved.source;
        let classification = self.classifier.classify(resolved.frame, &active, image_height);
        if source == FallbackSource::Fresh {
            self.last_valid = Some(frame.clone());
        }

        let completed_rep = match &classification {
            Ok(predicates) => self.counter.apply(predicates),
            Err(_) => false,
        };

        Observation {
            snapshot: self.snapshot(),
            calibration,
            fallback: source,
            classification,
            completed_rep,
        }
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            count: self.counter.count(),
            stage: self.counter.stage(),
            calibrated: self.calibration.is_some(),
        }
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    /// 状態を {Down, 0, None} に戻し、未キャリブレーションにする
    pub fn reset(&mut self) {
        self.counter.reset();
        self.last_valid = None;
        self.calibration = None;
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(Calibrator::default(), MovementClassifier::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Landmark, LandmarkId};
    use crate::tracker::calibrate::CalibrationSource;
    use crate::tracker::classify::tests::pose;

    const HEIGHT: f32 = 600.0;

    fn open() -> LandmarkFrame {
        pose(50.0, 210.0)
    }

    fn closed() -> LandmarkFrame {
        pose(250.0, 90.0)
    }

    /// 腕は下ろしたが脚は開いたまま
    fn half_closed() -> LandmarkFrame {
        pose(250.0, 210.0)
    }

    fn without(frame: &LandmarkFrame, ids: &[LandmarkId]) -> LandmarkFrame {
        let kept = frame.iter().copied().filter(|lm| !ids.contains(&lm.id));
        LandmarkFrame::from_landmarks(kept).unwrap()
    }

    #[test]
    fn test_default_calibration_applied_on_first_frame() {
        let mut tracker = Tracker::default();
        assert!(!tracker.snapshot().calibrated);
        let snap = tracker.observe(&LandmarkFrame::new(), HEIGHT, false);
        assert!(snap.calibrated);
        let calib = tracker.calibration().unwrap();
        assert_eq!(calib.leg_factor(), 1.5);
        assert_eq!(calib.source(), CalibrationSource::Default);
    }

    #[test]
    fn test_concrete_scenario() {
        let mut tracker = Tracker::default();
        let snap = tracker.observe(&open(), HEIGHT, false);
        assert_eq!(snap.stage, Stage::Up);
        assert_eq!(snap.count, 0);

        let snap = tracker.observe(&closed(), HEIGHT, false);
        assert_eq!(snap.stage, Stage::Down);
        assert_eq!(snap.count, 1);
    }

    #[test]
    fn test_single_count_per_cycle() {
        let mut tracker = Tracker::default();
        for _ in 0..3 {
            tracker.observe(&closed(), HEIGHT, false);
        }
        for _ in 0..7 {
            tracker.observe(&open(), HEIGHT, false);
        }
        for _ in 0..5 {
            tracker.observe(&closed(), HEIGHT, false);
        }
        assert_eq!(tracker.snapshot().count, 1);
    }

    #[test]
    fn test_no_double_count_on_jitter() {
        let mut tracker = Tracker::default();
        tracker.observe(&closed(), HEIGHT, false);
        tracker.observe(&open(), HEIGHT, false);
        tracker.observe(&half_closed(), HEIGHT, false);
        tracker.observe(&open(), HEIGHT, false);
        let snap = tracker.observe(&closed(), HEIGHT, false);
        assert_eq!(snap.count, 1);
    }

    #[test]
    fn test_count_is_monotonic() {
        let mut tracker = Tracker::default();
        let frames = [closed(), open(), half_closed(), LandmarkFrame::new(), closed(), open(), closed()];
        let mut prev = 0;
        for i in 0..40 {
            let snap = tracker.observe(&frames[(i * 5) % frames.len()], HEIGHT, i % 11 == 0);
            assert!(snap.count >= prev);
            prev = snap.count;
        }
    }

    #[test]
    fn test_fallback_reuses_last_complete_frame() {
        let mut with_gap = Tracker::default();
        with_gap.observe(&open(), HEIGHT, false);
        // 脚が閉じた位置から足首が消えた不完全フレーム
        let partial = without(&closed(), &[LandmarkId::LeftAnkle, LandmarkId::RightAnkle]);
        let obs = with_gap.observe_detailed(&partial, HEIGHT, false);
        assert_eq!(obs.fallback, FallbackSource::Stale);

        let mut resubmitted = Tracker::default();
        resubmitted.observe(&open(), HEIGHT, false);
        let expected = resubmitted.observe_detailed(&open(), HEIGHT, false);

        assert_eq!(obs.classification, expected.classification);
        assert_eq!(obs.snapshot, expected.snapshot);
    }

    #[test]
    fn test_incomplete_without_history_is_skipped() {
        let mut tracker = Tracker::default();
        let partial = without(&open(), &[LandmarkId::LeftWrist]);
        let obs = tracker.observe_detailed(&partial, HEIGHT, false);
        assert_eq!(obs.fallback, FallbackSource::Incomplete);
        assert!(obs.is_skipped());
        assert!(matches!(obs.classification, Err(ClassifyError::InsufficientLandmarks { missing })
            if missing.contains(LandmarkId::LeftWrist)));
        assert_eq!(obs.snapshot.stage, Stage::Down);
        assert_eq!(obs.snapshot.count, 0);
    }

    #[test]
    fn test_empty_frame_uses_history() {
        let mut tracker = Tracker::default();
        tracker.observe(&open(), HEIGHT, false);
        let obs = tracker.observe_detailed(&LandmarkFrame::new(), HEIGHT, false);
        // 空フレームは直近の open で補完されるので Up のまま
        assert_eq!(obs.fallback, FallbackSource::Stale);
        assert_eq!(obs.snapshot.stage, Stage::Up);
    }

    #[test]
    fn test_recalibration_replaces_leg_factor() {
        let mut tracker = Tracker::default();
        // 腰幅 100、足首幅 60 → 0.6 * 1.5 = 0.9
        let obs = tracker.observe_detailed(&pose(250.0, 60.0), HEIGHT, true);
        assert!(matches!(obs.calibration, Some(Ok(_))));
        let calib = tracker.calibration().unwrap();
        assert!((calib.leg_factor() - 0.9).abs() < 1e-5);
        assert_eq!(calib.source(), CalibrationSource::Measured);

        // 足首幅 100 > 90 で開脚と判定されるようになる
        let obs = tracker.observe_detailed(&pose(250.0, 100.0), HEIGHT, false);
        assert!(obs.classification.unwrap().legs_apart);
    }

    #[test]
    fn test_degenerate_recalibration_keeps_prior_value() {
        let mut tracker = Tracker::default();
        tracker.observe(&pose(250.0, 60.0), HEIGHT, true);
        let before = tracker.calibration().unwrap().leg_factor();

        let mut degenerate = closed();
        degenerate.insert(Landmark::new(LandmarkId::LeftHip, 150.0, 400.0));
        degenerate.insert(Landmark::new(LandmarkId::RightHip, 150.0, 400.0));
        let obs = tracker.observe_detailed(&degenerate, HEIGHT, true);

        assert!(matches!(obs.calibration, Some(Err(CalibrationError::DegenerateGeometry { .. }))));
        assert_eq!(tracker.calibration().unwrap().leg_factor(), before);
        assert!(obs.snapshot.calibrated);
    }

    #[test]
    fn test_recalibration_request_is_not_reapplied() {
        let mut tracker = Tracker::default();
        tracker.observe(&pose(250.0, 60.0), HEIGHT, true);
        let obs = tracker.observe_detailed(&pose(250.0, 20.0), HEIGHT, false);
        assert!(obs.calibration.is_none());
        assert!((tracker.calibration().unwrap().leg_factor() - 0.9).abs() < 1e-5);
    }

    #[test]
    fn test_reset_mid_repetition() {
        let mut tracker = Tracker::default();
        tracker.observe(&open(), HEIGHT, false);
        tracker.observe(&closed(), HEIGHT, false);
        tracker.observe(&open(), HEIGHT, true);
        tracker.reset();

        let snap = tracker.snapshot();
        assert_eq!(snap.count, 0);
        assert_eq!(snap.stage, Stage::Down);
        assert!(!snap.calibrated);
        assert!(tracker.calibration().is_none());

        // 補完履歴も消えている
        let obs = tracker.observe_detailed(&LandmarkFrame::new(), HEIGHT, false);
        assert_eq!(obs.fallback, FallbackSource::Incomplete);
    }

    #[test]
    fn test_from_config() {
        let config = CounterConfig {
            arm_raise_margin: 0.0,
            calibration_margin: 1.5,
            default_leg_factor: 3.0,
        };
        let mut tracker = Tracker::from_config(&config);
        // 足首幅 210 < 100 * 3.0 なので開脚ではない
        let snap = tracker.observe(&open(), HEIGHT, false);
        assert_eq!(snap.stage, Stage::Down);
        assert_eq!(tracker.calibration().unwrap().leg_factor(), 3.0);
    }
}
