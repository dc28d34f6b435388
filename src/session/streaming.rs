use std::marker::PhantomData;

use anyhow::{Context, Result};

use super::control::{status_channel, SessionControl, StatusBoard, StatusPublisher};
use super::fps::FpsMeter;
use super::status::{PersonStatus, SessionMetrics, SessionStatus, TrackingStatus};
use crate::config::{CounterConfig, SessionConfig};
use crate::log;
use crate::logging::Logger;
use crate::pose::{InputMismatch, LandmarkFrame, PoseDetector};
use crate::tracker::{DualTracker, Observation, Tracker};

/// セッションが扱う画像
pub trait FrameImage: Sized {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// 中央の縦線で左右に分割する。左は列 [0, w/2)、右は [w/2, w)。
    fn split_halves(&self) -> Result<(Self, Self)>;
}

enum Trackers<D> {
    Single {
        detector: D,
        tracker: Tracker,
    },
    Dual {
        left_detector: D,
        right_detector: D,
        tracker: DualTracker,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum Observations {
    Single(Observation),
    Dual(Observation, Observation),
}

/// 1フレーム処理した結果。画像は描画・エンコード用にそのまま返す。
#[derive(Debug)]
pub struct SessionTick<I> {
    pub image: I,
    pub status: SessionStatus,
    pub observations: Observations,
    /// 検出器の生出力。二人モードでは [左, 右] で x は各半分の座標。
    pub landmarks: Vec<LandmarkFrame>,
}

/// 映像ソース・検出器・トラッカーを束ねたフレームループ
pub struct StreamingSession<I, S, D> {
    source: S,
    trackers: Trackers<D>,
    control: SessionControl,
    publisher: StatusPublisher,
    fps: FpsMeter,
    frame_index: u64,
    streaks: [u32; 2],
    missing_warn_frames: u32,
    verbose: bool,
    logger: Logger,
    _image: PhantomData<fn() -> I>,
}

impl<I, S, D> StreamingSession<I, S, D>
where
    I: FrameImage,
    S: Iterator<Item = Result<I>>,
    D: PoseDetector<I>,
{
    fn with_trackers(source: S, trackers: Trackers<D>) -> Self {
        let (publisher, _) = status_channel();
        let defaults = SessionConfig::default();
        Self {
            source,
            trackers,
            control: SessionControl::new(),
            publisher,
            fps: FpsMeter::new(),
            frame_index: 0,
            streaks: [0; 2],
            missing_warn_frames: defaults.missing_warn_frames,
            verbose: defaults.verbose,
            logger: Logger::stderr(),
            _image: PhantomData,
        }
    }

    pub fn single(source: S, detector: D, counter: &CounterConfig) -> Self {
        Self::with_trackers(
            source,
            Trackers::Single {
                detector,
                tracker: Tracker::from_config(counter),
            },
        )
    }

    /// 左右の半分それぞれに別の検出器を使う
    pub fn dual(source: S, left_detector: D, right_detector: D, counter: &CounterConfig) -> Self {
        Self::with_trackers(
            source,
            Trackers::Dual {
                left_detector,
                right_detector,
                tracker: DualTracker::from_config(counter),
            },
        )
    }

    pub fn with_session_config(mut self, config: &SessionConfig) -> Self {
        self.missing_warn_frames = config.missing_warn_frames;
        self.verbose = config.verbose;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// 既存の制御フラグを共有する（ソース切り替え後も UI 側のハンドルを使い続けるため）
    pub fn with_control(mut self, control: SessionControl) -> Self {
        self.control = control;
        self
    }

    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    pub fn status_board(&self) -> StatusBoard {
        self.publisher.board()
    }

    pub fn is_dual(&self) -> bool {
        matches!(self.trackers, Trackers::Dual { .. })
    }

    /// 新しい映像ソースで数え直す（動画の再アップロードなど）
    pub fn restart(&mut self, source: S) {
        self.source = source;
        self.reset();
        log!(self.logger, "[session] restarted with new source");
    }

    fn reset(&mut self) {
        match &mut self.trackers {
            Trackers::Single { tracker, .. } => tracker.reset(),
            Trackers::Dual { tracker, .. } => tracker.reset(),
        }
        self.fps.reset();
        self.frame_index = 0;
        self.streaks = [0; 2];
    }

    /// ソースが尽きたら None
    pub fn step(&mut self) -> Result<Option<SessionTick<I>>> {
        let image = match self.source.next() {
            Some(frame) => frame.context("failed to read frame")?,
            None => return Ok(None),
        };

        if self.control.take_reset() {
            self.reset();
            log!(self.logger, "[session] reset");
        }
        let recalibrate = self.control.take_calibration();
        if recalibrate {
            log!(self.logger, "[calib] calibration requested at frame {}", self.frame_index);
        }

        let height = image.height() as f32;
        let (observations, landmarks) = match &mut self.trackers {
            Trackers::Single { detector, tracker } => {
                let frame = detect_or_empty(detector, &image, &self.logger)?;
                let obs = tracker.observe_detailed(&frame, height, recalibrate);
                (Observations::Single(obs), vec![frame])
            }
            Trackers::Dual {
                left_detector,
                right_detector,
                tracker,
            } => {
                let (left, right) = image.split_halves().context("failed to split frame")?;
                let left = detect_or_empty(left_detector, &left, &self.logger)?;
                let right = detect_or_empty(right_detector, &right, &self.logger)?;
                let (l, r) = tracker.observe_split_detailed(&left, &right, height, recalibrate);
                (Observations::Dual(l, r), vec![left, right])
            }
        };

        let tracking = match observations {
            Observations::Single(obs) => TrackingStatus::Single(self.record(0, "person", &obs)),
            Observations::Dual(l, r) => TrackingStatus::Dual {
                left: self.record(0, "person1", &l),
                right: self.record(1, "person2", &r),
            },
        };

        let fps = self.fps.tick();
        let status = SessionStatus {
            frame_index: self.frame_index,
            metrics: SessionMetrics {
                fps,
                calibration_requested: recalibrate,
            },
            tracking,
        };
        self.publisher.publish(status.clone());
        self.frame_index += 1;

        Ok(Some(SessionTick {
            image,
            status,
            observations,
            landmarks,
        }))
    }

    /// 判定不能の連続数を更新し、必要ならログを出す
    fn record(&mut self, slot: usize, label: &str, obs: &Observation) -> PersonStatus {
        match &obs.calibration {
            Some(Ok(calib)) => log!(self.logger, "[calib] {} leg_factor={:.3}", label, calib.leg_factor()),
            Some(Err(e)) => log!(self.logger, "[calib] {} failed: {}, keeping previous", label, e),
            None => {}
        }

        match &obs.classification {
            Ok(_) => self.streaks[slot] = 0,
            Err(e) => {
                self.streaks[slot] = self.streaks[slot].saturating_add(1);
                if self.streaks[slot] == self.missing_warn_frames {
                    log!(self.logger, "[session] {} not fully visible for {} frames: {}", label, self.streaks[slot], e);
                }
            }
        }

        if self.verbose {
            log!(
                self.logger,
                "[verbose] frame={} {} stage={} count={} fallback={:?}",
                self.frame_index,
                label,
                obs.snapshot.stage,
                obs.snapshot.count,
                obs.fallback
            );
        }
        if obs.completed_rep {
            log!(self.logger, "[count] {} {}", label, obs.snapshot.count);
        }

        PersonStatus {
            snapshot: obs.snapshot,
            missing_streak: self.streaks[slot],
        }
    }
}

/// 検出器の一時的な失敗は「人物なし」として扱う。入力形式の不一致はそのまま返す。
fn detect_or_empty<I, D: PoseDetector<I>>(detector: &mut D, image: &I, logger: &Logger) -> Result<LandmarkFrame> {
    match detector.detect(image) {
        Ok(frame) => Ok(frame),
        Err(e) if e.downcast_ref::<InputMismatch>().is_some() => Err(e),
        Err(e) => {
            log!(logger, "[detect] {e:#}");
            Ok(LandmarkFrame::new())
        }
    }
}

impl<I, S, D> Iterator for StreamingSession<I, S, D>
where
    I: FrameImage,
    S: Iterator<Item = Result<I>>,
    D: PoseDetector<I>,
{
    type Item = Result<SessionTick<I>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step().transpose()
    }
}
