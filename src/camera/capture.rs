use anyhow::{Context, Result};
use opencv::{
    core::{Mat, Rect},
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs},
};

use crate::config::SourceSpec;
use crate::session::FrameImage;

/// OpenCVを使用したカメラ・動画ファイルのフレームソース
///
/// 読み込みに失敗するか空フレームが来たら終端とみなす。
pub struct OpenCvSource {
    capture: VideoCapture,
    width: u32,
    height: u32,
    finished: bool,
}

impl OpenCvSource {
    pub fn open(spec: &SourceSpec) -> Result<Self> {
        let capture = match spec {
            SourceSpec::Camera(index) => {
                let mut capture = VideoCapture::new(*index, VideoCaptureAPIs::CAP_ANY as i32)
                    .with_context(|| format!("failed to open camera {}", index))?;
                capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;
                capture
            }
            SourceSpec::File(path) => {
                let path_str = path.to_str().context("video path is not valid UTF-8")?;
                VideoCapture::from_file(path_str, VideoCaptureAPIs::CAP_ANY as i32)
                    .with_context(|| format!("failed to open video {}", path.display()))?
            }
        };

        if !capture.is_opened()? {
            anyhow::bail!("{} is not available", spec);
        }

        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;

        Ok(Self {
            capture,
            width,
            height,
            finished: false,
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// フレームを読み込む（BGR形式）。終端なら None。
    fn read_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        let ok = self.capture.read(&mut frame).context("Failed to read frame")?;
        if !ok || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}

impl Iterator for OpenCvSource {
    type Item = Result<Mat>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl FrameImage for Mat {
    fn width(&self) -> u32 {
        self.cols() as u32
    }

    fn height(&self) -> u32 {
        self.rows() as u32
    }

    fn split_halves(&self) -> Result<(Self, Self)> {
        let w = self.cols();
        let h = self.rows();
        let mid = w / 2;
        // 検出器に連続メモリを渡すため ROI を複製する
        let left = Mat::roi(self, Rect::new(0, 0, mid, h))?.try_clone()?;
        let right = Mat::roi(self, Rect::new(mid, 0, w - mid, h))?.try_clone()?;
        Ok((left, right))
    }
}
