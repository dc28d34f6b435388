use anyhow::Result;
use thiserror::Error;

use super::landmark::LandmarkFrame;

/// 入力の形式が検出器に合わない。一時的な失敗と違い、次のフレームでも回復しない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("input mismatch: {0}")]
pub struct InputMismatch(pub String);

/// 画像 1 枚から人物 1 人分のランドマークを返す検出器
///
/// 実装はフレームごとに独立であること。二人モードでは左右それぞれに
/// 別インスタンスを用意する。
pub trait PoseDetector<I> {
    fn detect(&mut self, image: &I) -> Result<LandmarkFrame>;
}

impl<I, D: PoseDetector<I> + ?Sized> PoseDetector<I> for Box<D> {
    fn detect(&mut self, image: &I) -> Result<LandmarkFrame> {
        (**self).detect(image)
    }
}

#[cfg(feature = "desktop")]
pub use onnx::OnnxPoseDetector;

#[cfg(feature = "desktop")]
mod onnx {
    use anyhow::{Context, Result};
    use opencv::core::Mat;
    use opencv::prelude::*;
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::Tensor;

    use super::PoseDetector;
    use crate::config::DetectorConfig;
    use crate::pose::landmark::{Landmark, LandmarkFrame, LandmarkId};
    use crate::pose::preprocess::preprocess_for_blazepose;

    /// 出力 1 ランドマークあたりの値数 (x, y, z, visibility, presence)
    const VALUES_PER_LANDMARK: usize = 5;

    fn sigmoid(x: f32) -> f32 {
        1.0 / (1.0 + (-x).exp())
    }

    /// BlazePose ランドマークモデルを使用した姿勢検出器
    pub struct OnnxPoseDetector {
        session: Session,
        input_name: String,
        output_name: String,
        input_size: i32,
        visibility_threshold: f32,
    }

    impl OnnxPoseDetector {
        /// ONNXモデルを読み込んで初期化
        pub fn from_config(config: &DetectorConfig) -> Result<Self> {
            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .commit_from_file(&config.model_path)
                .with_context(|| format!("Failed to load ONNX model {}", config.model_path))?;

            Ok(Self {
                session,
                input_name: config.input_name.clone(),
                output_name: config.output_name.clone(),
                input_size: config.input_size,
                visibility_threshold: config.visibility_threshold,
            })
        }
    }

    impl PoseDetector<Mat> for OnnxPoseDetector {
        /// 出力: [1, 195] (39 点 × 5)。先頭 33 点が体のランドマーク。
        /// 座標は入力解像度のピクセル値なので画像サイズへ戻す。
        fn detect(&mut self, image: &Mat) -> Result<LandmarkFrame> {
            let width = image.cols() as f32;
            let height = image.rows() as f32;
            let input = preprocess_for_blazepose(image, self.input_size)?;

            let input_tensor = Tensor::from_array(input)?;
            let outputs = self
                .session
                .run(ort::inputs![self.input_name.as_str() => input_tensor])
                .context("Inference failed")?;

            let output: ndarray::ArrayViewD<f32> = outputs[self.output_name.as_str()]
                .try_extract_array()
                .context("Failed to extract output tensor")?;
            let values: Vec<f32> = output.iter().copied().collect();
            if values.len() < LandmarkId::COUNT * VALUES_PER_LANDMARK {
                anyhow::bail!("unexpected landmark output length {}", values.len());
            }

            let scale = self.input_size as f32;
            let mut frame = LandmarkFrame::new();
            for id in LandmarkId::ALL {
                let base = id.index() * VALUES_PER_LANDMARK;
                let visibility = sigmoid(values[base + 3]);
                if visibility < self.visibility_threshold {
                    continue;
                }
                // 整数ピクセルへ切り捨て
                let x = (values[base] / scale * width).trunc();
                let y = (values[base + 1] / scale * height).trunc();
                frame.insert(Landmark::new(id, x, y));
            }
            Ok(frame)
        }
    }
}
