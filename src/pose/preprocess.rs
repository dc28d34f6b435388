use anyhow::{Context, Result};
use ndarray::Array4;
use opencv::{
    core::{AlgorithmHint, Mat, Size, Vec3f, CV_32FC3},
    imgproc,
    prelude::*,
};

/// BlazePose ランドマークモデルの既定入力サイズ
pub const BLAZEPOSE_INPUT_SIZE: i32 = 256;

/// BGR の Mat を [1, S, S, 3] の RGB f32 テンソル (0.0-1.0) にする。
/// 切り出しはせず、縦横比も保持しない。
pub fn preprocess_for_blazepose(frame: &Mat, input_size: i32) -> Result<Array4<f32>> {
    let mut resized = Mat::default();
    imgproc::resize(
        frame,
        &mut resized,
        Size::new(input_size, input_size),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    let mut rgb = Mat::default();
    imgproc::cvt_color(&resized, &mut rgb, imgproc::COLOR_BGR2RGB, 0, AlgorithmHint::ALGO_HINT_DEFAULT)?;

    let mut normalized = Mat::default();
    rgb.convert_to(&mut normalized, CV_32FC3, 1.0 / 255.0, 0.0)?;

    // convert_to の出力は連続領域
    let pixels = normalized.data_typed::<Vec3f>()?;
    let values: Vec<f32> = pixels.iter().flat_map(|p| [p[0], p[1], p[2]]).collect();
    let side = input_size as usize;
    Array4::from_shape_vec((1, side, side, 3), values).context("unexpected preprocessed frame size")
}
