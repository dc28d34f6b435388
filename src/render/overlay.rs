use anyhow::Result;
use opencv::{
    core::{Mat, Point, Scalar, Vector},
    imgcodecs, imgproc,
    prelude::*,
};

use super::skeleton::{
    DIVIDER_COLOR, LANDMARK_COLOR, SKELETON_COLOR, SKELETON_CONNECTIONS, TEXT_COLOR,
};
use crate::pose::LandmarkFrame;
use crate::session::{PersonStatus, SessionStatus};

fn scalar((b, g, r): (f64, f64, f64)) -> Scalar {
    Scalar::new(b, g, r, 0.0)
}

/// ランドマークと骨格線を描画する。`x_offset` は二人モードの右半分用。
pub fn draw_landmarks(image: &mut Mat, frame: &LandmarkFrame, x_offset: i32) -> Result<()> {
    for &(a, b) in SKELETON_CONNECTIONS.iter() {
        if let (Some(p1), Some(p2)) = (frame.get(a), frame.get(b)) {
            imgproc::line(
                image,
                Point::new(p1.x as i32 + x_offset, p1.y as i32),
                Point::new(p2.x as i32 + x_offset, p2.y as i32),
                scalar(SKELETON_COLOR),
                2,
                imgproc::LINE_8,
                0,
            )?;
        }
    }
    for lm in frame.iter() {
        imgproc::circle(
            image,
            Point::new(lm.x as i32 + x_offset, lm.y as i32),
            4,
            scalar(LANDMARK_COLOR),
            -1,
            imgproc::LINE_8,
            0,
        )?;
    }
    Ok(())
}

fn put_text(image: &mut Mat, text: &str, x: i32, y: i32) -> Result<()> {
    imgproc::put_text(
        image,
        text,
        Point::new(x, y),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.8,
        scalar(TEXT_COLOR),
        2,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}

fn person_label(person: &PersonStatus) -> String {
    let s = person.snapshot;
    let mut label = format!("Jumps: {}  {}", s.count, s.stage);
    if !s.calibrated {
        label.push_str("  (uncalibrated)");
    }
    label
}

/// 検出結果・回数・FPS を重ねて描画する
pub fn draw_overlay(image: &mut Mat, status: &SessionStatus, landmarks: &[LandmarkFrame]) -> Result<()> {
    let width = image.cols();
    let height = image.rows();
    let people = status.people();

    if people.len() == 2 {
        let mid = width / 2;
        imgproc::line(
            image,
            Point::new(mid, 0),
            Point::new(mid, height),
            scalar(DIVIDER_COLOR),
            2,
            imgproc::LINE_8,
            0,
        )?;
        for (i, frame) in landmarks.iter().enumerate() {
            draw_landmarks(image, frame, if i == 0 { 0 } else { mid })?;
        }
        for (i, person) in people.iter().enumerate() {
            let x = if i == 0 { 10 } else { mid + 10 };
            put_text(image, &format!("P{}", i + 1), x, 30)?;
            put_text(image, &person_label(person), x, 60)?;
        }
    } else {
        for frame in landmarks {
            draw_landmarks(image, frame, 0)?;
        }
        if let Some(person) = people.first() {
            put_text(image, &person_label(person), 10, 30)?;
        }
    }

    put_text(image, &format!("FPS: {:.0}", status.metrics.fps), 10, height - 15)?;
    Ok(())
}

/// BGR フレームを JPEG に圧縮
pub fn encode_jpeg(frame: &Mat, quality: i32) -> Result<Vec<u8>> {
    let params = Vector::from_iter([imgcodecs::IMWRITE_JPEG_QUALITY, quality]);
    let mut buf: Vector<u8> = Vector::new();

    // imencode は BGR 8UC3 を想定
    let mat = if frame.channels() == 4 {
        let mut bgr = Mat::default();
        imgproc::cvt_color_def(frame, &mut bgr, imgproc::COLOR_BGRA2BGR)?;
        bgr
    } else {
        frame.clone()
    };

    imgcodecs::imencode(".jpg", &mat, &mut buf, &params)?;
    Ok(buf.to_vec())
}
