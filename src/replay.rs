//! 記録済みの検出結果をセッションループで再生する
//!
//! 1 行が 1 フレーム:
//!
//! ```text
//! {"width": 640, "height": 480, "landmarks": [[11, 250, 200], [12, 390, 200], ...]}
//! {"width": 1280, "height": 480, "left": [[11, 250, 200], ...], "right": [...]}
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::pose::{InputMismatch, Landmark, LandmarkFrame, PoseDetector};
use crate::session::FrameImage;

type RawLandmarks = Vec<(u32, f32, f32)>;

#[derive(Debug, Deserialize)]
struct RecordedFrame {
    width: u32,
    height: u32,
    #[serde(default)]
    landmarks: Option<RawLandmarks>,
    #[serde(default)]
    left: Option<RawLandmarks>,
    #[serde(default)]
    right: Option<RawLandmarks>,
}

#[derive(Debug, Clone, PartialEq)]
enum Content {
    Single(LandmarkFrame),
    Dual(LandmarkFrame, LandmarkFrame),
}

/// カメラ画像の代わり。画像サイズと検出器が見た点だけを持つ。
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayImage {
    width: u32,
    height: u32,
    content: Content,
}

impl ReplayImage {
    pub fn single(width: u32, height: u32, frame: LandmarkFrame) -> Self {
        Self {
            width,
            height,
            content: Content::Single(frame),
        }
    }

    /// 左右の半分ごとに記録済み。x は各半分の座標。
    pub fn dual(width: u32, height: u32, left: LandmarkFrame, right: LandmarkFrame) -> Self {
        Self {
            width,
            height,
            content: Content::Dual(left, right),
        }
    }

    pub fn is_dual(&self) -> bool {
        matches!(self.content, Content::Dual(..))
    }

    fn parse(line: &str) -> Result<Self> {
        let rec: RecordedFrame = serde_json::from_str(line)?;
        let frame = |raw: Option<RawLandmarks>| -> Result<LandmarkFrame> {
            Ok(LandmarkFrame::from_raw(raw.unwrap_or_default())?)
        };
        match (rec.landmarks, rec.left, rec.right) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                bail!("frame has both 'landmarks' and 'left'/'right'")
            }
            (landmarks, None, None) => Ok(Self::single(rec.width, rec.height, frame(landmarks)?)),
            (None, left, right) => Ok(Self::dual(rec.width, rec.height, frame(left)?, frame(right)?)),
        }
    }
}

impl FrameImage for ReplayImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    /// 一人用の記録は中央の x で振り分ける
    fn split_halves(&self) -> Result<(Self, Self)> {
        let mid = self.width / 2;
        let (left, right) = match &self.content {
            Content::Dual(left, right) => (left.clone(), right.clone()),
            Content::Single(frame) => {
                let mut left = LandmarkFrame::new();
                let mut right = LandmarkFrame::new();
                for lm in frame.iter() {
                    if lm.x < mid as f32 {
                        left.insert(*lm);
                    } else {
                        right.insert(Landmark::new(lm.id, lm.x - mid as f32, lm.y));
                    }
                }
                (left, right)
            }
        };
        Ok((
            Self::single(mid, self.height, left),
            Self::single(self.width - mid, self.height, right),
        ))
    }
}

/// 記録された点をそのまま返す
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayDetector;

impl PoseDetector<ReplayImage> for ReplayDetector {
    fn detect(&mut self, image: &ReplayImage) -> Result<LandmarkFrame> {
        match &image.content {
            Content::Single(frame) => Ok(frame.clone()),
            Content::Dual(..) => Err(InputMismatch(
                "two-person frame must be split before detection; replay with --dual".into(),
            )
            .into()),
        }
    }
}

/// 記録を 1 行ずつ読む。空行は飛ばす。
pub struct ReplaySource<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
    allow_dual: bool,
}

impl ReplaySource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> ReplaySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            allow_dual: true,
        }
    }

    /// 一人モード用。二人分の記録 (left/right) の行はエラーにする。
    pub fn single_person(mut self) -> Self {
        self.allow_dual = false;
        self
    }

    fn read_frame(&self, line: &str) -> Result<ReplayImage> {
        let image = ReplayImage::parse(line)?;
        if image.is_dual() && !self.allow_dual {
            bail!("two-person frame (left/right) in single-person mode; replay with --dual");
        }
        Ok(image)
    }
}

impl<R: BufRead> Iterator for ReplaySource<R> {
    type Item = Result<ReplayImage>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            if line.trim().is_empty() {
                continue;
            }
            let line_no = self.line_no;
            return Some(self.read_frame(&line).with_context(|| format!("line {}", line_no)));
        }
    }
}
