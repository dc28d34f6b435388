use crate::pose::{LandmarkFrame, LandmarkSet};

/// どのフレームを判定に使ったか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackSource {
    /// 今回のフレームが必要点をすべて含む
    Fresh,
    /// 直近の完全なフレームで代用
    Stale,
    /// 代用できるフレームがない（判定は失敗する）
    Incomplete,
}

#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub frame: &'a LandmarkFrame,
    pub source: FallbackSource,
}

/// 検出器は高速な動作中に 1〜2 フレームだけ点を落とすことがあるので、
/// 直近の完全なフレームで穴を埋める。失敗しない。
///
/// `Fresh` のとき、呼び出し側が `current` を新しい last_valid として保存する。
pub fn resolve<'a>(
    current: &'a LandmarkFrame,
    last_valid: Option<&'a LandmarkFrame>,
    required: LandmarkSet,
) -> Resolved<'a> {
    if current.contains_all(required) {
        return Resolved {
            frame: current,
            source: FallbackSource::Fresh,
        };
    }
    match last_valid {
        Some(last) if last.contains_all(required) => Resolved {
            frame: last,
            source: FallbackSource::Stale,
        },
        _ => Resolved {
            frame: current,
            source: FallbackSource::Incomplete,
        },
    }
}
