use std::fmt;

use serde::{Deserialize, Serialize};

use super::classify::Predicates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// 腕を下ろし脚を閉じた姿勢
    #[default]
    Down,
    /// 腕を上げ脚を開いた姿勢
    Up,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Down => "down",
            Stage::Up => "up",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Down/Up のヒステリシス付き状態機械
///
/// Down → Up は腕上げ かつ 開脚、Up → Down は腕下げ かつ 閉脚のときだけ。
/// 片方だけ戻った中間状態では遷移しない。回数は Up → Down で 1 増える。
#[derive(Debug, Clone, Default)]
pub struct RepCounter {
    stage: Stage,
    count: u32,
}

impl RepCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// 1 回分の動作が完了したら true
    pub fn apply(&mut self, p: &Predicates) -> bool {
        match self.stage {
            Stage::Down if p.arms_raised && p.legs_apart => {
                self.stage = Stage::Up;
                false
            }
            Stage::Up if !p.arms_raised && !p.legs_apart => {
                self.stage = Stage::Down;
                self.count = self.count.saturating_add(1);
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pred(arms_raised: bool, legs_apart: bool) -> Predicates {
        Predicates {
            arms_raised,
            legs_apart,
            ankle_width: 0.0,
            hip_width: 0.0,
        }
    }

    #[test]
    fn test_initial_state() {
        let c = RepCounter::new();
        assert_eq!(c.stage(), Stage::Down);
        assert_eq!(c.count(), 0);
    }

    #[test]
    fn test_transition_table() {
        let cases = [
            (Stage::Down, true, true, Stage::Up, 0),
            (Stage::Down, true, false, Stage::Down, 0),
            (Stage::Down, false, true, Stage::Down, 0),
            (Stage::Down, false, false, Stage::Down, 0),
            (Stage::Up, false, false, Stage::Down, 1),
            (Stage::Up, true, false, Stage::Up, 0),
            (Stage::Up, false, true, Stage::Up, 0),
            (Stage::Up, true, true, Stage::Up, 0),
        ];
        for (from, arms, legs, to, count) in cases {
            let mut c = RepCounter { stage: from, count: 0 };
            c.apply(&pred(arms, legs));
            assert_eq!(c.stage(), to, "from {from} arms={arms} legs={legs}");
            assert_eq!(c.count(), count, "from {from} arms={arms} legs={legs}");
        }
    }

    #[test]
    fn test_holding_open_pose_counts_once() {
        let mut c = RepCounter::new();
        for _ in 0..10 {
            c.apply(&pred(true, true));
        }
        for _ in 0..10 {
            c.apply(&pred(false, false));
        }
        assert_eq!(c.count(), 1);
    }

    #[test]
    fn test_partial_return_does_not_count() {
        let mut c = RepCounter::new();
        c.apply(&pred(true, true));
        assert!(!c.apply(&pred(false, true)));
        assert!(!c.apply(&pred(true, false)));
        assert!(!c.apply(&pred(true, true)));
        assert!(c.apply(&pred(false, false)));
        assert_eq!(c.count(), 1);
    }

    #[test]
    fn test_reset() {
        let mut c = RepCounter::new();
        c.apply(&pred(true, true));
        c.apply(&pred(false, false));
        c.apply(&pred(true, true));
        c.reset();
        assert_eq!(c.stage(), Stage::Down);
        assert_eq!(c.count(), 0);
    }

    #[test]
    fn test_stage_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Stage::Up).unwrap(), "\"up\"");
        assert_eq!(Stage::Down.to_string(), "down");
    }
}
