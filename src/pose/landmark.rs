use std::fmt;

use thiserror::Error;

/// BlazePose の 33 ランドマークインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum LandmarkId {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl LandmarkId {
    pub const COUNT: usize = 33;

    pub const ALL: [LandmarkId; Self::COUNT] = {
        use LandmarkId::*;
        [
            Nose, LeftEyeInner, LeftEye, LeftEyeOuter, RightEyeInner, RightEye, RightEyeOuter,
            LeftEar, RightEar, MouthLeft, MouthRight, LeftShoulder, RightShoulder, LeftElbow,
            RightElbow, LeftWrist, RightWrist, LeftPinky, RightPinky, LeftIndex, RightIndex,
            LeftThumb, RightThumb, LeftHip, RightHip, LeftKnee, RightKnee, LeftAnkle, RightAnkle,
            LeftHeel, RightHeel, LeftFootIndex, RightFootIndex,
        ]
    };

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// 単一ランドマーク（ピクセル座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub id: LandmarkId,
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(id: LandmarkId, x: f32, y: f32) -> Self {
        Self { id, x, y }
    }

    /// ユークリッド距離
    pub fn distance_to(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// ランドマーク ID の集合（ビットセット）
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LandmarkSet(u64);

impl LandmarkSet {
    pub const EMPTY: LandmarkSet = LandmarkSet(0);

    pub const fn of(ids: &[LandmarkId]) -> Self {
        let mut bits = 0u64;
        let mut i = 0;
        while i < ids.len() {
            bits |= 1 << (ids[i] as u8);
            i += 1;
        }
        Self(bits)
    }

    pub const fn contains(self, id: LandmarkId) -> bool {
        self.0 & (1 << (id as u8)) != 0
    }

    pub fn insert(&mut self, id: LandmarkId) {
        self.0 |= 1 << (id as u8);
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn union(self, other: LandmarkSet) -> LandmarkSet {
        LandmarkSet(self.0 | other.0)
    }

    /// `self` にあって `other` にない ID
    pub const fn difference(self, other: LandmarkSet) -> LandmarkSet {
        LandmarkSet(self.0 & !other.0)
    }

    pub const fn is_subset(self, other: LandmarkSet) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = LandmarkId> {
        LandmarkId::ALL.into_iter().filter(move |id| self.contains(*id))
    }
}

impl fmt::Debug for LandmarkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for LandmarkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.iter().map(|id| id.index().to_string()).collect();
        write!(f, "{{{}}}", ids.join(","))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("unknown landmark id {0}")]
    UnknownLandmark(u32),
    #[error("landmark {0:?} appears more than once")]
    DuplicateLandmark(LandmarkId),
}

/// 1フレーム分の検出結果。ID で直接引けるテーブル。
///
/// 人物が見つからなければ空、遮蔽があれば部分的になる。
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    slots: [Option<Landmark>; LandmarkId::COUNT],
}

impl LandmarkFrame {
    pub fn new() -> Self {
        Self {
            slots: [None; LandmarkId::COUNT],
        }
    }

    /// ランドマーク列から構築。同じ ID が二度現れたらエラー。
    pub fn from_landmarks<I>(landmarks: I) -> Result<Self, FrameError>
    where
        I: IntoIterator<Item = Landmark>,
    {
        let mut frame = Self::new();
        for lm in landmarks {
            if frame.insert(lm).is_some() {
                return Err(FrameError::DuplicateLandmark(lm.id));
            }
        }
        Ok(frame)
    }

    /// `[id, x, y]` 形式の生データから構築
    pub fn from_raw<I>(raw: I) -> Result<Self, FrameError>
    where
        I: IntoIterator<Item = (u32, f32, f32)>,
    {
        let mut landmarks = Vec::new();
        for (id, x, y) in raw {
            let id = LandmarkId::from_index(id as usize).ok_or(FrameError::UnknownLandmark(id))?;
            landmarks.push(Landmark::new(id, x, y));
        }
        Self::from_landmarks(landmarks)
    }

    /// 既存の値があれば置き換えて返す
    pub fn insert(&mut self, landmark: Landmark) -> Option<Landmark> {
        self.slots[landmark.id.index()].replace(landmark)
    }

    pub fn get(&self, id: LandmarkId) -> Option<&Landmark> {
        self.slots[id.index()].as_ref()
    }

    pub fn present(&self) -> LandmarkSet {
        let mut set = LandmarkSet::EMPTY;
        for lm in self.iter() {
            set.insert(lm.id);
        }
        set
    }

    pub fn contains_all(&self, required: LandmarkSet) -> bool {
        self.missing(required).is_empty()
    }

    pub fn missing(&self, required: LandmarkSet) -> LandmarkSet {
        required.difference(self.present())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    /// ID 順に走査
    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }
}

impl Default for LandmarkFrame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_id_count() {
        assert_eq!(LandmarkId::COUNT, 33);
        assert_eq!(LandmarkId::ALL.len(), 33);
    }

    #[test]
    fn test_landmark_id_from_index() {
        assert_eq!(LandmarkId::from_index(0), Some(LandmarkId::Nose));
        assert_eq!(LandmarkId::from_index(15), Some(LandmarkId::LeftWrist));
        assert_eq!(LandmarkId::from_index(28), Some(LandmarkId::RightAnkle));
        assert_eq!(LandmarkId::from_index(33), None);
        for (i, id) in LandmarkId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }

    #[test]
    fn test_distance() {
        let a = Landmark::new(LandmarkId::LeftHip, 0.0, 0.0);
        let b = Landmark::new(LandmarkId::RightHip, 3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_set_membership() {
        let set = LandmarkSet::of(&[LandmarkId::LeftHip, LandmarkId::RightAnkle]);
        assert!(set.contains(LandmarkId::LeftHip));
        assert!(set.contains(LandmarkId::RightAnkle));
        assert!(!set.contains(LandmarkId::Nose));
        assert_eq!(set.len(), 2);
        assert_eq!(set.to_string(), "{23,28}");
    }

    #[test]
    fn test_set_difference_and_subset() {
        let big = LandmarkSet::of(&[LandmarkId::LeftHip, LandmarkId::RightHip, LandmarkId::Nose]);
        let small = LandmarkSet::of(&[LandmarkId::LeftHip]);
        assert!(small.is_subset(big));
        assert!(!big.is_subset(small));
        let diff = big.difference(small);
        assert_eq!(diff.iter().collect::<Vec<_>>(), vec![LandmarkId::Nose, LandmarkId::RightHip]);
    }

    #[test]
    fn test_frame_from_raw_rejects_duplicates() {
        let err = LandmarkFrame::from_raw([(11, 1.0, 2.0), (11, 3.0, 4.0)]).unwrap_err();
        assert_eq!(err, FrameError::DuplicateLandmark(LandmarkId::LeftShoulder));
    }

    #[test]
    fn test_frame_from_raw_rejects_unknown_id() {
        let err = LandmarkFrame::from_raw([(40, 1.0, 2.0)]).unwrap_err();
        assert_eq!(err, FrameError::UnknownLandmark(40));
    }

    #[test]
    fn test_frame_missing() {
        let frame = LandmarkFrame::from_raw([(23, 100.0, 400.0), (24, 200.0, 400.0)]).unwrap();
        let required = LandmarkSet::of(&[LandmarkId::LeftHip, LandmarkId::RightHip, LandmarkId::LeftAnkle]);
        assert!(!frame.contains_all(required));
        assert_eq!(frame.missing(required), LandmarkSet::of(&[LandmarkId::LeftAnkle]));
        assert_eq!(frame.len(), 2);
        assert!(!frame.is_empty());
        assert!(LandmarkFrame::new().is_empty());
    }

    #[test]
    fn test_frame_iter_in_id_order() {
        let frame = LandmarkFrame::from_raw([(28, 0.0, 0.0), (0, 0.0, 0.0), (15, 0.0, 0.0)]).unwrap();
        let ids: Vec<usize> = frame.iter().map(|lm| lm.id.index()).collect();
        assert_eq!(ids, vec![0, 15, 28]);
    }
}
