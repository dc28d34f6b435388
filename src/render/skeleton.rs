use crate::pose::LandmarkId;

/// 描画する骨格の接続 (開始ランドマーク, 終了ランドマーク)
pub const SKELETON_CONNECTIONS: [(LandmarkId, LandmarkId); 12] = [
    // 上半身
    (LandmarkId::LeftShoulder, LandmarkId::RightShoulder),
    (LandmarkId::LeftShoulder, LandmarkId::LeftElbow),
    (LandmarkId::LeftElbow, LandmarkId::LeftWrist),
    (LandmarkId::RightShoulder, LandmarkId::RightElbow),
    (LandmarkId::RightElbow, LandmarkId::RightWrist),
    // 胴体
    (LandmarkId::LeftShoulder, LandmarkId::LeftHip),
    (LandmarkId::RightShoulder, LandmarkId::RightHip),
    (LandmarkId::LeftHip, LandmarkId::RightHip),
    // 下半身
    (LandmarkId::LeftHip, LandmarkId::LeftKnee),
    (LandmarkId::LeftKnee, LandmarkId::LeftAnkle),
    (LandmarkId::RightHip, LandmarkId::RightKnee),
    (LandmarkId::RightKnee, LandmarkId::RightAnkle),
];

/// ランドマーク点の色 (BGR)
pub const LANDMARK_COLOR: (f64, f64, f64) = (0.0, 255.0, 0.0);

/// 骨格線の色 (BGR)
pub const SKELETON_COLOR: (f64, f64, f64) = (0.0, 255.0, 255.0);

/// テキストの色 (BGR)
pub const TEXT_COLOR: (f64, f64, f64) = (255.0, 255.0, 255.0);

/// 二人モードの中央線の色 (BGR)
pub const DIVIDER_COLOR: (f64, f64, f64) = (0.0, 0.0, 255.0);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{CALIBRATION_REQUIRED, CLASSIFY_REQUIRED};

    #[test]
    fn test_connections_cover_tracked_landmarks() {
        let required = CALIBRATION_REQUIRED.union(CLASSIFY_REQUIRED);
        for id in required.iter() {
            assert!(
                SKELETON_CONNECTIONS.iter().any(|&(a, b)| a == id || b == id),
                "{:?} is not drawn",
                id
            );
        }
    }
}
