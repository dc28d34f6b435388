pub mod detector;
pub mod landmark;
#[cfg(feature = "desktop")]
pub mod preprocess;

pub use detector::{InputMismatch, PoseDetector};
#[cfg(feature = "desktop")]
pub use detector::OnnxPoseDetector;
pub use landmark::{FrameError, Landmark, LandmarkFrame, LandmarkId, LandmarkSet};
#[cfg(feature = "desktop")]
pub use preprocess::{preprocess_for_blazepose, BLAZEPOSE_INPUT_SIZE};
