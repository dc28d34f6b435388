#[cfg(feature = "desktop")]
pub mod overlay;
pub mod skeleton;

#[cfg(feature = "desktop")]
pub use overlay::{draw_landmarks, draw_overlay, encode_jpeg};
pub use skeleton::SKELETON_CONNECTIONS;
