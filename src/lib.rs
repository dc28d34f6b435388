#[cfg(feature = "desktop")]
pub mod camera;
pub mod config;
pub mod logging;
pub mod pose;
pub mod protocol;
pub mod render;
pub mod replay;
pub mod session;
pub mod tracker;
