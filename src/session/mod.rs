pub mod control;
pub mod fps;
pub mod status;
pub mod streaming;

pub use control::{status_channel, SessionControl, StatusBoard, StatusPublisher};
pub use fps::FpsMeter;
pub use status::{PersonStatus, SessionMetrics, SessionStatus, TrackingStatus};
pub use streaming::{FrameImage, Observations, SessionTick, StreamingSession};
