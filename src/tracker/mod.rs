pub mod calibrate;
pub mod classify;
pub mod counter;
pub mod dual;
pub mod fallback;
pub mod single;

pub use calibrate::{Calibration, CalibrationError, CalibrationSource, Calibrator, CALIBRATION_REQUIRED};
pub use classify::{ClassifyError, MovementClassifier, Predicates, CLASSIFY_REQUIRED};
pub use counter::{RepCounter, Stage};
pub use dual::DualTracker;
pub use fallback::FallbackSource;
pub use single::{Observation, Tracker, TrackerSnapshot};
