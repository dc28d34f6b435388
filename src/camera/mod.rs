pub mod capture;

pub use capture::OpenCvSource;
