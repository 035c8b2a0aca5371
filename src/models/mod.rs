pub mod error;
pub mod params;
pub mod stats;

pub use error::{CaptureError, Component, StreamKind};
pub use params::{AudioSources, CaptureParams, Region, SourceMask};
pub use stats::{AudioFormat, CaptureStats, WatchdogKind};
