pub mod audio_capture;
pub mod muxer;
pub mod recording;
pub mod screen_capture;

pub use audio_capture::{AudioCaptureError, AudioMixFormat, AudioRole, AudioSource};
pub use muxer::{Muxer, MuxerError, MuxerVariant};
pub use recording::{run, ProgressCallback, StatusCallback};
#[cfg(target_os = "windows")]
pub use recording::run_default;
pub use screen_capture::{ScreenCaptureError, ScreenSource, VideoFrame};
