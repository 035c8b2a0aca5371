//! Mock `ScreenSource`/`AudioSource`/`Muxer` implementations for driving
//! [`crate::services::recording::run`] end-to-end without real hardware.

mod mock_muxer;
mod mock_sources;

pub use mock_muxer::{MockMuxer, RecordedAudio, RecordedVideo};
pub use mock_sources::{MockAudioSource, MockScreenSource};
