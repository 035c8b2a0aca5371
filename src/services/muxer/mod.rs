//! Muxer.
//!
//! Five initialization variants selected by the
//! [parameter/mode resolver](crate::services::recording::mode_resolver),
//! one container type (MPEG-4), and a single submission/finalize contract
//! behind the [`Muxer`] trait so the orchestrator can be exercised against
//! [`crate::test_support::MockMuxer`] without a real sink writer.

pub mod clock;
#[cfg(target_os = "windows")]
mod mf_sink;

#[cfg(target_os = "windows")]
pub use mf_sink::MfSinkMuxer;

use thiserror::Error;

use crate::models::AudioFormat;

#[derive(Debug, Error)]
pub enum MuxerError {
    #[error("sink writer initialization failed: {0}")]
    InitFailed(String),
    #[error("sample submission failed: {0}")]
    SubmitFailed(String),
    #[error("finalize failed: {0}")]
    FinalizeFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxerVariant {
    VideoOnly,
    VideoPlusCombinedAudio,
    VideoPlusDualAudio,
    AudioOnlySingle,
    AudioOnlyDual,
}

impl MuxerVariant {
    pub fn has_video(&self) -> bool {
        matches!(self, MuxerVariant::VideoOnly | MuxerVariant::VideoPlusCombinedAudio | MuxerVariant::VideoPlusDualAudio)
    }

    pub fn is_dual_track(&self) -> bool {
        matches!(self, MuxerVariant::VideoPlusDualAudio | MuxerVariant::AudioOnlyDual)
    }

    pub fn has_combined_audio(&self) -> bool {
        matches!(self, MuxerVariant::VideoPlusCombinedAudio | MuxerVariant::AudioOnlySingle)
    }
}

/// Adaptive video bitrate by width.
pub fn video_bitrate_for_width(width: u32) -> u32 {
    if width >= 1920 {
        1_200_000
    } else if width >= 1280 {
        800_000
    } else {
        500_000
    }
}

/// Sample rate declared on the combined-audio track's output type.
///
/// Hard-coded to 44.1 kHz regardless of the source rate. This is a known
/// historical inconsistency rather than deliberate policy, and the
/// asymmetry with the dual-track variants (which use the source rate) is
/// preserved intentionally. See `DESIGN.md`.
pub const COMBINED_TRACK_OUTPUT_SAMPLE_RATE: u32 = 44_100;

pub const AUDIO_OUTPUT_BITRATE: u32 = 96_000;

pub struct FinalizeReport {
    /// Set when the sink writer's "empty media" code was returned and
    /// tolerated as success.
    pub empty_file_note: bool,
}

pub trait Muxer: Send {
    fn open(
        variant: MuxerVariant,
        output_path: &std::path::Path,
        width: u32,
        height: u32,
        target_fps: u32,
        audio: Option<AudioFormat>,
    ) -> Result<Self, MuxerError>
    where
        Self: Sized;

    fn add_video(&mut self, buf: &[u8], elapsed_ms: u64) -> Result<(), MuxerError>;
    fn add_combined_audio(&mut self, buf: &[u8], frames: u32, elapsed_ms: u64) -> Result<(), MuxerError>;
    fn add_system_audio(&mut self, buf: &[u8], frames: u32, elapsed_ms: u64) -> Result<(), MuxerError>;
    fn add_mic_audio(&mut self, buf: &[u8], frames: u32, elapsed_ms: u64) -> Result<(), MuxerError>;

    fn finalize(&mut self) -> Result<FinalizeReport, MuxerError>;
    fn cleanup(&mut self);
}

#[cfg(not(target_os = "windows"))]
pub struct MfSinkMuxer;

#[cfg(not(target_os = "windows"))]
impl Muxer for MfSinkMuxer {
    fn open(
        _variant: MuxerVariant,
        _output_path: &std::path::Path,
        _width: u32,
        _height: u32,
        _target_fps: u32,
        _audio: Option<AudioFormat>,
    ) -> Result<Self, MuxerError> {
        Err(MuxerError::InitFailed("Media Foundation is only available on Windows".into()))
    }

    fn add_video(&mut self, _buf: &[u8], _elapsed_ms: u64) -> Result<(), MuxerError> {
        unreachable!("open() always fails on this platform")
    }

    fn add_combined_audio(&mut self, _buf: &[u8], _frames: u32, _elapsed_ms: u64) -> Result<(), MuxerError> {
        unreachable!("open() always fails on this platform")
    }

    fn add_system_audio(&mut self, _buf: &[u8], _frames: u32, _elapsed_ms: u64) -> Result<(), MuxerError> {
        unreachable!("open() always fails on this platform")
    }

    fn add_mic_audio(&mut self, _buf: &[u8], _frames: u32, _elapsed_ms: u64) -> Result<(), MuxerError> {
        unreachable!("open() always fails on this platform")
    }

    fn finalize(&mut self) -> Result<FinalizeReport, MuxerError> {
        unreachable!("open() always fails on this platform")
    }

    fn cleanup(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitrate_steps_match_the_documented_thresholds() {
        assert_eq!(video_bitrate_for_width(3840), 1_200_000);
        assert_eq!(video_bitrate_for_width(1920), 1_200_000);
        assert_eq!(video_bitrate_for_width(1600), 800_000);
        assert_eq!(video_bitrate_for_width(1280), 800_000);
        assert_eq!(video_bitrate_for_width(640), 500_000);
    }

    #[test]
    fn variant_predicates_agree_with_the_five_cases() {
        assert!(MuxerVariant::VideoOnly.has_video());
        assert!(!MuxerVariant::VideoOnly.is_dual_track());
        assert!(MuxerVariant::AudioOnlyDual.is_dual_track());
        assert!(!MuxerVariant::AudioOnlyDual.has_video());
        assert!(MuxerVariant::VideoPlusCombinedAudio.has_combined_audio());
        assert!(!MuxerVariant::VideoPlusDualAudio.has_combined_audio());
    }
}
