//! Capture parameters: the immutable request that drives one recording.

use std::path::PathBuf;

/// A monitor-relative capture rectangle, active only when `region_enabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

/// Which audio endpoints the orchestrator was asked to enable.
///
/// Not the same as which sources actually initialized — see
/// [`crate::models::stats::CaptureStats`] for the realized set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SourceMask {
    pub video: bool,
    pub system_audio: bool,
    pub microphone: bool,
}

impl SourceMask {
    pub fn any_audio(&self) -> bool {
        self.system_audio || self.microphone
    }

    pub fn is_valid(&self) -> bool {
        self.video || self.any_audio()
    }
}

/// Which audio sources are enabled, as a single tag rather than two bools.
///
/// Derived from [`SourceMask`]; used by the mode resolver to pick a muxer
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSources {
    None,
    System,
    Microphone,
    Both,
}

impl From<SourceMask> for AudioSources {
    fn from(mask: SourceMask) -> Self {
        match (mask.system_audio, mask.microphone) {
            (true, true) => AudioSources::Both,
            (true, false) => AudioSources::System,
            (false, true) => AudioSources::Microphone,
            (false, false) => AudioSources::None,
        }
    }
}

/// Immutable parameters for one recording. Built by the glue layer (CLI
/// parsing lives outside this core — see `src/main.rs`) and handed whole to
/// [`crate::services::recording::run`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureParams {
    pub output_path: PathBuf,

    /// Target frame rate, 1..=120.
    pub fps: u32,

    /// Whole seconds; 0 means unlimited (the 60 s soft ceiling still
    /// applies).
    pub duration_secs: u64,

    pub sources: SourceMask,

    pub monitor_index: u32,
    pub region: Option<Region>,

    #[serde(default = "default_true")]
    pub cursor_visible: bool,
}

fn default_true() -> bool {
    true
}

impl CaptureParams {
    /// `video disabled AND at least one audio enabled`.
    pub fn audio_only_mode(&self) -> bool {
        !self.sources.video && self.sources.any_audio()
    }

    pub fn audio_sources(&self) -> AudioSources {
        self.sources.into()
    }

    pub fn region_enabled(&self) -> bool {
        self.region.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_only_requires_video_disabled() {
        let mask = SourceMask { video: false, system_audio: true, microphone: false };
        assert!(mask.any_audio());
        assert_eq!(AudioSources::from(mask), AudioSources::System);
    }

    #[test]
    fn source_mask_rejects_all_disabled() {
        let mask = SourceMask { video: false, system_audio: false, microphone: false };
        assert!(!mask.is_valid());
    }

    #[test]
    fn both_audio_sources_tag_as_both() {
        let mask = SourceMask { video: true, system_audio: true, microphone: true };
        assert_eq!(AudioSources::from(mask), AudioSources::Both);
    }
}
