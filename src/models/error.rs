//! The orchestrator's aggregate error type.

use thiserror::Error;

/// Named component, for `InitFailed`/`DownGraded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Screen,
    SystemAudio,
    Microphone,
    Muxer,
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Component::Screen => "screen",
            Component::SystemAudio => "system_audio",
            Component::Microphone => "microphone",
            Component::Muxer => "muxer",
        };
        f.write_str(s)
    }
}

/// Named stream, for `SubmitFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    CombinedAudio,
    SystemAudio,
    MicAudio,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    /// A required source or the muxer refused to start. Fatal.
    #[error("{component} failed to initialize: {reason}")]
    InitFailed { component: Component, reason: String },

    /// A single buffer was rejected by the muxer. Logged; recording
    /// continues — this variant is only ever surfaced inside log output,
    /// never returned from `run`.
    #[error("submission to {stream:?} stream failed: {reason}")]
    SubmitFailed { stream: StreamKind, reason: String },

    /// The sink writer could not close cleanly (and it was not the
    /// tolerated "empty media" case).
    #[error("muxer finalize failed: {0}")]
    FinalizeFailed(String),

    /// An optional audio source was requested but never initialized. Not
    /// actually returned as an error from `run` — recorded in
    /// [`crate::models::stats::CaptureStats`] and logged, but kept here so
    /// callers matching on `CaptureError` have a name for it.
    #[error("{component} downgraded: {reason}")]
    DownGraded { component: Component, reason: String },

    /// Audio-only recording lost its only source: `consecutive_failures`
    /// polls in a row returned no buffer. Fatal, unlike `watchdog_hit` or
    /// `cancelled`, which are reported as a successful stop.
    #[error("audio source failed {consecutive_failures} consecutive polls, aborting audio-only recording")]
    AudioExhausted { consecutive_failures: u32 },
}
