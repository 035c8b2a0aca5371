//! The result handed back from a completed (or gracefully stopped) recording.

/// Populated during teardown from the loop's own counters.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CaptureStats {
    pub total_frames: u64,
    pub failed_frames: u64,
    pub duration_ms: u64,

    pub audio_enabled: bool,
    pub audio_format: Option<AudioFormat>,

    pub system_audio_samples: u64,
    pub mic_audio_samples: u64,

    /// Set when the loop exited via a watchdog rather than a normal stop
    /// condition. Still a successful recording.
    pub watchdog_hit: Option<WatchdogKind>,

    /// Set when `cancel_flag` was observed set.
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub is_float: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum WatchdogKind {
    /// `loop_iterations > 2000` within a one-second window.
    LoopFrequency,
    /// `duration == 0` and the 60 s unlimited-recording ceiling was hit.
    UnlimitedCeiling,
    /// The 5-minute emergency watchdog set the cancel flag.
    Emergency,
}
