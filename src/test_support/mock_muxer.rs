//! A `Muxer` that records every submission instead of driving a real sink
//! writer. Uses the real [`VideoClock`]/[`AudioClock`] so the recorded
//! timestamps are exactly what `MfSinkMuxer` would have produced.

use crate::models::AudioFormat;
use crate::services::muxer::clock::{AudioClock, VideoClock};
use crate::services::muxer::{FinalizeReport, Muxer, MuxerError, MuxerVariant, COMBINED_TRACK_OUTPUT_SAMPLE_RATE};

#[derive(Debug, Clone, Copy)]
pub struct RecordedVideo {
    pub timestamp: u64,
    pub duration: u64,
    pub byte_len: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct RecordedAudio {
    pub timestamp: u64,
    pub duration: u64,
    pub frames: u32,
}

pub struct MockMuxer {
    pub variant: MuxerVariant,
    pub width: u32,
    pub height: u32,

    video_clock: VideoClock,
    combined_clock: Option<AudioClock>,
    system_clock: Option<AudioClock>,
    mic_clock: Option<AudioClock>,

    pub video: Vec<RecordedVideo>,
    pub combined_audio: Vec<RecordedAudio>,
    pub system_audio: Vec<RecordedAudio>,
    pub mic_audio: Vec<RecordedAudio>,

    pub finalized: bool,
    pub cleaned_up: bool,
}

impl Muxer for MockMuxer {
    fn open(
        variant: MuxerVariant,
        _output_path: &std::path::Path,
        width: u32,
        height: u32,
        target_fps: u32,
        audio: Option<AudioFormat>,
    ) -> Result<Self, MuxerError> {
        let audio_clock = |rate: u32| AudioClock::new(rate);
        let (combined_clock, system_clock, mic_clock) = match variant {
            MuxerVariant::VideoPlusCombinedAudio | MuxerVariant::AudioOnlySingle => {
                (Some(audio_clock(COMBINED_TRACK_OUTPUT_SAMPLE_RATE)), None, None)
            }
            MuxerVariant::VideoPlusDualAudio | MuxerVariant::AudioOnlyDual => {
                let rate = audio.map(|a| a.sample_rate).unwrap_or(48_000);
                (None, Some(audio_clock(rate)), Some(audio_clock(rate)))
            }
            MuxerVariant::VideoOnly => (None, None, None),
        };

        Ok(Self {
            variant,
            width,
            height,
            video_clock: VideoClock::new(target_fps.max(1)),
            combined_clock,
            system_clock,
            mic_clock,
            video: Vec::new(),
            combined_audio: Vec::new(),
            system_audio: Vec::new(),
            mic_audio: Vec::new(),
            finalized: false,
            cleaned_up: false,
        })
    }

    fn add_video(&mut self, buf: &[u8], _elapsed_ms: u64) -> Result<(), MuxerError> {
        let (timestamp, duration) = self.video_clock.next_sample();
        self.video.push(RecordedVideo { timestamp, duration, byte_len: buf.len() });
        Ok(())
    }

    fn add_combined_audio(&mut self, _buf: &[u8], frames: u32, _elapsed_ms: u64) -> Result<(), MuxerError> {
        let Some(clock) = self.combined_clock.as_mut() else { return Ok(()) };
        let (timestamp, duration) = clock.next_sample(frames as u64);
        self.combined_audio.push(RecordedAudio { timestamp, duration, frames });
        Ok(())
    }

    fn add_system_audio(&mut self, _buf: &[u8], frames: u32, _elapsed_ms: u64) -> Result<(), MuxerError> {
        let Some(clock) = self.system_clock.as_mut() else {
            return Err(MuxerError::SubmitFailed("system audio stream not configured".into()));
        };
        let (timestamp, duration) = clock.next_sample(frames as u64);
        self.system_audio.push(RecordedAudio { timestamp, duration, frames });
        Ok(())
    }

    fn add_mic_audio(&mut self, _buf: &[u8], frames: u32, _elapsed_ms: u64) -> Result<(), MuxerError> {
        let Some(clock) = self.mic_clock.as_mut() else {
            return Err(MuxerError::SubmitFailed("mic audio stream not configured".into()));
        };
        let (timestamp, duration) = clock.next_sample(frames as u64);
        self.mic_audio.push(RecordedAudio { timestamp, duration, frames });
        Ok(())
    }

    fn finalize(&mut self) -> Result<FinalizeReport, MuxerError> {
        self.finalized = true;
        let any_data = !self.video.is_empty() || !self.combined_audio.is_empty() || !self.system_audio.is_empty() || !self.mic_audio.is_empty();
        Ok(FinalizeReport { empty_file_note: !any_data })
    }

    fn cleanup(&mut self) {
        self.cleaned_up = true;
    }
}
