//! Mock sources: hand back a fixed frame/buffer shape rather than touching
//! any OS handle.

use crate::services::audio_capture::{AudioBuffer, AudioCaptureError, AudioMixFormat, AudioRole, AudioSource, GetBufferResult};
use crate::services::screen_capture::{FrameResult, ScreenCaptureError, ScreenSource, VideoFrame};

/// Always produces a frame of the configured dimensions; never reports
/// `NoNewFrame`, so tests can reason about submission counts directly from
/// elapsed time and fps.
pub struct MockScreenSource {
    width: u32,
    height: u32,
    fail_init: bool,
    frames_handed_out: u64,
}

impl MockScreenSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, fail_init: false, frames_handed_out: 0 }
    }

    pub fn failing_init() -> Self {
        Self { width: 0, height: 0, fail_init: true, frames_handed_out: 0 }
    }

    pub fn frames_handed_out(&self) -> u64 {
        self.frames_handed_out
    }
}

impl ScreenSource for MockScreenSource {
    fn init(&mut self) -> Result<(), ScreenCaptureError> {
        if self.fail_init {
            return Err(ScreenCaptureError::InitFailed("no adapter in test environment".into()));
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), ScreenCaptureError> {
        Ok(())
    }

    fn get_frame(&mut self, _dual_track: bool) -> Result<FrameResult, ScreenCaptureError> {
        self.frames_handed_out += 1;
        Ok(FrameResult::Frame(VideoFrame {
            data: vec![0u8; (self.width * self.height * 4) as usize],
            width: self.width,
            height: self.height,
        }))
    }

    fn stop(&mut self) {}
    fn cleanup(&mut self) {}

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Either a live source that always has a real (non-synthesized) packet
/// ready, or one that fails at `init()` to model an absent device (init
/// fails rather than ever producing data).
pub struct MockAudioSource {
    role: AudioRole,
    mix: AudioMixFormat,
    frames_per_call: u32,
    unavailable: bool,
}

impl MockAudioSource {
    pub fn live(role: AudioRole, mix: AudioMixFormat, frames_per_call: u32) -> Self {
        Self { role, mix, frames_per_call, unavailable: false }
    }

    pub fn absent(role: AudioRole) -> Self {
        Self {
            role,
            mix: AudioMixFormat { sample_rate: 0, channels: 0, bits_per_sample: 0, is_float: false },
            frames_per_call: 0,
            unavailable: true,
        }
    }
}

impl AudioSource for MockAudioSource {
    fn init(&mut self) -> Result<(), AudioCaptureError> {
        if self.unavailable {
            return Err(AudioCaptureError::DeviceNotAvailable);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioCaptureError> {
        Ok(())
    }

    fn get_buffer(&mut self) -> Result<GetBufferResult, AudioCaptureError> {
        let bytes_per_frame = self.mix.channels as usize * (self.mix.bits_per_sample as usize / 8);
        Ok(GetBufferResult::Buffer(AudioBuffer {
            data: vec![0u8; self.frames_per_call as usize * bytes_per_frame],
            frames: self.frames_per_call,
            synthesized: false,
        }))
    }

    fn stop(&mut self) {}
    fn cleanup(&mut self) {}

    fn mix_format(&self) -> Option<AudioMixFormat> {
        Some(self.mix)
    }

    fn role(&self) -> AudioRole {
        self.role
    }
}
