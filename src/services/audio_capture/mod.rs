//! Audio source.
//!
//! Two instances exist at runtime, one per [`AudioRole`]; they are
//! structurally identical, so both are realized by the same
//! [`WasapiAudioSource`] type, parameterized by which endpoint it opens and
//! which stream flags it passes to `IAudioClient::Initialize`.

pub mod silence;

#[cfg(target_os = "windows")]
mod wasapi;
#[cfg(target_os = "windows")]
pub use wasapi::WasapiAudioSource;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioCaptureError {
    #[error("no audio endpoint available")]
    DeviceNotAvailable,
    #[error("audio client configuration failed: {0}")]
    ConfigurationFailed(String),
    #[error("audio capture failed: {0}")]
    CaptureFailed(String),
    #[error("unsupported platform")]
    UnsupportedPlatform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioRole {
    /// Default render endpoint, opened with `AUDCLNT_STREAMFLAGS_LOOPBACK`.
    Loopback,
    /// Default capture endpoint, opened with no loopback flag.
    Microphone,
}

/// Sample format/geometry agreed with the OS mix format at `init()` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioMixFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub is_float: bool,
}

/// One pulled (or synthesized) audio buffer, consumed within the same
/// orchestrator iteration it was returned in.
pub struct AudioBuffer {
    pub data: Vec<u8>,
    pub frames: u32,
    pub synthesized: bool,
}

pub enum GetBufferResult {
    Buffer(AudioBuffer),
    /// No real data and the silence generator has nothing to catch up on
    /// yet; emit nothing this call.
    Idle,
}

pub trait AudioSource: Send {
    fn init(&mut self) -> Result<(), AudioCaptureError>;
    fn start(&mut self) -> Result<(), AudioCaptureError>;
    fn get_buffer(&mut self) -> Result<GetBufferResult, AudioCaptureError>;
    fn stop(&mut self);
    fn cleanup(&mut self);

    fn mix_format(&self) -> Option<AudioMixFormat>;
    fn role(&self) -> AudioRole;
}

#[cfg(not(target_os = "windows"))]
pub struct WasapiAudioSource {
    role: AudioRole,
}

#[cfg(not(target_os = "windows"))]
impl WasapiAudioSource {
    pub fn new(role: AudioRole) -> Self {
        Self { role }
    }
}

#[cfg(not(target_os = "windows"))]
impl AudioSource for WasapiAudioSource {
    fn init(&mut self) -> Result<(), AudioCaptureError> {
        Err(AudioCaptureError::UnsupportedPlatform)
    }

    fn start(&mut self) -> Result<(), AudioCaptureError> {
        Err(AudioCaptureError::UnsupportedPlatform)
    }

    fn get_buffer(&mut self) -> Result<GetBufferResult, AudioCaptureError> {
        Err(AudioCaptureError::UnsupportedPlatform)
    }

    fn stop(&mut self) {}
    fn cleanup(&mut self) {}

    fn mix_format(&self) -> Option<AudioMixFormat> {
        None
    }

    fn role(&self) -> AudioRole {
        self.role
    }
}
