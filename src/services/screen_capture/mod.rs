//! Screen source.
//!
//! Wraps a GPU desktop-duplication stream: acquire a compositor frame with
//! zero timeout, fall back to a cached frame when the compositor has
//! nothing new, and hand back a freshly allocated BGRA buffer whose row
//! order depends on whether the muxer is running in dual-track mode.

#[cfg(target_os = "windows")]
mod dxgi;
#[cfg(target_os = "windows")]
pub use dxgi::DxgiScreenSource;

use thiserror::Error;

/// Ceiling above which the cached frame is dropped rather than retained.
pub const CACHE_CEILING_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ScreenCaptureError {
    #[error("failed to initialize desktop duplication: {0}")]
    InitFailed(String),
    #[error("desktop duplication access lost")]
    AccessLost,
    #[error("frame acquisition failed: {0}")]
    CaptureFailed(String),
    #[error("unsupported platform")]
    UnsupportedPlatform,
}

/// One acquired BGRA frame, owned for exactly one orchestrator hop.
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl VideoFrame {
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

pub enum FrameResult {
    Frame(VideoFrame),
    NoNewFrame,
}

/// Implemented by the real DXGI source and, in tests, by a mock.
pub trait ScreenSource: Send {
    fn init(&mut self) -> Result<(), ScreenCaptureError>;
    fn start(&mut self) -> Result<(), ScreenCaptureError>;

    /// Non-blocking. `dual_track` selects the row-order convention — see
    /// the module doc: bottom-to-top in single-track mode, top-to-bottom in
    /// dual-track mode. This asymmetry is a behavioral contract, not a bug,
    /// and must not be "fixed."
    fn get_frame(&mut self, dual_track: bool) -> Result<FrameResult, ScreenCaptureError>;

    fn stop(&mut self);
    fn cleanup(&mut self);

    fn dimensions(&self) -> (u32, u32);
}

#[cfg(not(target_os = "windows"))]
pub struct DxgiScreenSource;

#[cfg(not(target_os = "windows"))]
impl DxgiScreenSource {
    pub fn new(_monitor_index: u32) -> Self {
        DxgiScreenSource
    }
}

#[cfg(not(target_os = "windows"))]
impl ScreenSource for DxgiScreenSource {
    fn init(&mut self) -> Result<(), ScreenCaptureError> {
        Err(ScreenCaptureError::UnsupportedPlatform)
    }

    fn start(&mut self) -> Result<(), ScreenCaptureError> {
        Err(ScreenCaptureError::UnsupportedPlatform)
    }

    fn get_frame(&mut self, _dual_track: bool) -> Result<FrameResult, ScreenCaptureError> {
        Err(ScreenCaptureError::UnsupportedPlatform)
    }

    fn stop(&mut self) {}
    fn cleanup(&mut self) {}

    fn dimensions(&self) -> (u32, u32) {
        (0, 0)
    }
}
