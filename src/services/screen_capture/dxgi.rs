//! DXGI desktop-duplication backed [`ScreenSource`].
//!
//! Follows the same COM-lifecycle idiom as the WASAPI audio sources: init on
//! the owning thread, `windows::core` `Result` propagation, explicit
//! `Release`-equivalent cleanup on every exit path.

use windows::core::Interface;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_UNKNOWN;
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Texture2D,
    D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAP_READ,
    D3D11_SDK_VERSION, D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
};
use windows::Win32::Graphics::Dxgi::Common::DXGI_FORMAT_B8G8R8A8_UNORM;
use windows::Win32::Graphics::Dxgi::{
    CreateDXGIFactory1, IDXGIAdapter1, IDXGIFactory1, IDXGIOutput1, IDXGIOutputDuplication,
    IDXGIResource, DXGI_ERROR_ACCESS_LOST, DXGI_ERROR_WAIT_TIMEOUT, DXGI_OUTDUPL_FRAME_INFO,
};

use super::{FrameResult, ScreenCaptureError, ScreenSource, VideoFrame, CACHE_CEILING_BYTES};

pub struct DxgiScreenSource {
    monitor_index: u32,
    device: Option<ID3D11Device>,
    context: Option<ID3D11DeviceContext>,
    duplication: Option<IDXGIOutputDuplication>,
    staging: Option<ID3D11Texture2D>,
    width: u32,
    height: u32,
    capturing: bool,
    cached_frame: Option<Vec<u8>>,
}

impl DxgiScreenSource {
    pub fn new(monitor_index: u32) -> Self {
        Self {
            monitor_index,
            device: None,
            context: None,
            duplication: None,
            staging: None,
            width: 0,
            height: 0,
            capturing: false,
            cached_frame: None,
        }
    }

    fn find_output(&self, factory: &IDXGIFactory1) -> Result<IDXGIOutput1, ScreenCaptureError> {
        unsafe {
            let adapter: IDXGIAdapter1 = factory
                .EnumAdapters1(0)
                .map_err(|e| ScreenCaptureError::InitFailed(format!("EnumAdapters1: {e}")))?;

            let output = adapter
                .EnumOutputs(self.monitor_index)
                .map_err(|e| ScreenCaptureError::InitFailed(format!("EnumOutputs: {e}")))?;

            output
                .cast::<IDXGIOutput1>()
                .map_err(|e| ScreenCaptureError::InitFailed(format!("IDXGIOutput1 cast: {e}")))
        }
    }

    fn make_staging_texture(
        &self,
        device: &ID3D11Device,
        width: u32,
        height: u32,
    ) -> Result<ID3D11Texture2D, ScreenCaptureError> {
        let desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: windows::Win32::Graphics::Dxgi::Common::DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_STAGING,
            BindFlags: 0,
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: 0,
        };

        unsafe {
            let mut staging: Option<ID3D11Texture2D> = None;
            device
                .CreateTexture2D(&desc, None, Some(&mut staging))
                .map_err(|e| ScreenCaptureError::InitFailed(format!("CreateTexture2D: {e}")))?;
            staging.ok_or_else(|| {
                ScreenCaptureError::InitFailed("CreateTexture2D returned no texture".into())
            })
        }
    }
}

impl ScreenSource for DxgiScreenSource {
    fn init(&mut self) -> Result<(), ScreenCaptureError> {
        unsafe {
            let factory: IDXGIFactory1 = CreateDXGIFactory1()
                .map_err(|e| ScreenCaptureError::InitFailed(format!("CreateDXGIFactory1: {e}")))?;

            let output = self.find_output(&factory)?;

            let mut device: Option<ID3D11Device> = None;
            let mut context: Option<ID3D11DeviceContext> = None;
            D3D11CreateDevice(
                None,
                D3D_DRIVER_TYPE_UNKNOWN,
                HANDLE::default().into(),
                D3D11_CREATE_DEVICE_BGRA_SUPPORT,
                None,
                D3D11_SDK_VERSION,
                Some(&mut device),
                None,
                Some(&mut context),
            )
            .map_err(|e| ScreenCaptureError::InitFailed(format!("D3D11CreateDevice: {e}")))?;

            let device = device
                .ok_or_else(|| ScreenCaptureError::InitFailed("no D3D11 device".into()))?;
            let context = context
                .ok_or_else(|| ScreenCaptureError::InitFailed("no D3D11 context".into()))?;

            let duplication = output
                .DuplicateOutput(&device)
                .map_err(|e| ScreenCaptureError::InitFailed(format!("DuplicateOutput: {e}")))?;

            let mut desc = Default::default();
            duplication.GetDesc(&mut desc);
            let (width, height) = (desc.ModeDesc.Width, desc.ModeDesc.Height);

            let staging = self.make_staging_texture(&device, width, height)?;

            self.device = Some(device);
            self.context = Some(context);
            self.duplication = Some(duplication);
            self.staging = Some(staging);
            self.width = width;
            self.height = height;
        }

        Ok(())
    }

    fn start(&mut self) -> Result<(), ScreenCaptureError> {
        if self.capturing {
            return Ok(());
        }
        if self.duplication.is_none() {
            return Err(ScreenCaptureError::InitFailed("not initialized".into()));
        }
        self.capturing = true;
        Ok(())
    }

    fn get_frame(&mut self, dual_track: bool) -> Result<FrameResult, ScreenCaptureError> {
        let duplication = self
            .duplication
            .as_ref()
            .ok_or_else(|| ScreenCaptureError::InitFailed("not initialized".into()))?;
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| ScreenCaptureError::InitFailed("not initialized".into()))?;
        let staging = self
            .staging
            .as_ref()
            .ok_or_else(|| ScreenCaptureError::InitFailed("not initialized".into()))?;

        let mut frame_info = DXGI_OUTDUPL_FRAME_INFO::default();
        let mut resource: Option<IDXGIResource> = None;

        let acquire = unsafe { duplication.AcquireNextFrame(0, &mut frame_info, &mut resource) };

        let resource = match acquire {
            Ok(()) => resource.ok_or_else(|| {
                ScreenCaptureError::CaptureFailed("AcquireNextFrame returned no resource".into())
            })?,
            Err(e) if e.code() == DXGI_ERROR_WAIT_TIMEOUT => {
                return Ok(match &self.cached_frame {
                    Some(cached) => FrameResult::Frame(VideoFrame {
                        data: cached.clone(),
                        width: self.width,
                        height: self.height,
                    }),
                    None => FrameResult::NoNewFrame,
                });
            }
            Err(e) if e.code() == DXGI_ERROR_ACCESS_LOST => {
                return Err(ScreenCaptureError::AccessLost);
            }
            Err(e) => return Err(ScreenCaptureError::CaptureFailed(e.to_string())),
        };

        let texture: ID3D11Texture2D = resource
            .cast()
            .map_err(|e| ScreenCaptureError::CaptureFailed(format!("texture cast: {e}")))?;

        let buf = unsafe {
            context.CopyResource(staging, &texture);

            let mut mapped = Default::default();
            context
                .Map(staging, 0, D3D11_MAP_READ, 0, Some(&mut mapped))
                .map_err(|e| ScreenCaptureError::CaptureFailed(format!("Map: {e}")))?;

            let row_bytes = self.width as usize * 4;
            let mut buf = vec![0u8; row_bytes * self.height as usize];
            let src = mapped.pData as *const u8;
            let src_pitch = mapped.RowPitch as usize;

            for row in 0..self.height as usize {
                let src_row = std::slice::from_raw_parts(src.add(row * src_pitch), row_bytes);
                // Row order is a behavioral contract, not an oversight: single
                // track mode flips vertically for the encoder path it feeds,
                // dual-track mode does not.
                let dst_row = if dual_track {
                    row
                } else {
                    self.height as usize - 1 - row
                };
                buf[dst_row * row_bytes..(dst_row + 1) * row_bytes].copy_from_slice(src_row);
            }

            context.Unmap(staging, 0);
            buf
        };

        let _ = duplication.ReleaseFrame();

        if buf.len() <= CACHE_CEILING_BYTES {
            self.cached_frame = Some(buf.clone());
        } else {
            self.cached_frame = None;
        }

        Ok(FrameResult::Frame(VideoFrame {
            data: buf,
            width: self.width,
            height: self.height,
        }))
    }

    fn stop(&mut self) {
        self.capturing = false;
    }

    fn cleanup(&mut self) {
        self.cached_frame = None;
        self.staging = None;
        self.duplication = None;
        self.context = None;
        self.device = None;
        self.width = 0;
        self.height = 0;
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
