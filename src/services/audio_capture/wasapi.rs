//! WASAPI shared-mode capture: same COM lifecycle for loopback and
//! microphone roles, same `GetNextPacketSize`/`GetBuffer`/`ReleaseBuffer`
//! pull loop, same MMCSS registration, pulled synchronously from the
//! orchestrator's own thread
//! rather than through a dedicated capture thread and channel: `init` does
//! the one-time `CoInitializeEx`/`Activate`/`Initialize` sequence and
//! `get_buffer` is a plain non-blocking poll with no inner thread.

use std::time::Instant;

use windows::core::PCWSTR;
use windows::Win32::Media::Audio::{
    eCapture, eConsole, eRender, IAudioCaptureClient, IAudioClient, IMMDeviceEnumerator,
    MMDeviceEnumerator, AUDCLNT_BUFFERFLAGS_SILENT, AUDCLNT_SHAREMODE_SHARED,
    AUDCLNT_STREAMFLAGS_LOOPBACK, AUDCLNT_STREAMFLAGS_NOPERSIST, WAVEFORMATEX,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoTaskMemFree, CoUninitialize, CLSCTX_ALL,
    COINIT_MULTITHREADED,
};
use windows::Win32::System::Threading::AvSetMmThreadCharacteristicsW;

use super::{AudioBuffer, AudioCaptureError, AudioMixFormat, AudioRole, AudioSource, GetBufferResult};
use super::silence::SilenceGenerator;

/// 50ms in 100-nanosecond units — the shared-mode buffer duration
/// requested at `Initialize`. Matches the silence generator's 50ms max
/// chunk size and the orchestrator's polling granularity.
const BUFFER_DURATION_100NS: i64 = 500_000;

pub struct WasapiAudioSource {
    role: AudioRole,
    audio_client: Option<IAudioClient>,
    capture_client: Option<IAudioCaptureClient>,
    mix_format: Option<AudioMixFormat>,
    silence: Option<SilenceGenerator>,
    com_initialized: bool,
}

// SAFETY: the COM objects here are only ever touched from the orchestrator
// thread that calls init/get_buffer/cleanup; the type is Send so it can be
// constructed and handed to the orchestrator but is never shared.
unsafe impl Send for WasapiAudioSource {}

impl WasapiAudioSource {
    pub fn new(role: AudioRole) -> Self {
        Self {
            role,
            audio_client: None,
            capture_client: None,
            mix_format: None,
            silence: None,
            com_initialized: false,
        }
    }

    fn stream_flags(&self) -> windows::Win32::Media::Audio::AUDCLNT_STREAMFLAGS {
        match self.role {
            AudioRole::Loopback => AUDCLNT_STREAMFLAGS_LOOPBACK | AUDCLNT_STREAMFLAGS_NOPERSIST,
            AudioRole::Microphone => AUDCLNT_STREAMFLAGS_NOPERSIST,
        }
    }
}

impl AudioSource for WasapiAudioSource {
    fn init(&mut self) -> Result<(), AudioCaptureError> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| AudioCaptureError::ConfigurationFailed(format!("CoInitializeEx: {e}")))?;
            self.com_initialized = true;

            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(|_| AudioCaptureError::DeviceNotAvailable)?;

            let device = match self.role {
                AudioRole::Loopback => enumerator
                    .GetDefaultAudioEndpoint(eRender, eConsole)
                    .map_err(|_| AudioCaptureError::DeviceNotAvailable)?,
                AudioRole::Microphone => enumerator
                    .GetDefaultAudioEndpoint(eCapture, eConsole)
                    .map_err(|_| AudioCaptureError::DeviceNotAvailable)?,
            };

            let audio_client: IAudioClient = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| AudioCaptureError::ConfigurationFailed(format!("Activate: {e}")))?;

            let mix_format_ptr = audio_client
                .GetMixFormat()
                .map_err(|e| AudioCaptureError::ConfigurationFailed(format!("GetMixFormat: {e}")))?;
            let mix_format = read_mix_format(mix_format_ptr);

            audio_client
                .Initialize(
                    AUDCLNT_SHAREMODE_SHARED,
                    self.stream_flags(),
                    BUFFER_DURATION_100NS,
                    0,
                    mix_format_ptr,
                    None,
                )
                .map_err(|e| {
                    AudioCaptureError::ConfigurationFailed(format!("IAudioClient::Initialize: {e}"))
                })?;

            CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));

            let capture_client: IAudioCaptureClient = audio_client
                .GetService()
                .map_err(|e| AudioCaptureError::ConfigurationFailed(format!("GetService: {e}")))?;

            self.audio_client = Some(audio_client);
            self.capture_client = Some(capture_client);
            self.mix_format = Some(mix_format);
            self.silence = Some(SilenceGenerator::new(mix_format.sample_rate));
        }

        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioCaptureError> {
        let client = self
            .audio_client
            .as_ref()
            .ok_or(AudioCaptureError::ConfigurationFailed("not initialized".into()))?;

        let mut task_index: u32 = 0;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        unsafe {
            let _ = AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index);
            client
                .Start()
                .map_err(|e| AudioCaptureError::CaptureFailed(format!("IAudioClient::Start: {e}")))?;
        }
        Ok(())
    }

    fn get_buffer(&mut self) -> Result<GetBufferResult, AudioCaptureError> {
        let capture_client = self
            .capture_client
            .as_ref()
            .ok_or(AudioCaptureError::ConfigurationFailed("not initialized".into()))?;
        let mix_format = self
            .mix_format
            .ok_or(AudioCaptureError::ConfigurationFailed("not initialized".into()))?;

        let packet_length = unsafe {
            capture_client
                .GetNextPacketSize()
                .map_err(|e| AudioCaptureError::CaptureFailed(format!("GetNextPacketSize: {e}")))?
        };

        if packet_length == 0 {
            let frames = self
                .silence
                .as_mut()
                .expect("silence generator initialized alongside mix format")
                .poll(Instant::now());

            if frames == 0 {
                return Ok(GetBufferResult::Idle);
            }

            let bytes_per_frame =
                mix_format.channels as usize * (mix_format.bits_per_sample as usize / 8);
            let data = vec![0u8; frames as usize * bytes_per_frame];

            return Ok(GetBufferResult::Buffer(AudioBuffer {
                data,
                frames: frames as u32,
                synthesized: true,
            }));
        }

        self.silence
            .as_mut()
            .expect("silence generator initialized alongside mix format")
            .reset();

        let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
        let mut num_frames: u32 = 0;
        let mut flags: u32 = 0;

        unsafe {
            capture_client
                .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                .map_err(|e| AudioCaptureError::CaptureFailed(format!("GetBuffer: {e}")))?;
        }

        let bytes_per_frame =
            mix_format.channels as usize * (mix_format.bits_per_sample as usize / 8);
        let total_bytes = num_frames as usize * bytes_per_frame;

        let data = if flags & AUDCLNT_BUFFERFLAGS_SILENT.0 as u32 != 0 || buffer_ptr.is_null() {
            vec![0u8; total_bytes]
        } else {
            unsafe { std::slice::from_raw_parts(buffer_ptr, total_bytes).to_vec() }
        };

        unsafe {
            capture_client
                .ReleaseBuffer(num_frames)
                .map_err(|e| AudioCaptureError::CaptureFailed(format!("ReleaseBuffer: {e}")))?;
        }

        Ok(GetBufferResult::Buffer(AudioBuffer {
            data,
            frames: num_frames,
            synthesized: false,
        }))
    }

    fn stop(&mut self) {
        if let Some(client) = &self.audio_client {
            unsafe {
                let _ = client.Stop();
            }
        }
    }

    fn cleanup(&mut self) {
        self.capture_client = None;
        self.audio_client = None;
        self.mix_format = None;
        self.silence = None;
        if self.com_initialized {
            unsafe {
                CoUninitialize();
            }
            self.com_initialized = false;
        }
    }

    fn mix_format(&self) -> Option<AudioMixFormat> {
        self.mix_format
    }

    fn role(&self) -> AudioRole {
        self.role
    }
}

fn read_mix_format(ptr: *mut WAVEFORMATEX) -> AudioMixFormat {
    // WAVE_FORMAT_IEEE_FLOAT == 3, WAVE_FORMAT_EXTENSIBLE == 0xFFFE (float
    // vs PCM is then carried in the sub-format GUID, which the mix format
    // on a modern shared-mode endpoint always sets to float).
    const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;
    const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

    unsafe {
        let fmt = &*ptr;
        let is_float =
            fmt.wFormatTag == WAVE_FORMAT_IEEE_FLOAT || fmt.wFormatTag == WAVE_FORMAT_EXTENSIBLE;
        AudioMixFormat {
            sample_rate: fmt.nSamplesPerSec,
            channels: fmt.nChannels,
            bits_per_sample: fmt.wBitsPerSample,
            is_float,
        }
    }
}
