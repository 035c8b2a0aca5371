//! Media Foundation Sink Writer backed [`Muxer`].
//!
//! Follows the usual acquire/use/release encoder lifecycle: construction
//! validates inputs and opens the sink, per-buffer writes submit samples,
//! `finalize` flushes and closes, and `Drop` cleans up a half-finished
//! writer as a last resort.

use std::path::Path;

use windows::core::{GUID, PCWSTR};
use windows::Win32::Media::MediaFoundation::{
    IMFAttributes, IMFMediaType, IMFSample, IMFSinkWriter, MFAudioFormat_AAC,
    MFAudioFormat_Float, MFAudioFormat_PCM, MFCreateAttributes, MFCreateMediaType,
    MFCreateMemoryBuffer, MFCreateSample, MFCreateSinkWriterFromURL, MFMediaType_Audio,
    MFMediaType_Video, MFSetAttributeRatio, MFSetAttributeSize, MFShutdown, MFStartup,
    MFTranscodeContainerType_MPEG4, MFVideoFormat_H264, MFVideoFormat_RGB32,
    MFVideoInterlace_Progressive, MF_MT_AUDIO_AVG_BYTES_PER_SECOND, MF_MT_AUDIO_BITS_PER_SAMPLE,
    MF_MT_AUDIO_BLOCK_ALIGNMENT, MF_MT_AUDIO_NUM_CHANNELS, MF_MT_AUDIO_SAMPLES_PER_SECOND,
    MF_MT_AVG_BITRATE, MF_MT_FRAME_RATE, MF_MT_FRAME_SIZE, MF_MT_INTERLACE_MODE,
    MF_MT_MAJOR_TYPE, MF_MT_SUBTYPE, MF_READWRITE_DISABLE_CONVERTERS,
    MF_SINK_WRITER_DISABLE_THROTTLING, MF_READWRITE_ENABLE_HARDWARE_TRANSFORMS, MF_LOW_LATENCY,
    MF_TRANSCODE_CONTAINERTYPE, MF_VERSION,
};

use super::clock::{AudioClock, VideoClock};
use super::{FinalizeReport, Muxer, MuxerError, MuxerVariant, AUDIO_OUTPUT_BITRATE, COMBINED_TRACK_OUTPUT_SAMPLE_RATE};
use crate::models::AudioFormat;

/// The HRESULT Media Foundation returns from `Finalize` when a stream was
/// declared but never received a sample — tolerated as a successful finalize.
const MF_E_EMPTY_MEDIA_FILE: i32 = -0x3FB9_3A1Bi32; // 0xC00D3A25 as i32

pub struct MfSinkMuxer {
    writer: IMFSinkWriter,
    variant: MuxerVariant,

    video_stream: Option<u32>,
    combined_audio_stream: Option<u32>,
    system_audio_stream: Option<u32>,
    mic_audio_stream: Option<u32>,

    video_clock: Option<VideoClock>,
    combined_audio_clock: Option<AudioClock>,
    system_audio_clock: Option<AudioClock>,
    mic_audio_clock: Option<AudioClock>,

    width: u32,
    height: u32,
    any_sample_written: bool,
}

fn wide_path(path: &Path) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str().encode_wide().chain(std::iter::once(0)).collect()
}

fn new_attributes(count: u32) -> Result<IMFAttributes, MuxerError> {
    unsafe {
        let mut attrs: Option<IMFAttributes> = None;
        MFCreateAttributes(&mut attrs, count)
            .map_err(|e| MuxerError::InitFailed(format!("MFCreateAttributes: {e}")))?;
        attrs.ok_or_else(|| MuxerError::InitFailed("MFCreateAttributes returned none".into()))
    }
}

fn video_output_type(width: u32, height: u32, fps: u32) -> Result<IMFMediaType, MuxerError> {
    unsafe {
        let mut mt: Option<IMFMediaType> = None;
        MFCreateMediaType(&mut mt).map_err(|e| MuxerError::InitFailed(format!("MFCreateMediaType: {e}")))?;
        let mt = mt.ok_or_else(|| MuxerError::InitFailed("no video output type".into()))?;

        mt.SetGUID(&MF_MT_MAJOR_TYPE, &MFMediaType_Video)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        mt.SetGUID(&MF_MT_SUBTYPE, &MFVideoFormat_H264)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        mt.SetUINT32(&MF_MT_AVG_BITRATE, super::video_bitrate_for_width(width))
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        mt.SetUINT32(&MF_MT_INTERLACE_MODE, MFVideoInterlace_Progressive.0 as u32)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        MFSetAttributeSize(&mt, &MF_MT_FRAME_SIZE, width, height)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        MFSetAttributeRatio(&mt, &MF_MT_FRAME_RATE, fps, 1)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;

        Ok(mt)
    }
}

fn video_input_type(width: u32, height: u32, fps: u32) -> Result<IMFMediaType, MuxerError> {
    unsafe {
        let mut mt: Option<IMFMediaType> = None;
        MFCreateMediaType(&mut mt).map_err(|e| MuxerError::InitFailed(format!("MFCreateMediaType: {e}")))?;
        let mt = mt.ok_or_else(|| MuxerError::InitFailed("no video input type".into()))?;

        mt.SetGUID(&MF_MT_MAJOR_TYPE, &MFMediaType_Video)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        mt.SetGUID(&MF_MT_SUBTYPE, &MFVideoFormat_RGB32)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        MFSetAttributeSize(&mt, &MF_MT_FRAME_SIZE, width, height)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        MFSetAttributeRatio(&mt, &MF_MT_FRAME_RATE, fps, 1)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;

        Ok(mt)
    }
}

fn audio_output_type(sample_rate: u32, channels: u16) -> Result<IMFMediaType, MuxerError> {
    unsafe {
        let mut mt: Option<IMFMediaType> = None;
        MFCreateMediaType(&mut mt).map_err(|e| MuxerError::InitFailed(format!("MFCreateMediaType: {e}")))?;
        let mt = mt.ok_or_else(|| MuxerError::InitFailed("no audio output type".into()))?;

        mt.SetGUID(&MF_MT_MAJOR_TYPE, &MFMediaType_Audio)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        mt.SetGUID(&MF_MT_SUBTYPE, &MFAudioFormat_AAC)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        mt.SetUINT32(&MF_MT_AUDIO_SAMPLES_PER_SECOND, sample_rate)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        mt.SetUINT32(&MF_MT_AUDIO_NUM_CHANNELS, channels as u32)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        mt.SetUINT32(&MF_MT_AUDIO_BITS_PER_SAMPLE, 16)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        mt.SetUINT32(&MF_MT_AVG_BITRATE, AUDIO_OUTPUT_BITRATE)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;

        Ok(mt)
    }
}

fn audio_input_type(fmt: AudioFormat) -> Result<IMFMediaType, MuxerError> {
    unsafe {
        let mut mt: Option<IMFMediaType> = None;
        MFCreateMediaType(&mut mt).map_err(|e| MuxerError::InitFailed(format!("MFCreateMediaType: {e}")))?;
        let mt = mt.ok_or_else(|| MuxerError::InitFailed("no audio input type".into()))?;

        let subtype: GUID = if fmt.is_float { MFAudioFormat_Float } else { MFAudioFormat_PCM };
        let block_align = fmt.channels as u32 * (fmt.bits_per_sample as u32 / 8);
        let byte_rate = block_align * fmt.sample_rate;

        mt.SetGUID(&MF_MT_MAJOR_TYPE, &MFMediaType_Audio)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        mt.SetGUID(&MF_MT_SUBTYPE, &subtype)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        mt.SetUINT32(&MF_MT_AUDIO_SAMPLES_PER_SECOND, fmt.sample_rate)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        mt.SetUINT32(&MF_MT_AUDIO_NUM_CHANNELS, fmt.channels as u32)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        mt.SetUINT32(&MF_MT_AUDIO_BITS_PER_SAMPLE, fmt.bits_per_sample as u32)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        mt.SetUINT32(&MF_MT_AUDIO_BLOCK_ALIGNMENT, block_align)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
        mt.SetUINT32(&MF_MT_AUDIO_AVG_BYTES_PER_SECOND, byte_rate)
            .map_err(|e| MuxerError::InitFailed(e.to_string()))?;

        Ok(mt)
    }
}

fn make_sample(data: &[u8], timestamp: u64, duration: u64) -> Result<IMFSample, MuxerError> {
    unsafe {
        let mut buffer = None;
        MFCreateMemoryBuffer(data.len() as u32, &mut buffer)
            .map_err(|e| MuxerError::SubmitFailed(format!("MFCreateMemoryBuffer: {e}")))?;
        let buffer = buffer.ok_or_else(|| MuxerError::SubmitFailed("no media buffer".into()))?;

        let mut ptr = std::ptr::null_mut();
        buffer
            .Lock(&mut ptr, None, None)
            .map_err(|e| MuxerError::SubmitFailed(format!("IMFMediaBuffer::Lock: {e}")))?;
        std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len());
        buffer
            .Unlock()
            .map_err(|e| MuxerError::SubmitFailed(format!("IMFMediaBuffer::Unlock: {e}")))?;
        buffer
            .SetCurrentLength(data.len() as u32)
            .map_err(|e| MuxerError::SubmitFailed(format!("SetCurrentLength: {e}")))?;

        let mut sample = None;
        MFCreateSample(&mut sample).map_err(|e| MuxerError::SubmitFailed(format!("MFCreateSample: {e}")))?;
        let sample = sample.ok_or_else(|| MuxerError::SubmitFailed("no sample".into()))?;

        sample
            .AddBuffer(&buffer)
            .map_err(|e| MuxerError::SubmitFailed(format!("AddBuffer: {e}")))?;
        sample
            .SetSampleTime(timestamp as i64)
            .map_err(|e| MuxerError::SubmitFailed(format!("SetSampleTime: {e}")))?;
        sample
            .SetSampleDuration(duration as i64)
            .map_err(|e| MuxerError::SubmitFailed(format!("SetSampleDuration: {e}")))?;

        Ok(sample)
    }
}

impl MfSinkMuxer {
    fn add_audio_stream(
        writer: &IMFSinkWriter,
        fmt: AudioFormat,
        sample_rate_for_output: u32,
    ) -> Result<u32, MuxerError> {
        unsafe {
            let output = audio_output_type(sample_rate_for_output, fmt.channels)?;
            let input = audio_input_type(fmt)?;
            let stream_index = writer
                .AddStream(&output)
                .map_err(|e| MuxerError::InitFailed(format!("AddStream (audio): {e}")))?;
            writer
                .SetInputMediaType(stream_index, &input, None)
                .map_err(|e| MuxerError::InitFailed(format!("SetInputMediaType (audio): {e}")))?;
            Ok(stream_index)
        }
    }
}

impl Muxer for MfSinkMuxer {
    fn open(
        variant: MuxerVariant,
        output_path: &Path,
        width: u32,
        height: u32,
        target_fps: u32,
        audio: Option<AudioFormat>,
    ) -> Result<Self, MuxerError> {
        unsafe {
            MFStartup(MF_VERSION, 0).map_err(|e| MuxerError::InitFailed(format!("MFStartup: {e}")))?;
        }

        let result = Self::open_inner(variant, output_path, width, height, target_fps, audio);
        if result.is_err() {
            unsafe {
                let _ = MFShutdown();
            }
        }
        result
    }

    fn add_video(&mut self, buf: &[u8], elapsed_ms: u64) -> Result<(), MuxerError> {
        let _ = elapsed_ms;
        let stream = self
            .video_stream
            .ok_or_else(|| MuxerError::SubmitFailed("no video stream configured".into()))?;
        let clock = self.video_clock.as_mut().expect("video clock present with video stream");

        // The caller's `size` is ignored by design — geometry is derived
        // from the stream's own configured width/height.
        let expected_len = self.width as usize * self.height as usize * 4;
        let payload = if buf.len() == expected_len { buf } else { &buf[..buf.len().min(expected_len)] };

        let (timestamp, duration) = clock.next_sample();
        let sample = make_sample(payload, timestamp, duration)?;
        unsafe {
            self.writer
                .WriteSample(stream, &sample)
                .map_err(|e| MuxerError::SubmitFailed(format!("WriteSample (video): {e}")))?;
        }
        self.any_sample_written = true;
        Ok(())
    }

    fn add_combined_audio(&mut self, buf: &[u8], frames: u32, elapsed_ms: u64) -> Result<(), MuxerError> {
        let _ = elapsed_ms;
        let Some(stream) = self.combined_audio_stream else { return Ok(()) };
        let clock = self.combined_audio_clock.as_mut().expect("combined audio clock present with stream");
        let (timestamp, duration) = clock.next_sample(frames as u64);
        let sample = make_sample(buf, timestamp, duration)?;
        unsafe {
            self.writer
                .WriteSample(stream, &sample)
                .map_err(|e| MuxerError::SubmitFailed(format!("WriteSample (combined audio): {e}")))?;
        }
        self.any_sample_written = true;
        Ok(())
    }

    fn add_system_audio(&mut self, buf: &[u8], frames: u32, elapsed_ms: u64) -> Result<(), MuxerError> {
        let _ = elapsed_ms;
        let stream = self
            .system_audio_stream
            .ok_or_else(|| MuxerError::SubmitFailed("system audio stream not active (not dual-track)".into()))?;
        let clock = self.system_audio_clock.as_mut().expect("system audio clock present with stream");
        let (timestamp, duration) = clock.next_sample(frames as u64);
        let sample = make_sample(buf, timestamp, duration)?;
        unsafe {
            self.writer
                .WriteSample(stream, &sample)
                .map_err(|e| MuxerError::SubmitFailed(format!("WriteSample (system audio): {e}")))?;
        }
        self.any_sample_written = true;
        Ok(())
    }

    fn add_mic_audio(&mut self, buf: &[u8], frames: u32, elapsed_ms: u64) -> Result<(), MuxerError> {
        let _ = elapsed_ms;
        let stream = self
            .mic_audio_stream
            .ok_or_else(|| MuxerError::SubmitFailed("mic audio stream not active (not dual-track)".into()))?;
        let clock = self.mic_audio_clock.as_mut().expect("mic audio clock present with stream");
        let (timestamp, duration) = clock.next_sample(frames as u64);
        let sample = make_sample(buf, timestamp, duration)?;
        unsafe {
            self.writer
                .WriteSample(stream, &sample)
                .map_err(|e| MuxerError::SubmitFailed(format!("WriteSample (mic audio): {e}")))?;
        }
        self.any_sample_written = true;
        Ok(())
    }

    fn finalize(&mut self) -> Result<FinalizeReport, MuxerError> {
        let streams: Vec<(Option<u32>, u64)> = vec![
            (self.video_stream, self.video_clock.map(|c| c.frames_emitted() * c.duration_ticks()).unwrap_or(0)),
            (self.combined_audio_stream, 0),
            (self.system_audio_stream, 0),
            (self.mic_audio_stream, 0),
        ];

        for (stream, _) in streams.iter().filter(|(s, _)| s.is_some()) {
            let stream = stream.unwrap();
            unsafe {
                let _ = self.writer.Flush(stream);
            }
        }

        // End-of-stream tick at the final sample-clock position for every
        // stream that received at least one sample.
        if let (Some(stream), Some(clock)) = (self.video_stream, self.video_clock) {
            if clock.frames_emitted() > 0 {
                let ts = clock.frames_emitted() * clock.duration_ticks();
                unsafe {
                    let _ = self.writer.SendStreamTick(stream, ts as i64);
                }
            }
        }
        for (stream, clock) in [
            (self.combined_audio_stream, self.combined_audio_clock),
            (self.system_audio_stream, self.system_audio_clock),
            (self.mic_audio_stream, self.mic_audio_clock),
        ] {
            if let (Some(stream), Some(clock)) = (stream, clock) {
                if clock.samples_emitted() > 0 {
                    let ts = clock.samples_emitted();
                    unsafe {
                        let _ = self.writer.SendStreamTick(stream, ts as i64);
                    }
                }
            }
        }

        let result = unsafe { self.writer.Finalize() };
        match result {
            Ok(()) => Ok(FinalizeReport { empty_file_note: false }),
            Err(e) if e.code().0 == MF_E_EMPTY_MEDIA_FILE => {
                Ok(FinalizeReport { empty_file_note: true })
            }
            Err(e) => Err(MuxerError::FinalizeFailed(e.to_string())),
        }
    }

    fn cleanup(&mut self) {
        self.video_stream = None;
        self.combined_audio_stream = None;
        self.system_audio_stream = None;
        self.mic_audio_stream = None;
        self.video_clock = None;
        self.combined_audio_clock = None;
        self.system_audio_clock = None;
        self.mic_audio_clock = None;
        self.any_sample_written = false;
        unsafe {
            let _ = MFShutdown();
        }
    }
}

impl MfSinkMuxer {
    fn open_inner(
        variant: MuxerVariant,
        output_path: &Path,
        width: u32,
        height: u32,
        target_fps: u32,
        audio: Option<AudioFormat>,
    ) -> Result<Self, MuxerError> {
        let writer = Self::create_sink_writer(output_path)?;

        let mut me = MfSinkMuxer {
            writer,
            variant,
            video_stream: None,
            combined_audio_stream: None,
            system_audio_stream: None,
            mic_audio_stream: None,
            video_clock: None,
            combined_audio_clock: None,
            system_audio_clock: None,
            mic_audio_clock: None,
            width,
            height,
            any_sample_written: false,
        };

        if variant.has_video() {
            let output = video_output_type(width, height, target_fps)?;
            let input = video_input_type(width, height, target_fps)?;
            unsafe {
                let idx = me
                    .writer
                    .AddStream(&output)
                    .map_err(|e| MuxerError::InitFailed(format!("AddStream (video): {e}")))?;
                me.writer
                    .SetInputMediaType(idx, &input, None)
                    .map_err(|e| MuxerError::InitFailed(format!("SetInputMediaType (video): {e}")))?;
                me.video_stream = Some(idx);
            }
            me.video_clock = Some(VideoClock::new(target_fps));
        }

        match variant {
            MuxerVariant::VideoPlusCombinedAudio | MuxerVariant::AudioOnlySingle => {
                let fmt = audio.ok_or_else(|| MuxerError::InitFailed("combined audio variant needs a format".into()))?;
                let idx = Self::add_audio_stream(&me.writer, fmt, COMBINED_TRACK_OUTPUT_SAMPLE_RATE)?;
                me.combined_audio_stream = Some(idx);
                me.combined_audio_clock = Some(AudioClock::new(COMBINED_TRACK_OUTPUT_SAMPLE_RATE));
            }
            MuxerVariant::VideoPlusDualAudio | MuxerVariant::AudioOnlyDual => {
                let fmt = audio.ok_or_else(|| MuxerError::InitFailed("dual audio variant needs a format".into()))?;
                let sys_idx = Self::add_audio_stream(&me.writer, fmt, fmt.sample_rate)?;
                me.system_audio_stream = Some(sys_idx);
                me.system_audio_clock = Some(AudioClock::new(fmt.sample_rate));

                let mic_idx = Self::add_audio_stream(&me.writer, fmt, fmt.sample_rate)?;
                me.mic_audio_stream = Some(mic_idx);
                me.mic_audio_clock = Some(AudioClock::new(fmt.sample_rate));
            }
            MuxerVariant::VideoOnly => {}
        }

        unsafe {
            me.writer
                .BeginWriting()
                .map_err(|e| MuxerError::InitFailed(format!("BeginWriting: {e}")))?;
        }

        Ok(me)
    }

    fn create_sink_writer(output_path: &Path) -> Result<IMFSinkWriter, MuxerError> {
        unsafe {
            let attrs = new_attributes(4)?;
            // Container-type attribute is load-bearing: omitting it lets
            // the writer pick a default that does not produce a well-formed
            // `moov` atom.
            attrs
                .SetGUID(&MF_TRANSCODE_CONTAINERTYPE, &MFTranscodeContainerType_MPEG4)
                .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
            attrs
                .SetUINT32(&MF_SINK_WRITER_DISABLE_THROTTLING, 1)
                .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
            attrs
                .SetUINT32(&MF_READWRITE_ENABLE_HARDWARE_TRANSFORMS, 1)
                .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
            attrs
                .SetUINT32(&MF_LOW_LATENCY, 1)
                .map_err(|e| MuxerError::InitFailed(e.to_string()))?;
            attrs
                .SetUINT32(&MF_READWRITE_DISABLE_CONVERTERS, 0)
                .map_err(|e| MuxerError::InitFailed(e.to_string()))?;

            let wide = wide_path(output_path);
            MFCreateSinkWriterFromURL(PCWSTR(wide.as_ptr()), None, &attrs)
                .map_err(|e| MuxerError::InitFailed(format!("MFCreateSinkWriterFromURL: {e}")))
        }
    }
}

impl Drop for MfSinkMuxer {
    fn drop(&mut self) {
        self.cleanup();
    }
}
