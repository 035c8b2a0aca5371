//! Capture orchestrator.
//!
//! The generic [`run`] is the testable core: it is parameterized over the
//! [`ScreenSource`], [`AudioSource`], and [`Muxer`] traits so
//! [`crate::test_support`] mocks can drive the end-to-end scenarios without
//! touching a GPU or an audio device. [`run_default`] is the thin
//! Windows-only wrapper main.rs actually calls, wiring in the real
//! DXGI/WASAPI/Media-Foundation implementations.
//!
//! This is a synchronous, single-thread tight poll rather than an async
//! channel-fed loop: every source performs its own non-blocking I/O and the
//! loop paces video acquisition against a target frame rate while polling
//! audio continuously.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::models::{AudioFormat, AudioSources, CaptureError, CaptureParams, CaptureStats, Component, StreamKind, WatchdogKind};
use crate::services::audio_capture::{AudioCaptureError, AudioRole, AudioSource, GetBufferResult};
use crate::services::muxer::{FinalizeReport, Muxer, MuxerError, MuxerVariant};
use crate::services::screen_capture::{FrameResult, ScreenCaptureError, ScreenSource};

use super::mode_resolver::{resolve_variant, RealizedSources};
use super::watchdog::CancellationBridge;

/// A defensive guard against tight-loop pathologies.
const LOOP_ITERATION_EMERGENCY_CEILING: u64 = 2000;
/// Unlimited recordings are hard-capped by the core at 60s.
const UNLIMITED_DURATION_CEILING_MS: u64 = 60_000;
/// Break with error after 1000 consecutive failures in audio-only mode.
const MAX_CONSECUTIVE_AUDIO_FAILURES: u32 = 1000;
const AUDIO_POLL_SLEEP_MS: u64 = 5;
const PROBE_ATTEMPTS: u32 = 5;
const PROBE_POLL_MS: u64 = 100;

pub type StatusCallback<'a> = dyn FnMut(&str) + 'a;
pub type ProgressCallback<'a> = dyn FnMut(u64, u64) + 'a;

struct AudioSlot<A> {
    source: A,
    failures: u32,
}

/// Generic capture loop — see the module doc for why this is parameterized.
#[allow(clippy::too_many_arguments)]
pub fn run<S, A, M>(
    params: &CaptureParams,
    status_cb: &mut StatusCallback,
    progress_cb: &mut ProgressCallback,
    cancel_flag: Arc<AtomicBool>,
    make_screen: impl FnOnce() -> S,
    make_audio: impl Fn(AudioRole) -> A,
    open_muxer: impl FnOnce(MuxerVariant, &Path, u32, u32, u32, Option<AudioFormat>) -> Result<M, MuxerError>,
) -> Result<CaptureStats, CaptureError>
where
    S: ScreenSource,
    A: AudioSource,
    M: Muxer,
{
    if !params.sources.is_valid() {
        return Err(CaptureError::InitFailed {
            component: Component::Screen,
            reason: "no source enabled".into(),
        });
    }

    let audio_only = params.audio_only_mode();
    let mut stats = CaptureStats::default();

    // --- init phase, step 1: screen source ---
    let mut screen = if !audio_only {
        let mut s = make_screen();
        s.init().map_err(|e| CaptureError::InitFailed {
            component: Component::Screen,
            reason: e.to_string(),
        })?;
        Some(s)
    } else {
        None
    };

    // --- init phase, step 2: audio sources ---
    let wants_system = params.sources.system_audio;
    let wants_mic = params.sources.microphone;

    let mut system_audio = init_audio_source(wants_system, AudioRole::Loopback, &make_audio, status_cb);
    let mut mic_audio = init_audio_source(wants_mic, AudioRole::Microphone, &make_audio, status_cb);

    let any_audio_requested = !matches!(params.audio_sources(), AudioSources::None);
    let any_audio_ok = system_audio.is_some() || mic_audio.is_some();

    if any_audio_requested && !any_audio_ok {
        if audio_only {
            return Err(CaptureError::InitFailed {
                component: Component::SystemAudio,
                reason: "no audio source initialized in audio-only mode".into(),
            });
        } else {
            let err = CaptureError::DownGraded {
                component: Component::SystemAudio,
                reason: "no audio source initialized, continuing video-only".into(),
            };
            warn!(event = "audio_downgraded", error = %err);
            status_cb(&err.to_string());
        }
    }

    // --- init phase, step 4: probe, only when not audio-only ---
    if any_audio_ok && !audio_only {
        if let Some(slot) = system_audio.as_mut() {
            let _ = probe_source(&mut slot.source, false);
        }
        if let Some(slot) = mic_audio.as_mut() {
            let saw_real_frame = probe_source(&mut slot.source, true);
            if !saw_real_frame {
                slot.source.stop();
                slot.source.cleanup();
                mic_audio = None;
                let err = CaptureError::DownGraded {
                    component: Component::Microphone,
                    reason: "probe saw no real frames".into(),
                };
                status_cb(&err.to_string());
            }
        }
    }

    let realized = RealizedSources {
        video_ok: screen.is_some(),
        system_audio_ok: system_audio.is_some(),
        mic_ok: mic_audio.is_some(),
    };
    let variant = resolve_variant(realized).ok_or_else(|| CaptureError::InitFailed {
        component: Component::Muxer,
        reason: "no source combination realized".into(),
    })?;

    // Microphone wins ties when both sources report a mix format.
    let to_audio_format = |mf: crate::services::audio_capture::AudioMixFormat| AudioFormat {
        sample_rate: mf.sample_rate,
        channels: mf.channels,
        bits_per_sample: mf.bits_per_sample,
        is_float: mf.is_float,
    };
    let audio_format = mic_audio
        .as_ref()
        .and_then(|s| s.source.mix_format())
        .map(to_audio_format)
        .or_else(|| system_audio.as_ref().and_then(|s| s.source.mix_format()).map(to_audio_format));

    let (width, height) = screen.as_ref().map(|s| s.dimensions()).unwrap_or((0, 0));

    let mut muxer = open_muxer(variant, &params.output_path, width, height, params.fps, audio_format)
        .map_err(|e| CaptureError::InitFailed { component: Component::Muxer, reason: e.to_string() })?;

    // --- init phase, step 6: start sources ---
    if let Some(s) = screen.as_mut() {
        let _ = s.start();
    }
    if let Some(slot) = system_audio.as_mut() {
        let _ = slot.source.start();
    }
    if let Some(slot) = mic_audio.as_mut() {
        let _ = slot.source.start();
    }

    let bridge = CancellationBridge::arm(Arc::clone(&cancel_flag));
    let start_time = Instant::now();
    status_cb("recording started");

    let dual_track = realized.dual_track();
    let combined_mode = !dual_track && any_audio_ok;

    let mut loop_iterations: u64 = 0;
    let mut last_loop_check = start_time;
    let mut next_frame_time = Duration::ZERO;
    let frame_interval = Duration::from_millis(1000 / params.fps.max(1) as u64);
    let mut watchdog_hit = None;
    let mut fatal_error = None;

    'main: loop {
        loop_iterations += 1;
        let now = Instant::now();
        let elapsed = now.duration_since(start_time);

        if now.duration_since(last_loop_check) >= Duration::from_secs(1) {
            if loop_iterations > LOOP_ITERATION_EMERGENCY_CEILING {
                watchdog_hit = Some(WatchdogKind::LoopFrequency);
                break 'main;
            }
            last_loop_check = now;
            loop_iterations = 0;
        }

        if params.duration_secs > 0 {
            if elapsed >= Duration::from_secs(params.duration_secs) {
                break 'main;
            }
        } else if elapsed > Duration::from_millis(UNLIMITED_DURATION_CEILING_MS) {
            watchdog_hit = Some(WatchdogKind::UnlimitedCeiling);
            break 'main;
        }

        if !audio_only && elapsed >= next_frame_time {
            if let Some(s) = screen.as_mut() {
                match s.get_frame(dual_track) {
                    Ok(FrameResult::Frame(frame)) => {
                        let elapsed_ms = elapsed.as_millis() as u64;
                        if let Err(e) = muxer.add_video(&frame.data, elapsed_ms) {
                            let err = CaptureError::SubmitFailed { stream: StreamKind::Video, reason: e.to_string() };
                            warn!(event = "submit_failed", error = %err);
                        }
                        stats.total_frames += 1;
                        progress_cb(stats.total_frames, elapsed_ms);
                        next_frame_time += frame_interval;
                    }
                    Ok(FrameResult::NoNewFrame) => {
                        stats.failed_frames += 1;
                    }
                    Err(ScreenCaptureError::AccessLost) => {
                        warn!(event = "screen_access_lost", "desktop duplication access lost");
                        stats.failed_frames += 1;
                    }
                    Err(e) => {
                        warn!(event = "screen_capture_error", error = %e);
                        stats.failed_frames += 1;
                    }
                }
            }
        }

        if let Some(slot) = system_audio.as_mut() {
            poll_audio(
                &mut slot.source,
                &mut slot.failures,
                AudioRole::Loopback,
                dual_track,
                combined_mode,
                &mut muxer,
                elapsed,
                &mut stats,
            );
        }
        if let Some(slot) = mic_audio.as_mut() {
            poll_audio(
                &mut slot.source,
                &mut slot.failures,
                AudioRole::Microphone,
                dual_track,
                combined_mode,
                &mut muxer,
                elapsed,
                &mut stats,
            );
        }

        if audio_only {
            let worst = system_audio
                .as_ref()
                .map(|s| s.failures)
                .into_iter()
                .chain(mic_audio.as_ref().map(|s| s.failures))
                .max()
                .unwrap_or(0);
            if worst >= MAX_CONSECUTIVE_AUDIO_FAILURES {
                fatal_error = Some(CaptureError::AudioExhausted { consecutive_failures: worst });
                break 'main;
            }
        }

        if cancel_flag.load(Ordering::SeqCst) {
            stats.cancelled = true;
            break 'main;
        }

        let sleep_for = if any_audio_ok {
            Duration::from_millis(AUDIO_POLL_SLEEP_MS)
        } else {
            let to_next_frame = next_frame_time.saturating_sub(elapsed);
            to_next_frame.clamp(Duration::from_millis(1), Duration::from_millis(AUDIO_POLL_SLEEP_MS))
        };
        std::thread::sleep(sleep_for);
    }

    // --- teardown ---
    if let Some(s) = screen.as_mut() {
        s.stop();
    }
    if let Some(slot) = system_audio.as_mut() {
        slot.source.stop();
    }
    if let Some(slot) = mic_audio.as_mut() {
        slot.source.stop();
    }

    let finalize_result = muxer.finalize();

    if let Some(s) = screen.as_mut() {
        s.cleanup();
    }
    if let Some(slot) = system_audio.as_mut() {
        slot.source.cleanup();
    }
    if let Some(slot) = mic_audio.as_mut() {
        slot.source.cleanup();
    }
    muxer.cleanup();
    bridge.disarm();

    stats.duration_ms = start_time.elapsed().as_millis() as u64;
    stats.audio_enabled = any_audio_ok;
    stats.audio_format = audio_format;
    stats.watchdog_hit = watchdog_hit;

    match finalize_result {
        Ok(FinalizeReport { empty_file_note: true }) => {
            info!(event = "finalize_empty_media", "finalized an empty container, tolerated as success");
            status_cb("recording finalized (no media written)");
        }
        Ok(_) => status_cb("recording finalized"),
        Err(e) => return Err(CaptureError::FinalizeFailed(e.to_string())),
    }

    if let Some(err) = fatal_error {
        warn!(event = "audio_exhausted", error = %err);
        return Err(err);
    }

    if let Some(kind) = stats.watchdog_hit {
        info!(event = "watchdog_hit", kind = ?kind, "recording ended via watchdog, reported as success");
    }

    Ok(stats)
}

fn init_audio_source<A: AudioSource>(
    wanted: bool,
    role: AudioRole,
    make_audio: &impl Fn(AudioRole) -> A,
    status_cb: &mut StatusCallback,
) -> Option<AudioSlot<A>> {
    if !wanted {
        return None;
    }
    let mut source = make_audio(role);
    match source.init() {
        Ok(()) => Some(AudioSlot { source, failures: 0 }),
        Err(e) => {
            let component = match role {
                AudioRole::Loopback => Component::SystemAudio,
                AudioRole::Microphone => Component::Microphone,
            };
            let err = CaptureError::DownGraded { component, reason: e.to_string() };
            warn!(event = "audio_init_downgraded", error = %err);
            status_cb(&err.to_string());
            None
        }
    }
}

/// Up to [`PROBE_ATTEMPTS`] non-blocking polls at [`PROBE_POLL_MS`]
/// intervals. Returns whether a real (non-idle, non-synthesized) frame was
/// observed.
fn probe_source<A: AudioSource>(source: &mut A, require_real_frame: bool) -> bool {
    let _ = source.start();
    let mut saw_real = false;
    for _ in 0..PROBE_ATTEMPTS {
        if let Ok(GetBufferResult::Buffer(buf)) = source.get_buffer() {
            if !buf.synthesized {
                saw_real = true;
            }
        }
        std::thread::sleep(Duration::from_millis(PROBE_POLL_MS));
    }
    source.stop();
    if require_real_frame {
        saw_real
    } else {
        true
    }
}

#[allow(clippy::too_many_arguments)]
fn poll_audio<A: AudioSource, M: Muxer>(
    source: &mut A,
    failures: &mut u32,
    role: AudioRole,
    dual_track: bool,
    combined_mode: bool,
    muxer: &mut M,
    elapsed: Duration,
    stats: &mut CaptureStats,
) {
    let elapsed_ms = elapsed.as_millis() as u64;
    match source.get_buffer() {
        Ok(GetBufferResult::Buffer(buf)) => {
            let submit_result = if dual_track {
                match role {
                    AudioRole::Loopback => muxer.add_system_audio(&buf.data, buf.frames, elapsed_ms),
                    AudioRole::Microphone => muxer.add_mic_audio(&buf.data, buf.frames, elapsed_ms),
                }
            } else if combined_mode {
                muxer.add_combined_audio(&buf.data, buf.frames, elapsed_ms)
            } else {
                Ok(())
            };

            match submit_result {
                Ok(()) => {
                    *failures = 0;
                    match role {
                        AudioRole::Loopback => stats.system_audio_samples += buf.frames as u64,
                        AudioRole::Microphone => stats.mic_audio_samples += buf.frames as u64,
                    }
                }
                Err(e) => {
                    let stream = if dual_track {
                        match role {
                            AudioRole::Loopback => StreamKind::SystemAudio,
                            AudioRole::Microphone => StreamKind::MicAudio,
                        }
                    } else {
                        StreamKind::CombinedAudio
                    };
                    let err = CaptureError::SubmitFailed { stream, reason: e.to_string() };
                    warn!(event = "submit_failed", error = %err);
                    *failures += 1;
                }
            }
        }
        Ok(GetBufferResult::Idle) => {}
        Err(AudioCaptureError::UnsupportedPlatform) => {
            *failures += 1;
        }
        Err(e) => {
            warn!(event = "audio_capture_error", role = ?role, error = %e);
            *failures += 1;
        }
    }
}

/// Real-component entry point used by `main.rs`. Windows-only, since the
/// DXGI/WASAPI/Media-Foundation backends only compile there.
#[cfg(target_os = "windows")]
pub fn run_default(
    params: &CaptureParams,
    status_cb: &mut StatusCallback,
    progress_cb: &mut ProgressCallback,
    cancel_flag: Arc<AtomicBool>,
) -> Result<CaptureStats, CaptureError> {
    use crate::services::audio_capture::WasapiAudioSource;
    use crate::services::muxer::MfSinkMuxer;
    use crate::services::screen_capture::DxgiScreenSource;

    let monitor_index = params.monitor_index;
    run::<DxgiScreenSource, WasapiAudioSource, MfSinkMuxer>(
        params,
        status_cb,
        progress_cb,
        cancel_flag,
        move || DxgiScreenSource::new(monitor_index),
        WasapiAudioSource::new,
        MfSinkMuxer::open,
    )
}
