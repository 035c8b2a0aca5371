//! CLI glue layer. Parses arguments, builds `CaptureParams`, wires
//! status/progress callbacks to the terminal, and installs the Ctrl+C ->
//! cancellation-flag bridge.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use scrcap_core::models::{CaptureParams, Region, SourceMask};
use scrcap_core::utils::filename::{coerce_mp4_extension, default_output_path};
use scrcap_core::utils::format_duration;

#[derive(Parser, Debug)]
#[command(name = "scrcap", about = "Windows desktop capture and muxing core")]
struct Cli {
    /// Output path; default = `YYMMDDHHMMSS.mp4` in the working directory.
    #[arg(short, long = "out")]
    out: Option<PathBuf>,

    /// Duration in whole seconds; 0 = unlimited.
    #[arg(short = 't', long = "time", default_value_t = 0)]
    time: u64,

    /// Enable video capture.
    #[arg(short = 'v', long = "video")]
    video: bool,

    /// Enable system (loopback) audio capture.
    #[arg(short = 's', long = "system")]
    system: bool,

    /// Enable microphone capture.
    #[arg(short = 'm', long = "microphone")]
    microphone: bool,

    #[arg(long = "fps", default_value_t = 30)]
    fps: u32,

    #[arg(long = "monitor", default_value_t = 0)]
    monitor: u32,

    #[arg(long = "cursor", default_value = "on")]
    cursor: String,

    #[arg(long = "region", num_args = 4, value_names = ["X", "Y", "W", "H"])]
    region: Option<Vec<i64>>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = scrcap_core::init_logging() {
        eprintln!("warning: failed to initialize logging: {e}");
    }

    let sources = SourceMask {
        video: cli.video,
        system_audio: cli.system,
        microphone: cli.microphone,
    };

    if !sources.is_valid() {
        eprintln!("error: at least one of -v/-s/-m must be enabled");
        std::process::exit(1);
    }

    if !(1..=120).contains(&cli.fps) {
        eprintln!("error: --fps must be in 1..=120");
        std::process::exit(1);
    }

    let cursor_visible = match cli.cursor.as_str() {
        "on" => true,
        "off" => false,
        other => {
            eprintln!("error: --cursor must be 'on' or 'off', got '{other}'");
            std::process::exit(1);
        }
    };

    let region = cli.region.map(|r| Region {
        x: r[0] as i32,
        y: r[1] as i32,
        w: r[2] as u32,
        h: r[3] as u32,
    });

    let output_path = coerce_mp4_extension(cli.out.unwrap_or_else(|| default_output_path(chrono::Local::now())));

    let params = CaptureParams {
        output_path,
        fps: cli.fps,
        duration_secs: cli.time,
        sources,
        monitor_index: cli.monitor,
        region,
        cursor_visible,
    };

    let cancel_flag = Arc::new(AtomicBool::new(false));
    install_ctrl_c_handler(Arc::clone(&cancel_flag));

    let mut status_cb = |msg: &str| {
        println!("[status] {msg}");
    };
    let mut progress_cb = |frames: u64, elapsed_ms: u64| {
        print!("\rframes={frames} elapsed={}", format_duration(elapsed_ms / 1000));
        use std::io::Write;
        let _ = std::io::stdout().flush();
    };

    let result = run_capture(&params, &mut status_cb, &mut progress_cb, cancel_flag);

    println!();
    match result {
        Ok(stats) => {
            println!(
                "recording finished: {} frames, {} failed, {}",
                stats.total_frames,
                stats.failed_frames,
                format_duration(stats.duration_ms / 1000)
            );
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(target_os = "windows")]
fn run_capture(
    params: &CaptureParams,
    status_cb: &mut dyn FnMut(&str),
    progress_cb: &mut dyn FnMut(u64, u64),
    cancel_flag: Arc<AtomicBool>,
) -> Result<scrcap_core::models::CaptureStats, scrcap_core::models::CaptureError> {
    scrcap_core::services::run_default(params, status_cb, progress_cb, cancel_flag)
}

#[cfg(not(target_os = "windows"))]
fn run_capture(
    _params: &CaptureParams,
    _status_cb: &mut dyn FnMut(&str),
    _progress_cb: &mut dyn FnMut(u64, u64),
    _cancel_flag: Arc<AtomicBool>,
) -> Result<scrcap_core::models::CaptureStats, scrcap_core::models::CaptureError> {
    Err(scrcap_core::models::CaptureError::InitFailed {
        component: scrcap_core::models::Component::Screen,
        reason: "this build was not compiled for Windows".into(),
    })
}

#[cfg(target_os = "windows")]
fn install_ctrl_c_handler(cancel_flag: Arc<AtomicBool>) {
    use windows::Win32::Foundation::BOOL;
    use windows::Win32::System::Console::SetConsoleCtrlHandler;

    static CANCEL_FLAG: std::sync::OnceLock<Arc<AtomicBool>> = std::sync::OnceLock::new();
    let _ = CANCEL_FLAG.set(cancel_flag);

    unsafe extern "system" fn handler(_ctrl_type: u32) -> BOOL {
        if let Some(flag) = CANCEL_FLAG.get() {
            flag.store(true, Ordering::SeqCst);
        }
        BOOL(1)
    }

    unsafe {
        let _ = SetConsoleCtrlHandler(Some(handler), true);
    }
}

#[cfg(not(target_os = "windows"))]
fn install_ctrl_c_handler(_cancel_flag: Arc<AtomicBool>) {}
