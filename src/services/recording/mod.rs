pub mod mode_resolver;
pub mod orchestrator;
pub mod watchdog;

pub use orchestrator::{run, ProgressCallback, StatusCallback};
#[cfg(target_os = "windows")]
pub use orchestrator::run_default;
pub use watchdog::CancellationBridge;
