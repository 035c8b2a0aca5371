pub mod models;
pub mod services;
pub mod utils;

/// Mock `ScreenSource`/`AudioSource`/`Muxer` implementations driving the
/// orchestrator's end-to-end scenarios. Available in both test and
/// production builds so integration tests under `tests/` can use them
/// without a feature flag.
pub mod test_support;

pub use utils::logging::init_logging;
