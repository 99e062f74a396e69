//! Tracing/logging setup.
//!
//! A single init helper rather than scattering `env_logger`-style setup
//! across binaries: the core emits `tracing` spans and events, and callers
//! decide how to subscribe.

use tracing_subscriber::EnvFilter;

/// Initialize a reasonable default subscriber for binaries embedding this
/// crate. Reads `RUST_LOG`, defaulting to `info`. Safe to call at most once;
/// subsequent calls are no-ops (the global default subscriber can only be set
/// once per process).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
