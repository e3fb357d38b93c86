//! Logging setup for applications embedding trino-link.
//!
//! The crate itself only emits `tracing` events; installing a subscriber is left to the
//! application. This helper covers the common case of logging to stderr.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Builds the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initializes logging to stderr.
///
/// Returns `false` if a global subscriber was already installed, in which case the
/// existing one is left in place.
pub fn init_stderr_logging() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

