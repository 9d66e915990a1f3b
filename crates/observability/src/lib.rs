//! Tracing and logging (shared setup).

/// Initialize process-wide tracing/logging from `config`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(config: &LoggingConfig) {
    tracing::init(config);
}

/// Logging configuration.
pub mod logging;

/// Tracing subscriber installation (filters, formatters).
pub mod tracing;

pub use logging::{LogFormat, LoggingConfig};
