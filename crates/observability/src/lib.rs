//! Process-wide logging setup shared by the service binary and tests.

/// Initialize structured logging with the default `info` filter.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init(tracing::DEFAULT_FILTER);
}

/// Tracing subscriber configuration.
pub mod tracing;
