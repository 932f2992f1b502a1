use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "PCSIZE_LOG";

/// Initialize structured logging with environment filter.
/// Set PCSIZE_LOG=debug (or trace, info, warn, error) for verbosity control.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Like [`init_logging`], but falls back to `default_directive` when
/// PCSIZE_LOG is unset or invalid. Logs go to stderr so command output on
/// stdout stays machine-readable.
pub fn init_logging_with_default(default_directive: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .try_init();
}
