// 📝 Logging - tracing subscriber shared by both binaries
//
// Logs go to stderr so report output on stdout stays clean.

use tracing_subscriber::EnvFilter;

/// Filter from RUST_LOG when set, else `default_filter`
pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install the global subscriber; a second call is a no-op
pub fn init(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
