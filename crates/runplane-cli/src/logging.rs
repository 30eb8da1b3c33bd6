use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "RUNPLANE_LOG";

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber, logging to stderr.
///
/// Uses `RUNPLANE_LOG` if set and valid, otherwise `info`.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
