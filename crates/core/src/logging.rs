//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Install a stderr subscriber filtered by `filter`
///
/// Falls back to `info` when the directive does not parse. Calling this
/// more than once keeps the first subscriber.
pub fn init(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
