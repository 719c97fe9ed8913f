use tracing_subscriber::{fmt, EnvFilter};

/// Installs an env-filtered fmt subscriber. For host binaries and tests; a
/// host that already configures tracing can skip this (re-initialization is
/// a no-op).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
