use tracing_subscriber::EnvFilter;

/// Install the tracing subscriber. RUST_LOG controls filtering; the default
/// shows the per-operation sync lines.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
