use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber with an env-filter. `level` is the fallback
/// directive when RUST_LOG is unset. Repeated calls are no-ops.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
