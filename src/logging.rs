use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Installs a stderr subscriber. `RUST_LOG` takes precedence over `default_level`.
pub fn init(default_level: Level) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
