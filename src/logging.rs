use std::sync::Once;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT_LOGGING: Once = Once::new();

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directives, in `RUST_LOG` syntax.
    pub log_level: String,
}

impl LoggingConfig {
    /// Read `RUST_LOG`, falling back to `warn` (or `debug` when verbose).
    pub fn from_env(verbose: bool) -> Self {
        let fallback = if verbose { "solvo=debug" } else { "warn" };
        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| fallback.to_string()),
        }
    }
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays machine readable. Later calls are no-ops.
pub fn init_logging(config: LoggingConfig) {
    INIT_LOGGING.call_once(|| {
        let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

        let initialized = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init();

        if initialized.is_ok() {
            tracing::debug!(level = %config.log_level, "logging initialized");
        }
    });
}
