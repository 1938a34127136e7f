//! Tracing setup for the binary

use crate::cli::LogLevel;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Target used for the milestone messages every user should see
pub const PROGRESS_TARGET: &str = "progress";

/// Filter directives for a `--log-level`. Progress messages stay visible at
/// every level.
pub fn filter_directives(level: LogLevel) -> String {
    format!("{},{}=info", level.as_str(), PROGRESS_TARGET)
}

/// Install the global subscriber. `RUST_LOG` overrides `--log-level`.
pub fn init_logging(level: LogLevel) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(level)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
