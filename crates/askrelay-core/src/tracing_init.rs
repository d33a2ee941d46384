//! Tracing/logging initialization for the relay binary.
//!
//! Log lines go to stderr so stdout stays free for whatever supervises the
//! process. Nothing logged here is ever echoed back to HTTP clients.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Pretty,
    /// One JSON object per line, for log aggregation.
    Json,
}

impl LogFormat {
    pub const fn from_json_flag(log_json: bool) -> Self {
        if log_json { Self::Json } else { Self::Pretty }
    }
}

/// Build the filter directive used when `RUST_LOG` is unset,
/// e.g. `default_directive("askrelay_server", "info")` -> `"askrelay_server=info"`.
pub fn default_directive(target: &str, level: &str) -> String {
    format!("{target}={level}")
}

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- filter used when the `RUST_LOG` env-var is not set.
/// * `format` -- human-readable or JSON output.
pub fn init_tracing(default_filter: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
