//! Tracing initialisation for triagekit embedders.
//!
//! Call [`init_tracing`] once at program start to install the global
//! subscriber with an `EnvFilter` and optional JSON formatting.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// * `json` sends newline-delimited JSON log lines, for aggregation
///   pipelines.
/// * `level` is the default verbosity when `RUST_LOG` is not set.
///
/// `RUST_LOG` takes precedence for fine-grained filtering. Safe to call
/// more than once; only the first call takes effect (the global
/// subscriber can be set once per process).
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}
