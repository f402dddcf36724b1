//! Logging setup.
//!
//! Call sites use the `log` macros; this installs a `tracing-subscriber`
//! formatter as the backend.  Its `tracing-log` bridge picks up `log`
//! records, so both facades end up on stderr.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const DEFAULT_FILTER: &str = "info";

/// Explicit filter first, then `RUST_LOG`, then [`DEFAULT_FILTER`].
pub fn filter(explicit: Option<&str>) -> Result<EnvFilter> {
    match explicit {
        Some(spec) => {
            EnvFilter::try_new(spec).map_err(|e| anyhow!("invalid log filter '{spec}': {e}"))
        }
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

/// Install the global subscriber.  Fails if one is already installed.
pub fn init(explicit: Option<&str>) -> Result<()> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter(explicit)?)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| anyhow!("logging init failed: {e}"))
}
