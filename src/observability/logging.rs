//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise `LOG_LEVEL` is applied to the
//! operator's own targets. `LOG_FORMAT=json` switches to JSON lines.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Filter directive used when `RUST_LOG` is not set
#[must_use]
pub fn default_directive(log_level: &str) -> String {
    let level = match log_level.trim().to_ascii_lowercase().as_str() {
        level @ ("error" | "warn" | "info" | "debug" | "trace") => level.to_string(),
        _ => "info".to_string(),
    };
    format!("deploy_operator={level},tower_http=info")
}

/// Install the global subscriber
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(log_level: &str, log_format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    let result = if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    result.map_err(|e| anyhow!("Failed to initialize tracing subscriber: {e}"))
}
