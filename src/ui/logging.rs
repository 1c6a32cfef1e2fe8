//! ui::logging
//!
//! Tracing subscriber setup.
//!
//! Lines go to stdout with a UTC timestamp and the level, no colours, so
//! that CI logs stay readable. `RUST_LOG` overrides `--log-level` when set;
//! an unparseable level falls back to `info`.

use anyhow::Result;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Timestamp format of every log line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Build the level filter for `log_level`.
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.trim().to_ascii_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber.
///
/// Must be called once, before anything is logged.
pub fn init_tracing(log_level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(ChronoUtc::new(TIMESTAMP_FORMAT.to_string()))
                .with_target(false)
                .with_ansi(false),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_accepts_level_names() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert_eq!(env_filter("DEBUG").to_string(), "debug");
        assert_eq!(env_filter("warn").to_string(), "warn");
    }

    #[test]
    fn bad_level_falls_back_to_info() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert_eq!(env_filter("soos_sca=loud").to_string(), "info");
    }
}
