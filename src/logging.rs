//! Tracing setup
//!
//! Logs go to stderr so stdout stays free for NDJSON output. The filter is
//! read from `STRESSFLUX_LOG` (EnvFilter syntax) and falls back to the level
//! given by the caller.

use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "STRESSFLUX_LOG";

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Errors emitted when configuring the tracing subscriber.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("tracing has already been initialised")]
    AlreadyInitialised,
    #[error("invalid log filter: {0}")]
    Filter(String),
}

/// Configures the global tracing subscriber.
pub fn init_tracing(default_level: &str) -> Result<(), InitError> {
    INITIALISED
        .set(())
        .map_err(|_| InitError::AlreadyInitialised)?;

    let filter = build_filter(std::env::var(LOG_ENV).ok().as_deref(), default_level)?;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|_| InitError::AlreadyInitialised)
}

fn build_filter(directive: Option<&str>, default_level: &str) -> Result<EnvFilter, InitError> {
    match directive {
        Some(raw) if !raw.trim().is_empty() => {
            EnvFilter::try_new(raw).map_err(|e| InitError::Filter(e.to_string()))
        }
        _ => EnvFilter::try_new(default_level).map_err(|e| InitError::Filter(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_prefers_env_directive() {
        let filter = build_filter(Some("eeg_stress_flux=debug"), "warn").unwrap();
        assert!(filter.to_string().contains("eeg_stress_flux=debug"));

        let filter = build_filter(Some("  "), "warn").unwrap();
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn test_bad_filter_rejected() {
        assert!(build_filter(None, "eeg_stress_flux=loud").is_err());
    }
}
