//! Observability setup for the gateway.

#![warn(missing_docs, clippy::pedantic)]

use anyhow::{Context, anyhow};
use gate_config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Builds the filter for `config`. `RUST_LOG` wins when it is set and parses.
///
/// # Errors
///
/// Returns an error when the configured directive does not parse.
pub fn env_filter(config: &LoggingConfig) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.filter)
        .with_context(|| format!("invalid log filter `{}`", config.filter))
}

/// Installs the global fmt subscriber.
///
/// # Errors
///
/// Returns an error when the filter is invalid or a global subscriber is
/// already installed.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = env_filter(config)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;
    tracing::debug!(filter = %config.filter, "tracing initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_an_error() {
        let config = LoggingConfig {
            filter: "warn".to_owned(),
            ansi: false,
        };
        init_tracing(&config).unwrap();
        assert!(init_tracing(&config).is_err());
    }

    #[test]
    fn rejects_unparseable_directive() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            filter: "tool=notalevel".to_owned(),
            ansi: false,
        };
        assert!(env_filter(&config).is_err());
    }
}
