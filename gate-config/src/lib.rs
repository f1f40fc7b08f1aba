//! Configuration for the trustgate gateway.
//!
//! Values are layered: built-in defaults, then a JSON file (`trustgate.json`
//! or the path in `TRUSTGATE_CONFIG`), then `TRUSTGATE_*` environment
//! variables with `__` separating nested keys.

#![warn(missing_docs, clippy::pedantic)]

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "trustgate.json";

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "TRUSTGATE_CONFIG";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "TRUSTGATE_";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A provider failed or a value had the wrong shape.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    /// A value was well-formed but unusable.
    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit ANSI colours.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            ansi: true,
        }
    }
}

/// Gateway settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Deadline applied to tools without an override, in milliseconds.
    pub default_timeout_ms: u64,
    /// Per-tool deadline overrides in milliseconds.
    pub tool_timeouts_ms: BTreeMap<String, u64>,
    /// Maximum number of handlers running at once.
    pub max_concurrency: usize,
    /// Whether destructive tools need a confirmation token.
    pub require_confirmation: bool,
    /// Lifetime of minted confirmation tokens, in seconds.
    pub confirmation_ttl_secs: u64,
    /// Audit entries kept in memory; `None` keeps everything.
    pub audit_retention: Option<usize>,
    /// Tools treated as destructive regardless of their metadata.
    pub destructive_tools: BTreeSet<String>,
    /// Log output settings.
    pub logging: LoggingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            tool_timeouts_ms: BTreeMap::new(),
            max_concurrency: 64,
            require_confirmation: false,
            confirmation_ttl_secs: 300,
            audit_retention: Some(10_000),
            destructive_tools: BTreeSet::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a layer fails to parse or validation fails.
    pub fn load() -> ConfigResult<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);
        Self::load_from(path)
    }

    /// Loads configuration using `path` as the file layer. A missing file is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a layer fails to parse or validation fails.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::from_figment(&Self::figment(path))
    }

    /// Builds the provider stack without extracting it.
    #[must_use]
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Json::file(path.as_ref()))
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&["config"])
                    .split("__"),
            )
    }

    /// Extracts and validates configuration from `figment`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when extraction or validation fails.
    pub fn from_figment(figment: &Figment) -> ConfigResult<Self> {
        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        debug!(
            max_concurrency = config.max_concurrency,
            default_timeout_ms = config.default_timeout_ms,
            require_confirmation = config.require_confirmation,
            "gateway configuration loaded"
        );
        Ok(config)
    }

    /// Checks values that parse but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_timeout_ms == 0 {
            return Err(invalid("default_timeout_ms", "must be greater than zero"));
        }
        if self.tool_timeouts_ms.values().any(|ms| *ms == 0) {
            return Err(invalid("tool_timeouts_ms", "overrides must be greater than zero"));
        }
        if self.max_concurrency == 0 {
            return Err(invalid("max_concurrency", "must be greater than zero"));
        }
        if self.confirmation_ttl_secs == 0 {
            return Err(invalid("confirmation_ttl_secs", "must be greater than zero"));
        }
        if self.audit_retention == Some(0) {
            return Err(invalid("audit_retention", "must be greater than zero or null"));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(invalid("logging.filter", "must not be empty"));
        }
        Ok(())
    }

    /// Returns the default deadline.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Returns the per-tool deadline overrides.
    pub fn tool_timeouts(&self) -> impl Iterator<Item = (&str, Duration)> + '_ {
        self.tool_timeouts_ms
            .iter()
            .map(|(name, ms)| (name.as_str(), Duration::from_millis(*ms)))
    }

    /// Returns the executor permit count, clamped to at least one.
    #[must_use]
    pub fn concurrency(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_concurrency).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the confirmation token lifetime.
    #[must_use]
    pub fn confirmation_ttl(&self) -> Duration {
        Duration::from_secs(self.confirmation_ttl_secs)
    }

    /// Returns the audit retention cap.
    #[must_use]
    pub fn retention(&self) -> Option<NonZeroUsize> {
        self.audit_retention.and_then(NonZeroUsize::new)
    }
}

fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_are_valid() {
        let config = GatewayConfig::default();
        config.validate().unwrap();
        assert_eq!(config.default_timeout(), Duration::from_secs(30));
        assert_eq!(config.concurrency().get(), 64);
        assert_eq!(config.retention().map(NonZeroUsize::get), Some(10_000));
        assert!(!config.require_confirmation);
    }

    #[test]
    fn file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"{
                    "max_concurrency": 4,
                    "require_confirmation": true,
                    "tool_timeouts_ms": { "slow": 50 },
                    "destructive_tools": ["delete_file"],
                    "logging": { "filter": "debug" }
                }"#,
            )?;
            jail.set_env("TRUSTGATE_MAX_CONCURRENCY", "8");
            jail.set_env("TRUSTGATE_LOGGING__ANSI", "false");

            let config = GatewayConfig::load().expect("config loads");
            assert_eq!(config.max_concurrency, 8);
            assert!(config.require_confirmation);
            assert_eq!(config.tool_timeouts_ms["slow"], 50);
            assert!(config.destructive_tools.contains("delete_file"));
            assert_eq!(config.logging.filter, "debug");
            assert!(!config.logging.ansi);
            assert_eq!(config.default_timeout_ms, 30_000);
            Ok(())
        });
    }

    #[test]
    fn config_path_env_selects_file() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.json", r#"{ "confirmation_ttl_secs": 5 }"#)?;
            jail.set_env(CONFIG_PATH_ENV, "custom.json");

            let config = GatewayConfig::load().expect("config loads");
            assert_eq!(config.confirmation_ttl(), Duration::from_secs(5));
            Ok(())
        });
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        Jail::expect_with(|_jail| {
            let config = GatewayConfig::load().expect("config loads");
            assert_eq!(config, GatewayConfig::default());
            Ok(())
        });
    }

    #[test]
    fn zero_values_are_rejected() {
        let config = GatewayConfig {
            max_concurrency: 0,
            ..GatewayConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "max_concurrency", .. })
        ));

        Jail::expect_with(|jail| {
            jail.set_env("TRUSTGATE_DEFAULT_TIMEOUT_MS", "0");
            let err = GatewayConfig::load().unwrap_err();
            assert!(err.to_string().contains("default_timeout_ms"));
            Ok(())
        });
    }

    #[test]
    fn malformed_values_surface_as_load_errors() {
        Jail::expect_with(|jail| {
            jail.set_env("TRUSTGATE_MAX_CONCURRENCY", "lots");
            assert!(matches!(GatewayConfig::load(), Err(ConfigError::Load(_))));
            Ok(())
        });
    }
}
