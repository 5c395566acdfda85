//! # re-config
//!
//! Layered settings: built-in defaults, then an optional
//! `rate-everything.toml`, then `RATE_EVERYTHING_*` environment variables
//! (nested keys joined with `__`, e.g. `RATE_EVERYTHING_STORE__BACKEND=memory`).
//! A `.env` file is loaded into the environment first.

use std::path::PathBuf;

use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use config::builder::DefaultState;
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE: &str = "rate-everything";
pub const ENV_PREFIX: &str = "RATE_EVERYTHING";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub sqlite_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardSettings {
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub store: StoreSettings,
    pub log: LogSettings,
    pub leaderboard: LeaderboardSettings,
    /// The `.env` file merged into the environment by [`Settings::load`].
    #[serde(skip)]
    pub env_file: Option<PathBuf>,
}

impl Settings {
    /// Loads from `.env`, the optional config file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let env_file = dotenvy::dotenv().ok();
        let builder = defaults()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        let mut settings = Self::build(builder)?;
        settings.env_file = env_file;
        Ok(settings)
    }

    /// Loads from TOML text layered over the defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Self::build(defaults()?.add_source(File::from_str(text, FileFormat::Toml)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.leaderboard.limit == 0 {
            return Err(ConfigError::Invalid(
                "leaderboard.limit must be at least 1".into(),
            ));
        }
        if self.store.backend == StoreBackend::Sqlite && self.store.sqlite_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "store.sqlite_url is required for the sqlite backend".into(),
            ));
        }
        Ok(())
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(Config::builder()
        .set_default("store.backend", "sqlite")?
        .set_default("store.sqlite_url", "sqlite:rate_everything.db")?
        .set_default("log.filter", "info")?
        .set_default("log.json", false)?
        .set_default("leaderboard.limit", 10)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.store.backend, StoreBackend::Sqlite);
        assert_eq!(settings.store.sqlite_url, "sqlite:rate_everything.db");
        assert_eq!(settings.leaderboard.limit, 10);
        assert!(!settings.log.json);
        assert!(settings.env_file.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let settings = Settings::from_toml(
            r#"
            [store]
            backend = "memory"

            [leaderboard]
            limit = 3
            "#,
        )
        .unwrap();
        assert_eq!(settings.store.backend, StoreBackend::Memory);
        assert_eq!(settings.leaderboard.limit, 3);
        assert_eq!(settings.log.filter, "info");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let zero = Settings::from_toml("[leaderboard]\nlimit = 0");
        assert!(matches!(zero, Err(ConfigError::Invalid(_))));

        let no_url = Settings::from_toml("[store]\nsqlite_url = \"  \"");
        assert!(matches!(no_url, Err(ConfigError::Invalid(_))));

        let unknown = Settings::from_toml("[store]\nbackend = \"firebase\"");
        assert!(matches!(unknown, Err(ConfigError::Load(_))));
    }
}
