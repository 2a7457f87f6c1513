use anyhow::{Context, Result};
use cachecheck_engine::{CheckerConfig, Provider};
use config::{Config, Environment, File};
use dirs::{config_dir, data_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "cachecheck";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite file holding the debrid cache
    pub database_path: PathBuf,

    /// Validity of stored verdicts in seconds
    pub ttl_secs: u64,

    /// Identifiers per provider request
    pub chunk_size: usize,

    /// Providers taking part in checks
    pub enabled_providers: Vec<Provider>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let database_path = data_dir()
            .map(|dir| dir.join(APP_DIR).join("debridcache.db"))
            .unwrap_or_else(|| PathBuf::from("debridcache.db"));
        Self {
            database_path,
            ttl_secs: 3600,
            chunk_size: 100,
            enabled_providers: Provider::ALL.to_vec(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        if let Some(path) = config_path.map(Path::to_path_buf).or_else(Self::default_config_path) {
            if path.exists() {
                builder = builder.add_source(File::from(path));
            }
        }

        // CACHECHECK_TTL_SECS=60, CACHECHECK_ENABLED_PROVIDERS=rd,pm
        builder = builder.add_source(
            Environment::with_prefix("CACHECHECK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("enabled_providers"),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Get default configuration file path
    pub fn default_config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Explicit path if given, otherwise the default location.
    pub fn resolve_path(config_path: Option<&Path>) -> Result<PathBuf> {
        config_path
            .map(Path::to_path_buf)
            .or_else(Self::default_config_path)
            .context("No configuration path available")
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, toml_string).context("Failed to write configuration file")?;

        Ok(())
    }

    /// Reset configuration to defaults and save
    pub fn reset(config_path: Option<&Path>) -> Result<PathBuf> {
        let path = Self::resolve_path(config_path)?;
        Self::default().save(&path)?;
        Ok(path)
    }

    /// Show current configuration as a formatted string
    pub fn show(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration for display")
    }

    /// Checker settings equivalent to this file.
    pub fn checker_config(&self) -> CheckerConfig {
        CheckerConfig::default()
            .with_enabled_providers(self.enabled_providers.iter().copied())
            .with_chunk_size(self.chunk_size)
            .with_default_ttl(Duration::from_secs(self.ttl_secs))
    }
}
