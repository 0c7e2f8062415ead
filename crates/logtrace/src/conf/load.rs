//! Load — config loading from file and environment variables.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::error::ConfigError;
use super::model::{Profile, TraceConfig};

pub const CONFIG_FILE_ENV: &str = "LOGTRACE_CONFIG_FILE";
pub const DEFAULT_CONFIG_FILE: &str = "/etc/logtrace/logtrace.toml";

const LOG_DIR_ENV: &str = "LOGTRACE_LOG_DIR";
const POLL_INTERVAL_ENV: &str = "LOGTRACE_POLL_INTERVAL_MS";
const PROFILE_ENV: &str = "LOGTRACE_PROFILE";

impl TraceConfig {
    /// Load configuration from file or environment variables
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!("Config file not found at {}, using environment variables", config_path);
            Self::from_env()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Default source set, with the settings that vary per host taken from the environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Environment variables override file config for critical settings.
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(LOG_DIR_ENV) {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(POLL_INTERVAL_ENV) {
            match raw.trim().parse() {
                Ok(ms) => self.poll_interval_ms = ms,
                Err(_) => tracing::warn!("Ignoring {}={:?}: not a number", POLL_INTERVAL_ENV, raw),
            }
        }
        if let Some(raw) = lookup(PROFILE_ENV) {
            match Profile::parse(&raw) {
                Some(profile) => self.profile = profile,
                None => tracing::warn!("Ignoring {}={:?}: expected production or debug", PROFILE_ENV, raw),
            }
        }
    }

    /// Check that configuration values are sane
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid("poll_interval_ms must be > 0"));
        }
        if self.sources.is_empty() {
            return Err(ConfigError::invalid("at least one source must be configured"));
        }

        let mut names = HashSet::new();
        let mut roles = HashSet::new();
        for source in &self.sources {
            if source.prefix.trim().is_empty() {
                return Err(ConfigError::invalid(format!(
                    "source '{}' has an empty prefix",
                    source.name
                )));
            }
            if source.capacity == 0 {
                return Err(ConfigError::invalid(format!(
                    "source '{}': capacity must be > 0",
                    source.name
                )));
            }
            if !names.insert(source.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            if let Some(role) = source.role {
                if !roles.insert(role) {
                    return Err(ConfigError::invalid(format!(
                        "more than one source has role {}",
                        role.as_str()
                    )));
                }
            }
        }

        let limits = self.correlator_limits();
        if limits.evict_batch == 0 || limits.evict_batch > limits.threshold {
            return Err(ConfigError::invalid(format!(
                "correlator evict_batch must be between 1 and threshold ({}), got {}",
                limits.threshold, limits.evict_batch
            )));
        }
        if limits.history_per_role == 0 {
            return Err(ConfigError::invalid("correlator history_per_role must be > 0"));
        }
        Ok(())
    }
}
