use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Random probes the zone type detector sends before giving up (0 = unlimited)
    pub detect_attempts: u32,

    /// Consecutive probes without a new record before a walk is aborted
    pub max_no_progress_retries: u32,

    /// Retries for a single failed query before a walk is aborted
    pub max_query_retries: u32,

    /// Candidate labels hashed per NSEC3 probe while looking for an uncovered region
    pub nsec3_max_hash_attempts: u32,

    /// Blocking tasks used by the dictionary matcher (0 = available parallelism)
    pub dictionary_workers: usize,

    /// Log every probe at debug level
    pub log_probes: bool,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            detect_attempts: 5,
            max_no_progress_retries: 3,
            max_query_retries: 2,
            nsec3_max_hash_attempts: 100_000,
            dictionary_workers: 0,
            log_probes: false,
        }
    }
}

impl WalkConfig {
    /// Create a WalkConfig from environment variables
    /// Returns Err if a variable is present but invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self =
            toml::from_str(&text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `ZONEWALK_*` variables
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_number("ZONEWALK_DETECT_ATTEMPTS")? {
            self.detect_attempts = v;
        }

        if let Some(v) = env_number("ZONEWALK_MAX_NO_PROGRESS_RETRIES")? {
            self.max_no_progress_retries = v;
        }

        if let Some(v) = env_number("ZONEWALK_MAX_QUERY_RETRIES")? {
            self.max_query_retries = v;
        }

        if let Some(v) = env_number("ZONEWALK_NSEC3_MAX_HASH_ATTEMPTS")? {
            self.nsec3_max_hash_attempts = v;
        }

        if let Some(v) = env_number("ZONEWALK_DICTIONARY_WORKERS")? {
            self.dictionary_workers = v;
        }

        if let Ok(log_probes) = std::env::var("ZONEWALK_LOG_PROBES") {
            self.log_probes = parse_bool(&log_probes, false);
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nsec3_max_hash_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "nsec3_max_hash_attempts".to_string(),
                value: "must be greater than 0".to_string(),
            });
        }

        if self.max_no_progress_retries > 1000 {
            return Err(ConfigError::InvalidValue {
                key: "max_no_progress_retries".to_string(),
                value: format!("{} (max 1000)", self.max_no_progress_retries),
            });
        }

        if self.dictionary_workers > 1024 {
            return Err(ConfigError::InvalidValue {
                key: "dictionary_workers".to_string(),
                value: format!("{} (max 1024)", self.dictionary_workers),
            });
        }

        Ok(())
    }

    /// Worker count with 0 resolved to the machine's parallelism
    pub fn effective_workers(&self) -> usize {
        if self.dictionary_workers > 0 {
            self.dictionary_workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

/// Parse a boolean from a string, with a default value for invalid input
fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}
