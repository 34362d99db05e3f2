//! Configuration management for the broker
//!
//! One TOML file holds a section per channel plus the execution deadlines.
//! Every struct is `#[serde(default)]`, so a partial (or empty) file is valid.

mod channels;
mod loopback;
pub mod serde_utils;

pub use channels::{EscalationConfig, ExecutionConfig, PrivilegedConfig, UnprivilegedConfig};
pub use loopback::{BackoffConfig, LoopbackConfig, DEFAULT_LOOPBACK_HOST, DEFAULT_LOOPBACK_PORT};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hu-shell")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Complete broker configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Superuser channel
    pub privileged: PrivilegedConfig,
    /// Loopback ADB channel
    pub loopback: LoopbackConfig,
    /// Escalation service channel
    pub escalation: EscalationConfig,
    /// Unprivileged shell channel
    pub unprivileged: UnprivilegedConfig,
    /// Deadlines shared by all channels
    pub execution: ExecutionConfig,
}

impl BrokerConfig {
    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match load_config(path) {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(path)) => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loopback.port == 0 {
            return Err(ConfigError::Invalid("loopback.port must be non-zero".into()));
        }
        if self.execution.command_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "execution.command_timeout must be at least 1 second".into(),
            ));
        }
        if self.execution.probe_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "execution.probe_timeout must be at least 1 second".into(),
            ));
        }
        if self.privileged.root_marker.is_empty() {
            return Err(ConfigError::Invalid("privileged.root_marker must not be empty".into()));
        }
        let backoff = &self.loopback.backoff;
        if backoff.multiplier < 1.0 || !(0.0..=1.0).contains(&backoff.jitter) {
            return Err(ConfigError::Invalid(
                "loopback.backoff needs multiplier >= 1.0 and jitter within 0.0..=1.0".into(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: BrokerConfig = toml::from_str("").unwrap();
        assert_eq!(config, BrokerConfig::default());
        assert_eq!(config.loopback.port, DEFAULT_LOOPBACK_PORT);
        assert_eq!(config.execution.command_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let toml_str = r#"
            [loopback]
            port = 5556

            [execution]
            probe_timeout = 2
        "#;
        let config: BrokerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.loopback.port, 5556);
        assert_eq!(config.loopback.host, DEFAULT_LOOPBACK_HOST);
        assert_eq!(config.execution.probe_timeout, Duration::from_secs(2));
        assert_eq!(config.privileged.root_marker, "uid=0");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = BrokerConfig::default();
        config.escalation.rish_path = "/data/local/tmp/rish".into();
        save_config(&path, &config).unwrap();

        let loaded: BrokerConfig = load_config(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            load_config::<BrokerConfig>(&path),
            Err(ConfigError::NotFound(_))
        ));
        assert_eq!(BrokerConfig::load_or_default(&path).unwrap(), BrokerConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = BrokerConfig::default();
        assert!(config.validate().is_ok());
        config.execution.command_timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
