//! Loopback ADB configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Default loopback host
pub const DEFAULT_LOOPBACK_HOST: &str = "127.0.0.1";

/// Default adbd TCP port
pub const DEFAULT_LOOPBACK_PORT: u16 = 5555;

/// Configuration for the loopback ADB channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    /// Host adbd listens on
    pub host: String,

    /// TCP port adbd listens on
    pub port: u16,

    /// TCP connect plus CNXN handshake deadline
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// How long to wait for the user to accept our key on the head unit
    #[serde(with = "duration_secs")]
    pub auth_timeout: Duration,

    /// RSA public key offered when adbd asks for authentication
    /// (the `adbkey.pub` written by the platform tools)
    pub public_key_path: Option<PathBuf>,

    /// Backoff between attempts of `connect_with_retry`
    pub backoff: BackoffConfig,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_LOOPBACK_HOST.to_string(),
            port: DEFAULT_LOOPBACK_PORT,
            connect_timeout: Duration::from_secs(5),
            auth_timeout: Duration::from_secs(30),
            public_key_path: dirs::home_dir().map(|home| home.join(".android").join("adbkey.pub")),
            backoff: BackoffConfig::default(),
        }
    }
}

impl LoopbackConfig {
    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_secs")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_secs")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}
