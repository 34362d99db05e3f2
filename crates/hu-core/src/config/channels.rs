//! Per-channel configuration for the process-spawning tiers

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Superuser channel (`su -c`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivilegedConfig {
    /// `su` binary, resolved through `PATH` when not absolute
    pub su_path: PathBuf,

    /// Substring of `id` output proving we are root
    pub root_marker: String,
}

impl Default for PrivilegedConfig {
    fn default() -> Self {
        Self {
            su_path: PathBuf::from("su"),
            root_marker: "uid=0".to_string(),
        }
    }
}

/// Escalation service channel (Shizuku)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// The `rish` shell tool shipped by Shizuku
    pub rish_path: PathBuf,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            rish_path: PathBuf::from("rish"),
        }
    }
}

/// Unprivileged shell channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnprivilegedConfig {
    /// Shell invoked as `<shell_path> -c <command>`
    pub shell_path: PathBuf,
}

impl Default for UnprivilegedConfig {
    fn default() -> Self {
        Self {
            shell_path: PathBuf::from("sh"),
        }
    }
}

/// Deadlines applied to every channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Upper bound on one command
    #[serde(with = "duration_secs")]
    pub command_timeout: Duration,

    /// Upper bound on one availability probe
    #[serde(with = "duration_secs")]
    pub probe_timeout: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(120),
            probe_timeout: Duration::from_secs(5),
        }
    }
}
