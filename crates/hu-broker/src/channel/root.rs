//! Superuser channel (`su -c`)

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use hu_core::config::{ExecutionConfig, PrivilegedConfig};
use hu_core::{ChannelClient, CommandResult, ExecutionChannel};

use super::process::run_shell;

/// Runs commands through the device's `su` binary
#[derive(Debug, Clone)]
pub struct RootShell {
    su_path: PathBuf,
    root_marker: String,
    command_timeout: Duration,
    probe_timeout: Duration,
}

impl RootShell {
    /// Create a root shell client
    pub fn new(config: &PrivilegedConfig, execution: &ExecutionConfig) -> Self {
        Self {
            su_path: config.su_path.clone(),
            root_marker: config.root_marker.clone(),
            command_timeout: execution.command_timeout,
            probe_timeout: execution.probe_timeout,
        }
    }
}

#[async_trait]
impl ChannelClient for RootShell {
    fn channel(&self) -> ExecutionChannel {
        ExecutionChannel::PrivilegedLocal
    }

    /// `su -c id` must report the root marker (`uid=0`).
    ///
    /// A denied grant, a missing binary or a timeout all read as unavailable.
    async fn is_available(&self) -> bool {
        let probe = run_shell(&self.su_path, "id", self.probe_timeout).await;
        let available = probe.output.contains(&self.root_marker);
        tracing::debug!(
            "Root probe via {}: exit={} available={}",
            self.su_path.display(),
            probe.exit_code,
            available
        );
        available
    }

    async fn execute(&self, command: &str) -> CommandResult {
        run_shell(&self.su_path, command, self.command_timeout).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell_with(su_path: &str, marker: &str) -> RootShell {
        let config = PrivilegedConfig {
            su_path: su_path.into(),
            root_marker: marker.into(),
        };
        RootShell::new(&config, &ExecutionConfig::default())
    }

    #[tokio::test]
    async fn test_missing_su_is_unavailable() {
        let shell = shell_with("/nonexistent/su", "uid=0");
        assert!(!shell.is_available().await);
        assert_eq!(shell.execute("id").await.exit_code, -1);
    }

    #[tokio::test]
    async fn test_marker_decides_availability() {
        // `sh -c id` prints our own uid; match on a marker it always contains
        let shell = shell_with("sh", "uid=");
        assert!(shell.is_available().await);

        let shell = shell_with("sh", "uid=not-a-real-uid");
        assert!(!shell.is_available().await);
    }
}
