//! Unprivileged shell channel

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use hu_core::config::{ExecutionConfig, UnprivilegedConfig};
use hu_core::{ChannelClient, CommandResult, ExecutionChannel};

use super::process::run_shell;

/// Runs commands in the caller's own shell, without privileges
#[derive(Debug, Clone)]
pub struct LocalShell {
    shell_path: PathBuf,
    command_timeout: Duration,
}

impl LocalShell {
    /// Create a local shell client
    pub fn new(config: &UnprivilegedConfig, execution: &ExecutionConfig) -> Self {
        Self {
            shell_path: config.shell_path.clone(),
            command_timeout: execution.command_timeout,
        }
    }
}

impl Default for LocalShell {
    fn default() -> Self {
        Self::new(&UnprivilegedConfig::default(), &ExecutionConfig::default())
    }
}

#[async_trait]
impl ChannelClient for LocalShell {
    fn channel(&self) -> ExecutionChannel {
        ExecutionChannel::UnprivilegedLocal
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn execute(&self, command: &str) -> CommandResult {
        run_shell(&self.shell_path, command, self.command_timeout).await
    }
}
