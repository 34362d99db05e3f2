//! Escalation service channel
//!
//! The escalation service is a separate process holding ADB-shell
//! privileges (Shizuku on the head units). How that process is reached is
//! hidden behind `EscalationBackend`; the default backend drives Shizuku's
//! `rish` shell tool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hu_core::config::{EscalationConfig, ExecutionConfig};
use hu_core::{ChannelClient, CommandResult, ExecutionChannel};
use thiserror::Error;

use super::process::run_shell;
use crate::heuristics::infer_escalation_exit_code;

/// What an escalation backend hands back for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationOutput {
    /// Native exit status, when the backend can observe one
    pub exit_code: Option<i32>,
    /// Combined output
    pub output: String,
}

/// Errors reaching the escalation service
#[derive(Debug, Error)]
pub enum EscalationError {
    /// The service is not running or has not granted us access
    #[error("Escalation service unavailable: {0}")]
    Unavailable(String),

    /// The request could not be delivered
    #[error("Escalation request failed: {0}")]
    Transport(String),
}

/// Capability interface to an external privilege-escalation service
#[async_trait]
pub trait EscalationBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Whether the service is running and has granted us access.
    /// Must return `false` rather than fail.
    async fn ping(&self) -> bool;

    /// Run one command inside the service
    async fn exec(&self, command: &str) -> Result<EscalationOutput, EscalationError>;
}

/// Shizuku's `rish` tool, invoked as `rish -c <command>`
#[derive(Debug, Clone)]
pub struct RishBackend {
    rish_path: PathBuf,
    command_timeout: Duration,
    probe_timeout: Duration,
}

impl RishBackend {
    /// Create a rish backend
    pub fn new(config: &EscalationConfig, execution: &ExecutionConfig) -> Self {
        Self {
            rish_path: config.rish_path.clone(),
            command_timeout: execution.command_timeout,
            probe_timeout: execution.probe_timeout,
        }
    }
}

#[async_trait]
impl EscalationBackend for RishBackend {
    fn name(&self) -> &str {
        "rish"
    }

    async fn ping(&self) -> bool {
        run_shell(&self.rish_path, "id", self.probe_timeout)
            .await
            .is_success()
    }

    async fn exec(&self, command: &str) -> Result<EscalationOutput, EscalationError> {
        let result = run_shell(&self.rish_path, command, self.command_timeout).await;
        if result.is_spawn_failure() {
            return Err(EscalationError::Unavailable(result.output));
        }
        Ok(EscalationOutput {
            exit_code: Some(result.exit_code),
            output: result.output,
        })
    }
}

/// `ChannelClient` over an `EscalationBackend`
#[derive(Clone)]
pub struct EscalationChannel {
    backend: Arc<dyn EscalationBackend>,
}

impl EscalationChannel {
    /// Wrap a backend
    pub fn new(backend: Arc<dyn EscalationBackend>) -> Self {
        Self { backend }
    }

    /// Channel over the default `rish` backend
    pub fn rish(config: &EscalationConfig, execution: &ExecutionConfig) -> Self {
        Self::new(Arc::new(RishBackend::new(config, execution)))
    }
}

#[async_trait]
impl ChannelClient for EscalationChannel {
    fn channel(&self) -> ExecutionChannel {
        ExecutionChannel::EscalationService
    }

    async fn is_available(&self) -> bool {
        let available = self.backend.ping().await;
        tracing::debug!("Escalation probe via {}: available={}", self.backend.name(), available);
        available
    }

    async fn execute(&self, command: &str) -> CommandResult {
        match self.backend.exec(command).await {
            Ok(out) => {
                let output = out.output.trim().to_string();
                let exit_code = out
                    .exit_code
                    .unwrap_or_else(|| infer_escalation_exit_code(&output));
                CommandResult::new(exit_code, output)
            }
            Err(e) => {
                tracing::warn!("{} backend failed: {}", self.backend.name(), e);
                CommandResult::spawn_failure(e)
            }
        }
    }
}
