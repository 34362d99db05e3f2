//! Loopback ADB channel

use std::sync::Arc;

use async_trait::async_trait;
use hu_core::{ChannelClient, CommandResult, ExecutionChannel, SPAWN_FAILURE_CODE};

use crate::heuristics::infer_loopback_exit_code;
use crate::loopback::{LoopbackConnection, LoopbackError, LOOPBACK_UNAVAILABLE};

/// `ChannelClient` over a shared `LoopbackConnection`
#[derive(Debug, Clone)]
pub struct LoopbackChannel {
    connection: Arc<LoopbackConnection>,
}

impl LoopbackChannel {
    /// Wrap a connection
    pub fn new(connection: Arc<LoopbackConnection>) -> Self {
        Self { connection }
    }

    /// The underlying connection
    pub fn connection(&self) -> &Arc<LoopbackConnection> {
        &self.connection
    }
}

#[async_trait]
impl ChannelClient for LoopbackChannel {
    fn channel(&self) -> ExecutionChannel {
        ExecutionChannel::LoopbackNetwork
    }

    async fn is_available(&self) -> bool {
        self.connection.is_connected().await
    }

    async fn execute(&self, command: &str) -> CommandResult {
        match self.connection.run(command).await {
            Ok(response) => {
                let exit_code = response
                    .exit_code
                    .unwrap_or_else(|| infer_loopback_exit_code(&response.output));
                CommandResult::new(exit_code, response.output)
            }
            Err(LoopbackError::NotConnected) => {
                CommandResult::new(SPAWN_FAILURE_CODE, LOOPBACK_UNAVAILABLE)
            }
            Err(e) => CommandResult::spawn_failure(e),
        }
    }
}
