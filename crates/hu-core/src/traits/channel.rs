//! Channel client trait

use async_trait::async_trait;

use crate::types::{CommandResult, ExecutionChannel};

/// One execution backend the broker can route a command to.
///
/// Implementations never fail at the type level: spawn errors, unreachable
/// endpoints and timeouts all come back as a `CommandResult` with
/// `exit_code == -1`. Both methods are async so callers on an event loop
/// never block on a child process or a socket.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Which tier this client implements
    fn channel(&self) -> ExecutionChannel;

    /// Live availability probe. Not cached; may spawn a process or touch
    /// the network. Must return `false` rather than fail.
    async fn is_available(&self) -> bool;

    /// Run one command and return its normalized result
    async fn execute(&self, command: &str) -> CommandResult;
}
