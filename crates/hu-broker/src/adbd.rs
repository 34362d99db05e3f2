//! Wireless ADB toggling
//!
//! adbd listens on TCP when `service.adb.tcp.port` holds a port at the time
//! it starts. Setting the property and restarting adbd needs root in
//! practice: over the loopback channel the restart drops our own
//! connection.

use hu_core::command::ShellCommand;
use hu_core::error::CommandError;
use hu_core::Execution;

use crate::broker::ExecutionBroker;

/// System property holding the adbd TCP port
pub const ADB_TCP_PORT_PROPERTY: &str = "service.adb.tcp.port";

/// Parse `getprop service.adb.tcp.port` output.
///
/// The first non-empty line is the value; empty, `-1`, `0` or garbage
/// means TCP is off.
pub fn parse_tcp_port(output: &str) -> Option<u16> {
    let value = output.lines().map(str::trim).find(|line| !line.is_empty())?;
    match value.parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}

/// Port adbd is configured to listen on, if any.
///
/// Only a spawn failure is trusted as "no answer". The loopback tier
/// without shell v2 reports exit 1 for any output lacking "success", so a
/// plain `5555` arrives as a failure; the output decides instead.
pub async fn adb_tcp_port(broker: &ExecutionBroker) -> Option<u16> {
    let result = broker
        .run_smart(&format!("getprop {}", ADB_TCP_PORT_PROPERTY))
        .await;
    if result.is_spawn_failure() {
        tracing::debug!("getprop failed: {}", result.output);
        return None;
    }
    parse_tcp_port(&result.output)
}

/// Outcome of `set_adb_tcp`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpToggle {
    /// `setprop`, `stop adbd`, `start adbd`, in order
    pub steps: Vec<Execution>,
    /// Port read back afterwards
    pub port: Option<u16>,
}

impl TcpToggle {
    /// Whether the read-back port matches the request
    pub fn applied(&self, enabled: bool, port: u16) -> bool {
        if enabled {
            self.port == Some(port)
        } else {
            self.port.is_none()
        }
    }
}

/// Enable (on `port`) or disable adbd's TCP listener and restart adbd.
///
/// Every step runs even if an earlier one failed; the read-back port tells
/// whether the change took.
pub async fn set_adb_tcp(
    broker: &ExecutionBroker,
    enabled: bool,
    port: u16,
) -> Result<TcpToggle, CommandError> {
    let value = if enabled { port.to_string() } else { "-1".to_string() };
    let commands = [
        ShellCommand::new("setprop")?
            .args([ADB_TCP_PORT_PROPERTY, value.as_str()])?
            .render(),
        ShellCommand::new("stop")?.arg("adbd")?.render(),
        ShellCommand::new("start")?.arg("adbd")?.render(),
    ];

    let mut steps = Vec::with_capacity(commands.len());
    for command in &commands {
        let execution = broker.run_smart_traced(command).await;
        tracing::info!(
            "{} via {}: exit={}",
            command,
            execution.channel,
            execution.result.exit_code
        );
        steps.push(execution);
    }

    let port = adb_tcp_port(broker).await;
    Ok(TcpToggle { steps, port })
}
