//! Exec command implementation

use anyhow::Result;

use hu_broker::ExecutionBroker;

use crate::output::format_execution;

/// Run one command through the broker.
///
/// Returns the command's exit code so the process can exit with it.
pub async fn exec_command(broker: &ExecutionBroker, command: &str, json: bool, connect_adb: bool) -> Result<i32> {
    if connect_adb && !broker.loopback().connect().await {
        tracing::debug!("Local ADB not reachable at {}", broker.loopback().endpoint());
    }

    let execution = broker.run_smart_traced(command).await;
    tracing::info!("Ran on {}", execution.channel);

    if json {
        println!("{}", serde_json::to_string_pretty(&execution)?);
    } else {
        println!("{}", format_execution(&execution));
    }

    broker.loopback().disconnect().await;
    Ok(execution.result.exit_code)
}
