//! Status command implementation

use anyhow::Result;

use hu_broker::ExecutionBroker;

use crate::output::format_report;

/// Probe every channel and print the availability table
pub async fn status_command(broker: &ExecutionBroker, connect_adb: bool, json: bool) -> Result<()> {
    if connect_adb {
        broker.loopback().connect().await;
    }

    let report = broker.probe_all().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", format_report(&report, &broker.loopback().endpoint()));
        println!("Selected: {}", report.selected());
    }

    broker.loopback().disconnect().await;
    Ok(())
}
