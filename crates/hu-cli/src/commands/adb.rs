//! Loopback ADB commands

use std::time::Duration;

use anyhow::{bail, Result};

use hu_broker::adbd::{adb_tcp_port, set_adb_tcp};
use hu_broker::loopback::{key_fingerprint, load_public_key, ExponentialBackoff};
use hu_broker::ExecutionBroker;
use hu_core::config::BrokerConfig;

use crate::output::{print_info, print_success, print_warning};

/// Connect to local ADB, optionally retrying for `wait`
pub async fn adb_connect(broker: &ExecutionBroker, config: &BrokerConfig, wait: Option<u64>) -> Result<()> {
    let loopback = broker.loopback();
    let result = match wait {
        Some(secs) if secs > 0 => {
            let backoff = ExponentialBackoff::from_config(&config.loopback.backoff);
            let attempts = backoff.attempts_within(Duration::from_secs(secs));
            loopback.connect_with_retry(backoff, attempts).await
        }
        _ => loopback.try_connect().await,
    };

    match result {
        Ok(()) => {
            if loopback.is_connected().await {
                print_success(&format!("Connected to local ADB at {}", loopback.endpoint()));
                loopback.disconnect().await;
                Ok(())
            } else {
                loopback.disconnect().await;
                bail!("Connected to {} but the device did not answer", loopback.endpoint())
            }
        }
        Err(e) => {
            if e.is_auth() {
                print_info("Set loopback.public_key_path and accept the key on the head unit");
            } else {
                print_info("Enable Wireless ADB first: hu-shell adb enable");
            }
            Err(anyhow::Error::new(e).context(format!("Could not connect to {}", loopback.endpoint())))
        }
    }
}

/// Show adbd TCP port, loopback state and the configured key
pub async fn adb_status(broker: &ExecutionBroker, config: &BrokerConfig) -> Result<()> {
    match adb_tcp_port(broker).await {
        Some(port) => println!("adbd TCP port: {}", port),
        None => println!("adbd TCP port: inactive (USB only)"),
    }

    let loopback = broker.loopback();
    let connected = loopback.connect().await && loopback.is_connected().await;
    println!(
        "Local ADB ({}): {}",
        loopback.endpoint(),
        if connected { "connected".to_string() } else { loopback.state().await.to_string() }
    );
    loopback.disconnect().await;

    match &config.loopback.public_key_path {
        Some(path) => match load_public_key(path) {
            Ok(key) => println!("ADB key: {} ({})", path.display(), key_fingerprint(&key)),
            Err(e) => println!("ADB key: {}", e),
        },
        None => println!("ADB key: not configured"),
    }

    Ok(())
}

/// Enable or disable adbd's TCP listener
pub async fn adb_set_tcp(broker: &ExecutionBroker, enabled: bool, port: u16) -> Result<()> {
    if !broker.is_privileged_available().await {
        print_warning("Root is not available; restarting adbd will probably fail");
    }

    let toggle = set_adb_tcp(broker, enabled, port).await?;
    for step in toggle.steps.iter().filter(|step| !step.result.is_success()) {
        print_warning(&format!(
            "{} step failed (exit {}): {}",
            step.channel,
            step.result.exit_code,
            step.result.output_or("<no output>")
        ));
    }

    if toggle.applied(enabled, port) {
        if enabled {
            print_success(&format!("Wireless ADB active on port {}", port));
        } else {
            print_success("Wireless ADB disabled");
        }
        Ok(())
    } else {
        bail!(
            "adbd TCP port is now {}",
            toggle
                .port
                .map(|p| p.to_string())
                .unwrap_or_else(|| "inactive".to_string())
        )
    }
}
