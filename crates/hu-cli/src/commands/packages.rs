//! Package batch command implementation

use std::collections::BTreeSet;

use anyhow::Result;

use hu_broker::packages::{run_package_batch, PackageAction};
use hu_broker::ExecutionBroker;

use crate::output::{format_batch, print_info};

/// Apply `action` to each package. Returns whether every package succeeded.
pub async fn packages_command(
    broker: &ExecutionBroker,
    action: PackageAction,
    packages: &[String],
    protect: &[String],
) -> Result<bool> {
    let effective = action.for_privilege(
        action != PackageAction::Uninstall || broker.is_privileged_available().await,
    );
    if effective != action {
        print_info(&format!("No root; using {} instead of {}", effective, action));
    }

    let protected: BTreeSet<String> = protect.iter().cloned().collect();
    let report = run_package_batch(broker, effective, packages, &protected).await;
    println!("{}", format_batch(&report));

    Ok(report.failed() == 0)
}
