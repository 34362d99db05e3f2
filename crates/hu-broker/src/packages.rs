//! Per-package enable/disable/uninstall/restore
//!
//! Each package gets its own `pm` invocation through the broker so one bad
//! package cannot fail the rest. There is no rollback: packages already
//! changed stay changed when a later one fails.

use std::collections::BTreeSet;
use std::fmt;

use hu_core::command::{PackageName, ShellCommand};
use hu_core::error::CommandError;
use hu_core::CommandResult;

use crate::broker::ExecutionBroker;

/// What to do with each package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageAction {
    /// `pm disable-user --user 0`
    Disable,
    /// `pm uninstall --user 0` (keeps the APK on the system partition)
    Uninstall,
    /// Reinstall for user 0, then enable
    Restore,
    /// `pm enable`
    Enable,
}

impl PackageAction {
    /// Lowercase verb used in logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            PackageAction::Disable => "disable",
            PackageAction::Uninstall => "uninstall",
            PackageAction::Restore => "restore",
            PackageAction::Enable => "enable",
        }
    }

    /// Uninstall needs root; without it the action degrades to Disable
    pub fn for_privilege(self, has_root: bool) -> Self {
        match self {
            PackageAction::Uninstall if !has_root => PackageAction::Disable,
            other => other,
        }
    }

    /// Whether protected packages are skipped for this action
    pub fn honors_protection(&self) -> bool {
        !matches!(self, PackageAction::Restore)
    }

    /// Shell command applying this action to `package`
    pub fn command(&self, package: &PackageName) -> Result<String, CommandError> {
        let pkg = package.as_str();
        let line = match self {
            PackageAction::Disable => ShellCommand::new("pm")?
                .args(["disable-user", "--user", "0", pkg])?
                .render(),
            PackageAction::Uninstall => ShellCommand::new("pm")?
                .args(["uninstall", "--user", "0", pkg])?
                .render(),
            PackageAction::Restore => ShellCommand::chain(&[
                ShellCommand::new("cmd")?.args(["package", "install-existing", pkg])?,
                ShellCommand::new("pm")?.args(["enable", pkg])?,
            ]),
            PackageAction::Enable => ShellCommand::new("pm")?.args(["enable", pkg])?.render(),
        };
        Ok(line)
    }
}

impl fmt::Display for PackageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What happened to one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
    /// Skipped because it is on the protected list
    Protected,
    /// Skipped because the name is not a valid package name
    InvalidName(CommandError),
    /// The command ran (or failed to) with this result
    Executed(CommandResult),
}

/// One line of a batch report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReport {
    /// Package as given
    pub package: String,
    /// Outcome
    pub outcome: PackageOutcome,
}

impl fmt::Display for PackageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            PackageOutcome::Protected => write!(f, "{} → SKIP (protected)", self.package),
            PackageOutcome::InvalidName(_) => write!(f, "{} → SKIP (invalid name)", self.package),
            PackageOutcome::Executed(result) if result.output.trim().is_empty() => {
                write!(f, "{} → {}", self.package, result.exit_code)
            }
            PackageOutcome::Executed(result) => {
                write!(f, "{} → {} ({})", self.package, result.exit_code, result.output)
            }
        }
    }
}

/// Results of a batch, in input order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Action applied
    pub action: PackageAction,
    /// One entry per input package
    pub entries: Vec<PackageReport>,
}

impl BatchReport {
    /// Packages whose command exited 0
    pub fn succeeded(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(&e.outcome, PackageOutcome::Executed(r) if r.is_success()))
            .count()
    }

    /// Packages that were skipped
    pub fn skipped(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !matches!(e.outcome, PackageOutcome::Executed(_)))
            .count()
    }

    /// Packages whose command ran and did not exit 0
    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded() - self.skipped()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}

/// Apply `action` to each package through `broker`, one command per package.
///
/// Protected packages are skipped for every action except `Restore`.
pub async fn run_package_batch(
    broker: &ExecutionBroker,
    action: PackageAction,
    packages: &[String],
    protected: &BTreeSet<String>,
) -> BatchReport {
    let mut entries = Vec::with_capacity(packages.len());

    for package in packages {
        let outcome = if action.honors_protection() && protected.contains(package) {
            tracing::info!("Skipping protected package {}", package);
            PackageOutcome::Protected
        } else {
            match PackageName::parse(package).and_then(|name| action.command(&name)) {
                Ok(command) => {
                    let execution = broker.run_smart_traced(&command).await;
                    tracing::info!(
                        "{} {} via {}: exit={}",
                        action,
                        package,
                        execution.channel,
                        execution.result.exit_code
                    );
                    PackageOutcome::Executed(execution.result)
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", package, e);
                    PackageOutcome::InvalidName(e)
                }
            }
        };

        entries.push(PackageReport {
            package: package.clone(),
            outcome,
        });
    }

    BatchReport { action, entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::testing::broker;

    fn pkg(name: &str) -> PackageName {
        PackageName::parse(name).unwrap()
    }

    #[test]
    fn test_command_lines() {
        let p = pkg("com.atoto.radio");
        assert_eq!(
            PackageAction::Disable.command(&p).unwrap(),
            "pm disable-user --user 0 com.atoto.radio"
        );
        assert_eq!(
            PackageAction::Uninstall.command(&p).unwrap(),
            "pm uninstall --user 0 com.atoto.radio"
        );
        assert_eq!(
            PackageAction::Restore.command(&p).unwrap(),
            "cmd package install-existing com.atoto.radio && pm enable com.atoto.radio"
        );
        assert_eq!(PackageAction::Enable.command(&p).unwrap(), "pm enable com.atoto.radio");
    }

    #[test]
    fn test_uninstall_degrades_without_root() {
        assert_eq!(PackageAction::Uninstall.for_privilege(false), PackageAction::Disable);
        assert_eq!(PackageAction::Uninstall.for_privilege(true), PackageAction::Uninstall);
        assert_eq!(PackageAction::Restore.for_privilege(false), PackageAction::Restore);
    }

    #[tokio::test]
    async fn test_batch_skips_protected_and_invalid() {
        let (broker, fakes) = broker(true, false, false);
        let packages = vec![
            "com.example.bloat".to_string(),
            "com.android.systemui".to_string(),
            "bad name; reboot".to_string(),
        ];
        let protected: BTreeSet<String> = ["com.android.systemui".to_string()].into();

        let report = run_package_batch(&broker, PackageAction::Disable, &packages, &protected).await;

        assert_eq!(report.entries.len(), 3);
        assert_eq!(report.entries[1].outcome, PackageOutcome::Protected);
        assert!(matches!(report.entries[2].outcome, PackageOutcome::InvalidName(_)));
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.failed(), 0);
        assert_eq!(fakes[0].ran(), vec!["pm disable-user --user 0 com.example.bloat"]);
    }

    #[tokio::test]
    async fn test_restore_ignores_protection() {
        let (broker, fakes) = broker(true, false, false);
        let packages = vec!["com.android.systemui".to_string()];
        let protected: BTreeSet<String> = packages.iter().cloned().collect();

        let report = run_package_batch(&broker, PackageAction::Restore, &packages, &protected).await;
        assert_eq!(report.succeeded(), 1);
        assert_eq!(fakes[0].ran().len(), 1);
    }

    #[test]
    fn test_report_lines() {
        let report = BatchReport {
            action: PackageAction::Disable,
            entries: vec![
                PackageReport {
                    package: "a.b".into(),
                    outcome: PackageOutcome::Executed(CommandResult::new(0, "")),
                },
                PackageReport {
                    package: "c.d".into(),
                    outcome: PackageOutcome::Executed(CommandResult::new(1, "Failure")),
                },
                PackageReport {
                    package: "e.f".into(),
                    outcome: PackageOutcome::Protected,
                },
            ],
        };
        assert_eq!(
            report.to_string(),
            "a.b → 0\nc.d → 1 (Failure)\ne.f → SKIP (protected)\n"
        );
        assert_eq!(report.failed(), 1);
    }
}
