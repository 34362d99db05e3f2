//! hu-broker: Privilege-tiered command execution for Android head units
//!
//! For every shell command the broker picks the most privileged channel
//! that is reachable right now (root `su`, loopback ADB, the Shizuku
//! escalation service, or the app's own shell), runs the command there,
//! and hands back a uniform `CommandResult`. Nothing in this crate returns
//! an error for a failed command; failures are folded into the result.

pub mod adbd;
pub mod broker;
pub mod channel;
pub mod heuristics;
pub mod loopback;
pub mod packages;

pub use broker::{BrokerError, ChannelReport, ChannelStatus, ExecutionBroker};
pub use channel::{EscalationBackend, EscalationChannel, LocalShell, LoopbackChannel, RishBackend, RootShell};
pub use loopback::{LoopbackConnection, LoopbackError, LoopbackState, LOOPBACK_UNAVAILABLE};
pub use packages::{run_package_batch, BatchReport, PackageAction, PackageOutcome};
