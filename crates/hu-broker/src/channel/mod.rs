//! Channel client implementations
//!
//! One `ChannelClient` per execution tier. The process-spawning tiers share
//! the runner in `process`.

mod escalation;
mod local;
mod loopback;
mod process;
mod root;

pub use escalation::{EscalationBackend, EscalationChannel, EscalationError, EscalationOutput, RishBackend};
pub use local::LocalShell;
pub use loopback::LoopbackChannel;
pub use root::RootShell;
