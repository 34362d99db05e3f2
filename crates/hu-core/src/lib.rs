//! hu-core: Core abstractions and configuration for the head-unit broker
//!
//! This crate provides the shared result contract, the execution channel
//! enumeration, the `ChannelClient` trait every tier implements, and the
//! configuration structures used by the broker and the CLI.

pub mod command;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use command::{quote, PackageName, ShellCommand};
pub use error::{CommandError, ConfigError};
pub use traits::ChannelClient;
pub use types::{CommandResult, Execution, ExecutionChannel, Outcome, SPAWN_FAILURE_CODE};
