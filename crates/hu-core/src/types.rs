//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exit code reserved for "the execution machinery itself failed"
/// (process could not be spawned, channel unreachable, timeout).
pub const SPAWN_FAILURE_CODE: i32 = -1;

/// Prefix put in front of machinery failure messages
pub const ERROR_PREFIX: &str = "ERROR: ";

/// An execution backend, declared in descending privilege order.
///
/// The declaration order is the broker's preference order: deriving `Ord`
/// makes `PrivilegedLocal` the smallest (most preferred) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionChannel {
    /// Local superuser invocation (`su -c`)
    PrivilegedLocal,
    /// Loopback ADB connection to the device itself
    LoopbackNetwork,
    /// Separate escalation service reached over IPC (Shizuku)
    EscalationService,
    /// The caller's own restricted shell
    UnprivilegedLocal,
}

impl ExecutionChannel {
    /// All channels, most preferred first
    pub const ALL: [ExecutionChannel; 4] = [
        ExecutionChannel::PrivilegedLocal,
        ExecutionChannel::LoopbackNetwork,
        ExecutionChannel::EscalationService,
        ExecutionChannel::UnprivilegedLocal,
    ];

    /// Short label used in logs and tables
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionChannel::PrivilegedLocal => "root",
            ExecutionChannel::LoopbackNetwork => "loopback-adb",
            ExecutionChannel::EscalationService => "escalation",
            ExecutionChannel::UnprivilegedLocal => "shell",
        }
    }

    /// One-line description of the mechanism
    pub fn description(&self) -> &'static str {
        match self {
            ExecutionChannel::PrivilegedLocal => "superuser shell (su -c)",
            ExecutionChannel::LoopbackNetwork => "ADB over TCP to the device itself",
            ExecutionChannel::EscalationService => "escalation service (Shizuku rish)",
            ExecutionChannel::UnprivilegedLocal => "app shell without privileges",
        }
    }
}

impl fmt::Display for ExecutionChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized result of running one command on any channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Process exit code, or `SPAWN_FAILURE_CODE`
    pub exit_code: i32,
    /// Merged stdout + stderr, trimmed; empty when nothing was written
    pub output: String,
}

impl CommandResult {
    /// Create a result
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    /// A machinery failure: `(-1, "ERROR: <message>")`
    pub fn spawn_failure(message: impl fmt::Display) -> Self {
        Self {
            exit_code: SPAWN_FAILURE_CODE,
            output: format!("{}{}", ERROR_PREFIX, message),
        }
    }

    /// Build a result from raw process streams.
    ///
    /// stdout lines come first, then stderr lines, each terminated by a
    /// newline, and the whole text is trimmed.
    pub fn from_streams(exit_code: i32, stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            exit_code,
            output: merge_output(stdout, stderr),
        }
    }

    /// Whether the command ran and exited 0
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Whether the execution machinery failed
    pub fn is_spawn_failure(&self) -> bool {
        self.exit_code == SPAWN_FAILURE_CODE
    }

    /// Classify this result
    pub fn outcome(&self) -> Outcome {
        match self.exit_code {
            0 => Outcome::Success,
            SPAWN_FAILURE_CODE => Outcome::SpawnFailure,
            code => Outcome::CommandFailure(code),
        }
    }

    /// Non-empty output, or `fallback`
    pub fn output_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.output.trim().is_empty() {
            fallback
        } else {
            &self.output
        }
    }
}

/// Classification of a `CommandResult`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Exit code 0
    Success,
    /// The command ran and exited non-zero
    CommandFailure(i32),
    /// The command never ran
    SpawnFailure,
}

/// A result together with the channel that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Channel the broker selected
    pub channel: ExecutionChannel,
    /// What the channel returned
    pub result: CommandResult,
}

/// Merge process streams line by line, stdout first.
pub fn merge_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut merged = String::new();
    for stream in [stdout, stderr] {
        for line in String::from_utf8_lossy(stream).lines() {
            merged.push_str(line);
            merged.push('\n');
        }
    }
    merged.trim().to_string()
}
