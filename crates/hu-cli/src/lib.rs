//! hu-shell: Command-line interface for the head-unit broker
//!
//! Provides the `hu-shell` CLI for running commands through the
//! privilege-tiered broker, managing the loopback ADB connection and
//! the package batch workflow.

pub mod commands;
pub mod output;
