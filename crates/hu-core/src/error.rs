//! Core error types
//!
//! Command execution never surfaces these to callers: every channel folds
//! its failures into a `CommandResult`. They cover the edges around that
//! contract (configuration, command construction).

use std::path::PathBuf;

use thiserror::Error;

/// Errors building a command line from structured arguments
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Package name does not follow Android naming rules
    #[error("Invalid package name: {0:?}")]
    InvalidPackageName(String),

    /// Argument contains a NUL byte, which no channel can transport
    #[error("Argument contains a NUL byte: {0:?}")]
    NulByte(String),

    /// Program name is empty
    #[error("Empty program name")]
    EmptyProgram,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
