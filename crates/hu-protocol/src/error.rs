//! Protocol error types

use thiserror::Error;

/// Errors that can occur while framing ADB messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Header magic does not match `command ^ 0xFFFFFFFF`
    #[error("Invalid message magic for command {command:#010x}")]
    InvalidMagic { command: u32 },

    /// Unknown command word
    #[error("Unknown command: {0:#010x}")]
    UnknownCommand(u32),

    /// Payload exceeds maximum size
    #[error("Payload too large: {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// Payload checksum does not match the header
    #[error("Checksum mismatch: header says {expected}, payload sums to {actual}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Unknown shell protocol v2 packet id
    #[error("Unknown shell packet id: {0}")]
    UnknownShellPacket(u8),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
