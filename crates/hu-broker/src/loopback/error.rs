//! Loopback connection errors

use std::path::PathBuf;
use std::time::Duration;

use hu_protocol::ProtocolError;
use thiserror::Error;

/// Errors talking to the loopback ADB daemon
#[derive(Debug, Error)]
pub enum LoopbackError {
    /// No handle and the single reconnect attempt failed
    #[error("Not connected to local ADB")]
    NotConnected,

    /// TCP connect failed (adbd not listening on the port)
    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// TCP connect or CNXN handshake did not finish in time
    #[error("Connecting to {address} timed out after {timeout:?}")]
    ConnectTimeout { address: String, timeout: Duration },

    /// adbd wants authentication and no public key is configured
    #[error("Device requires authentication but no ADB public key is configured")]
    AuthRequired,

    /// Our key was offered and not accepted
    #[error("Device did not accept our ADB key")]
    AuthRejected,

    /// The configured public key could not be read
    #[error("Failed to read ADB public key {path}: {source}")]
    KeyUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected message during the handshake
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// adbd refused to open the service
    #[error("Device refused service {0:?}")]
    ServiceRefused(String),

    /// adbd closed the TCP connection
    #[error("Connection closed by device")]
    ConnectionClosed,

    /// Framing error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Command did not finish in time
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoopbackError {
    /// Errors that retrying with the same key cannot fix
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            LoopbackError::AuthRequired | LoopbackError::AuthRejected | LoopbackError::KeyUnreadable { .. }
        )
    }
}
