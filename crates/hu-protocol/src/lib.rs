//! hu-protocol: ADB wire protocol for the loopback shell channel
//!
//! This crate defines the binary framing spoken by `adbd` over TCP
//! (24-byte message header plus payload) and the shell protocol v2
//! packet layout carried inside `WRTE` payloads. It knows nothing
//! about connections or retries; see `hu-broker` for that.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod shell;
pub mod stream;

pub use codec::AdbCodec;
pub use error::ProtocolError;
pub use frame::{MessageHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use message::{
    AdbMessage, AuthType, Command, DeviceBanner, ADB_VERSION, HOST_BANNER, FEATURE_SHELL_V2,
};
pub use shell::{ShellPacket, ShellPacketDecoder, ShellPacketId};
pub use stream::StreamId;
