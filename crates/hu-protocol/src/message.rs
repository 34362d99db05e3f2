//! Message types for the ADB transport protocol
//!
//! Every ADB message is a fixed header (see `frame.rs`) followed by an
//! optional payload. The command word selects the meaning of `arg0`/`arg1`.
//!
//! # Message Flow
//!
//! Sequence used by the loopback shell client:
//!
//! 1. Host sends `CNXN(version, max_payload, "host::features=...")`
//! 2. Device answers `CNXN` (no auth) or `AUTH(TOKEN)`; in the latter case
//!    the host offers `AUTH(RSAPUBLICKEY)` and waits for the user to approve
//! 3. Host sends `OPEN(local_id, 0, "shell,v2,raw:<cmd>\0")`
//! 4. Device answers `OKAY(remote_id, local_id)` or `CLSE(0, local_id)`
//! 5. Device streams `WRTE(remote_id, local_id, data)`; host acks each with `OKAY`
//! 6. Device sends `CLSE(remote_id, local_id)`; host answers `CLSE`

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

use crate::stream::StreamId;

/// Protocol version sent in `CNXN` (`A_VERSION`, checksum-skipping revision)
pub const ADB_VERSION: u32 = 0x0100_0001;

/// Feature name for shell protocol v2 (separate stdout/stderr and exit status)
pub const FEATURE_SHELL_V2: &str = "shell_v2";

/// Banner the host announces in its `CNXN` payload
pub const HOST_BANNER: &str = "host::features=shell_v2,cmd";

/// ADB command words (ASCII, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Command {
    /// `SYNC` (obsolete, never sent by this client)
    Sync = 0x434e_5953,
    /// `CNXN` connection handshake
    Connect = 0x4e58_4e43,
    /// `AUTH` authentication challenge / response
    Auth = 0x4854_5541,
    /// `OPEN` a stream to a service
    Open = 0x4e45_504f,
    /// `OKAY` ready / write acknowledgement
    Okay = 0x5941_4b4f,
    /// `CLSE` close a stream
    Close = 0x4553_4c43,
    /// `WRTE` stream data
    Write = 0x4554_5257,
    /// `STLS` TLS upgrade request
    StartTls = 0x534c_5453,
}

impl Command {
    /// Convert to the raw command word
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// Convert from a raw command word
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x434e_5953 => Some(Self::Sync),
            0x4e58_4e43 => Some(Self::Connect),
            0x4854_5541 => Some(Self::Auth),
            0x4e45_504f => Some(Self::Open),
            0x5941_4b4f => Some(Self::Okay),
            0x4553_4c43 => Some(Self::Close),
            0x4554_5257 => Some(Self::Write),
            0x534c_5453 => Some(Self::StartTls),
            _ => None,
        }
    }

    /// Magic value the header must carry for this command
    pub fn magic(&self) -> u32 {
        self.as_u32() ^ 0xFFFF_FFFF
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Sync => "SYNC",
            Command::Connect => "CNXN",
            Command::Auth => "AUTH",
            Command::Open => "OPEN",
            Command::Okay => "OKAY",
            Command::Close => "CLSE",
            Command::Write => "WRTE",
            Command::StartTls => "STLS",
        };
        f.write_str(name)
    }
}

/// `arg0` of an `AUTH` message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AuthType {
    /// Device challenge containing a random token
    Token = 1,
    /// Host signature over the token
    Signature = 2,
    /// Host public key offered for user approval
    RsaPublicKey = 3,
}

impl AuthType {
    /// Convert from `arg0`
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Token),
            2 => Some(Self::Signature),
            3 => Some(Self::RsaPublicKey),
            _ => None,
        }
    }
}

/// A complete ADB message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdbMessage {
    /// Command word
    pub command: Command,
    /// First argument (meaning depends on command)
    pub arg0: u32,
    /// Second argument (meaning depends on command)
    pub arg1: u32,
    /// Payload bytes
    pub payload: Bytes,
}

impl AdbMessage {
    /// Create a new message
    pub fn new(command: Command, arg0: u32, arg1: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            command,
            arg0,
            arg1,
            payload: payload.into(),
        }
    }

    /// Host handshake: `CNXN(version, max_payload, banner)`
    pub fn connect(max_payload: u32) -> Self {
        Self::new(
            Command::Connect,
            ADB_VERSION,
            max_payload,
            nul_terminated(HOST_BANNER),
        )
    }

    /// Offer the host public key (the contents of `adbkey.pub`)
    pub fn auth_public_key(public_key: &str) -> Self {
        Self::new(
            Command::Auth,
            AuthType::RsaPublicKey as u32,
            0,
            nul_terminated(public_key.trim_end()),
        )
    }

    /// Open a stream to `destination` (e.g. `shell,v2,raw:id`)
    pub fn open(local: StreamId, destination: &str) -> Self {
        Self::new(Command::Open, local.as_u32(), 0, nul_terminated(destination))
    }

    /// Acknowledge readiness / a write
    pub fn okay(local: StreamId, remote: StreamId) -> Self {
        Self::new(Command::Okay, local.as_u32(), remote.as_u32(), Bytes::new())
    }

    /// Write data to the remote end of a stream
    pub fn write(local: StreamId, remote: StreamId, data: impl Into<Bytes>) -> Self {
        Self::new(Command::Write, local.as_u32(), remote.as_u32(), data)
    }

    /// Close a stream
    pub fn close(local: StreamId, remote: StreamId) -> Self {
        Self::new(Command::Close, local.as_u32(), remote.as_u32(), Bytes::new())
    }

    /// Byte-sum checksum of the payload (`data_crc32` field)
    pub fn checksum(&self) -> u32 {
        checksum(&self.payload)
    }

    /// Auth type when this is an `AUTH` message
    pub fn auth_type(&self) -> Option<AuthType> {
        if self.command == Command::Auth {
            AuthType::from_u32(self.arg0)
        } else {
            None
        }
    }
}

/// Byte-sum checksum used by protocol versions before `ADB_VERSION`
pub fn checksum(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |acc, b| acc.wrapping_add(*b as u32))
}

fn nul_terminated(s: &str) -> Bytes {
    let mut v = Vec::with_capacity(s.len() + 1);
    v.extend_from_slice(s.as_bytes());
    v.push(0);
    Bytes::from(v)
}

/// Parsed device banner from the device's `CNXN` payload
///
/// Format: `device::ro.product.name=x;ro.product.model=y;features=shell_v2,cmd`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceBanner {
    /// System type before the first `:` (usually `device`)
    pub system_type: String,
    /// `key=value` properties (minus `features`)
    pub properties: HashMap<String, String>,
    /// Feature list
    pub features: Vec<String>,
}

impl DeviceBanner {
    /// Parse a banner payload (trailing NUL tolerated)
    pub fn parse(payload: &[u8]) -> Self {
        let text = String::from_utf8_lossy(payload);
        let text = text.trim_end_matches('\0');

        let mut parts = text.splitn(3, ':');
        let system_type = parts.next().unwrap_or_default().to_string();
        let _serial = parts.next();
        let props = parts.next().unwrap_or_default();

        let mut properties = HashMap::new();
        let mut features = Vec::new();
        for entry in props.split(';').filter(|e| !e.is_empty()) {
            let Some((key, value)) = entry.split_once('=') else {
                continue;
            };
            if key == "features" {
                features = value
                    .split(',')
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect();
            } else {
                properties.insert(key.to_string(), value.to_string());
            }
        }

        Self {
            system_type,
            properties,
            features,
        }
    }

    /// Whether the device advertises `feature`
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    /// Product model, if announced
    pub fn model(&self) -> Option<&str> {
        self.properties.get("ro.product.model").map(String::as_str)
    }
}
