//! ADB-over-TCP client
//!
//! Just enough of the host side of the ADB protocol to run shell commands:
//! the `CNXN` handshake (offering our public key if the device asks), and
//! one `shell` stream at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use hu_core::config::LoopbackConfig;
use hu_core::types::merge_output;
use hu_protocol::{
    AdbCodec, AdbMessage, AuthType, Command, DeviceBanner, ShellPacketDecoder, ShellPacketId, StreamId,
    FEATURE_SHELL_V2, MAX_PAYLOAD_SIZE,
};
use sha2::{Digest, Sha256};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::{Decoder, Framed};

use super::{LoopbackError, LoopbackTransport, ShellHandle, ShellResponse};

/// Read the `adbkey.pub` contents
pub fn load_public_key(path: &Path) -> Result<String, LoopbackError> {
    std::fs::read_to_string(path)
        .map(|key| key.trim().to_string())
        .map_err(|source| LoopbackError::KeyUnreadable {
            path: path.to_path_buf(),
            source,
        })
}

/// SHA-256 fingerprint of a public key line, as colon-separated hex.
///
/// Only the base64 body is hashed, so the `user@host` comment does not
/// change the fingerprint.
pub fn key_fingerprint(public_key: &str) -> String {
    let body = public_key.split_whitespace().next().unwrap_or_default();
    Sha256::digest(body.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Opens `AdbDevice` connections
#[derive(Debug, Clone)]
pub struct AdbTransport {
    connect_timeout: Duration,
    auth_timeout: Duration,
    public_key_path: Option<PathBuf>,
}

impl AdbTransport {
    /// Create a transport from the loopback configuration
    pub fn from_config(config: &LoopbackConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            auth_timeout: config.auth_timeout,
            public_key_path: config.public_key_path.clone(),
        }
    }
}

#[async_trait]
impl LoopbackTransport for AdbTransport {
    async fn open(&self, host: &str, port: u16) -> Result<Arc<dyn ShellHandle>, LoopbackError> {
        let device = AdbDevice::connect(
            host,
            port,
            self.connect_timeout,
            self.auth_timeout,
            self.public_key_path.as_deref(),
        )
        .await?;
        Ok(Arc::new(device))
    }
}

struct DeviceIo {
    framed: Framed<TcpStream, AdbCodec>,
    next_local_id: u32,
}

impl DeviceIo {
    fn allocate_id(&mut self) -> StreamId {
        let id = self.next_local_id;
        self.next_local_id = self.next_local_id.wrapping_add(1).max(1);
        StreamId::new(id)
    }

    async fn recv(&mut self) -> Result<AdbMessage, LoopbackError> {
        match self.framed.next().await {
            Some(Ok(message)) => Ok(message),
            Some(Err(e)) => Err(e.into()),
            None => Err(LoopbackError::ConnectionClosed),
        }
    }

    async fn send(&mut self, message: AdbMessage) -> Result<(), LoopbackError> {
        self.framed.send(message).await?;
        Ok(())
    }
}

/// An authenticated ADB connection to one device
pub struct AdbDevice {
    io: Mutex<DeviceIo>,
    banner: DeviceBanner,
    shell_v2: bool,
}

impl AdbDevice {
    /// Connect and complete the `CNXN` handshake.
    ///
    /// If the device answers with `AUTH TOKEN` we offer the public key at
    /// `public_key_path` and wait up to `auth_timeout` for the user to
    /// accept it on screen. Token signing is not supported.
    pub async fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        auth_timeout: Duration,
        public_key_path: Option<&Path>,
    ) -> Result<Self, LoopbackError> {
        let address = format!("{}:{}", host, port);

        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| LoopbackError::ConnectTimeout {
                address: address.clone(),
                timeout: connect_timeout,
            })?
            .map_err(|source| LoopbackError::Connect {
                address: address.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;

        let mut io = DeviceIo {
            framed: Framed::new(stream, AdbCodec::new()),
            next_local_id: 1,
        };
        io.send(AdbMessage::connect(MAX_PAYLOAD_SIZE as u32)).await?;

        let mut deadline = tokio::time::Instant::now() + connect_timeout;
        let mut key_offered = false;

        let (banner, max_payload) = loop {
            let message = match tokio::time::timeout_at(deadline, io.recv()).await {
                Ok(Ok(message)) => message,
                Ok(Err(LoopbackError::ConnectionClosed)) if key_offered => {
                    return Err(LoopbackError::AuthRejected)
                }
                Ok(Err(e)) => return Err(e),
                Err(_) if key_offered => return Err(LoopbackError::AuthRejected),
                Err(_) => {
                    return Err(LoopbackError::ConnectTimeout {
                        address,
                        timeout: connect_timeout,
                    })
                }
            };

            match message.command {
                Command::Connect => {
                    let max_payload = (message.arg1 as usize).clamp(1, MAX_PAYLOAD_SIZE);
                    break (DeviceBanner::parse(&message.payload), max_payload);
                }
                Command::Auth if message.auth_type() == Some(AuthType::Token) => {
                    if key_offered {
                        return Err(LoopbackError::AuthRejected);
                    }
                    let path = public_key_path.ok_or(LoopbackError::AuthRequired)?;
                    let key = load_public_key(path)?;
                    tracing::info!(
                        "Device at {} requested authentication; accept key {} on the head unit",
                        address,
                        key_fingerprint(&key)
                    );
                    io.send(AdbMessage::auth_public_key(&key)).await?;
                    key_offered = true;
                    deadline = tokio::time::Instant::now() + auth_timeout;
                }
                other => {
                    return Err(LoopbackError::Handshake(format!(
                        "unexpected {} before CNXN",
                        other
                    )))
                }
            }
        };

        *io.framed.codec_mut() = AdbCodec::with_max_payload(max_payload);
        let shell_v2 = banner.has_feature(FEATURE_SHELL_V2);
        tracing::debug!(
            "ADB handshake with {} done: model={:?} shell_v2={} max_payload={}",
            address,
            banner.model(),
            shell_v2,
            io.framed.codec().max_payload()
        );

        Ok(Self {
            io: Mutex::new(io),
            banner,
            shell_v2,
        })
    }

    /// Banner the device sent in its `CNXN`
    pub fn banner(&self) -> &DeviceBanner {
        &self.banner
    }

    /// Whether commands report a native exit status
    pub fn supports_shell_v2(&self) -> bool {
        self.shell_v2
    }

    /// Run one shell stream to completion on the locked transport
    async fn run_shell(&self, io: &mut DeviceIo, command: &str) -> Result<ShellResponse, LoopbackError> {
        let service = if self.shell_v2 {
            format!("shell,v2,raw:{}", command)
        } else {
            format!("shell:{}", command)
        };

        let local = io.allocate_id();
        io.send(AdbMessage::open(local, &service)).await?;

        let remote = loop {
            let message = io.recv().await?;
            if message.arg1 != local.as_u32() {
                continue;
            }
            match message.command {
                Command::Okay => break StreamId::new(message.arg0),
                Command::Close => return Err(LoopbackError::ServiceRefused(service)),
                _ => continue,
            }
        };

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;
        let mut packets = BytesMut::new();
        let mut decoder = ShellPacketDecoder::new();

        loop {
            let message = io.recv().await?;
            if message.arg1 != local.as_u32() {
                continue;
            }
            match message.command {
                Command::Write => {
                    io.send(AdbMessage::okay(local, remote)).await?;
                    if !self.shell_v2 {
                        stdout.extend_from_slice(&message.payload);
                        continue;
                    }
                    packets.extend_from_slice(&message.payload);
                    while let Some(packet) = decoder.decode(&mut packets)? {
                        match packet.id {
                            ShellPacketId::Stdout => stdout.extend_from_slice(&packet.data),
                            ShellPacketId::Stderr => stderr.extend_from_slice(&packet.data),
                            ShellPacketId::Exit => exit_code = packet.exit_code(),
                            _ => {}
                        }
                    }
                }
                Command::Close => {
                    io.send(AdbMessage::close(local, remote)).await?;
                    break;
                }
                _ => {}
            }
        }

        Ok(ShellResponse {
            output: merge_output(&stdout, &stderr),
            exit_code,
        })
    }
}

#[async_trait]
impl ShellHandle for AdbDevice {
    async fn shell(&self, command: &str) -> Result<ShellResponse, LoopbackError> {
        let mut io = self.io.lock().await;
        self.run_shell(&mut io, command).await
    }

    async fn try_shell(&self, command: &str) -> Option<Result<ShellResponse, LoopbackError>> {
        let mut io = self.io.try_lock().ok()?;
        Some(self.run_shell(&mut io, command).await)
    }

    async fn close(&self) {
        let mut io = self.io.lock().await;
        if let Err(e) = SinkExt::<AdbMessage>::close(&mut io.framed).await {
            tracing::debug!("Error closing ADB connection: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_ignores_comment() {
        let a = key_fingerprint("QAAAAJ3x user@laptop");
        let b = key_fingerprint("QAAAAJ3x unknown@unknown");
        assert_eq!(a, b);
        assert_eq!(a.split(':').count(), 32);
    }

    #[test]
    fn test_load_public_key_trims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adbkey.pub");
        std::fs::write(&path, "QAAAAJ3x user@laptop\n").unwrap();
        assert_eq!(load_public_key(&path).unwrap(), "QAAAAJ3x user@laptop");
    }

    #[test]
    fn test_load_missing_key() {
        let err = load_public_key(Path::new("/nonexistent/adbkey.pub")).unwrap_err();
        assert!(matches!(err, LoopbackError::KeyUnreadable { .. }));
        assert!(err.is_auth());
    }
}
