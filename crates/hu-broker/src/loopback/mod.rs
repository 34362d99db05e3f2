//! Loopback ADB connection
//!
//! A head unit with wireless debugging enabled runs `adbd` on
//! `127.0.0.1:5555`. Talking to it from on-device gives ADB-shell
//! privileges without root. `LoopbackConnection` owns at most one live
//! handle to that endpoint, creates it lazily, and drops it as soon as the
//! transport misbehaves so the next call reconnects.

mod adb;
mod error;
mod reconnect;

pub use adb::{key_fingerprint, load_public_key, AdbDevice, AdbTransport};
pub use error::LoopbackError;
pub use reconnect::ExponentialBackoff;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hu_core::config::{BrokerConfig, DEFAULT_LOOPBACK_HOST, DEFAULT_LOOPBACK_PORT};
use tokio::sync::Mutex;

/// Returned by `execute` when no connection can be made
pub const LOOPBACK_UNAVAILABLE: &str = "Error: Local ADB not connected. Enable Wireless ADB first.";

/// Command used to check that a handle still works
const LIVENESS_COMMAND: &str = "echo 1";

/// Output of one shell request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellResponse {
    /// Merged stdout + stderr, trimmed
    pub output: String,
    /// Native exit status; `None` when the device lacks shell protocol v2
    pub exit_code: Option<i32>,
}

/// A live connection able to run shell commands
#[async_trait]
pub trait ShellHandle: Send + Sync {
    /// Run one command to completion
    async fn shell(&self, command: &str) -> Result<ShellResponse, LoopbackError>;

    /// Run `command` only if no other request holds the transport.
    ///
    /// `None` means the handle is busy with another command.
    async fn try_shell(&self, command: &str) -> Option<Result<ShellResponse, LoopbackError>> {
        Some(self.shell(command).await)
    }

    /// Close the connection; errors are ignored
    async fn close(&self);
}

/// Opens `ShellHandle`s to an endpoint
#[async_trait]
pub trait LoopbackTransport: Send + Sync {
    /// Connect and complete any handshake
    async fn open(&self, host: &str, port: u16) -> Result<Arc<dyn ShellHandle>, LoopbackError>;
}

/// Lifecycle of the connection slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopbackState {
    /// Never connected, or disconnected on request
    Absent,
    /// A connect attempt is in flight
    Connecting,
    /// A handle is stored
    Connected,
    /// The last connect failed or the handle was dropped after an error
    Broken,
}

impl fmt::Display for LoopbackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopbackState::Absent => "absent",
            LoopbackState::Connecting => "connecting",
            LoopbackState::Connected => "connected",
            LoopbackState::Broken => "broken",
        };
        f.write_str(s)
    }
}

struct Slot {
    handle: Option<Arc<dyn ShellHandle>>,
    state: LoopbackState,
}

/// Lazily created, self-healing handle to the loopback ADB endpoint.
///
/// The slot lock is only held to read or swap the handle, never across
/// network I/O.
pub struct LoopbackConnection {
    host: String,
    port: u16,
    transport: Arc<dyn LoopbackTransport>,
    command_timeout: Duration,
    probe_timeout: Duration,
    slot: Mutex<Slot>,
}

impl LoopbackConnection {
    /// Create a connection to the default endpoint over `transport`
    pub fn new(transport: Arc<dyn LoopbackTransport>) -> Self {
        Self {
            host: DEFAULT_LOOPBACK_HOST.to_string(),
            port: DEFAULT_LOOPBACK_PORT,
            transport,
            command_timeout: Duration::from_secs(120),
            probe_timeout: Duration::from_secs(5),
            slot: Mutex::new(Slot {
                handle: None,
                state: LoopbackState::Absent,
            }),
        }
    }

    /// Create a connection speaking the ADB protocol, as configured
    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::new(Arc::new(AdbTransport::from_config(&config.loopback)))
            .with_endpoint(&config.loopback.host, config.loopback.port)
            .with_timeouts(config.execution.command_timeout, config.execution.probe_timeout)
    }

    /// Override the endpoint
    pub fn with_endpoint(mut self, host: &str, port: u16) -> Self {
        self.host = host.to_string();
        self.port = port;
        self
    }

    /// Override the command and liveness-probe deadlines
    pub fn with_timeouts(mut self, command: Duration, probe: Duration) -> Self {
        self.command_timeout = command;
        self.probe_timeout = probe;
        self
    }

    /// `host:port` this connection targets
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Current slot state
    pub async fn state(&self) -> LoopbackState {
        self.slot.lock().await.state
    }

    /// Connect if no handle exists. Returns whether a handle is stored.
    ///
    /// Idempotent: with a handle present no network attempt is made.
    pub async fn connect(&self) -> bool {
        self.try_connect().await.is_ok()
    }

    /// Like `connect`, reporting why the attempt failed
    pub async fn try_connect(&self) -> Result<(), LoopbackError> {
        {
            let mut slot = self.slot.lock().await;
            if slot.handle.is_some() {
                return Ok(());
            }
            slot.state = LoopbackState::Connecting;
        }

        tracing::debug!("Connecting to local ADB at {}", self.endpoint());
        match self.transport.open(&self.host, self.port).await {
            Ok(handle) => {
                let mut slot = self.slot.lock().await;
                if slot.handle.is_some() {
                    // Lost a race with another connect; keep the stored one
                    drop(slot);
                    handle.close().await;
                    return Ok(());
                }
                slot.handle = Some(handle);
                slot.state = LoopbackState::Connected;
                tracing::info!("Connected to local ADB at {}", self.endpoint());
                Ok(())
            }
            Err(e) => {
                let mut slot = self.slot.lock().await;
                if slot.handle.is_none() {
                    slot.state = LoopbackState::Broken;
                }
                tracing::warn!("Local ADB connect to {} failed: {}", self.endpoint(), e);
                Err(e)
            }
        }
    }

    /// Retry `try_connect` with backoff, up to `attempts` times.
    ///
    /// Used right after adbd restarts, while its TCP listener comes back.
    /// Authentication failures are returned at once.
    pub async fn connect_with_retry(
        &self,
        mut backoff: ExponentialBackoff,
        attempts: u32,
    ) -> Result<(), LoopbackError> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.try_connect().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_auth() => return Err(e),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    let delay = backoff.next().unwrap_or_default();
                    tracing::warn!(
                        "Connection attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Live check: runs `echo 1` on the stored handle.
    ///
    /// No handle means `false` without touching the network. A handle busy
    /// with another command is alive: that command owns the transport and
    /// reports its own failures. A transport error, or no answer to our own
    /// `echo 1` within the probe deadline, drops the handle so the next call
    /// reconnects.
    pub async fn is_connected(&self) -> bool {
        let Some(handle) = self.current().await else {
            return false;
        };

        match tokio::time::timeout(self.probe_timeout, handle.try_shell(LIVENESS_COMMAND)).await {
            Ok(None) => {
                tracing::debug!("Local ADB busy with another command, treating as alive");
                true
            }
            Ok(Some(Ok(response))) => response.exit_code.unwrap_or(0) == 0,
            Ok(Some(Err(e))) => {
                tracing::debug!("Local ADB liveness check failed: {}", e);
                self.invalidate(&handle).await;
                false
            }
            Err(_) => {
                tracing::debug!("Local ADB did not answer the liveness check in {:?}", self.probe_timeout);
                self.invalidate(&handle).await;
                false
            }
        }
    }

    /// Run a command, reconnecting once if there is no handle
    pub async fn run(&self, command: &str) -> Result<ShellResponse, LoopbackError> {
        let handle = match self.current().await {
            Some(handle) => handle,
            None => {
                self.connect().await;
                self.current().await.ok_or(LoopbackError::NotConnected)?
            }
        };

        match tokio::time::timeout(self.command_timeout, handle.shell(command)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                self.invalidate(&handle).await;
                Err(e)
            }
            Err(_) => {
                self.invalidate(&handle).await;
                Err(LoopbackError::Timeout(self.command_timeout))
            }
        }
    }

    /// Run a command and render the outcome as text.
    ///
    /// A non-zero native exit status is appended as `\n(Exit Code: N)`.
    pub async fn execute(&self, command: &str) -> String {
        match self.run(command).await {
            Ok(ShellResponse {
                output,
                exit_code: Some(code),
            }) if code != 0 => format!("{}\n(Exit Code: {})", output, code),
            Ok(response) => response.output,
            Err(LoopbackError::NotConnected) => LOOPBACK_UNAVAILABLE.to_string(),
            Err(e) => format!("Error executing ADB command: {}", e),
        }
    }

    /// Close the handle, if any. The slot is always cleared.
    pub async fn disconnect(&self) {
        let handle = {
            let mut slot = self.slot.lock().await;
            slot.state = LoopbackState::Absent;
            slot.handle.take()
        };
        if let Some(handle) = handle {
            handle.close().await;
            tracing::info!("Disconnected from local ADB at {}", self.endpoint());
        }
    }

    async fn current(&self) -> Option<Arc<dyn ShellHandle>> {
        self.slot.lock().await.handle.clone()
    }

    /// Drop `handle` from the slot if it is still the stored one
    async fn invalidate(&self, handle: &Arc<dyn ShellHandle>) {
        let removed = {
            let mut slot = self.slot.lock().await;
            match &slot.handle {
                Some(current) if Arc::ptr_eq(current, handle) => {
                    slot.state = LoopbackState::Broken;
                    slot.handle.take()
                }
                _ => None,
            }
        };
        if let Some(handle) = removed {
            tracing::warn!("Dropping broken local ADB connection to {}", self.endpoint());
            handle.close().await;
        }
    }
}

impl fmt::Debug for LoopbackConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackConnection")
            .field("endpoint", &self.endpoint())
            .field("command_timeout", &self.command_timeout)
            .field("probe_timeout", &self.probe_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Counting mock transport

    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Scripted handle: pops queued replies, then answers `("1", Some(0))`
    #[derive(Default)]
    pub struct MockHandle {
        pub replies: std::sync::Mutex<VecDeque<Result<ShellResponse, LoopbackError>>>,
        pub commands: std::sync::Mutex<Vec<String>>,
        pub closed: AtomicBool,
        /// Pretend another command holds the transport
        pub busy: AtomicBool,
    }

    impl MockHandle {
        pub fn push(&self, reply: Result<ShellResponse, LoopbackError>) {
            self.replies.lock().unwrap().push_back(reply);
        }
    }

    #[async_trait]
    impl ShellHandle for MockHandle {
        async fn shell(&self, command: &str) -> Result<ShellResponse, LoopbackError> {
            self.commands.lock().unwrap().push(command.to_string());
            self.replies.lock().unwrap().pop_front().unwrap_or(Ok(ShellResponse {
                output: "1".into(),
                exit_code: Some(0),
            }))
        }

        async fn try_shell(&self, command: &str) -> Option<Result<ShellResponse, LoopbackError>> {
            if self.busy.load(Ordering::SeqCst) {
                return None;
            }
            Some(self.shell(command).await)
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Counts `open` calls; fails while `refuse` is set
    #[derive(Default)]
    pub struct MockTransport {
        pub opens: AtomicUsize,
        pub refuse: AtomicBool,
        pub handles: std::sync::Mutex<Vec<Arc<MockHandle>>>,
    }

    impl MockTransport {
        pub fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }

        pub fn last_handle(&self) -> Arc<MockHandle> {
            self.handles.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl LoopbackTransport for MockTransport {
        async fn open(&self, _host: &str, _port: u16) -> Result<Arc<dyn ShellHandle>, LoopbackError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.refuse.load(Ordering::SeqCst) {
                return Err(LoopbackError::Connect {
                    address: "127.0.0.1:5555".into(),
                    source: std::io::ErrorKind::ConnectionRefused.into(),
                });
            }
            let handle = Arc::new(MockHandle::default());
            self.handles.lock().unwrap().push(handle.clone());
            Ok(handle)
        }
    }
}
