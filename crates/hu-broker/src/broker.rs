//! Tiered execution broker
//!
//! `run_smart` walks the channels from most to least privileged, runs the
//! command on the first one whose live probe succeeds, and returns that
//! channel's result unchanged. The unprivileged shell is the last resort
//! and is never probed.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use hu_core::config::BrokerConfig;
use hu_core::{ChannelClient, CommandResult, Execution, ExecutionChannel};
use serde::Serialize;
use thiserror::Error;

use crate::channel::{EscalationChannel, LocalShell, LoopbackChannel, RootShell};
use crate::loopback::LoopbackConnection;

/// Errors assembling a broker
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    /// Two clients claim the same channel
    #[error("Duplicate client for channel {0}")]
    DuplicateChannel(ExecutionChannel),

    /// No client for the unprivileged fallback
    #[error("No client for the unprivileged fallback channel")]
    MissingFallback,
}

/// Availability of one channel at probe time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    /// Channel probed
    pub channel: ExecutionChannel,
    /// Probe result
    pub available: bool,
}

/// Result of probing every channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelReport {
    /// One entry per configured channel, most preferred first
    pub channels: Vec<ChannelStatus>,
}

impl ChannelReport {
    /// The channel `run_smart` would pick right now
    pub fn selected(&self) -> ExecutionChannel {
        self.channels
            .iter()
            .find(|status| status.available)
            .map(|status| status.channel)
            .unwrap_or(ExecutionChannel::UnprivilegedLocal)
    }

    /// Whether `channel` was available
    pub fn is_available(&self, channel: ExecutionChannel) -> bool {
        self.channels
            .iter()
            .any(|status| status.channel == channel && status.available)
    }
}

/// Routes commands to the most privileged available channel
pub struct ExecutionBroker {
    /// Probed tiers, most preferred first
    preferred: Vec<Arc<dyn ChannelClient>>,
    /// Unprivileged last resort
    fallback: Arc<dyn ChannelClient>,
    /// Shared loopback connection
    loopback: Arc<LoopbackConnection>,
    /// Upper bound on one probe
    probe_timeout: Duration,
}

impl ExecutionBroker {
    /// Assemble a broker from explicit clients.
    ///
    /// The loopback tier is always built from `loopback`, so `loopback()`
    /// is the connection routing actually uses; passing a
    /// `LoopbackNetwork` client is rejected. Clients are ordered by their
    /// channel and exactly one must be `UnprivilegedLocal`. Missing
    /// privileged tiers are simply skipped.
    pub fn new(
        clients: Vec<Arc<dyn ChannelClient>>,
        loopback: Arc<LoopbackConnection>,
        probe_timeout: Duration,
    ) -> Result<Self, BrokerError> {
        if clients
            .iter()
            .any(|client| client.channel() == ExecutionChannel::LoopbackNetwork)
        {
            return Err(BrokerError::DuplicateChannel(ExecutionChannel::LoopbackNetwork));
        }

        let mut clients = clients;
        clients.push(Arc::new(LoopbackChannel::new(loopback.clone())));
        Self::assemble(clients, loopback, probe_timeout)
    }

    fn assemble(
        mut clients: Vec<Arc<dyn ChannelClient>>,
        loopback: Arc<LoopbackConnection>,
        probe_timeout: Duration,
    ) -> Result<Self, BrokerError> {
        clients.sort_by_key(|client| client.channel());

        for pair in clients.windows(2) {
            if pair[0].channel() == pair[1].channel() {
                return Err(BrokerError::DuplicateChannel(pair[0].channel()));
            }
        }

        let fallback = match clients.pop() {
            Some(client) if client.channel() == ExecutionChannel::UnprivilegedLocal => client,
            _ => return Err(BrokerError::MissingFallback),
        };

        Ok(Self {
            preferred: clients,
            fallback,
            loopback,
            probe_timeout,
        })
    }

    /// Broker over arbitrary tiers, including a scripted loopback tier
    #[cfg(test)]
    pub(crate) fn from_clients(
        clients: Vec<Arc<dyn ChannelClient>>,
        probe_timeout: Duration,
    ) -> Result<Self, BrokerError> {
        Self::assemble(clients, testing::idle_loopback(), probe_timeout)
    }

    /// Wire the real channels from configuration
    pub fn from_config(config: &BrokerConfig) -> Self {
        let loopback = Arc::new(LoopbackConnection::from_config(config));
        let execution = &config.execution;

        Self {
            preferred: vec![
                Arc::new(RootShell::new(&config.privileged, execution)),
                Arc::new(LoopbackChannel::new(loopback.clone())),
                Arc::new(EscalationChannel::rish(&config.escalation, execution)),
            ],
            fallback: Arc::new(LocalShell::new(&config.unprivileged, execution)),
            loopback,
            probe_timeout: execution.probe_timeout,
        }
    }

    /// The shared loopback connection
    pub fn loopback(&self) -> &Arc<LoopbackConnection> {
        &self.loopback
    }

    /// Run `command` on the best available channel
    pub async fn run_smart(&self, command: &str) -> CommandResult {
        self.run_smart_traced(command).await.result
    }

    /// Like `run_smart`, also reporting which channel ran the command
    pub async fn run_smart_traced(&self, command: &str) -> Execution {
        for client in &self.preferred {
            if self.probe(client.as_ref()).await {
                tracing::debug!("Running on {}", client.channel());
                return self.execute_on(client.as_ref(), command).await;
            }
            tracing::debug!("{} unavailable, falling through", client.channel());
        }

        tracing::debug!("Running on {}", self.fallback.channel());
        self.execute_on(self.fallback.as_ref(), command).await
    }

    /// Live probe of the superuser channel
    pub async fn is_privileged_available(&self) -> bool {
        self.probe_channel(ExecutionChannel::PrivilegedLocal).await
    }

    /// Live probe of the escalation service
    pub async fn is_escalation_service_available(&self) -> bool {
        self.probe_channel(ExecutionChannel::EscalationService).await
    }

    /// Probe every channel in preference order
    pub async fn probe_all(&self) -> ChannelReport {
        let mut channels = Vec::with_capacity(self.preferred.len() + 1);
        for client in self.preferred.iter().chain(std::iter::once(&self.fallback)) {
            channels.push(ChannelStatus {
                channel: client.channel(),
                available: self.probe(client.as_ref()).await,
            });
        }
        ChannelReport { channels }
    }

    async fn probe_channel(&self, channel: ExecutionChannel) -> bool {
        match self.preferred.iter().find(|client| client.channel() == channel) {
            Some(client) => self.probe(client.as_ref()).await,
            None => false,
        }
    }

    /// Probe with a deadline; a panic or timeout reads as unavailable
    async fn probe(&self, client: &dyn ChannelClient) -> bool {
        let probe = AssertUnwindSafe(client.is_available()).catch_unwind();
        match tokio::time::timeout(self.probe_timeout, probe).await {
            Ok(Ok(available)) => available,
            Ok(Err(panic)) => {
                tracing::warn!(
                    "{} probe panicked: {}",
                    client.channel(),
                    panic_message(panic.as_ref())
                );
                false
            }
            Err(_) => {
                tracing::debug!("{} probe timed out after {:?}", client.channel(), self.probe_timeout);
                false
            }
        }
    }

    async fn execute_on(&self, client: &dyn ChannelClient, command: &str) -> Execution {
        let channel = client.channel();
        let result = match AssertUnwindSafe(client.execute(command)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::warn!("{} execution panicked: {}", channel, message);
                CommandResult::spawn_failure(format!("{} channel panicked: {}", channel, message))
            }
        };
        Execution { channel, result }
    }
}

impl fmt::Debug for ExecutionBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels: Vec<ExecutionChannel> = self
            .preferred
            .iter()
            .chain(std::iter::once(&self.fallback))
            .map(|client| client.channel())
            .collect();
        f.debug_struct("ExecutionBroker")
            .field("channels", &channels)
            .field("loopback", &self.loopback)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{broker, idle_loopback, FakeChannel};
    use super::*;
    use async_trait::async_trait;

    #[tokio::test]
    async fn test_tier_ordering() {
        let cases = [
            ((true, true, true), ExecutionChannel::PrivilegedLocal),
            ((false, true, true), ExecutionChannel::LoopbackNetwork),
            ((false, false, true), ExecutionChannel::EscalationService),
            ((false, false, false), ExecutionChannel::UnprivilegedLocal),
        ];

        for ((root, loopback, escalation), expected) in cases {
            let (broker, fakes) = broker(root, loopback, escalation);
            let execution = broker.run_smart_traced("id").await;
            assert_eq!(execution.channel, expected);
            assert_eq!(execution.result.output, expected.label());

            for fake in &fakes {
                let ran = fake.ran();
                if fake.channel == expected {
                    assert_eq!(ran, vec!["id"]);
                } else {
                    assert!(ran.is_empty(), "{} should not have run", fake.channel);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_fallback_is_never_probed() {
        let (broker, fakes) = broker(false, false, false);
        broker.run_smart("id").await;
        assert_eq!(fakes[3].probes(), 0);
        assert_eq!(fakes[0].probes(), 1);
    }

    #[tokio::test]
    async fn test_lower_tiers_not_probed_after_selection() {
        let (broker, fakes) = broker(true, true, true);
        broker.run_smart("id").await;
        assert_eq!(fakes[1].probes(), 0);
        assert_eq!(fakes[2].probes(), 0);
    }

    #[tokio::test]
    async fn test_probes_rerun_every_call() {
        let (broker, fakes) = broker(false, false, true);
        broker.run_smart("a").await;
        broker.run_smart("b").await;
        assert_eq!(fakes[0].probes(), 2);
        assert_eq!(fakes[2].ran(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_no_retry_after_chosen_tier_fails() {
        let mut root = FakeChannel::build(ExecutionChannel::PrivilegedLocal, true);
        root.reply = CommandResult::spawn_failure("su: permission denied");
        let root = Arc::new(root);
        let shell = FakeChannel::new(ExecutionChannel::UnprivilegedLocal, true);

        let broker = ExecutionBroker::new(
            vec![shell.clone(), root.clone()],
            idle_loopback(),
            Duration::from_secs(5),
        )
        .unwrap();

        let result = broker.run_smart("pm list packages").await;
        assert_eq!(result, CommandResult::spawn_failure("su: permission denied"));
        assert!(shell.ran().is_empty());
    }

    #[tokio::test]
    async fn test_command_failure_returned_as_is() {
        let mut root = FakeChannel::build(ExecutionChannel::PrivilegedLocal, true);
        root.reply = CommandResult::new(7, "bad");
        let broker = ExecutionBroker::new(
            vec![Arc::new(root), FakeChannel::new(ExecutionChannel::UnprivilegedLocal, true)],
            idle_loopback(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(broker.run_smart("x").await, CommandResult::new(7, "bad"));
    }

    #[tokio::test]
    async fn test_panicking_probe_counts_as_unavailable() {
        let mut root = FakeChannel::build(ExecutionChannel::PrivilegedLocal, true);
        root.panic_on_probe = true;
        let escalation = FakeChannel::new(ExecutionChannel::EscalationService, true);
        let broker = ExecutionBroker::new(
            vec![
                Arc::new(root),
                escalation.clone(),
                FakeChannel::new(ExecutionChannel::UnprivilegedLocal, true),
            ],
            idle_loopback(),
            Duration::from_secs(5),
        )
        .unwrap();

        let execution = broker.run_smart_traced("id").await;
        assert_eq!(execution.channel, ExecutionChannel::EscalationService);
        assert!(!broker.is_privileged_available().await);
    }

    #[tokio::test]
    async fn test_panicking_execute_is_spawn_failure() {
        let mut root = FakeChannel::build(ExecutionChannel::PrivilegedLocal, true);
        root.panic_on_execute = true;
        let broker = ExecutionBroker::new(
            vec![Arc::new(root), FakeChannel::new(ExecutionChannel::UnprivilegedLocal, true)],
            idle_loopback(),
            Duration::from_secs(5),
        )
        .unwrap();

        let result = broker.run_smart("id").await;
        assert_eq!(result.exit_code, -1);
        assert!(result.output.starts_with("ERROR: root channel panicked"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_times_out() {
        struct Hang;

        #[async_trait]
        impl ChannelClient for Hang {
            fn channel(&self) -> ExecutionChannel {
                ExecutionChannel::PrivilegedLocal
            }
            async fn is_available(&self) -> bool {
                futures::future::pending::<()>().await;
                true
            }
            async fn execute(&self, _command: &str) -> CommandResult {
                CommandResult::new(0, "")
            }
        }

        let shell = FakeChannel::new(ExecutionChannel::UnprivilegedLocal, true);
        let broker = ExecutionBroker::new(
            vec![Arc::new(Hang), shell.clone()],
            idle_loopback(),
            Duration::from_secs(1),
        )
        .unwrap();

        let execution = broker.run_smart_traced("id").await;
        assert_eq!(execution.channel, ExecutionChannel::UnprivilegedLocal);
    }

    #[tokio::test]
    async fn test_random_input_never_escapes() {
        let mut loopback = FakeChannel::build(ExecutionChannel::LoopbackNetwork, true);
        loopback.panic_on_execute = true;
        let mut root = FakeChannel::build(ExecutionChannel::PrivilegedLocal, false);
        root.panic_on_probe = true;
        let broker = ExecutionBroker::from_clients(
            vec![
                Arc::new(root),
                Arc::new(loopback),
                FakeChannel::new(ExecutionChannel::UnprivilegedLocal, true),
            ],
            Duration::from_secs(5),
        )
        .unwrap();

        for _ in 0..200 {
            let len = rand::random::<usize>() % 64;
            let bytes: Vec<u8> = (0..len).map(|_| rand::random::<u8>()).collect();
            let command = String::from_utf8_lossy(&bytes);
            let result = broker.run_smart(&command).await;
            assert_eq!(result.exit_code, -1);
            assert!(result.output.starts_with("ERROR: "));
        }
    }

    #[tokio::test]
    async fn test_probe_all_and_selected() {
        let (broker, _fakes) = broker(false, true, false);
        let report = broker.probe_all().await;
        assert_eq!(report.channels.len(), 4);
        assert!(report.is_available(ExecutionChannel::LoopbackNetwork));
        assert!(report.is_available(ExecutionChannel::UnprivilegedLocal));
        assert!(!report.is_available(ExecutionChannel::PrivilegedLocal));
        assert_eq!(report.selected(), ExecutionChannel::LoopbackNetwork);
        assert!(!broker.is_escalation_service_available().await);
    }

    #[test]
    fn test_construction_errors() {
        let missing = ExecutionBroker::new(
            vec![FakeChannel::new(ExecutionChannel::PrivilegedLocal, true)],
            idle_loopback(),
            Duration::from_secs(5),
        );
        assert_eq!(missing.unwrap_err(), BrokerError::MissingFallback);

        let duplicate = ExecutionBroker::new(
            vec![
                FakeChannel::new(ExecutionChannel::UnprivilegedLocal, true),
                FakeChannel::new(ExecutionChannel::UnprivilegedLocal, true),
            ],
            idle_loopback(),
            Duration::from_secs(5),
        );
        assert_eq!(
            duplicate.unwrap_err(),
            BrokerError::DuplicateChannel(ExecutionChannel::UnprivilegedLocal)
        );

        let foreign_loopback = ExecutionBroker::new(
            vec![
                FakeChannel::new(ExecutionChannel::LoopbackNetwork, true),
                FakeChannel::new(ExecutionChannel::UnprivilegedLocal, true),
            ],
            idle_loopback(),
            Duration::from_secs(5),
        );
        assert_eq!(
            foreign_loopback.unwrap_err(),
            BrokerError::DuplicateChannel(ExecutionChannel::LoopbackNetwork)
        );
    }

    #[tokio::test]
    async fn test_loopback_accessor_drives_routing() {
        let loopback = idle_loopback();
        let shell = FakeChannel::new(ExecutionChannel::UnprivilegedLocal, true);
        let broker = ExecutionBroker::new(vec![shell.clone()], loopback.clone(), Duration::from_secs(5)).unwrap();
        assert!(Arc::ptr_eq(broker.loopback(), &loopback));

        assert_eq!(
            broker.run_smart_traced("id").await.channel,
            ExecutionChannel::UnprivilegedLocal
        );

        // Connecting through the accessor makes the loopback tier win
        assert!(broker.loopback().connect().await);
        let execution = broker.run_smart_traced("id").await;
        assert_eq!(execution.channel, ExecutionChannel::LoopbackNetwork);
        assert_eq!(shell.ran(), vec!["id"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_real_shell_fallback() {
        let broker = ExecutionBroker::new(
            vec![Arc::new(crate::channel::LocalShell::default())],
            idle_loopback(),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(broker.run_smart("true").await, CommandResult::new(0, ""));
        assert_eq!(broker.run_smart("false").await, CommandResult::new(1, ""));
        assert_eq!(broker.run_smart("exit 7").await.exit_code, 7);
        assert_eq!(broker.run_smart("printf 'a\\nb\\n'").await.output, "a\nb");
        assert_eq!(broker.run_smart("").await, CommandResult::new(0, ""));
        assert_eq!(broker.run_smart("echo \0").await.exit_code, -1);
    }
}
