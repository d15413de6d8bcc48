//! Presence heartbeat: keeps the routing tier pointed at this server.
//!
//! Publishes a registration message on `router.register` on a two-phase
//! interval: fast right after start, then steady once the router greets us
//! (or after `fast_beats` beats without a greeting). On shutdown the same
//! message goes out on `router.unregister`.

pub mod nats;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::time;

use conductor_core::config::HeartbeatSettings;

pub const REGISTER_SUBJECT: &str = "router.register";
pub const UNREGISTER_SUBJECT: &str = "router.unregister";
pub const GREET_SUBJECT: &str = "router.greet";
pub const START_SUBJECT: &str = "router.start";

/// Body of register/unregister messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMessage {
    pub host: String,
    pub port: u16,
    pub uris: Vec<String>,
}

/// Reply to `router.greet` and body of `router.start`.
#[derive(Debug, Clone, Deserialize)]
pub struct RouterGreeting {
    #[serde(rename = "minimumRegisterIntervalInSeconds", default)]
    pub minimum_register_interval_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to connect to message bus: {0}")]
    Connect(String),
    #[error("publish to {subject} failed: {reason}")]
    Publish { subject: String, reason: String },
    #[error("subscribe to {subject} failed: {reason}")]
    Subscribe { subject: String, reason: String },
    #[error("request on {subject} failed: {reason}")]
    Request { subject: String, reason: String },
}

/// The pub/sub operations the heartbeat needs.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError>;

    /// Payloads published on `subject`, until the subscription drops.
    async fn subscribe(&self, subject: &str) -> Result<mpsc::Receiver<Bytes>, BusError>;

    /// Publish and wait for a single reply.
    async fn request(&self, subject: &str, payload: Bytes) -> Result<Bytes, BusError>;
}

#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    pub initial_interval: Duration,
    pub steady_interval: Duration,
    pub fast_beats: u32,
}

impl From<&HeartbeatSettings> for HeartbeatConfig {
    fn from(s: &HeartbeatSettings) -> Self {
        Self {
            initial_interval: s.initial_interval(),
            steady_interval: s.steady_interval(),
            fast_beats: s.fast_beats,
        }
    }
}

pub struct Heartbeat {
    bus: Arc<dyn MessageBus>,
    payload: Bytes,
    config: HeartbeatConfig,
    shutdown: broadcast::Receiver<()>,
}

impl Heartbeat {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        message: &RegistryMessage,
        config: HeartbeatConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            bus,
            payload: Bytes::from(serde_json::to_vec(message)?),
            config,
            shutdown,
        })
    }

    pub async fn run(mut self) {
        let mut greetings = self.listen_for_greetings().await;
        let mut interval = self.config.initial_interval;
        let mut beats: u32 = 0;
        let mut greeted = false;

        tracing::info!(
            initial_interval_ms = interval.as_millis() as u64,
            "router heartbeat starting"
        );
        self.beat(REGISTER_SUBJECT).await;

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    self.beat(UNREGISTER_SUBJECT).await;
                    tracing::info!("router heartbeat stopped");
                    return;
                }
                Some(steady) = greetings.recv() => {
                    tracing::info!(interval_secs = steady.as_secs(), "greeted by router");
                    interval = steady;
                    greeted = true;
                }
                _ = time::sleep(interval) => {
                    self.beat(REGISTER_SUBJECT).await;
                    beats = beats.saturating_add(1);
                    if !greeted && beats == self.config.fast_beats {
                        tracing::info!("no greeting from router, slowing heartbeat");
                        interval = self.config.steady_interval;
                    }
                }
            }
        }
    }

    async fn beat(&self, subject: &str) {
        match self.bus.publish(subject, self.payload.clone()).await {
            Ok(()) => tracing::trace!(subject, "heartbeat sent"),
            Err(e) => tracing::warn!(error = %e, "heartbeat publish failed"),
        }
    }

    /// Ask the router for its interval and follow its start broadcasts.
    /// Both sources feed the returned channel.
    async fn listen_for_greetings(&self) -> mpsc::Receiver<Duration> {
        let (tx, rx) = mpsc::channel(4);

        match self.bus.subscribe(START_SUBJECT).await {
            Ok(mut starts) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    while let Some(payload) = starts.recv().await {
                        if let Some(interval) = parse_greeting(&payload) {
                            if tx.send(interval).await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
            Err(e) => tracing::warn!(error = %e, "not following router starts"),
        }

        let bus = Arc::clone(&self.bus);
        tokio::spawn(async move {
            match bus.request(GREET_SUBJECT, Bytes::new()).await {
                Ok(reply) => {
                    if let Some(interval) = parse_greeting(&reply) {
                        let _ = tx.send(interval).await;
                    }
                }
                Err(e) => tracing::debug!(error = %e, "router greeting went unanswered"),
            }
        });

        rx
    }
}

fn parse_greeting(payload: &[u8]) -> Option<Duration> {
    match serde_json::from_slice::<RouterGreeting>(payload) {
        Ok(g) => Some(Duration::from_secs(g.minimum_register_interval_secs.max(1))),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed router greeting");
            None
        }
    }
}

/// Address the router should send traffic to. A wildcard listen address is
/// resolved to the local interface that routes toward the first NATS server.
pub fn advertised_host(listen: SocketAddr, nats_addresses: &[String]) -> String {
    if !listen.ip().is_unspecified() {
        return listen.ip().to_string();
    }
    let probe_target = nats_addresses
        .first()
        .map(|addr| {
            let addr = addr.split_once("://").map_or(addr.as_str(), |(_, rest)| rest);
            addr.rsplit_once('@').map_or(addr, |(_, host)| host).to_string()
        })
        .unwrap_or_else(|| "127.0.0.1:4222".to_string());

    let probed = std::net::UdpSocket::bind("0.0.0.0:0")
        .and_then(|probe| {
            probe.connect(probe_target.as_str())?;
            probe.local_addr()
        })
        .map(|local| local.ip().to_string());
    match probed {
        Ok(ip) => ip,
        Err(e) => {
            tracing::warn!(error = %e, target = %probe_target, "could not discover local address");
            "127.0.0.1".to_string()
        }
    }
}
