//! NATS binding for [`MessageBus`].

use async_nats::{ConnectOptions, ServerAddr};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;

use super::{BusError, MessageBus};

pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    pub async fn connect(
        addresses: &[String],
        username: &str,
        password: &str,
    ) -> Result<Self, BusError> {
        let servers = addresses
            .iter()
            .map(|addr| {
                addr.parse::<ServerAddr>()
                    .map_err(|e| BusError::Connect(format!("bad nats address {addr}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut options = ConnectOptions::new().name("conductor");
        if !username.is_empty() {
            options = options.user_and_password(username.to_string(), password.to_string());
        }
        let client = options
            .connect(servers.as_slice())
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;

        tracing::info!(servers = addresses.len(), "connected to nats");
        Ok(Self { client })
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| BusError::Publish {
                subject: subject.to_string(),
                reason: e.to_string(),
            })
    }

    async fn subscribe(&self, subject: &str) -> Result<mpsc::Receiver<Bytes>, BusError> {
        let mut subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| BusError::Subscribe {
                subject: subject.to_string(),
                reason: e.to_string(),
            })?;

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                if tx.send(message.payload).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn request(&self, subject: &str, payload: Bytes) -> Result<Bytes, BusError> {
        self.client
            .request(subject.to_string(), payload)
            .await
            .map(|message| message.payload)
            .map_err(|e| BusError::Request {
                subject: subject.to_string(),
                reason: e.to_string(),
            })
    }
}
