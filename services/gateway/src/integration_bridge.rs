//! Optional mirror of bucket writes into an external pub/sub system.
//! Absence of a configured bridge must never change any other module's
//! behavior — every call site treats this as fire-and-forget.

use std::time::Duration;

use async_trait::async_trait;
use nest_protocol::Bucket;
use rumqttc::{AsyncClient, MqttOptions, QoS};

use crate::config::MqttConfig;

#[async_trait]
pub trait IntegrationBridge: Send + Sync {
    async fn on_bucket_write(&self, bucket: &Bucket);
}

/// Default bridge used when no integration is configured.
pub struct NoopBridge;

#[async_trait]
impl IntegrationBridge for NoopBridge {
    async fn on_bucket_write(&self, _bucket: &Bucket) {}
}

pub struct MqttBridge {
    client: AsyncClient,
    topic_prefix: String,
}

impl MqttBridge {
    /// Connects to the broker and spawns the background event-loop driver.
    /// Returns `None` and logs a warning if the initial connection attempt
    /// cannot even be constructed (malformed config); runtime connection
    /// loss is handled by rumqttc's own reconnect loop.
    pub fn connect(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new("thermocontrol-gateway", config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(user), Some(password)) = (&config.user, &config.password) {
            options.set_credentials(user.clone(), password.clone());
        }

        let (client, mut event_loop) = AsyncClient::new(options, 16);
        tokio::spawn(async move {
            loop {
                if let Err(err) = event_loop.poll().await {
                    tracing::warn!(error = %err, "mqtt event loop error, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });

        Self {
            client,
            topic_prefix: config.topic_prefix.clone(),
        }
    }
}

#[async_trait]
impl IntegrationBridge for MqttBridge {
    async fn on_bucket_write(&self, bucket: &Bucket) {
        let topic = format!("{}/{}/{}", self.topic_prefix, bucket.serial, bucket.object_key);
        let payload = match serde_json::to_vec(&bucket.value) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, serial = %bucket.serial, "failed to serialize bucket for mqtt publish");
                return;
            }
        };
        if let Err(err) = self
            .client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
        {
            tracing::warn!(error = %err, serial = %bucket.serial, "mqtt publish failed");
        }
    }
}
