//! MQTT adapter built on `rumqttc`.
//!
//! One long-lived connection is opened at startup. Its [`AsyncClient`] half is
//! handed out as a [`MqttPublisher`] capability; its [`EventLoop`] half is
//! driven by [`run_subscription`], which forwards every inbound publish to
//! the ingestion side over a bounded channel.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, info, trace, warn};

use super::{InboundMessage, PublishError, Publisher};
use crate::Config;

// ---

/// Capacity of the client -> event loop request queue.
const REQUEST_QUEUE_CAPACITY: usize = 64;

/// Pause before polling again after a connection error.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Build the MQTT client and its event loop. Nothing is sent on the wire
/// until the event loop is polled.
pub fn connect(cfg: &Config) -> (AsyncClient, EventLoop) {
    // ---
    let mut options = MqttOptions::new(&cfg.mqtt_client_id, &cfg.mqtt_host, cfg.mqtt_port);
    options.set_keep_alive(Duration::from_secs(cfg.mqtt_keep_alive_secs.into()));
    options.set_clean_session(true);

    if let Some(username) = &cfg.mqtt_username {
        options.set_credentials(username, cfg.mqtt_password.clone().unwrap_or_default());
    }

    if cfg.mqtt_tls {
        options.set_transport(Transport::tls_with_default_config());
    }

    AsyncClient::new(options, REQUEST_QUEUE_CAPACITY)
}

/// Drive the connection and forward inbound publishes to `tx`.
///
/// Subscriptions are (re)issued on every `ConnAck`, so they survive
/// reconnects with a clean session. Returns once `tx` is closed.
///
/// The event loop is never parked on a full channel: keep-alive pings and
/// queued confirmations keep flowing, and a message that arrives while
/// ingestion is saturated is dropped with a warning.
pub async fn run_subscription(
    client: AsyncClient,
    mut eventloop: EventLoop,
    topics: Vec<String>,
    tx: mpsc::Sender<InboundMessage>,
) {
    // ---
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connected to MQTT broker");
                tokio::spawn(subscribe_all(client.clone(), topics.clone()));
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                if !forward(&tx, message) {
                    info!("Ingestion side closed, leaving MQTT subscription loop");
                    break;
                }
            }
            Ok(event) => trace!("MQTT event: {:?}", event),
            Err(e) => {
                error!("MQTT connection error: {}", e);
                tokio::time::sleep(RECONNECT_BACKOFF).await;
            }
        }
    }

    if let Err(e) = client.disconnect().await {
        trace!("MQTT disconnect request not queued: {}", e);
    }
}

/// Hand a message to ingestion without waiting. Returns `false` once the
/// receiving side is gone.
fn forward(tx: &mpsc::Sender<InboundMessage>, message: InboundMessage) -> bool {
    // ---
    match tx.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Full(dropped)) => {
            warn!("Ingestion saturated, dropping message on {}", dropped.topic);
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

async fn subscribe_all(client: AsyncClient, topics: Vec<String>) {
    // ---
    for topic in topics {
        match client.subscribe(&topic, QoS::AtLeastOnce).await {
            Ok(()) => info!("Subscription requested: {}", topic),
            Err(e) => error!("Failed to subscribe to {}: {}", topic, e),
        }
    }
}

/// [`Publisher`] over a shared MQTT client.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    // ---
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    /// Queue without waiting; a full request queue is an error.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        // ---
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|e| PublishError {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_forward_drops_when_saturated() {
        // ---
        let (tx, mut rx) = mpsc::channel(1);

        assert!(forward(&tx, InboundMessage::new("farm/a", "1")));
        assert!(forward(&tx, InboundMessage::new("farm/b", "2")));

        assert_eq!(rx.try_recv().unwrap().topic, "farm/a");
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(!forward(&tx, InboundMessage::new("farm/c", "3")));
    }

    #[tokio::test]
    async fn test_publisher_does_not_wait_on_full_queue() {
        // ---
        let options = MqttOptions::new("ingest-test", "localhost", 1883);
        let (client, _eventloop) = AsyncClient::new(options, 2);
        let publisher = MqttPublisher::new(client);

        assert!(publisher.publish("a/confirm", b"1".to_vec()).await.is_ok());
        assert!(publisher.publish("a/confirm", b"2".to_vec()).await.is_ok());

        let err = publisher
            .publish("a/confirm", b"3".to_vec())
            .await
            .unwrap_err();
        assert_eq!(err.topic, "a/confirm");
    }
}
