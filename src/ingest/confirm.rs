//! Acknowledgements published back to the broker for test traffic.
//!
//! Emission is best effort: failures are logged and never reach the
//! ingestion result.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::transport::Publisher;

// ---

const STATUS_RECEIVED: &str = "test_received";
const KIND_SIMULATION: &str = "simulation";
const CONFIRM_MESSAGE: &str = "Node-RED test received and stored";

/// Value echoed back; `"unknown"` when no number was extracted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfirmedValue {
    Number(f64),
    Unknown(&'static str),
}

impl From<Option<f64>> for ConfirmedValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(ConfirmedValue::Unknown("unknown"), ConfirmedValue::Number)
    }
}

/// Envelope published on `<prefix>/test/<device_id>/confirm`.
#[derive(Debug, Clone, Serialize)]
pub struct Confirmation {
    // ---
    pub status: &'static str,
    pub device_id: String,
    pub reading_id: Uuid,
    pub value: ConfirmedValue,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub timestamp: DateTime<Utc>,
    pub message: &'static str,
}

impl Confirmation {
    // ---
    pub fn new(device_id: &str, reading_id: Uuid, value: Option<f64>, at: DateTime<Utc>) -> Self {
        Self {
            status: STATUS_RECEIVED,
            device_id: device_id.to_string(),
            reading_id,
            value: value.into(),
            kind: KIND_SIMULATION,
            timestamp: at,
            message: CONFIRM_MESSAGE,
        }
    }
}

pub fn confirmation_topic(prefix: &str, device_id: &str) -> String {
    format!("{}/test/{}/confirm", prefix.trim_end_matches('/'), device_id)
}

/// Builds and publishes confirmations through an injected [`Publisher`].
pub struct ConfirmationEmitter<P> {
    publisher: Arc<P>,
    prefix: String,
}

impl<P: Publisher> ConfirmationEmitter<P> {
    // ---
    pub fn new(publisher: Arc<P>, prefix: impl Into<String>) -> Self {
        Self {
            publisher,
            prefix: prefix.into(),
        }
    }

    /// Publish a confirmation for a stored test reading. Returns whether the
    /// publish was accepted by the transport.
    pub async fn emit(&self, device_id: &str, reading_id: Uuid, value: Option<f64>) -> bool {
        // ---
        let topic = confirmation_topic(&self.prefix, device_id);
        let envelope = Confirmation::new(device_id, reading_id, value, Utc::now());

        let payload = match serde_json::to_vec(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Could not encode confirmation for {}: {}", device_id, e);
                return false;
            }
        };

        match self.publisher.publish(&topic, payload).await {
            Ok(()) => {
                info!("Confirmation sent on {}", topic);
                true
            }
            Err(e) => {
                warn!("Confirmation not sent: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::transport::recording::RecordingPublisher;
    use chrono::TimeZone;
    use serde_json::{json, Value};

    #[test]
    fn test_confirmation_topic_shape() {
        // ---
        assert_eq!(
            confirmation_topic("piquet/agricole", "inject"),
            "piquet/agricole/test/inject/confirm"
        );
        assert_eq!(
            confirmation_topic("piquet/agricole/", "soil1"),
            "piquet/agricole/test/soil1/confirm"
        );
    }

    #[test]
    fn test_envelope_fields() {
        // ---
        let id = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let value = serde_json::to_value(Confirmation::new("inject", id, Some(55.0), at)).unwrap();

        assert_eq!(value["status"], json!("test_received"));
        assert_eq!(value["device_id"], json!("inject"));
        assert_eq!(value["reading_id"], json!(id.to_string()));
        assert_eq!(value["value"], json!(55.0));
        assert_eq!(value["type"], json!("simulation"));
        assert_eq!(value["timestamp"], json!("2025-06-01T09:00:00Z"));
        assert!(value["message"].is_string());
    }

    #[test]
    fn test_missing_value_is_unknown() {
        // ---
        let value = serde_json::to_value(Confirmation::new(
            "inject",
            Uuid::new_v4(),
            None,
            Utc::now(),
        ))
        .unwrap();
        assert_eq!(value["value"], json!("unknown"));
    }

    #[tokio::test]
    async fn test_emit_publishes_on_confirm_topic() {
        // ---
        let publisher = Arc::new(RecordingPublisher::default());
        let emitter = ConfirmationEmitter::new(publisher.clone(), "piquet/agricole");

        assert!(emitter.emit("inject", Uuid::new_v4(), Some(55.0)).await);

        let sent = publisher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "piquet/agricole/test/inject/confirm");
        let body: Value = serde_json::from_slice(&sent[0].1).unwrap();
        assert_eq!(body["value"], json!(55.0));
    }

    #[tokio::test]
    async fn test_emit_swallows_publish_failure() {
        // ---
        let emitter =
            ConfirmationEmitter::new(Arc::new(RecordingPublisher::failing()), "piquet/agricole");
        assert!(!emitter.emit("inject", Uuid::new_v4(), None).await);
    }
}
