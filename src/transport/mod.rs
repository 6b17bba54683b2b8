//! Publish/subscribe transport boundary.
//!
//! The rest of the crate sees the broker only through [`InboundMessage`]
//! (what arrives) and the [`Publisher`] capability (what can be sent). The
//! MQTT specifics live in `mqtt.rs`.

use async_trait::async_trait;

mod mqtt;

pub use mqtt::{connect, run_subscription, MqttPublisher};

// ---

/// A message delivered on one of the subscribed topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    // ---
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    // ---
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload as text; invalid UTF-8 sequences are replaced.
    pub fn body(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("publish to '{topic}' failed: {reason}")]
pub struct PublishError {
    pub topic: String,
    pub reason: String,
}

/// Handle able to put a message on the transport.
///
/// Implementations must not wait for broker acknowledgement; a publish that
/// cannot be queued right away is reported as a [`PublishError`].
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}

#[cfg(test)]
pub mod recording {
    //! Publisher fake that records what it was asked to send.

    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct RecordingPublisher {
        sent: Mutex<Vec<(String, Vec<u8>)>>,
        fail: bool,
    }

    impl RecordingPublisher {
        /// A publisher whose every publish fails.
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
            if self.fail {
                return Err(PublishError {
                    topic: topic.to_string(),
                    reason: "broker unavailable".to_string(),
                });
            }
            self.sent.lock().unwrap().push((topic.to_string(), payload));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_body_is_lossy_utf8() {
        // ---
        let msg = InboundMessage::new("farm/soil1", "24°C");
        assert_eq!(msg.body(), "24°C");

        let msg = InboundMessage::new("farm/soil1", vec![b'4', 0xFF, b'2']);
        assert_eq!(msg.body(), "4\u{FFFD}2");
    }
}
