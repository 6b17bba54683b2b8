//! Per-message wiring of the ingestion pipeline.
//!
//! ```text
//! test path: device id -> test parser -> store -> confirmation
//! real path: device id -> parser chain -> normalizer -> store
//! ```
//!
//! Every message is handled independently. A failed append ends processing
//! of that message only and is never retried.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::classifier::{traffic_path, TrafficPath};
use super::confirm::ConfirmationEmitter;
use super::device::resolve_device_id;
use super::normalizer::{normalize, NormalizeError};
use super::parser::{parse_real_payload, parse_test_payload, TestPayload};
use crate::models::{Field, Measurements, Reading, SensorKind, SourceType, ValidationError};
use crate::store::{ReadingStore, StoreError};
use crate::transport::{InboundMessage, Publisher};

// ---

/// Device used for test traffic whose topic yields no identifier.
const TEST_DEVICE_FALLBACK: &str = "node-red-test";
const TEST_NOTES: &str = "Test data from Node-RED";

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("no device identity for topic '{topic}'")]
    MissingDeviceId { topic: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to a successfully ingested message.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    // ---
    pub reading_id: Uuid,
    pub device_id: String,
    pub path: TrafficPath,
    /// Test path only: whether the confirmation publish was accepted.
    pub confirmed: bool,
}

pub struct Coordinator<S, P> {
    store: Arc<S>,
    confirmations: ConfirmationEmitter<P>,
}

impl<S: ReadingStore, P: Publisher> Coordinator<S, P> {
    // ---
    pub fn new(store: Arc<S>, confirmations: ConfirmationEmitter<P>) -> Self {
        Self {
            store,
            confirmations,
        }
    }

    /// Classify, parse, store and (for test traffic) confirm one message.
    pub async fn handle(&self, message: &InboundMessage) -> Result<Ingested, IngestError> {
        // ---
        let body = message.body();
        let received_at = Utc::now();
        debug!("Message received: {}", body);

        match traffic_path(&message.topic, &body) {
            TrafficPath::Test => self.handle_test(&message.topic, &body, received_at).await,
            TrafficPath::Real => self.handle_real(&message.topic, &body, received_at).await,
        }
    }

    async fn handle_test(
        &self,
        topic: &str,
        body: &str,
        received_at: DateTime<Utc>,
    ) -> Result<Ingested, IngestError> {
        // ---
        let device_id = match resolve_device_id(topic) {
            id if id.trim().is_empty() => TEST_DEVICE_FALLBACK.to_string(),
            id => id,
        };

        let parsed = parse_test_payload(body);
        match parsed {
            TestPayload {
                temperature: Some(t),
                ..
            } => debug!("Test value {} read as temperature", t),
            TestPayload {
                humidity: Some(h), ..
            } => debug!("Test value {} read as humidity", h),
            TestPayload {
                raw_value: Some(v),
                ..
            } => debug!("Test value {} left unclassified", v),
            _ => debug!("No numeric value in test message"),
        }

        let reading = test_reading(device_id, &parsed, body, received_at);
        let reading_id = self.store.append(&reading).await?;
        info!(
            "Test reading {} stored for device {} (simulation)",
            reading_id, reading.device_id
        );

        let confirmed = self
            .confirmations
            .emit(&reading.device_id, reading_id, parsed.raw_value)
            .await;

        Ok(Ingested {
            reading_id,
            device_id: reading.device_id,
            path: TrafficPath::Test,
            confirmed,
        })
    }

    async fn handle_real(
        &self,
        topic: &str,
        body: &str,
        received_at: DateTime<Utc>,
    ) -> Result<Ingested, IngestError> {
        // ---
        let topic_device_id = resolve_device_id(topic);
        let (strategy, record) = parse_real_payload(body);
        debug!("Payload parsed as {}", strategy.as_str());

        let reading = normalize(record, &topic_device_id, received_at).map_err(|e| match e {
            NormalizeError::MissingDeviceId => IngestError::MissingDeviceId {
                topic: topic.to_string(),
            },
        })?;

        let reading_id = self.store.append(&reading).await?;
        let fields: Vec<String> = reading
            .measurements
            .present()
            .map(|(field, value)| format!("{}={}", field.name(), value))
            .collect();
        info!(
            "Reading {} stored for device {} ({}) [{}]",
            reading_id,
            reading.device_id,
            if reading.is_simulation { "simulation" } else { "real sensor" },
            fields.join(", ")
        );

        Ok(Ingested {
            reading_id,
            device_id: reading.device_id,
            path: TrafficPath::Real,
            confirmed: false,
        })
    }
}

/// Reading stored for a test message. The raw payload records what was
/// received and what was guessed from it.
fn test_reading(
    device_id: String,
    parsed: &TestPayload,
    body: &str,
    received_at: DateTime<Utc>,
) -> Reading {
    // ---
    let mut measurements = Measurements::default();
    let mut raw = Map::new();
    raw.insert("device_id".into(), json!(device_id));
    raw.insert("source".into(), json!("node-red"));
    raw.insert("is_simulation".into(), json!(true));
    raw.insert("timestamp".into(), json!(received_at.to_rfc3339()));
    raw.insert("raw_message".into(), json!(body));
    raw.insert("test_value".into(), json!(parsed.raw_value));

    if let Some(t) = parsed.temperature {
        measurements.set(Field::TemperatureAir, t);
        raw.insert("temperature".into(), json!(t));
    }
    if let Some(h) = parsed.humidity {
        measurements.set(Field::HumidityAir, h);
        raw.insert("humidity".into(), json!(h));
    }

    Reading {
        device_id,
        measurements,
        measured_at: received_at,
        is_simulation: true,
        source_type: SourceType::NodeRed,
        sensor_kind: SensorKind::default(),
        raw_payload: Value::Object(raw),
        notes: Some(TEST_NOTES.to_string()),
    }
}

/// Consume inbound messages until the channel closes, processing each one
/// as its own task with at most `max_in_flight` running at once. Waits for
/// in-flight messages before returning.
pub async fn run<S, P>(
    coordinator: Arc<Coordinator<S, P>>,
    mut rx: mpsc::Receiver<InboundMessage>,
    max_in_flight: usize,
) where
    S: ReadingStore,
    P: Publisher,
{
    // ---
    let max_in_flight = max_in_flight.max(1);
    let permits = Arc::new(Semaphore::new(max_in_flight));

    while let Some(message) = rx.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let coordinator = coordinator.clone();
        let span = info_span!("ingest", topic = %message.topic);

        tokio::spawn(
            async move {
                let _permit = permit;
                match coordinator.handle(&message).await {
                    Ok(done) => debug!(
                        reading_id = %done.reading_id,
                        device_id = %done.device_id,
                        confirmed = done.confirmed,
                        "Message handled on {:?} path",
                        done.path
                    ),
                    Err(e) => log_failure(&e),
                }
            }
            .instrument(span),
        );
    }

    // All permits free means every spawned message is done
    let _ = permits.acquire_many(max_in_flight as u32).await;
    info!("Ingestion loop finished");
}

fn log_failure(err: &IngestError) {
    // ---
    match err {
        IngestError::Store(StoreError::Validation(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        })) => warn!(
            field = *field,
            value = *value,
            "Reading rejected: {} = {} outside [{}, {}]",
            field,
            value,
            min,
            max
        ),
        IngestError::Store(StoreError::Validation(e)) => warn!("Reading rejected: {}", e),
        IngestError::Store(StoreError::Persistence(e)) => {
            error!("Reading dropped, store failure: {}", e)
        }
        IngestError::MissingDeviceId { topic } => {
            warn!("Message dropped, no device id for topic {}", topic)
        }
    }
}
