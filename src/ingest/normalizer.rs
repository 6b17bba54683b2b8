//! Maps parsed payload records onto the canonical [`Reading`] shape.
//!
//! Field names are resolved through [`SYNONYMS`]; each list starts with the
//! canonical name, so normalizing an already-canonical record yields the same
//! measurements. Adding a naming convention means adding a table entry.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::models::{Field, Measurements, Reading, SensorKind, SourceType};

// ---

/// Accepted payload keys per canonical field, canonical name first.
pub const SYNONYMS: &[(Field, &[&str])] = &[
    (Field::HumidityAir, &["humidity_air", "humidity", "humidite"]),
    (
        Field::HumiditySoil,
        &["humidity_soil", "soil_moisture", "moisture", "humidite_sol"],
    ),
    (Field::TemperatureAir, &["temperature_air", "temp", "temperature"]),
    (Field::TemperatureSoil, &["temperature_soil", "soil_temp"]),
    (Field::Pressure, &["pressure", "pression"]),
    (Field::Latitude, &["latitude"]),
    (Field::Longitude, &["longitude"]),
    (Field::Battery, &["battery", "batterie"]),
    (Field::SignalQuality, &["signal_quality", "qualite_signal"]),
];

const DEVICE_ID_KEYS: &[&str] = &["device_id"];
const TIMESTAMP_KEYS: &[&str] = &["measured_at", "timestamp", "timestamp_mesure"];
const SOURCE_KEYS: &[&str] = &["source_type", "source"];
const SENSOR_KIND_KEYS: &[&str] = &["sensor_kind", "type_capteur"];

/// Naive timestamp layouts accepted in addition to RFC 3339; read as UTC.
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("no device identity in payload or topic")]
    MissingDeviceId,
}

/// Build a reading from a parsed record.
///
/// `topic_device_id` is used only when the payload carries no identifier of
/// its own; `received_at` stands in for a missing or unparseable timestamp.
pub fn normalize(
    parsed: Value,
    topic_device_id: &str,
    received_at: DateTime<Utc>,
) -> Result<Reading, NormalizeError> {
    // ---
    let device_id = lookup(&parsed, DEVICE_ID_KEYS)
        .and_then(device_id_of)
        .or_else(|| non_empty(topic_device_id))
        .ok_or(NormalizeError::MissingDeviceId)?;

    let mut measurements = Measurements::default();
    for (field, names) in SYNONYMS {
        if let Some(value) = names
            .iter()
            .filter_map(|name| parsed.get(*name))
            .find_map(as_number)
        {
            measurements.set(*field, value);
        }
    }

    let measured_at = match lookup(&parsed, TIMESTAMP_KEYS) {
        Some(raw) => parse_timestamp(raw).unwrap_or_else(|| {
            debug!("Unparseable timestamp {}, using ingestion time", raw);
            received_at
        }),
        None => received_at,
    };

    let is_simulation = parsed
        .get("is_simulation")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let source_type = match lookup(&parsed, SOURCE_KEYS).and_then(Value::as_str) {
        Some(label) => SourceType::from_label(label).unwrap_or_else(|| {
            warn!("Unknown source label '{}', recording as real_sensor", label);
            SourceType::RealSensor
        }),
        None => SourceType::RealSensor,
    };

    let sensor_kind = lookup(&parsed, SENSOR_KIND_KEYS)
        .and_then(Value::as_str)
        .and_then(SensorKind::from_label)
        .unwrap_or_default();

    let notes = parsed
        .get("notes")
        .and_then(Value::as_str)
        .map(str::to_string);

    if measurements.is_empty() {
        info!(
            "No canonical measurements for device {}, storing raw payload only",
            device_id
        );
    }

    Ok(Reading {
        device_id,
        measurements,
        measured_at,
        is_simulation,
        source_type,
        sensor_kind,
        raw_payload: parsed,
        notes,
    })
}

/// First key present in an object record. Non-object records have no keys.
fn lookup<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| record.get(*key))
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn device_id_of(value: &Value) -> Option<String> {
    // ---
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers, or strings holding a number.
fn as_number(value: &Value) -> Option<f64> {
    // ---
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// RFC 3339, naive UTC date-times, or epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    // ---
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            NAIVE_TIMESTAMP_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}
