//! Payload parsing strategies.
//!
//! Test traffic gets a minimal numeric extraction ([`parse_test_payload`]).
//! Real traffic goes through an ordered chain of attempts
//! ([`REAL_PATH_CHAIN`]): strict JSON decoding, then free-text pattern
//! extraction. Each attempt returns `None` on a normal miss; when every
//! attempt misses the body is kept as an unclassified raw value
//! ([`raw_record`]).
//!
//! Every record produced here carries the original body (or *is* the
//! original body, for structured payloads).

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use crate::models::Field;

// ---

/// Which attempt produced a parsed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    Structured,
    FreeText,
    Raw,
}

impl ParseStrategy {
    // ---
    pub fn as_str(self) -> &'static str {
        match self {
            ParseStrategy::Structured => "structured",
            ParseStrategy::FreeText => "free_text",
            ParseStrategy::Raw => "raw",
        }
    }
}

/// A single parsing attempt over the message body.
pub type ParseAttempt = fn(&str) -> Option<Value>;

/// Real-path attempts, tried in order until one matches.
pub const REAL_PATH_CHAIN: &[(ParseStrategy, ParseAttempt)] = &[
    (ParseStrategy::Structured, parse_structured as ParseAttempt),
    (ParseStrategy::FreeText, parse_free_text as ParseAttempt),
];

/// Result of the test-path extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TestPayload {
    // ---
    /// First decimal number found in the body, if any.
    pub raw_value: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

// Digits are ASCII only; `\d` would also match other Unicode digits that
// `f64::from_str` rejects. The patterns are constants, checked by
// `test_patterns_compile`.

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)").expect("number pattern"))
}

fn temperature_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s*°?\s*[cC]").expect("temperature pattern")
    })
}

fn humidity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s*%?").expect("humidity pattern"))
}

/// Matched against the lower-cased body; number then `soil`, or `soil` then
/// number.
fn soil_moisture_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s*%.*soil|soil.*?([0-9]+(?:\.[0-9]+)?)\s*%")
            .expect("soil moisture pattern")
    })
}

fn first_capture(re: &Regex, haystack: &str) -> Option<f64> {
    // ---
    let caps = re.captures(haystack)?;
    caps.iter()
        .skip(1)
        .flatten()
        .find_map(|m| m.as_str().parse::<f64>().ok())
}

/// Pull the first decimal number out of a test message and guess what it
/// measures from its range.
///
/// The temperature range is checked before the humidity range, so a value
/// that fits both (e.g. 42) is always a temperature.
pub fn parse_test_payload(body: &str) -> TestPayload {
    // ---
    let Some(value) = first_capture(number_re(), body) else {
        return TestPayload::default();
    };

    let mut parsed = TestPayload {
        raw_value: Some(value),
        ..Default::default()
    };

    if (-50.0..=100.0).contains(&value) {
        parsed.temperature = Some(value);
    } else if (0.0..=100.0).contains(&value) {
        parsed.humidity = Some(value);
    }

    parsed
}

/// Strict JSON decoding. Any valid JSON document is accepted, including bare
/// numbers and strings.
pub fn parse_structured(body: &str) -> Option<Value> {
    serde_json::from_str(body).ok()
}

/// Free-text extraction for bodies such as `"24°C"`, `"45 %"` or
/// `"25% soil moisture"`.
///
/// Humidity is only looked for when no temperature matched, since its
/// pattern would otherwise pick up the same digits again. Soil moisture is
/// independent of both.
pub fn parse_free_text(body: &str) -> Option<Value> {
    // ---
    let mut record = Map::new();

    let temperature = first_capture(temperature_re(), body);
    if let Some(t) = temperature {
        record.insert(Field::TemperatureAir.name().into(), json!(t));
    } else if let Some(h) = first_capture(humidity_re(), body) {
        record.insert(Field::HumidityAir.name().into(), json!(h));
    }

    if let Some(s) = first_capture(soil_moisture_re(), &body.to_lowercase()) {
        record.insert(Field::HumiditySoil.name().into(), json!(s));
    }

    if record.is_empty() {
        return None;
    }

    record.insert("is_simulation".into(), json!(false));
    record.insert("raw_message".into(), json!(body));
    Some(Value::Object(record))
}

/// Last resort: keep the body verbatim as an unclassified value.
pub fn raw_record(body: &str) -> Value {
    json!({
        "raw_value": body,
        "raw_message": body,
        "is_simulation": false,
    })
}

/// Run the real-path chain, falling back to a raw record.
pub fn parse_real_payload(body: &str) -> (ParseStrategy, Value) {
    // ---
    REAL_PATH_CHAIN
        .iter()
        .find_map(|(strategy, attempt)| attempt(body).map(|record| (*strategy, record)))
        .unwrap_or_else(|| (ParseStrategy::Raw, raw_record(body)))
}
