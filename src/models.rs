//! Canonical data model for ingested sensor readings.
//!
//! A [`Reading`] is built exactly once per ingested message and never mutated
//! afterwards. Every scalar measurement is optional; the ones that are present
//! must fall inside the range declared by their [`Field`], which is checked by
//! [`Reading::validate`] at the persistence boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---

/// Canonical scalar measurement names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    HumidityAir,
    HumiditySoil,
    TemperatureAir,
    TemperatureSoil,
    Pressure,
    Latitude,
    Longitude,
    Battery,
    SignalQuality,
}

impl Field {
    // ---
    pub const ALL: [Field; 9] = [
        Field::HumidityAir,
        Field::HumiditySoil,
        Field::TemperatureAir,
        Field::TemperatureSoil,
        Field::Pressure,
        Field::Latitude,
        Field::Longitude,
        Field::Battery,
        Field::SignalQuality,
    ];

    /// Column / JSON name of the field.
    pub fn name(self) -> &'static str {
        // ---
        match self {
            Field::HumidityAir => "humidity_air",
            Field::HumiditySoil => "humidity_soil",
            Field::TemperatureAir => "temperature_air",
            Field::TemperatureSoil => "temperature_soil",
            Field::Pressure => "pressure",
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
            Field::Battery => "battery",
            Field::SignalQuality => "signal_quality",
        }
    }

    /// Inclusive `(min, max)` bounds a present value must respect.
    pub fn range(self) -> (f64, f64) {
        // ---
        match self {
            Field::HumidityAir | Field::HumiditySoil => (0.0, 100.0),
            Field::TemperatureAir | Field::TemperatureSoil => (-50.0, 100.0),
            Field::Pressure => (800.0, 1200.0),
            Field::Latitude => (-90.0, 90.0),
            Field::Longitude => (-180.0, 180.0),
            Field::Battery | Field::SignalQuality => (0.0, 100.0),
        }
    }
}

/// The optional scalar measurements of a reading, keyed by canonical name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    // ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity_air: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity_soil: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_air: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_soil: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_quality: Option<f64>,
}

impl Measurements {
    // ---
    pub fn get(&self, field: Field) -> Option<f64> {
        // ---
        match field {
            Field::HumidityAir => self.humidity_air,
            Field::HumiditySoil => self.humidity_soil,
            Field::TemperatureAir => self.temperature_air,
            Field::TemperatureSoil => self.temperature_soil,
            Field::Pressure => self.pressure,
            Field::Latitude => self.latitude,
            Field::Longitude => self.longitude,
            Field::Battery => self.battery,
            Field::SignalQuality => self.signal_quality,
        }
    }

    pub fn set(&mut self, field: Field, value: f64) {
        // ---
        let slot = match field {
            Field::HumidityAir => &mut self.humidity_air,
            Field::HumiditySoil => &mut self.humidity_soil,
            Field::TemperatureAir => &mut self.temperature_air,
            Field::TemperatureSoil => &mut self.temperature_soil,
            Field::Pressure => &mut self.pressure,
            Field::Latitude => &mut self.latitude,
            Field::Longitude => &mut self.longitude,
            Field::Battery => &mut self.battery,
            Field::SignalQuality => &mut self.signal_quality,
        };
        *slot = Some(value);
    }

    /// Present fields with their values, in canonical order.
    pub fn present(&self) -> impl Iterator<Item = (Field, f64)> + '_ {
        Field::ALL
            .into_iter()
            .filter_map(move |field| self.get(field).map(|value| (field, value)))
    }

    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

/// Where a reading came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[default]
    RealSensor,
    NodeRed,
    Test,
    Simulation,
    SoilSensor,
}

impl SourceType {
    // ---
    pub fn as_str(self) -> &'static str {
        // ---
        match self {
            SourceType::RealSensor => "real_sensor",
            SourceType::NodeRed => "node_red",
            SourceType::Test => "test",
            SourceType::Simulation => "simulation",
            SourceType::SoilSensor => "soil_sensor",
        }
    }

    /// Parse a payload-supplied label. Accepts the legacy labels `node-red`
    /// and `capteur_reel` used by older firmware.
    pub fn from_label(label: &str) -> Option<Self> {
        // ---
        match label.trim().to_ascii_lowercase().as_str() {
            "real_sensor" | "capteur_reel" => Some(SourceType::RealSensor),
            "node_red" | "node-red" => Some(SourceType::NodeRed),
            "test" => Some(SourceType::Test),
            "simulation" => Some(SourceType::Simulation),
            "soil_sensor" => Some(SourceType::SoilSensor),
            _ => None,
        }
    }
}

/// Physical kind of sensor that produced a reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    SoilMoisture,
    Temperature,
    #[default]
    Multi,
    Environment,
}

impl SensorKind {
    // ---
    pub fn as_str(self) -> &'static str {
        // ---
        match self {
            SensorKind::SoilMoisture => "soil_moisture",
            SensorKind::Temperature => "temperature",
            SensorKind::Multi => "multi",
            SensorKind::Environment => "environment",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        // ---
        match label.trim().to_ascii_lowercase().as_str() {
            "soil_moisture" => Some(SensorKind::SoilMoisture),
            "temperature" => Some(SensorKind::Temperature),
            "multi" => Some(SensorKind::Multi),
            "environment" => Some(SensorKind::Environment),
            _ => None,
        }
    }
}

/// Canonical reading, ready to be appended to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    // ---
    pub device_id: String,
    #[serde(flatten)]
    pub measurements: Measurements,
    pub measured_at: DateTime<Utc>,
    pub is_simulation: bool,
    pub source_type: SourceType,
    pub sensor_kind: SensorKind,
    /// Original decoded or constructed payload, kept verbatim.
    pub raw_payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Why a reading was refused at the persistence boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("device_id is empty")]
    MissingDeviceId,

    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl Reading {
    // ---
    /// Check the identity and range invariants. Out-of-range values are
    /// reported, never clamped; NaN is always out of range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        // ---
        if self.device_id.trim().is_empty() {
            return Err(ValidationError::MissingDeviceId);
        }

        for (field, value) in self.measurements.present() {
            let (min, max) = field.range();
            if !(min..=max).contains(&value) {
                return Err(ValidationError::OutOfRange {
                    field: field.name(),
                    value,
                    min,
                    max,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn create_test_reading(measurements: Measurements) -> Reading {
        // ---
        Reading {
            device_id: "soil1".to_string(),
            measurements,
            measured_at: Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap(),
            is_simulation: false,
            source_type: SourceType::RealSensor,
            sensor_kind: SensorKind::Multi,
            raw_payload: json!({}),
            notes: None,
        }
    }

    #[test]
    fn test_range_boundaries_are_inclusive() {
        // ---
        for field in Field::ALL {
            let (min, max) = field.range();

            let mut low = Measurements::default();
            low.set(field, min);
            assert!(create_test_reading(low).validate().is_ok(), "{field:?} min");

            let mut high = Measurements::default();
            high.set(field, max);
            assert!(create_test_reading(high).validate().is_ok(), "{field:?} max");
        }
    }

    #[test]
    fn test_out_of_range_temperature_rejected() {
        // ---
        let reading = create_test_reading(Measurements {
            temperature_air: Some(150.0),
            ..Default::default()
        });

        assert_eq!(
            reading.validate(),
            Err(ValidationError::OutOfRange {
                field: "temperature_air",
                value: 150.0,
                min: -50.0,
                max: 100.0,
            })
        );
    }

    #[test]
    fn test_every_field_rejects_values_past_its_bounds() {
        // ---
        for field in Field::ALL {
            let (min, max) = field.range();
            for bad in [min - 0.5, max + 0.5, f64::NAN] {
                let mut m = Measurements::default();
                m.set(field, bad);
                let err = create_test_reading(m).validate().unwrap_err();
                match err {
                    ValidationError::OutOfRange { field: name, .. } => {
                        assert_eq!(name, field.name())
                    }
                    other => panic!("unexpected error {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_raw_only_reading_is_valid() {
        // ---
        let reading = create_test_reading(Measurements::default());
        assert!(reading.measurements.is_empty());
        assert!(reading.validate().is_ok());
    }

    #[test]
    fn test_blank_device_id_rejected() {
        // ---
        let mut reading = create_test_reading(Measurements::default());
        reading.device_id = "  ".to_string();
        assert_eq!(reading.validate(), Err(ValidationError::MissingDeviceId));
    }

    #[test]
    fn test_serialization_flattens_present_measurements() {
        // ---
        let reading = create_test_reading(Measurements {
            humidity_soil: Some(40.0),
            temperature_air: Some(18.0),
            ..Default::default()
        });

        let value = serde_json::to_value(&reading).unwrap();
        assert_eq!(value["humidity_soil"], json!(40.0));
        assert_eq!(value["temperature_air"], json!(18.0));
        assert!(value.get("humidity_air").is_none());
        assert_eq!(value["source_type"], json!("real_sensor"));
        assert_eq!(value["sensor_kind"], json!("multi"));
    }

    #[test]
    fn test_source_type_accepts_legacy_labels() {
        // ---
        assert_eq!(SourceType::from_label("node-red"), Some(SourceType::NodeRed));
        assert_eq!(
            SourceType::from_label("capteur_reel"),
            Some(SourceType::RealSensor)
        );
        assert_eq!(SourceType::from_label("Soil_Sensor"), Some(SourceType::SoilSensor));
        assert_eq!(SourceType::from_label("satellite"), None);
    }
}
