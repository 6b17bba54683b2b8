//! In-memory [`ReadingStore`] for tests.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ReadingStore, StoreError};
use crate::models::Reading;

// ---

#[derive(Default)]
pub struct MemoryReadingStore {
    readings: RwLock<Vec<(Uuid, Reading)>>,
    fail: bool,
}

impl MemoryReadingStore {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every insert fails with a persistence error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub async fn stored(&self) -> Vec<(Uuid, Reading)> {
        self.readings.read().await.clone()
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn insert(&self, reading: &Reading) -> Result<Uuid, StoreError> {
        // ---
        if self.fail {
            return Err(StoreError::Persistence("store offline".to_string()));
        }
        let id = Uuid::new_v4();
        self.readings.write().await.push((id, reading.clone()));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{Measurements, SensorKind, SourceType};
    use chrono::Utc;
    use serde_json::json;

    fn create_test_reading(temperature_air: f64) -> Reading {
        // ---
        Reading {
            device_id: "soil1".to_string(),
            measurements: Measurements {
                temperature_air: Some(temperature_air),
                ..Default::default()
            },
            measured_at: Utc::now(),
            is_simulation: false,
            source_type: SourceType::RealSensor,
            sensor_kind: SensorKind::Multi,
            raw_payload: json!({"temp": temperature_air}),
            notes: None,
        }
    }

    #[test]
    fn test_append_assigns_distinct_ids() {
        // ---
        let store = MemoryReadingStore::new();
        let (a, b) = tokio_test::block_on(async {
            let a = store.append(&create_test_reading(18.0)).await.unwrap();
            let b = store.append(&create_test_reading(19.0)).await.unwrap();
            (a, b)
        });

        assert_ne!(a, b);
        assert_eq!(tokio_test::block_on(store.stored()).len(), 2);
    }

    #[test]
    fn test_append_rejects_out_of_range_without_storing() {
        // ---
        let store = MemoryReadingStore::new();
        let result = tokio_test::block_on(store.append(&create_test_reading(150.0)));

        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert!(tokio_test::block_on(store.stored()).is_empty());
    }

    #[test]
    fn test_validation_runs_before_backend() {
        // ---
        let store = MemoryReadingStore::failing();

        let invalid = tokio_test::block_on(store.append(&create_test_reading(-51.0)));
        assert!(matches!(invalid, Err(StoreError::Validation(_))));

        let valid = tokio_test::block_on(store.append(&create_test_reading(20.0)));
        assert!(matches!(valid, Err(StoreError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interfere() {
        // ---
        let store = std::sync::Arc::new(MemoryReadingStore::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.append(&create_test_reading(i as f64)).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(store.stored().await.len(), 16);
    }
}
