use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{ReadingStore, StoreError};
use crate::models::Reading;

// ---

/// [`ReadingStore`] backed by the `readings` table (see `schema.rs`).
///
/// Identifiers are generated client-side, so an insert is a single
/// statement with no read-back.
#[derive(Debug, Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    // ---
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn insert(&self, reading: &Reading) -> Result<Uuid, StoreError> {
        // ---
        let id = Uuid::new_v4();
        let m = &reading.measurements;

        sqlx::query(
            r#"
            INSERT INTO readings (
                id, device_id,
                humidity_air, humidity_soil, temperature_air, temperature_soil,
                pressure, latitude, longitude, battery, signal_quality,
                measured_at, is_simulation, source_type, sensor_kind,
                raw_payload, notes
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17
            )
            "#,
        )
        .bind(id)
        .bind(&reading.device_id)
        .bind(m.humidity_air)
        .bind(m.humidity_soil)
        .bind(m.temperature_air)
        .bind(m.temperature_soil)
        .bind(m.pressure)
        .bind(m.latitude)
        .bind(m.longitude)
        .bind(m.battery)
        .bind(m.signal_quality)
        .bind(reading.measured_at)
        .bind(reading.is_simulation)
        .bind(reading.source_type.as_str())
        .bind(reading.sensor_kind.as_str())
        .bind(&reading.raw_payload)
        .bind(reading.notes.as_deref())
        .execute(&self.pool)
        .await?;

        debug!("Inserted reading {} for device {}", id, reading.device_id);
        Ok(id)
    }
}
