//! Database schema management for `piquet-ingest`.
//!
//! Ensures the `readings` table and its indexes exist before ingestion starts.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create the database schema (idempotent).
///
/// Every scalar column is nullable: a reading carries only what its payload
/// provided. Range checks happen in the store adapter before insert.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            id                UUID             PRIMARY KEY,
            device_id         TEXT             NOT NULL,
            humidity_air      DOUBLE PRECISION,
            humidity_soil     DOUBLE PRECISION,
            temperature_air   DOUBLE PRECISION,
            temperature_soil  DOUBLE PRECISION,
            pressure          DOUBLE PRECISION,
            latitude          DOUBLE PRECISION,
            longitude         DOUBLE PRECISION,
            battery           DOUBLE PRECISION,
            signal_quality    DOUBLE PRECISION,
            measured_at       TIMESTAMPTZ      NOT NULL,
            is_simulation     BOOLEAN          NOT NULL DEFAULT FALSE,
            source_type       TEXT             NOT NULL,
            sensor_kind       TEXT             NOT NULL DEFAULT 'multi',
            raw_payload       JSONB            NOT NULL,
            notes             TEXT,
            created_at        TIMESTAMPTZ      NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Indexes for the usual per-device and per-kind queries
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_readings_device_measured
            ON readings (device_id, measured_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_readings_sensor_kind
            ON readings (sensor_kind)",
        "CREATE INDEX IF NOT EXISTS idx_readings_humidity_soil
            ON readings (humidity_soil)",
        "CREATE INDEX IF NOT EXISTS idx_readings_temperature_soil
            ON readings (temperature_soil)",
        "CREATE INDEX IF NOT EXISTS idx_readings_is_simulation
            ON readings (is_simulation)",
    ];

    for statement in indexes {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(())
}
