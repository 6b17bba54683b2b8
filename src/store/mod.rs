//! Append-only persistence boundary for readings.
//!
//! [`ReadingStore::append`] is the only write the ingestion core performs:
//! it validates the reading's range invariants and then inserts it. Backends
//! implement [`ReadingStore::insert`] and are responsible for their own
//! concurrency safety; readings are independent, so callers take no locks.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Reading, ValidationError};

#[cfg(test)]
pub mod memory;
mod postgres;

pub use postgres::PgReadingStore;

// ---

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The reading broke a range or identity invariant and was not stored.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The backing store failed (connectivity, capacity, ...).
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        Self::Persistence(value.to_string())
    }
}

#[async_trait]
pub trait ReadingStore: Send + Sync + 'static {
    /// Store an already validated reading and return its new identifier.
    async fn insert(&self, reading: &Reading) -> Result<Uuid, StoreError>;

    /// Validate, then insert. Never retries.
    async fn append(&self, reading: &Reading) -> Result<Uuid, StoreError> {
        // ---
        reading.validate()?;
        self.insert(reading).await
    }
}
