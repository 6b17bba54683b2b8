//! Ingestion pipeline gateway.
//!
//! Only the items re-exported here are used outside `ingest/`.

mod classifier;
mod confirm;
mod coordinator;
mod device;
mod normalizer;
mod parser;

pub use confirm::ConfirmationEmitter;
pub use coordinator::{run, Coordinator};
