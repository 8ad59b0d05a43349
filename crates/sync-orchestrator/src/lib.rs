//! C11 Sync Orchestrator (spec.md §4.7): idempotent ingest coordination
//! over the Quote and Broker providers, with a bounded per-symbol worker
//! pool for bar fetches (spec.md §5).

pub mod models;
pub mod orchestrator;

pub use models::{SyncConfig, SyncOutcome};
pub use orchestrator::SyncOrchestrator;
