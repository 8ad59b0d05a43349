//! Sync orchestrator config and result types (spec.md §4.7).

use chrono::NaiveDate;
use core_types::SyncStatus;

/// Tunables spec.md §5 calls out by name: the bounded per-symbol worker
/// pool size and per-call deadlines.
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    pub kline_concurrency: usize,
    pub bars_timeout: std::time::Duration,
    pub broker_timeout: std::time::Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            kline_concurrency: 4,
            bars_timeout: std::time::Duration::from_secs(10),
            broker_timeout: std::time::Duration::from_secs(15),
        }
    }
}

/// The outcome of one sync action, before it's written into a `SyncLog`.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    pub records_count: i64,
    pub error: Option<String>,
}

impl SyncOutcome {
    pub fn success(records_count: i64) -> Self {
        Self { status: SyncStatus::Success, records_count, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { status: SyncStatus::Failed, records_count: 0, error: Some(error.into()) }
    }

    /// Combines this outcome with a following one, widening to `Partial`
    /// the moment either side isn't a clean success — used by `sync_all`
    /// to fold `{positions, trades, watchlist, klines}` into one result.
    pub fn then(self, next: SyncOutcome) -> SyncOutcome {
        let records_count = self.records_count + next.records_count;
        let error = match (self.error, next.error) {
            (Some(a), Some(b)) => Some(format!("{a}; {b}")),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
        let status = if self.status == SyncStatus::Success && next.status == SyncStatus::Success {
            SyncStatus::Success
        } else if self.status == SyncStatus::Failed && next.status == SyncStatus::Failed {
            SyncStatus::Failed
        } else {
            SyncStatus::Partial
        };
        SyncOutcome { status, records_count, error }
    }
}

/// One per-symbol failure recorded during a klines sync, for the log's
/// `error` field (spec.md §4.7: "recorded in the log with the offending
/// symbol").
#[derive(Debug, Clone)]
pub struct SymbolFailure {
    pub code: String,
    pub reason: String,
}

pub(crate) fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}
