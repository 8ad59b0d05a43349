//! C9 Trade Pairing & Statistics (spec.md §4.5): pairs raw fills into
//! round-trip trades per `(account, market, code, instrument)` queue via
//! LIFO lot matching, then summarizes the result.

pub mod multiplier;
pub mod pairing;
pub mod statistics;

pub use multiplier::MultiplierTable;
pub use pairing::{pair_fills, OpenLot};
pub use statistics::{compute_statistics, HistogramBucket, MarketBreakdown, MonthlyPnl, StatisticsConfig, TradeStatistics};

use core_types::{RoundTripTrade, TradeFill};

/// The full output of pairing and summarizing one batch of fills.
#[derive(Debug, Clone)]
pub struct TradePairingResult {
    pub trades: Vec<RoundTripTrade>,
    pub open_lots: Vec<OpenLot>,
    pub statistics: TradeStatistics,
}

pub fn pair_and_summarize(fills: &[TradeFill], multipliers: &MultiplierTable, stats_cfg: StatisticsConfig) -> TradePairingResult {
    let (trades, open_lots) = pair_fills(fills, multipliers);
    let statistics = compute_statistics(&trades, stats_cfg);
    TradePairingResult { trades, open_lots, statistics }
}
