//! Round-trip trade statistics (spec.md §4.5): win rate, gain/loss
//! aggregates, profit factor, expectancy, hold-day averages, fee
//! breakdown by instrument class, top/bottom trades, a monthly P&L
//! series, a pnl-ratio histogram, and a per-market breakdown. Grounded
//! on the teacher's `portfolio-manager::risk_metrics` aggregate-over-a-
//! vector style, generalized from that module's single-pass f64 folds to
//! the richer multi-facet summary spec.md calls for.

use chrono::Datelike;
use core_types::{Instrument, Market, RoundTripTrade};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyPnl {
    pub year: i32,
    pub month: u32,
    pub net_pnl: Decimal,
    pub trade_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketBreakdown {
    pub market: Market,
    pub trade_count: usize,
    pub net_pnl: Decimal,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct StatisticsConfig {
    pub top_n: usize,
    pub histogram_buckets: usize,
    /// Histogram spans `[-histogram_range_pct, +histogram_range_pct]` of
    /// pnl_ratio; values outside clamp into the edge buckets.
    pub histogram_range_pct: f64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self { top_n: 5, histogram_buckets: 10, histogram_range_pct: 0.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeStatistics {
    pub count: usize,
    pub win_rate: f64,
    pub total_gain: Decimal,
    pub average_gain: Decimal,
    /// Sum of losing trades' net P&L; zero or negative.
    pub total_loss: Decimal,
    pub average_loss: Decimal,
    /// `|total_gain| / |total_loss|`; `None` when there are no losing trades.
    pub profit_factor: Option<f64>,
    pub expectancy: Decimal,
    pub avg_hold_days_win: Option<f64>,
    pub avg_hold_days_loss: Option<f64>,
    pub fees_by_instrument: Vec<(Instrument, Decimal)>,
    pub top_best: Vec<RoundTripTrade>,
    pub top_worst: Vec<RoundTripTrade>,
    pub monthly_pnl: Vec<MonthlyPnl>,
    pub pnl_ratio_histogram: Vec<HistogramBucket>,
    pub market_breakdown: Vec<MarketBreakdown>,
}

fn mean_hold_days(trades: &[&RoundTripTrade]) -> Option<f64> {
    if trades.is_empty() {
        return None;
    }
    let sum: i64 = trades.iter().map(|t| t.hold_days).sum();
    Some(sum as f64 / trades.len() as f64)
}

pub fn compute_statistics(trades: &[RoundTripTrade], cfg: StatisticsConfig) -> TradeStatistics {
    let count = trades.len();
    let wins: Vec<&RoundTripTrade> = trades.iter().filter(|t| t.net_pnl > Decimal::ZERO).collect();
    let losses: Vec<&RoundTripTrade> = trades.iter().filter(|t| t.net_pnl < Decimal::ZERO).collect();

    let win_rate = if count > 0 { wins.len() as f64 / count as f64 } else { 0.0 };
    let total_gain: Decimal = wins.iter().map(|t| t.net_pnl).sum();
    let average_gain = if !wins.is_empty() { total_gain / Decimal::from(wins.len()) } else { Decimal::ZERO };
    let total_loss: Decimal = losses.iter().map(|t| t.net_pnl).sum();
    let average_loss = if !losses.is_empty() { total_loss / Decimal::from(losses.len()) } else { Decimal::ZERO };

    let profit_factor = if !total_loss.is_zero() {
        let ratio = (total_gain.abs() / total_loss.abs()).to_f64().unwrap_or(0.0);
        Some(ratio)
    } else {
        None
    };

    let expectancy = if count > 0 { (total_gain + total_loss) / Decimal::from(count) } else { Decimal::ZERO };

    let avg_hold_days_win = mean_hold_days(&wins);
    let avg_hold_days_loss = mean_hold_days(&losses);

    let mut fees_by_instrument: Vec<(Instrument, Decimal)> = Vec::new();
    for instrument in [Instrument::Stock, Instrument::Option] {
        let fees: Decimal = trades.iter().filter(|t| t.instrument == instrument).map(|t| t.fees).sum();
        if trades.iter().any(|t| t.instrument == instrument) {
            fees_by_instrument.push((instrument, fees));
        }
    }

    let mut by_pnl_desc = trades.to_vec();
    by_pnl_desc.sort_by(|a, b| b.net_pnl.cmp(&a.net_pnl));
    let top_best: Vec<RoundTripTrade> = by_pnl_desc.iter().take(cfg.top_n).cloned().collect();
    let top_worst: Vec<RoundTripTrade> = by_pnl_desc.iter().rev().take(cfg.top_n).cloned().collect();

    let mut monthly: std::collections::BTreeMap<(i32, u32), (Decimal, usize)> = std::collections::BTreeMap::new();
    for t in trades {
        let key = (t.exit_time.year(), t.exit_time.month());
        let entry = monthly.entry(key).or_insert((Decimal::ZERO, 0));
        entry.0 += t.net_pnl;
        entry.1 += 1;
    }
    let monthly_pnl: Vec<MonthlyPnl> = monthly
        .into_iter()
        .map(|((year, month), (net_pnl, trade_count))| MonthlyPnl { year, month, net_pnl, trade_count })
        .collect();

    let pnl_ratio_histogram = build_histogram(trades, cfg.histogram_buckets, cfg.histogram_range_pct);

    let mut by_market: std::collections::HashMap<Market, (usize, Decimal, usize)> = std::collections::HashMap::new();
    for t in trades {
        let entry = by_market.entry(t.market).or_insert((0, Decimal::ZERO, 0));
        entry.0 += 1;
        entry.1 += t.net_pnl;
        if t.net_pnl > Decimal::ZERO {
            entry.2 += 1;
        }
    }
    let mut market_breakdown: Vec<MarketBreakdown> = by_market
        .into_iter()
        .map(|(market, (trade_count, net_pnl, win_count))| MarketBreakdown {
            market,
            trade_count,
            net_pnl,
            win_rate: if trade_count > 0 { win_count as f64 / trade_count as f64 } else { 0.0 },
        })
        .collect();
    market_breakdown.sort_by(|a, b| format!("{:?}", a.market).cmp(&format!("{:?}", b.market)));

    TradeStatistics {
        count,
        win_rate,
        total_gain,
        average_gain,
        total_loss,
        average_loss,
        profit_factor,
        expectancy,
        avg_hold_days_win,
        avg_hold_days_loss,
        fees_by_instrument,
        top_best,
        top_worst,
        monthly_pnl,
        pnl_ratio_histogram,
        market_breakdown,
    }
}

fn build_histogram(trades: &[RoundTripTrade], buckets: usize, range_pct: f64) -> Vec<HistogramBucket> {
    if buckets == 0 {
        return Vec::new();
    }
    let width = (2.0 * range_pct) / buckets as f64;
    let mut counts = vec![0usize; buckets];
    for t in trades {
        let clamped = t.pnl_ratio.clamp(-range_pct, range_pct);
        let mut idx = (((clamped + range_pct) / width) as usize).min(buckets - 1);
        if clamped >= range_pct {
            idx = buckets - 1;
        }
        counts[idx] += 1;
    }
    (0..buckets)
        .map(|i| HistogramBucket {
            lower: -range_pct + i as f64 * width,
            upper: -range_pct + (i + 1) as f64 * width,
            count: counts[i],
        })
        .collect()
}
