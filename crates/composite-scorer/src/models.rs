//! Config and result types for the composite scorer (spec.md §4.8).

use serde::{Deserialize, Serialize};

/// Default weights sum to 100, matching spec.md §4.8 exactly.
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub trend: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub volume: f64,
    pub pattern: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self { trend: 30.0, momentum: 20.0, volatility: 10.0, volume: 15.0, pattern: 25.0 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompositeConfig {
    /// Recent-bars window the scorer operates over (spec.md §4.8 default: 120).
    pub window: usize,
    pub weights: Weights,
    /// Minimum bars required to produce every subscore without undefined
    /// warm-up gaps (MA60 is the longest warm-up any subscore uses).
    pub min_bars: usize,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self { window: 120, weights: Weights::default(), min_bars: 60 }
    }
}

/// Externally supplied fundamentals/news nudges (spec.md §4.8: "optional
/// externally supplied fundamentals and news fields"). Each, if present, is
/// expected in `[0, 100]` on the same bullish-to-bearish scale as the core
/// subscores. Neither carries a weight in the table spec.md gives (trend
/// 30/momentum 20/volatility 10/volume 15/pattern 25 already sums to 100
/// with no fundamentals/news slot), so they pass through to the result for
/// a reporting layer to display rather than folding into the composite.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalSignals {
    pub fundamental_score: Option<f64>,
    pub news_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SubScores {
    pub trend: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub volume: f64,
    pub pattern: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Rating {
    /// Band thresholds from spec.md §4.8: >=75 strong_buy, 60-74 buy,
    /// 45-59 hold, 25-44 sell, <25 strong_sell.
    pub fn from_composite(composite: f64) -> Self {
        if composite >= 75.0 {
            Rating::StrongBuy
        } else if composite >= 60.0 {
            Rating::Buy
        } else if composite >= 45.0 {
            Rating::Hold
        } else if composite >= 25.0 {
            Rating::Sell
        } else {
            Rating::StrongSell
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeScore {
    pub subscores: SubScores,
    pub composite: f64,
    pub rating: Rating,
    pub fundamental_score: Option<f64>,
    pub news_score: Option<f64>,
    pub signals: Vec<String>,
}
