//! Support/resistance level clustering (spec.md §4.3). Swing extrema are
//! located the same way as the teacher's `technical-analysis::indicators::
//! support_resistance` (local-extremum confirmation over a window), then
//! clustered by price proximity instead of the teacher's
//! nearest-single-level approach, so each level carries a touch count and
//! a recency-weighted strength.

use core_types::Bar;
use indicator_engine::divergence::{find_pivots, PivotKind};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct LevelConfig {
    pub pivot_window: usize,
    /// Two swings cluster into the same level when within this fraction
    /// of each other's price, e.g. 0.02 = 2%.
    pub tolerance_pct: f64,
    pub top_k: usize,
    /// Bars-to-half-strength for the recency weight: a touch `half_life`
    /// bars old contributes half the weight of a touch at the last bar.
    pub recency_half_life: f64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self { pivot_window: 3, tolerance_pct: 0.02, top_k: 3, recency_half_life: 40.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    pub price: f64,
    pub touches: usize,
    pub strength: f64,
    pub last_touch_index: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupportResistance {
    pub supports: Vec<Level>,
    pub resistances: Vec<Level>,
}

fn cluster(mut swings: Vec<(usize, f64)>, tolerance_pct: f64, n: usize, half_life: f64) -> Vec<Level> {
    swings.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    let mut levels: Vec<Level> = Vec::new();
    let mut bucket: Vec<(usize, f64)> = Vec::new();

    let flush = |bucket: &[(usize, f64)], levels: &mut Vec<Level>| {
        if bucket.is_empty() {
            return;
        }
        let price = bucket.iter().map(|(_, p)| p).sum::<f64>() / bucket.len() as f64;
        let last_touch_index = bucket.iter().map(|(i, _)| *i).max().unwrap();
        let age = (n.saturating_sub(1) - last_touch_index) as f64;
        let recency_weight = 0.5f64.powf(age / half_life.max(1.0));
        levels.push(Level { price, touches: bucket.len(), strength: bucket.len() as f64 * recency_weight, last_touch_index });
    };

    for s in swings {
        match bucket.last() {
            None => bucket.push(s),
            Some(&(_, last_price)) => {
                if last_price <= 0.0 || (s.1 - last_price).abs() / last_price <= tolerance_pct {
                    bucket.push(s);
                } else {
                    flush(&bucket, &mut levels);
                    bucket.clear();
                    bucket.push(s);
                }
            }
        }
    }
    flush(&bucket, &mut levels);
    levels
}

/// Clusters swing highs into resistance candidates and swing lows into
/// support candidates, then keeps the top `top_k` by strength on each
/// side of the last close.
pub fn support_resistance(bars: &[Bar], cfg: LevelConfig) -> SupportResistance {
    if bars.is_empty() {
        return SupportResistance::default();
    }
    let highs: Vec<f64> = bars.iter().map(|b| b.high.to_f64().unwrap_or(0.0)).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low.to_f64().unwrap_or(0.0)).collect();
    let close = bars.last().unwrap().close.to_f64().unwrap_or(0.0);
    let n = bars.len();

    let swing_highs: Vec<(usize, f64)> = find_pivots(&highs, cfg.pivot_window)
        .into_iter()
        .filter(|p| p.kind == PivotKind::High)
        .map(|p| (p.index, highs[p.index]))
        .collect();
    let swing_lows: Vec<(usize, f64)> = find_pivots(&lows, cfg.pivot_window)
        .into_iter()
        .filter(|p| p.kind == PivotKind::Low)
        .map(|p| (p.index, lows[p.index]))
        .collect();

    let mut resistances = cluster(swing_highs, cfg.tolerance_pct, n, cfg.recency_half_life)
        .into_iter()
        .filter(|l| l.price > close)
        .collect::<Vec<_>>();
    let mut supports = cluster(swing_lows, cfg.tolerance_pct, n, cfg.recency_half_life)
        .into_iter()
        .filter(|l| l.price < close)
        .collect::<Vec<_>>();

    resistances.sort_by(|a, b| b.strength.partial_cmp(&a.strength).unwrap());
    supports.sort_by(|a, b| b.strength.partial_cmp(&a.strength).unwrap());
    resistances.truncate(cfg.top_k);
    supports.truncate(cfg.top_k);

    SupportResistance { supports, resistances }
}
