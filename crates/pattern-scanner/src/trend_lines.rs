//! Trend-line fitting (spec.md §4.3): a line through two or more confirmed
//! swing lows (uptrend/support line) or swing highs (downtrend/resistance
//! line), scored by R² and touch count, rejected once it accumulates more
//! than `max_breaches` violations.

use core_types::Bar;
use indicator_engine::divergence::{find_pivots, PivotKind};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendKind {
    Uptrend,
    Downtrend,
}

#[derive(Debug, Clone, Copy)]
pub struct TrendLineConfig {
    pub pivot_window: usize,
    pub max_breaches: usize,
    /// Fractional distance from the line within which a bar counts as a
    /// touch rather than a breach or a miss.
    pub touch_tolerance_pct: f64,
}

impl Default for TrendLineConfig {
    fn default() -> Self {
        Self { pivot_window: 2, max_breaches: 1, touch_tolerance_pct: 0.01 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendLine {
    pub kind: TrendKind,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub touches: usize,
    pub breaches: usize,
    pub key_points: Vec<usize>,
}

fn line_value(slope: f64, intercept: f64, x: f64) -> f64 {
    slope * x + intercept
}

/// Fits a line through every pair of same-kind swings, validates it
/// against the full bar series, and keeps candidates within the breach
/// budget. Returns the best candidate per kind (highest touches, then R²).
pub fn fit_trend_lines(bars: &[Bar], cfg: TrendLineConfig) -> Vec<TrendLine> {
    let highs: Vec<f64> = bars.iter().map(|b| b.high.to_f64().unwrap_or(0.0)).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low.to_f64().unwrap_or(0.0)).collect();

    let swing_lows: Vec<usize> = find_pivots(&lows, cfg.pivot_window)
        .into_iter()
        .filter(|p| p.kind == PivotKind::Low)
        .map(|p| p.index)
        .collect();
    let swing_highs: Vec<usize> = find_pivots(&highs, cfg.pivot_window)
        .into_iter()
        .filter(|p| p.kind == PivotKind::High)
        .map(|p| p.index)
        .collect();

    let mut out = Vec::new();
    if let Some(line) = best_candidate(&swing_lows, &lows, TrendKind::Uptrend, cfg) {
        out.push(line);
    }
    if let Some(line) = best_candidate(&swing_highs, &highs, TrendKind::Downtrend, cfg) {
        out.push(line);
    }
    out
}

fn best_candidate(swings: &[usize], series: &[f64], kind: TrendKind, cfg: TrendLineConfig) -> Option<TrendLine> {
    if swings.len() < 2 {
        return None;
    }
    let mut best: Option<TrendLine> = None;

    for i in 0..swings.len() {
        for j in (i + 1)..swings.len() {
            let (x1, x2) = (swings[i] as f64, swings[j] as f64);
            let (y1, y2) = (series[swings[i]], series[swings[j]]);
            if (x2 - x1).abs() < f64::EPSILON {
                continue;
            }
            let slope = (y2 - y1) / (x2 - x1);
            let intercept = y1 - slope * x1;

            let mut touches = 0usize;
            let mut breaches = 0usize;
            let mut key_points = Vec::new();
            let mut sum_sq_err = 0.0;
            let mut sum_sq_tot = 0.0;
            let mean: f64 = series.iter().sum::<f64>() / series.len() as f64;

            for (idx, &v) in series.iter().enumerate() {
                let expected = line_value(slope, intercept, idx as f64);
                if expected.abs() < f64::EPSILON {
                    continue;
                }
                let rel_dev = (v - expected) / expected;
                sum_sq_err += (v - expected).powi(2);
                sum_sq_tot += (v - mean).powi(2);

                let violates = match kind {
                    TrendKind::Uptrend => v < expected * (1.0 - cfg.touch_tolerance_pct),
                    TrendKind::Downtrend => v > expected * (1.0 + cfg.touch_tolerance_pct),
                };
                if violates {
                    breaches += 1;
                } else if rel_dev.abs() <= cfg.touch_tolerance_pct {
                    touches += 1;
                    key_points.push(idx);
                }
            }

            if breaches > cfg.max_breaches || touches < 2 {
                continue;
            }
            let r_squared = if sum_sq_tot > f64::EPSILON { (1.0 - sum_sq_err / sum_sq_tot).max(0.0) } else { 1.0 };

            let candidate = TrendLine { kind, slope, intercept, r_squared, touches, breaches, key_points };
            let better = match &best {
                None => true,
                Some(b) => candidate
                    .touches
                    .cmp(&b.touches)
                    .then(candidate.r_squared.partial_cmp(&b.r_squared).unwrap())
                    == std::cmp::Ordering::Greater,
            };
            if better {
                best = Some(candidate);
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_types::Market;
    use rust_decimal::Decimal;

    fn bar(day: u32, h: f64, l: f64) -> Bar {
        Bar {
            market: Market::Us,
            code: "T".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: Decimal::try_from((h + l) / 2.0).unwrap(),
            high: Decimal::try_from(h).unwrap(),
            low: Decimal::try_from(l).unwrap(),
            close: Decimal::try_from((h + l) / 2.0).unwrap(),
            volume: Decimal::from(1000),
            amount: None,
            turnover_rate: None,
            change_pct: None,
            precomputed: None,
        }
    }

    #[test]
    fn fits_clean_uptrend_support_line() {
        // Four collinear swing lows at indices 1, 4, 7, 10 (slope 2/3,
        // intercept 9.3333): 10.0, 12.0, 14.0, 16.0. Every other bar's low
        // sits 3 above the same line, so it never breaches the line and
        // always bounces away from it as a local minimum at the touch
        // indices — a clean ascending support line with zero breaches.
        let slope = 2.0 / 3.0;
        let intercept = 10.0 - slope * 1.0;
        let touch_indices = [1usize, 4, 7, 10];
        let lows: Vec<f64> = (0..13)
            .map(|i| {
                let expected = slope * i as f64 + intercept;
                if touch_indices.contains(&i) {
                    expected
                } else {
                    expected + 3.0
                }
            })
            .collect();
        let bars: Vec<Bar> = lows.iter().enumerate().map(|(i, &l)| bar((i + 1) as u32, l + 5.0, l)).collect();

        let lines = fit_trend_lines(&bars, TrendLineConfig { pivot_window: 1, ..TrendLineConfig::default() });
        assert!(
            lines.iter().any(|l| l.kind == TrendKind::Uptrend && l.slope > 0.0 && l.breaches == 0 && l.touches >= 2),
            "lines: {:?}",
            lines
        );
    }
}
