//! Multi-bar chart pattern detectors (spec.md §4.3): each is a predicate
//! over the sequence of swings with explicit ratio and timing constraints,
//! returning a typed descriptor `{detected, score, key_points, projected_target}`.
//! Structural idiom (typed `PatternMatch` + free `detect_*` functions over
//! bar slices) is grounded on the teacher's `technical-analysis::patterns`
//! candlestick detectors; the swing-level patterns themselves (double
//! top/bottom, head-and-shoulders, cup-and-handle, triangles) have no
//! direct analog in the teacher and are original to this workspace.

use crate::trend_lines::{fit_trend_lines, TrendKind, TrendLineConfig};
use core_types::Bar;
use indicator_engine::divergence::{find_pivots, PivotKind};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartPattern {
    DoubleTop,
    DoubleBottom,
    HeadAndShoulders,
    InverseHeadAndShoulders,
    CupAndHandle,
    AscendingTriangle,
    DescendingTriangle,
    SymmetricalTriangle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternResult {
    pub pattern: ChartPattern,
    pub detected: bool,
    pub score: f64,
    pub key_points: Vec<usize>,
    pub projected_target: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct ChartPatternConfig {
    pub pivot_window: usize,
    /// Two swing prices are "roughly equal" when within this fraction.
    pub peak_tolerance_pct: f64,
    /// A handle must retrace no more than this fraction of the cup's depth.
    pub max_handle_retrace_pct: f64,
}

impl Default for ChartPatternConfig {
    fn default() -> Self {
        Self { pivot_window: 2, peak_tolerance_pct: 0.03, max_handle_retrace_pct: 0.5 }
    }
}

struct Swings {
    highs: Vec<(usize, f64)>,
    lows: Vec<(usize, f64)>,
}

fn swings(bars: &[Bar], window: usize) -> Swings {
    let highs: Vec<f64> = bars.iter().map(|b| b.high.to_f64().unwrap_or(0.0)).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low.to_f64().unwrap_or(0.0)).collect();
    let swing_highs = find_pivots(&highs, window)
        .into_iter()
        .filter(|p| p.kind == PivotKind::High)
        .map(|p| (p.index, highs[p.index]))
        .collect();
    let swing_lows = find_pivots(&lows, window)
        .into_iter()
        .filter(|p| p.kind == PivotKind::Low)
        .map(|p| (p.index, lows[p.index]))
        .collect();
    Swings { highs: swing_highs, lows: swing_lows }
}

fn roughly_equal(a: f64, b: f64, tol_pct: f64) -> bool {
    let base = a.abs().max(b.abs());
    base > 0.0 && (a - b).abs() / base <= tol_pct
}

/// Double top: two similar-height swing highs with an intervening swing
/// low (the "valley") dipping meaningfully below both. Breakdown target is
/// the valley price minus the peak-to-valley depth.
pub fn detect_double_top(bars: &[Bar], cfg: ChartPatternConfig) -> PatternResult {
    let s = swings(bars, cfg.pivot_window);
    for w in s.highs.windows(2) {
        let (i1, p1) = w[0];
        let (i2, p2) = w[1];
        if !roughly_equal(p1, p2, cfg.peak_tolerance_pct) {
            continue;
        }
        if let Some(&(vi, vp)) = s.lows.iter().find(|&&(vi, _)| vi > i1 && vi < i2) {
            let depth = (p1.max(p2) - vp) / p1.max(p2);
            if depth > 0.02 {
                let target = vp - (p1.max(p2) - vp);
                return PatternResult {
                    pattern: ChartPattern::DoubleTop,
                    detected: true,
                    score: (depth.min(0.3) / 0.3).clamp(0.0, 1.0),
                    key_points: vec![i1, vi, i2],
                    projected_target: Some(target),
                };
            }
        }
    }
    PatternResult { pattern: ChartPattern::DoubleTop, detected: false, score: 0.0, key_points: vec![], projected_target: None }
}

/// Double bottom: mirror of `detect_double_top` over swing lows with an
/// intervening peak.
pub fn detect_double_bottom(bars: &[Bar], cfg: ChartPatternConfig) -> PatternResult {
    let s = swings(bars, cfg.pivot_window);
    for w in s.lows.windows(2) {
        let (i1, p1) = w[0];
        let (i2, p2) = w[1];
        if !roughly_equal(p1, p2, cfg.peak_tolerance_pct) {
            continue;
        }
        if let Some(&(pi, pp)) = s.highs.iter().find(|&&(pi, _)| pi > i1 && pi < i2) {
            let depth = (pp - p1.min(p2)) / pp.max(1e-9);
            if depth > 0.02 {
                let target = pp + (pp - p1.min(p2));
                return PatternResult {
                    pattern: ChartPattern::DoubleBottom,
                    detected: true,
                    score: (depth.min(0.3) / 0.3).clamp(0.0, 1.0),
                    key_points: vec![i1, pi, i2],
                    projected_target: Some(target),
                };
            }
        }
    }
    PatternResult { pattern: ChartPattern::DoubleBottom, detected: false, score: 0.0, key_points: vec![], projected_target: None }
}

/// Head-and-shoulders: three consecutive swing highs, the middle
/// ("head") taller than both roughly-equal "shoulders", with a neckline
/// drawn through the two intervening swing lows. Target is the neckline
/// minus the head-to-neckline distance.
pub fn detect_head_and_shoulders(bars: &[Bar], cfg: ChartPatternConfig) -> PatternResult {
    let s = swings(bars, cfg.pivot_window);
    for w in s.highs.windows(3) {
        let (li, lp) = w[0];
        let (hi, hp) = w[1];
        let (ri, rp) = w[2];
        if !(hp > lp && hp > rp) || !roughly_equal(lp, rp, cfg.peak_tolerance_pct) {
            continue;
        }
        let left_trough = s.lows.iter().find(|&&(i, _)| i > li && i < hi);
        let right_trough = s.lows.iter().find(|&&(i, _)| i > hi && i < ri);
        if let (Some(&(lti, ltp)), Some(&(rti, rtp))) = (left_trough, right_trough) {
            let neckline = (ltp + rtp) / 2.0;
            let target = neckline - (hp - neckline);
            return PatternResult {
                pattern: ChartPattern::HeadAndShoulders,
                detected: true,
                score: ((hp - lp.max(rp)) / hp).clamp(0.0, 1.0),
                key_points: vec![li, lti, hi, rti, ri],
                projected_target: Some(target),
            };
        }
    }
    PatternResult { pattern: ChartPattern::HeadAndShoulders, detected: false, score: 0.0, key_points: vec![], projected_target: None }
}

/// Inverse head-and-shoulders: mirror of `detect_head_and_shoulders` over
/// swing lows (a "head" trough deeper than two roughly-equal shoulders).
pub fn detect_inverse_head_and_shoulders(bars: &[Bar], cfg: ChartPatternConfig) -> PatternResult {
    let s = swings(bars, cfg.pivot_window);
    for w in s.lows.windows(3) {
        let (li, lp) = w[0];
        let (hi, hp) = w[1];
        let (ri, rp) = w[2];
        if !(hp < lp && hp < rp) || !roughly_equal(lp, rp, cfg.peak_tolerance_pct) {
            continue;
        }
        let left_peak = s.highs.iter().find(|&&(i, _)| i > li && i < hi);
        let right_peak = s.highs.iter().find(|&&(i, _)| i > hi && i < ri);
        if let (Some(&(lpi, lpp)), Some(&(rpi, rpp))) = (left_peak, right_peak) {
            let neckline = (lpp + rpp) / 2.0;
            let target = neckline + (neckline - hp);
            return PatternResult {
                pattern: ChartPattern::InverseHeadAndShoulders,
                detected: true,
                score: ((lp.min(rp) - hp) / lp.min(rp).max(1e-9)).clamp(0.0, 1.0),
                key_points: vec![li, lpi, hi, rpi, ri],
                projected_target: Some(target),
            };
        }
    }
    PatternResult {
        pattern: ChartPattern::InverseHeadAndShoulders,
        detected: false,
        score: 0.0,
        key_points: vec![],
        projected_target: None,
    }
}

/// Cup and handle: a rim peak, a deep trough (the cup), a recovery to a
/// roughly-equal rim peak, then a shallow handle pullback retracing no
/// more than `max_handle_retrace_pct` of the cup's depth. Target is the
/// rim plus the cup depth.
pub fn detect_cup_and_handle(bars: &[Bar], cfg: ChartPatternConfig) -> PatternResult {
    let s = swings(bars, cfg.pivot_window);
    for i in 0..s.highs.len().saturating_sub(1) {
        let (rim1_i, rim1_p) = s.highs[i];
        let (rim2_i, rim2_p) = s.highs[i + 1];
        if !roughly_equal(rim1_p, rim2_p, cfg.peak_tolerance_pct) {
            continue;
        }
        let Some(&(bottom_i, bottom_p)) = s.lows.iter().find(|&&(bi, _)| bi > rim1_i && bi < rim2_i) else {
            continue;
        };
        let cup_depth = rim1_p.max(rim2_p) - bottom_p;
        if cup_depth <= 0.0 {
            continue;
        }
        // Handle: the next swing low after the second rim, shallower than
        // the cup.
        if let Some(&(handle_i, handle_p)) = s.lows.iter().find(|&&(hi, _)| hi > rim2_i) {
            let handle_depth = rim2_p - handle_p;
            if handle_depth > 0.0 && handle_depth / cup_depth <= cfg.max_handle_retrace_pct {
                let target = rim2_p + cup_depth;
                return PatternResult {
                    pattern: ChartPattern::CupAndHandle,
                    detected: true,
                    score: (1.0 - handle_depth / cup_depth).clamp(0.0, 1.0),
                    key_points: vec![rim1_i, bottom_i, rim2_i, handle_i],
                    projected_target: Some(target),
                };
            }
        }
    }
    PatternResult { pattern: ChartPattern::CupAndHandle, detected: false, score: 0.0, key_points: vec![], projected_target: None }
}

/// Triangles: fit the upper (swing-high) and lower (swing-low) boundary
/// lines over the same window and classify by their slopes — ascending
/// (flat top, rising bottom), descending (falling top, flat bottom), or
/// symmetrical (converging). Target is the breakout price plus the
/// triangle's height at its widest point.
pub fn detect_triangle(bars: &[Bar], cfg: ChartPatternConfig) -> PatternResult {
    let lines = fit_trend_lines(bars, TrendLineConfig { pivot_window: cfg.pivot_window, ..TrendLineConfig::default() });
    let upper = lines.iter().find(|l| l.kind == TrendKind::Downtrend);
    let lower = lines.iter().find(|l| l.kind == TrendKind::Uptrend);

    let (Some(upper), Some(lower)) = (upper, lower) else {
        return none_triangle();
    };

    let flat_threshold = 0.02;
    let upper_flat = upper.slope.abs() <= flat_threshold;
    let lower_flat = lower.slope.abs() <= flat_threshold;

    let pattern = if lower.slope > flat_threshold && upper_flat {
        ChartPattern::AscendingTriangle
    } else if upper.slope < -flat_threshold && lower_flat {
        ChartPattern::DescendingTriangle
    } else if upper.slope < -flat_threshold && lower.slope > flat_threshold {
        ChartPattern::SymmetricalTriangle
    } else {
        return none_triangle();
    };

    let n = bars.len() as f64;
    let last_close = bars.last().and_then(|b| b.close.to_f64()).unwrap_or(0.0);
    let height_at_start = (upper.intercept - lower.intercept).abs();
    let height_now = ((upper.slope * n + upper.intercept) - (lower.slope * n + lower.intercept)).abs();
    let score = (upper.touches + lower.touches) as f64 / 10.0;

    let target = match pattern {
        ChartPattern::AscendingTriangle => Some(last_close + height_at_start.max(height_now)),
        ChartPattern::DescendingTriangle => Some(last_close - height_at_start.max(height_now)),
        _ => None,
    };

    let mut key_points = upper.key_points.clone();
    key_points.extend(lower.key_points.iter().copied());
    key_points.sort_unstable();

    PatternResult { pattern, detected: true, score: score.clamp(0.0, 1.0), key_points, projected_target: target }
}

fn none_triangle() -> PatternResult {
    PatternResult {
        pattern: ChartPattern::SymmetricalTriangle,
        detected: false,
        score: 0.0,
        key_points: vec![],
        projected_target: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_types::Market;
    use rust_decimal::Decimal;

    fn bar(day: u32, h: f64, l: f64, c: f64) -> Bar {
        Bar {
            market: Market::Us,
            code: "T".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: Decimal::try_from(c).unwrap(),
            high: Decimal::try_from(h).unwrap(),
            low: Decimal::try_from(l).unwrap(),
            close: Decimal::try_from(c).unwrap(),
            volume: Decimal::from(1000),
            amount: None,
            turnover_rate: None,
            change_pct: None,
            precomputed: None,
        }
    }

    #[test]
    fn detects_double_top_with_deep_valley() {
        // Peak(100) ... valley(80) ... peak(99) — within 3% tolerance, valley 20% below.
        let bars = vec![
            bar(1, 90.0, 85.0, 88.0),
            bar(2, 100.0, 95.0, 98.0),
            bar(3, 90.0, 85.0, 87.0),
            bar(4, 85.0, 80.0, 82.0),
            bar(5, 90.0, 85.0, 87.0),
            bar(6, 99.0, 94.0, 97.0),
            bar(7, 90.0, 85.0, 87.0),
        ];
        let result = detect_double_top(&bars, ChartPatternConfig { pivot_window: 1, ..ChartPatternConfig::default() });
        assert!(result.detected, "signals: {:?}", result);
        assert!(result.projected_target.unwrap() < 80.0);
    }

    #[test]
    fn no_double_top_on_monotonic_series() {
        let bars: Vec<Bar> = (1..=10).map(|d| bar(d, 50.0 + d as f64, 45.0 + d as f64, 48.0 + d as f64)).collect();
        let result = detect_double_top(&bars, ChartPatternConfig::default());
        assert!(!result.detected);
    }
}
