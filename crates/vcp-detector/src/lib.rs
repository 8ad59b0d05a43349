//! C6 VCP Detector: identifies volatility-contraction patterns over a bar
//! series (spec.md §4.2). Built in the structural idiom of the teacher's
//! `technical-analysis::patterns` (typed result + free `detect_*`
//! functions over bar slices) — no direct VCP algorithm exists in the
//! teacher, so the swing/contraction logic here is original to this
//! workspace.

use core_types::Bar;
use indicator_engine::divergence::{find_pivots, PivotKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct VcpConfig {
    /// Half-width of the local-window swing pivot test (default: 3-5 bars).
    pub pivot_window: usize,
    pub min_contractions: usize,
    pub max_first_depth_pct: f64,
    pub depth_decrease_ratio: f64,
    pub final_depth_threshold: f64,
    pub pivot_distance_threshold_pct: f64,
}

impl Default for VcpConfig {
    fn default() -> Self {
        Self {
            pivot_window: 3,
            min_contractions: 2,
            max_first_depth_pct: 0.35,
            depth_decrease_ratio: 0.7,
            final_depth_threshold: 0.10,
            pivot_distance_threshold_pct: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VcpStage {
    None,
    Forming,
    Mature,
    Breakout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contraction {
    pub high_index: usize,
    pub high: f64,
    pub low_index: usize,
    pub low: f64,
    pub depth: f64,
    pub avg_volume: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcpResult {
    pub is_vcp: bool,
    pub score: f64,
    pub contractions: Vec<Contraction>,
    pub depth_sequence: Vec<f64>,
    pub pivot_price: Option<f64>,
    pub pivot_distance_pct: Option<f64>,
    pub stage: VcpStage,
    pub signals: Vec<String>,
}

/// Pairs each swing high with the next swing low that follows it,
/// chronologically, to form a raw sequence of contractions.
fn raw_contractions(bars: &[Bar], cfg: &VcpConfig) -> Vec<Contraction> {
    use rust_decimal::prelude::ToPrimitive;
    let highs: Vec<f64> = bars.iter().map(|b| b.high.to_f64().unwrap_or(0.0)).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low.to_f64().unwrap_or(0.0)).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume.to_f64().unwrap_or(0.0)).collect();

    let swing_highs: Vec<usize> = find_pivots(&highs, cfg.pivot_window)
        .into_iter()
        .filter(|p| p.kind == PivotKind::High)
        .map(|p| p.index)
        .collect();
    let swing_lows: Vec<usize> = find_pivots(&lows, cfg.pivot_window)
        .into_iter()
        .filter(|p| p.kind == PivotKind::Low)
        .map(|p| p.index)
        .collect();

    let mut events: Vec<(usize, bool)> = swing_highs.iter().map(|&i| (i, true)).chain(swing_lows.iter().map(|&i| (i, false))).collect();
    events.sort_by_key(|&(i, _)| i);

    let mut out = Vec::new();
    let mut pending_high: Option<usize> = None;
    for (idx, is_high) in events {
        if is_high {
            pending_high = Some(idx);
        } else if let Some(hidx) = pending_high.take() {
            if idx <= hidx {
                continue;
            }
            let high = highs[hidx];
            let low = lows[idx];
            if high <= 0.0 {
                continue;
            }
            let depth = (high - low) / high;
            let avg_volume = volumes[hidx..=idx].iter().sum::<f64>() / (idx - hidx + 1) as f64;
            out.push(Contraction { high_index: hidx, high, low_index: idx, low, depth, avg_volume });
        }
    }
    out
}

/// Builds the right-anchored non-increasing-high, strictly-narrowing
/// sequence described in spec.md §4.2. A contraction that is wider than
/// (or whose high exceeds) its predecessor resets the sequence from that
/// point, so the result is the tail run ending at the most recent
/// contraction.
fn narrowing_sequence(raw: Vec<Contraction>) -> Vec<Contraction> {
    let mut run: Vec<Contraction> = Vec::new();
    for c in raw {
        match run.last() {
            None => run.push(c),
            Some(prev) => {
                if c.high <= prev.high && c.depth < prev.depth {
                    run.push(c);
                } else {
                    run = vec![c];
                }
            }
        }
    }
    run
}

pub fn detect_vcp(bars: &[Bar], cfg: VcpConfig) -> VcpResult {
    use rust_decimal::prelude::ToPrimitive;

    let raw = raw_contractions(bars, &cfg);
    let sequence = narrowing_sequence(raw);

    if sequence.len() < cfg.min_contractions {
        let stage = if sequence.is_empty() { VcpStage::None } else { VcpStage::Forming };
        return VcpResult {
            is_vcp: false,
            score: 0.0,
            contractions: sequence.clone(),
            depth_sequence: sequence.iter().map(|c| c.depth).collect(),
            pivot_price: sequence.last().map(|c| c.high),
            pivot_distance_pct: None,
            stage,
            signals: vec!["insufficient contractions".to_string()],
        };
    }

    let depth_sequence: Vec<f64> = sequence.iter().map(|c| c.depth).collect();
    let pivot = sequence.last().unwrap().high;
    let close = bars.last().and_then(|b| b.close.to_f64()).unwrap_or(0.0);
    let pivot_distance_pct = if pivot > 0.0 { (close - pivot) / pivot * 100.0 } else { 0.0 };

    let mut signals = Vec::new();

    let count_ok = sequence.len() >= cfg.min_contractions;

    let first_depth_ok = depth_sequence[0] <= cfg.max_first_depth_pct;
    if !first_depth_ok {
        signals.push(format!("first contraction depth {:.1}% exceeds max", depth_sequence[0] * 100.0));
    }

    let mut decrease_ok = true;
    for w in depth_sequence.windows(2) {
        if w[1] > w[0] * cfg.depth_decrease_ratio {
            decrease_ok = false;
        }
    }
    let final_depth_ok = *depth_sequence.last().unwrap() < cfg.final_depth_threshold;
    if !final_depth_ok {
        signals.push("final contraction depth not tight enough".to_string());
    }

    let mut dryup_ok = true;
    for w in sequence.windows(2) {
        if w[1].avg_volume >= w[0].avg_volume {
            dryup_ok = false;
        }
    }
    if !dryup_ok {
        signals.push("volume did not dry up across contractions".to_string());
    }

    let pivot_ok = pivot_distance_pct.abs() <= cfg.pivot_distance_threshold_pct * 100.0 || pivot_distance_pct >= 0.0;
    if pivot_distance_pct > 0.0 {
        signals.push("close above pivot: breakout".to_string());
    } else if !pivot_ok {
        signals.push("close not within pivot distance threshold".to_string());
    }

    let is_vcp = count_ok && first_depth_ok && decrease_ok && final_depth_ok && dryup_ok && pivot_ok;

    let count_score = (sequence.len() as f64 / 5.0).min(1.0);
    let depth_quality_score = {
        let pairs = depth_sequence.len().saturating_sub(1).max(1) as f64;
        let good_pairs = depth_sequence
            .windows(2)
            .filter(|w| w[1] <= w[0] * cfg.depth_decrease_ratio)
            .count() as f64;
        let ratio_score = if depth_sequence.len() > 1 { good_pairs / pairs } else { 1.0 };
        let final_score = if final_depth_ok { 1.0 } else { 0.0 };
        (ratio_score + final_score) / 2.0
    };
    let volume_score = {
        let pairs = sequence.len().saturating_sub(1).max(1) as f64;
        let good_pairs = sequence
            .windows(2)
            .filter(|w| w[1].avg_volume < w[0].avg_volume)
            .count() as f64;
        if sequence.len() > 1 { good_pairs / pairs } else { 1.0 }
    };
    let pivot_score = if pivot_distance_pct >= 0.0 {
        1.0
    } else {
        (1.0 - (pivot_distance_pct.abs() / (cfg.pivot_distance_threshold_pct * 100.0)).min(1.0)).max(0.0)
    };

    let score = (count_score * 0.30 + depth_quality_score * 0.30 + volume_score * 0.25 + pivot_score * 0.15) * 100.0;

    let stage = if pivot_distance_pct >= 0.0 {
        VcpStage::Breakout
    } else if is_vcp {
        VcpStage::Mature
    } else {
        VcpStage::Forming
    };

    VcpResult {
        is_vcp,
        score,
        contractions: sequence,
        depth_sequence,
        pivot_price: Some(pivot),
        pivot_distance_pct: Some(pivot_distance_pct),
        stage,
        signals,
    }
}
