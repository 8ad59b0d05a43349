//! The five subscore computations spec.md §4.8 names, each returning a
//! value in `[0, 100]`. Grounded on the teacher's
//! `analysis-orchestrator::combine_results` shape (independent scored
//! inputs folded by fixed weight), but the subscore formulas themselves —
//! trend alignment, RSI/MACD momentum banding, Bollinger
//! position/width, OBV slope/divergence, VCP+chart-pattern blending — have
//! no direct analog in the teacher and are original to this workspace,
//! derived straight from spec.md's named ingredients for each subscore.

use core_types::Bar;
use indicator_engine::{
    bollinger_bands, detect_divergence, macd, obv, rsi, sma, BollingerConfig, DivergenceConfig, DivergenceKind,
    MacdConfig, RsiConfig,
};
use pattern_scanner::{scan, ChartPattern};
use rust_decimal::prelude::ToPrimitive;
use vcp_detector::{detect_vcp, VcpConfig};

pub(crate) fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close.to_f64().unwrap_or(0.0)).collect()
}

pub(crate) fn volumes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.volume.to_f64().unwrap_or(0.0)).collect()
}

fn clamp(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

/// Maps a signed fractional change into `[0, 100]` centered at 50, saturating
/// once `|change| >= cap`.
fn center_on_50(change_pct: f64, cap: f64) -> f64 {
    clamp(50.0 + (change_pct / cap).clamp(-1.0, 1.0) * 50.0)
}

/// Trend: MA alignment (ma5 > ma10 > ma20 > ma60), price vs. MA20, and
/// MA20 slope, averaged.
pub fn trend_subscore(bars: &[Bar], signals: &mut Vec<String>) -> f64 {
    let c = closes(bars);
    let n = c.len();
    let ma5 = sma(&c, 5);
    let ma10 = sma(&c, 10);
    let ma20 = sma(&c, 20);
    let ma60 = sma(&c, 60);

    let (Some(m5), Some(m10), Some(m20), Some(m60)) = (ma5[n - 1], ma10[n - 1], ma20[n - 1], ma60[n - 1]) else {
        return 50.0;
    };

    let alignment_hits = [m5 > m10, m10 > m20, m20 > m60].iter().filter(|&&b| b).count();
    let alignment_score = alignment_hits as f64 / 3.0 * 100.0;
    if alignment_hits == 3 {
        signals.push("MA5/MA10/MA20/MA60 bullish alignment".into());
    } else if alignment_hits == 0 {
        signals.push("moving averages in bearish alignment".into());
    }

    let price_vs_ma20 = center_on_50((c[n - 1] - m20) / m20, 0.05);

    let slope_lookback = 10usize.min(n.saturating_sub(1));
    let ma20_slope = if slope_lookback > 0 && ma20[n - 1 - slope_lookback].is_some() {
        let prior = ma20[n - 1 - slope_lookback].unwrap();
        center_on_50((m20 - prior) / prior, 0.05)
    } else {
        50.0
    };

    clamp((alignment_score + price_vs_ma20 + ma20_slope) / 3.0)
}

/// Momentum: RSI band plus MACD cross state and zero-line position.
pub fn momentum_subscore(bars: &[Bar], signals: &mut Vec<String>) -> f64 {
    let c = closes(bars);
    let n = c.len();
    let rsi_series = rsi(&c, RsiConfig::default());
    let rsi_last = rsi_series[n - 1].unwrap_or(50.0);
    let rsi_score = rsi_band_score(rsi_last);

    let macd_result = macd(&c, MacdConfig::default());
    let mut macd_score = 50.0;
    let recent_cross = macd_result.cross[n.saturating_sub(3)..n].iter().copied().find(|&x| x != 0).unwrap_or(0);
    if recent_cross > 0 {
        macd_score += 25.0;
        signals.push("MACD crossed above signal".into());
    } else if recent_cross < 0 {
        macd_score -= 25.0;
        signals.push("MACD crossed below signal".into());
    }
    if let Some(m) = macd_result.macd[n - 1] {
        macd_score += if m > 0.0 { 15.0 } else { -15.0 };
    }

    clamp((rsi_score + clamp(macd_score)) / 2.0)
}

/// RSI band: overbought/oversold extremes roll off rather than saturate,
/// since an extreme RSI reading carries reversal risk alongside momentum.
fn rsi_band_score(rsi: f64) -> f64 {
    if rsi >= 80.0 {
        70.0
    } else if rsi >= 50.0 {
        50.0 + (rsi - 50.0) / 30.0 * 40.0
    } else if rsi >= 20.0 {
        10.0 + (rsi - 20.0) / 30.0 * 40.0
    } else {
        10.0
    }
}

/// Volatility: Bollinger position within the band plus the squeeze/width
/// state — a tight band scores as a favorable setup, a position near
/// either band edge scores as stretched.
pub fn volatility_subscore(bars: &[Bar], signals: &mut Vec<String>) -> f64 {
    let c = closes(bars);
    let n = c.len();
    let bb_config = BollingerConfig::default();
    let bb = bollinger_bands(&c, bb_config);
    let (Some(upper), Some(lower), Some(middle)) = (bb.upper[n - 1], bb.lower[n - 1], bb.middle[n - 1]) else {
        return 50.0;
    };

    let position = if upper > lower { clamp((c[n - 1] - lower) / (upper - lower) * 100.0) } else { 50.0 };
    let position_score = clamp(100.0 - (position - 50.0).abs() * 2.0);

    let width_pct = if middle != 0.0 { (upper - lower) / middle } else { 0.0 };
    let squeeze_threshold = bb_config.squeeze_threshold;
    let width_score = if bb.squeeze[n - 1] {
        signals.push("Bollinger band squeeze".into());
        90.0
    } else if width_pct > 0.0 {
        clamp((squeeze_threshold / width_pct) * 90.0).max(10.0)
    } else {
        50.0
    };

    clamp((position_score + width_score) / 2.0)
}

/// Volume: OBV slope plus price/OBV divergence near the end of the window.
pub fn volume_subscore(bars: &[Bar], signals: &mut Vec<String>) -> f64 {
    let c = closes(bars);
    let v = volumes(bars);
    let n = c.len();
    let obv_series = obv(&c, &v);

    let slope_lookback = 10usize.min(n.saturating_sub(1));
    let obv_last = obv_series[n - 1].unwrap_or(0.0);
    let mut score = if slope_lookback > 0 {
        let prior = obv_series[n - 1 - slope_lookback].unwrap_or(obv_last);
        let denom = prior.abs().max(1.0);
        center_on_50((obv_last - prior) / denom, 0.5)
    } else {
        50.0
    };

    let divs = detect_divergence(&c, &obv_series, DivergenceConfig::default());
    if let Some(last) = divs.last() {
        if last.recent_index + 10 >= n {
            match last.kind {
                DivergenceKind::Bullish => {
                    score += 15.0;
                    signals.push("bullish OBV divergence".into());
                }
                DivergenceKind::Bearish => {
                    score -= 15.0;
                    signals.push("bearish OBV divergence".into());
                }
            }
        }
    }

    clamp(score)
}

/// Pattern: VCP score primarily, nudged by any detected chart patterns
/// from the pattern scanner (spec.md §4.8: "VCP score primarily;
/// contributions from other patterns").
pub fn pattern_subscore(bars: &[Bar], signals: &mut Vec<String>) -> f64 {
    let vcp = detect_vcp(bars, VcpConfig::default());
    if vcp.is_vcp {
        signals.push(format!("VCP detected (score {:.1})", vcp.score));
    }

    let scan_result = scan(bars);
    let mut bullish_sum = 0.0;
    let mut bearish_sum = 0.0;
    for p in &scan_result.chart_patterns {
        match p.pattern {
            ChartPattern::DoubleBottom | ChartPattern::InverseHeadAndShoulders | ChartPattern::CupAndHandle | ChartPattern::AscendingTriangle => {
                bullish_sum += p.score;
                signals.push(format!("{:?} detected", p.pattern));
            }
            ChartPattern::DoubleTop | ChartPattern::HeadAndShoulders | ChartPattern::DescendingTriangle => {
                bearish_sum += p.score;
                signals.push(format!("{:?} detected", p.pattern));
            }
            ChartPattern::SymmetricalTriangle => {}
        }
    }
    let pattern_adjustment = ((bullish_sum - bearish_sum) / 100.0 * 30.0).clamp(-30.0, 30.0);

    clamp(0.7 * vcp.score + 0.3 * (50.0 + pattern_adjustment))
}
