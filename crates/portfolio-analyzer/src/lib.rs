//! C8 Portfolio Analyzer (spec.md §4.4): per-position metrics, summary,
//! market allocation, top/bottom performers, risk metrics, and signals
//! over a snapshot of positions. Grounded on the teacher's
//! `portfolio-manager::risk_metrics::RiskCalculator` (concentration via
//! weights, `herfindahl_index`) and `portfolio-manager::portfolio::
//! get_portfolio_summary` (per-position pl aggregation), rescaled per
//! spec.md from the teacher's HHI range [0,1] to [0,10000].

use core_types::{Market, Position, PositionSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionMetric {
    pub market: Market,
    pub code: String,
    pub market_value: Decimal,
    pub pl_value: Decimal,
    pub pl_ratio: Option<f64>,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketAllocation {
    pub market: Market,
    pub position_count: usize,
    pub market_value: Decimal,
    pub weight: f64,
    pub pl_value: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub position_count: usize,
    pub total_market_value: Decimal,
    pub total_pl_value: Decimal,
    pub total_pl_ratio: Option<f64>,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcentrationRisk {
    Low,
    Medium,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// `Σ(weight_i · 10000)² / 10000`, scaled to [0, 10000].
    pub hhi: f64,
    pub concentration_risk: ConcentrationRisk,
    pub diversification_score: f64,
    pub largest_loss_position: Option<(Market, String, Decimal)>,
}

#[derive(Debug, Clone, Copy)]
pub struct AnalyzerConfig {
    pub single_position_warn_pct: f64,
    pub hhi_warn: f64,
    pub min_positions_warn: usize,
    pub top5_concentration_warn_pct: f64,
    pub pl_ratio_loss_warn: f64,
    pub concentration_low_max_pct: f64,
    pub concentration_medium_max_pct: f64,
    pub concentration_high_max_pct: f64,
    pub top_n: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            single_position_warn_pct: 20.0,
            hhi_warn: 2500.0,
            min_positions_warn: 5,
            top5_concentration_warn_pct: 80.0,
            pl_ratio_loss_warn: -0.20,
            concentration_low_max_pct: 10.0,
            concentration_medium_max_pct: 20.0,
            concentration_high_max_pct: 30.0,
            top_n: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub positions: Vec<PositionMetric>,
    pub summary: PortfolioSummary,
    pub market_allocation: Vec<MarketAllocation>,
    pub top_performers: Vec<PositionMetric>,
    pub bottom_performers: Vec<PositionMetric>,
    pub risk: RiskMetrics,
    pub signals: Vec<String>,
}

fn decimal_to_f64(d: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    d.to_f64().unwrap_or(0.0)
}

pub fn analyze(positions: &[Position], cfg: AnalyzerConfig) -> AnalysisResult {
    let total_market_value: Decimal = positions.iter().map(|p| p.market_value()).sum();
    let total_mv_f64 = decimal_to_f64(total_market_value);

    let mut metrics: Vec<PositionMetric> = positions
        .iter()
        .map(|p| {
            let mv = p.market_value();
            let weight = if total_mv_f64 > 0.0 { decimal_to_f64(mv) / total_mv_f64 } else { 0.0 };
            PositionMetric { market: p.market, code: p.code.clone(), market_value: mv, pl_value: p.pl_value(), pl_ratio: p.pl_ratio(), weight }
        })
        .collect();
    metrics.sort_by(|a, b| a.code.cmp(&b.code));

    let total_pl_value: Decimal = metrics.iter().map(|m| m.pl_value).sum();
    let total_cost: Decimal = positions.iter().map(|p| p.cost_price * p.qty).sum();
    let total_pl_ratio = if !total_cost.is_zero() { Some(decimal_to_f64(total_pl_value) / decimal_to_f64(total_cost)) } else { None };
    let win_rate = if !metrics.is_empty() {
        metrics.iter().filter(|m| m.pl_value > Decimal::ZERO).count() as f64 / metrics.len() as f64
    } else {
        0.0
    };

    let summary = PortfolioSummary {
        position_count: metrics.len(),
        total_market_value,
        total_pl_value,
        total_pl_ratio,
        win_rate,
    };

    let mut by_market: HashMap<Market, (usize, Decimal, Decimal)> = HashMap::new();
    for m in &metrics {
        let entry = by_market.entry(m.market).or_insert((0, Decimal::ZERO, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += m.market_value;
        entry.2 += m.pl_value;
    }
    let mut market_allocation: Vec<MarketAllocation> = by_market
        .into_iter()
        .map(|(market, (count, mv, pl))| MarketAllocation {
            market,
            position_count: count,
            market_value: mv,
            weight: if total_mv_f64 > 0.0 { decimal_to_f64(mv) / total_mv_f64 } else { 0.0 },
            pl_value: pl,
        })
        .collect();
    market_allocation.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap());

    let rank_key = |m: &PositionMetric| (m.pl_ratio.unwrap_or(0.0), decimal_to_f64(m.pl_value).abs(), m.code.clone());
    let mut by_performance = metrics.clone();
    by_performance.sort_by(|a, b| {
        let (ra, va, ca) = rank_key(a);
        let (rb, vb, cb) = rank_key(b);
        rb.partial_cmp(&ra).unwrap().then(vb.partial_cmp(&va).unwrap()).then(ca.cmp(&cb))
    });
    let top_performers: Vec<PositionMetric> = by_performance.iter().take(cfg.top_n).cloned().collect();
    let bottom_performers: Vec<PositionMetric> = by_performance.iter().rev().take(cfg.top_n).cloned().collect();

    let weights: Vec<f64> = metrics.iter().map(|m| m.weight).collect();
    let hhi = weights.iter().map(|w| (w * 10000.0).powi(2)).sum::<f64>() / 10000.0;
    let max_weight_pct = weights.iter().cloned().fold(0.0, f64::max) * 100.0;
    let concentration_risk = if max_weight_pct <= cfg.concentration_low_max_pct {
        ConcentrationRisk::Low
    } else if max_weight_pct <= cfg.concentration_medium_max_pct {
        ConcentrationRisk::Medium
    } else if max_weight_pct <= cfg.concentration_high_max_pct {
        ConcentrationRisk::High
    } else {
        ConcentrationRisk::VeryHigh
    };
    // Diversification: 100 at HHI=0 (perfectly diversified), 0 at HHI=10000
    // (single position), discounted further for very few holdings.
    let position_count_factor = (metrics.len() as f64 / 10.0).min(1.0);
    let diversification_score = (1.0 - hhi / 10000.0) * 100.0 * position_count_factor;

    let largest_loss_position = metrics
        .iter()
        .filter(|m| m.pl_value < Decimal::ZERO)
        .min_by_key(|m| m.pl_value)
        .map(|m| (m.market, m.code.clone(), m.pl_value));

    let risk = RiskMetrics { hhi, concentration_risk, diversification_score, largest_loss_position };

    let mut signals = Vec::new();
    if max_weight_pct > cfg.single_position_warn_pct {
        signals.push(format!("single position exceeds {:.0}% of portfolio ({:.1}%)", cfg.single_position_warn_pct, max_weight_pct));
    }
    if hhi > cfg.hhi_warn {
        signals.push(format!("HHI {:.0} exceeds concentration threshold {:.0}", hhi, cfg.hhi_warn));
    }
    if metrics.len() < cfg.min_positions_warn {
        signals.push(format!("fewer than {} positions held ({})", cfg.min_positions_warn, metrics.len()));
    }
    let mut weights_desc: Vec<f64> = metrics.iter().map(|m| m.weight).collect();
    weights_desc.sort_by(|a, b| b.partial_cmp(a).unwrap());
    let top5_concentration_pct: f64 = weights_desc.iter().take(5).sum::<f64>() * 100.0;
    if top5_concentration_pct > cfg.top5_concentration_warn_pct {
        signals.push(format!("top 5 positions hold {:.1}% of portfolio", top5_concentration_pct));
    }
    for m in &metrics {
        if let Some(ratio) = m.pl_ratio {
            if ratio < cfg.pl_ratio_loss_warn {
                signals.push(format!("{} down {:.1}%", m.code, ratio * 100.0));
            }
        }
    }

    AnalysisResult { positions: metrics, summary, market_allocation, top_performers, bottom_performers, risk, signals }
}

/// Counts how many of `positions` are currently short (for completeness
/// of per-position metrics; the side itself is carried on `Position`).
pub fn short_count(positions: &[Position]) -> usize {
    positions.iter().filter(|p| p.side == PositionSide::Short).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn position(code: &str, qty: i64, cost: i64, price: i64) -> Position {
        Position {
            account: "acct1".into(),
            snapshot_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            market: Market::Us,
            code: code.into(),
            qty: Decimal::from(qty),
            can_sell_qty: None,
            cost_price: Decimal::from(cost),
            market_price: Decimal::from(price),
            side: PositionSide::Long,
        }
    }

    #[test]
    fn single_dominant_position_trips_concentration_signals() {
        let positions = vec![position("AAPL", 1000, 10, 15), position("MSFT", 1, 10, 10)];
        let result = analyze(&positions, AnalyzerConfig::default());
        assert_eq!(result.risk.concentration_risk, ConcentrationRisk::VeryHigh);
        assert!(result.signals.iter().any(|s| s.contains("single position")));
    }

    #[test]
    fn win_rate_counts_positive_pl_positions() {
        let positions = vec![
            position("AAPL", 10, 10, 15),
            position("MSFT", 10, 10, 5),
            position("GOOG", 10, 10, 20),
        ];
        let result = analyze(&positions, AnalyzerConfig::default());
        assert!((result.summary.win_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn diversified_equal_weight_portfolio_has_low_hhi() {
        let positions: Vec<Position> = (0..10).map(|i| position(&format!("S{i}"), 10, 10, 10)).collect();
        let result = analyze(&positions, AnalyzerConfig::default());
        assert!(result.risk.hhi < 1500.0, "hhi was {}", result.risk.hhi);
        assert_eq!(result.risk.concentration_risk, ConcentrationRisk::Low);
    }

    #[test]
    fn largest_loss_position_is_most_negative_pl() {
        let positions = vec![position("AAPL", 10, 10, 15), position("MSFT", 10, 10, 2)];
        let result = analyze(&positions, AnalyzerConfig::default());
        let (_, code, _) = result.risk.largest_loss_position.unwrap();
        assert_eq!(code, "MSFT");
    }
}
