//! VCP-breakout strategy (spec.md §4.6): buy when the VCP detector reports
//! `Mature` with score at or above a threshold and `close ≥ pivotPrice`;
//! exit on a trailing stop at a fixed percent below the highest close
//! observed since entry.

use crate::models::{BacktestContext, Intent, IntentSide, Strategy};
use core_types::Bar;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use vcp_detector::{detect_vcp, VcpConfig, VcpStage};

pub struct VcpBreakoutStrategy {
    window: usize,
    score_threshold: f64,
    trailing_stop_pct: f64,
    qty: Decimal,
    vcp_config: VcpConfig,
    bars_seen: Vec<Bar>,
    highest_since_entry: Option<Decimal>,
}

impl VcpBreakoutStrategy {
    pub fn new(window: usize, score_threshold: f64, trailing_stop_pct: f64, qty: Decimal) -> Self {
        Self::with_vcp_config(window, score_threshold, trailing_stop_pct, qty, VcpConfig::default())
    }

    pub fn with_vcp_config(
        window: usize,
        score_threshold: f64,
        trailing_stop_pct: f64,
        qty: Decimal,
        vcp_config: VcpConfig,
    ) -> Self {
        Self {
            window,
            score_threshold,
            trailing_stop_pct,
            qty,
            vcp_config,
            bars_seen: Vec::new(),
            highest_since_entry: None,
        }
    }
}

impl Strategy for VcpBreakoutStrategy {
    fn on_bar(&mut self, ctx: &BacktestContext, bar: &Bar) -> Vec<Intent> {
        self.bars_seen.push(bar.clone());
        let holding: Decimal = ctx.positions.values().map(|p| p.qty).sum();

        if holding.is_zero() {
            // The pattern is evaluated over the bars preceding this one, so
            // that "close >= pivotPrice" checks the current bar's breakout
            // against a pivot established before it — evaluating the pivot
            // over a window that already includes this bar would make a
            // `Mature` stage and `close >= pivot` mutually exclusive, since
            // `detect_vcp` classifies a window whose own last close already
            // clears the pivot as `Breakout`, not `Mature`.
            let history_len = self.bars_seen.len() - 1;
            if history_len < self.window {
                return Vec::new();
            }
            let window_slice = &self.bars_seen[history_len - self.window..history_len];
            let result = detect_vcp(window_slice, self.vcp_config);
            if result.is_vcp && result.stage == VcpStage::Mature && result.score >= self.score_threshold {
                if let Some(pivot) = result.pivot_price {
                    if bar.close.to_f64().unwrap_or(0.0) >= pivot {
                        self.highest_since_entry = Some(bar.close);
                        return vec![Intent {
                            side: IntentSide::Buy,
                            qty: self.qty,
                            reason: format!("VCP breakout score {:.1}", result.score),
                        }];
                    }
                }
            }
            Vec::new()
        } else {
            let highest = self.highest_since_entry.get_or_insert(bar.close);
            if bar.close > *highest {
                *highest = bar.close;
            }
            let stop_fraction = Decimal::try_from(self.trailing_stop_pct).unwrap_or(Decimal::ZERO);
            let stop_price = *highest * (Decimal::ONE - stop_fraction);
            if bar.close <= stop_price {
                self.highest_since_entry = None;
                vec![Intent { side: IntentSide::Sell, qty: holding, reason: "trailing stop".into() }]
            } else {
                Vec::new()
            }
        }
    }
}
