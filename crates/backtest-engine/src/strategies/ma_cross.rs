//! MA-cross strategy (spec.md §4.6): buy when the short SMA crosses above
//! the long SMA, sell on the reverse cross, fixed position sizing.

use crate::models::{BacktestContext, Intent, IntentSide, Strategy};
use core_types::Bar;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

pub struct MaCrossStrategy {
    short_period: usize,
    long_period: usize,
    qty: Decimal,
    closes: Vec<f64>,
    prev_short: Option<f64>,
    prev_long: Option<f64>,
}

impl MaCrossStrategy {
    pub fn new(short_period: usize, long_period: usize, qty: Decimal) -> Self {
        Self { short_period, long_period, qty, closes: Vec::new(), prev_short: None, prev_long: None }
    }

    fn sma(&self, period: usize) -> Option<f64> {
        if self.closes.len() < period {
            return None;
        }
        let window = &self.closes[self.closes.len() - period..];
        Some(window.iter().sum::<f64>() / period as f64)
    }
}

impl Strategy for MaCrossStrategy {
    fn on_bar(&mut self, ctx: &BacktestContext, bar: &Bar) -> Vec<Intent> {
        self.closes.push(bar.close.to_f64().unwrap_or(0.0));
        let short = self.sma(self.short_period);
        let long = self.sma(self.long_period);

        let mut intents = Vec::new();
        if let (Some(s), Some(l), Some(ps), Some(pl)) = (short, long, self.prev_short, self.prev_long) {
            let holding: Decimal = ctx.positions.values().map(|p| p.qty).sum();
            let crossed_up = ps <= pl && s > l;
            let crossed_down = ps >= pl && s < l;
            if crossed_up && holding.is_zero() {
                intents.push(Intent { side: IntentSide::Buy, qty: self.qty, reason: "short SMA crossed above long SMA".into() });
            } else if crossed_down && !holding.is_zero() {
                intents.push(Intent { side: IntentSide::Sell, qty: holding, reason: "short SMA crossed below long SMA".into() });
            }
        }

        self.prev_short = short;
        self.prev_long = long;
        intents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BacktestEngine;
    use crate::models::BacktestConfig;
    use chrono::NaiveDate;
    use core_types::Market;

    fn bar(day: u32, close: i64) -> Bar {
        Bar {
            market: Market::Us,
            code: "AAPL".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: Decimal::from(close),
            high: Decimal::from(close),
            low: Decimal::from(close),
            close: Decimal::from(close),
            volume: Decimal::from(1000),
            amount: None,
            turnover_rate: None,
            change_pct: None,
            precomputed: None,
        }
    }

    #[test]
    fn buys_on_golden_cross_and_sells_on_death_cross() {
        // closes fall then rise sharply, so short(2) crosses above long(4)
        // partway through, then falls back to trigger the reverse cross.
        let closes = [20, 18, 16, 14, 20, 26, 30, 24, 18, 12, 8];
        let bars: Vec<Bar> = closes.iter().enumerate().map(|(i, &c)| bar((i + 1) as u32, c)).collect();
        let mut strategy = MaCrossStrategy::new(2, 4, Decimal::from(10));
        let mut engine = BacktestEngine::new(BacktestConfig {
            strategy_name: "ma_cross".into(),
            code: "AAPL".into(),
            initial_capital: Decimal::from(10_000),
            commission_rate: Decimal::ZERO,
        });
        let result = engine.run(&bars, &mut strategy);
        assert!(result.total_trades >= 1, "expected at least one round trip, got {:?}", result.trades);
    }
}
