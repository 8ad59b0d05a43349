//! Backtest domain types (spec.md §4.6). Grounded on the teacher's
//! `models.rs`, trimmed to the fields spec.md's simulation loop and result
//! set actually need: no margin, short-selling, market-impact, tiered
//! commission, or regime-sizing configuration.

use chrono::NaiveDate;
use core_types::Bar;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub strategy_name: String,
    pub code: String,
    pub initial_capital: Decimal,
    /// Flat commission rate applied to both entry and exit notional, e.g.
    /// `0.001` = 0.1%. Matches the teacher's flat-rate default; the
    /// teacher's tiered `CommissionModel` has no spec.md counterpart.
    pub commission_rate: Decimal,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            strategy_name: "unnamed".into(),
            code: String::new(),
            initial_capital: Decimal::from(100_000),
            commission_rate: Decimal::new(1, 3),
        }
    }
}

/// A position open at a point during the run — `{qty, avgCost}` per
/// spec.md §4.6 State.
#[derive(Debug, Clone, Default)]
pub struct PositionState {
    pub qty: Decimal,
    pub avg_cost: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentSide {
    Buy,
    Sell,
}

/// An order intent emitted by a strategy's `on_bar`, executed at the same
/// bar's close (spec.md §4.6 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub side: IntentSide,
    pub qty: Decimal,
    pub reason: String,
}

/// Read-only view handed to a strategy's callbacks: current cash,
/// mark-to-market equity, and open positions.
pub struct BacktestContext<'a> {
    pub date: NaiveDate,
    pub cash: Decimal,
    pub equity: Decimal,
    pub positions: &'a HashMap<String, PositionState>,
}

/// A strategy: `on_bar` emits zero or more intents for the current bar;
/// `on_end` is a finalization hook invoked once after the last bar (it does
/// not emit further intents — the engine liquidates nothing automatically).
pub trait Strategy {
    fn on_bar(&mut self, ctx: &BacktestContext, bar: &Bar) -> Vec<Intent>;
    fn on_end(&mut self, _ctx: &BacktestContext) {}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: Decimal,
    pub drawdown_percent: f64,
}

/// A completed round-trip trade in the simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestTrade {
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub qty: Decimal,
    pub profit_loss: Decimal,
    pub profit_loss_percent: f64,
    pub holding_period_days: i64,
    pub commission_cost: Decimal,
    pub exit_reason: String,
}

/// An intent the engine refused to execute (would drive cash negative, or
/// has no matching position to close).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedIntent {
    pub date: NaiveDate,
    pub side: IntentSide,
    pub qty: Decimal,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub code: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: Decimal,
    pub final_capital: Decimal,
    pub total_return: Decimal,
    pub total_return_percent: f64,
    pub annualized_return_percent: Option<f64>,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub profit_factor: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub max_drawdown_percent: f64,
    pub calmar_ratio: Option<f64>,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<BacktestTrade>,
    pub rejected_intents: Vec<RejectedIntent>,
    pub benchmark: Option<BenchmarkComparison>,
}

/// Buy-and-hold comparison, and an optional externally supplied benchmark
/// (spec.md supplement, §2 of SPEC_FULL.md). Additive: doesn't change the
/// core result fields above.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub buy_hold_return_percent: f64,
    pub alpha: f64,
    pub benchmark_return_percent: Option<f64>,
    pub benchmark_alpha: Option<f64>,
    pub information_ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardFold {
    pub fold_number: usize,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
    pub in_sample_return_percent: f64,
    pub out_of_sample_return_percent: f64,
    pub in_sample_sharpe: Option<f64>,
    pub out_of_sample_sharpe: Option<f64>,
    pub in_sample_trades: usize,
    pub out_of_sample_trades: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub folds: Vec<WalkForwardFold>,
    pub avg_in_sample_return_percent: f64,
    pub avg_out_of_sample_return_percent: f64,
    /// in-sample / out-of-sample average return; values near 1.0 indicate
    /// low overfitting.
    pub overfitting_ratio: Option<f64>,
    pub out_of_sample_win_rate: f64,
    pub combined_out_of_sample_equity_curve: Vec<EquityPoint>,
    pub total_out_of_sample_trades: usize,
}
