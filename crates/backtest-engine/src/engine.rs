//! The simulation loop (spec.md §4.6): mark-to-market, invoke the
//! strategy, execute its intents at the same bar's close. Grounded on the
//! teacher's `BacktestEngine::run` (cash/positions/equity_curve/trades
//! bookkeeping, commission deduction, drawdown tracking), rewritten
//! around a push-based `Strategy` trait in place of the teacher's
//! pre-generated `Vec<Signal>` pull model, and trimmed of slippage,
//! rebalancing, margin, and short-selling (no spec.md counterpart).

use crate::metrics;
use crate::models::*;
use core_types::Bar;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

struct OpenPosition {
    qty: Decimal,
    avg_cost: Decimal,
    avg_entry_fee_per_unit: Decimal,
    entry_date: chrono::NaiveDate,
}

pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn run(&mut self, bars: &[Bar], strategy: &mut dyn Strategy) -> BacktestResult {
        let mut cash = self.config.initial_capital;
        let mut book: HashMap<String, OpenPosition> = HashMap::new();
        let mut equity_curve = Vec::new();
        let mut trades: Vec<BacktestTrade> = Vec::new();
        let mut rejected = Vec::new();
        let mut peak_equity = self.config.initial_capital;

        for bar in bars {
            let positions_value: Decimal = book.values().map(|p| p.qty * bar.close).sum();
            let equity = cash + positions_value;
            if equity > peak_equity {
                peak_equity = equity;
            }
            let drawdown_percent = if !peak_equity.is_zero() {
                (((peak_equity - equity) / peak_equity) * Decimal::from(100)).to_f64().unwrap_or(0.0)
            } else {
                0.0
            };
            equity_curve.push(EquityPoint { date: bar.date, equity, drawdown_percent });

            let view: HashMap<String, PositionState> =
                book.iter().map(|(k, p)| (k.clone(), PositionState { qty: p.qty, avg_cost: p.avg_cost })).collect();
            let intents = {
                let ctx = BacktestContext { date: bar.date, cash, equity, positions: &view };
                strategy.on_bar(&ctx, bar)
            };

            for intent in intents {
                if intent.qty <= Decimal::ZERO {
                    continue;
                }
                match intent.side {
                    IntentSide::Buy => self.execute_buy(&mut cash, &mut book, bar, &intent, &mut rejected),
                    IntentSide::Sell => self.execute_sell(&mut cash, &mut book, bar, &intent, &mut trades, &mut rejected),
                }
            }
        }

        if let Some(last) = bars.last() {
            let view: HashMap<String, PositionState> =
                book.iter().map(|(k, p)| (k.clone(), PositionState { qty: p.qty, avg_cost: p.avg_cost })).collect();
            let equity = cash + book.values().map(|p| p.qty * last.close).sum::<Decimal>();
            let ctx = BacktestContext { date: last.date, cash, equity, positions: &view };
            strategy.on_end(&ctx);
        }

        self.summarize(bars, cash, &book, equity_curve, trades, rejected)
    }

    fn execute_buy(
        &self,
        cash: &mut Decimal,
        book: &mut HashMap<String, OpenPosition>,
        bar: &Bar,
        intent: &Intent,
        rejected: &mut Vec<RejectedIntent>,
    ) {
        let notional = intent.qty * bar.close;
        let fee = notional * self.config.commission_rate;
        if *cash - notional - fee < Decimal::ZERO {
            tracing::warn!(date = %bar.date, qty = %intent.qty, "buy intent rejected: insufficient cash");
            rejected.push(RejectedIntent {
                date: bar.date,
                side: IntentSide::Buy,
                qty: intent.qty,
                reason: "insufficient cash".into(),
            });
            return;
        }
        *cash -= notional + fee;
        let fee_per_unit = fee / intent.qty;
        let entry = book.entry(self.config.code.clone()).or_insert(OpenPosition {
            qty: Decimal::ZERO,
            avg_cost: Decimal::ZERO,
            avg_entry_fee_per_unit: Decimal::ZERO,
            entry_date: bar.date,
        });
        if entry.qty.is_zero() {
            entry.entry_date = bar.date;
        }
        let new_qty = entry.qty + intent.qty;
        entry.avg_cost = (entry.avg_cost * entry.qty + bar.close * intent.qty) / new_qty;
        entry.avg_entry_fee_per_unit = (entry.avg_entry_fee_per_unit * entry.qty + fee_per_unit * intent.qty) / new_qty;
        entry.qty = new_qty;
    }

    fn execute_sell(
        &self,
        cash: &mut Decimal,
        book: &mut HashMap<String, OpenPosition>,
        bar: &Bar,
        intent: &Intent,
        trades: &mut Vec<BacktestTrade>,
        rejected: &mut Vec<RejectedIntent>,
    ) {
        let Some(pos) = book.get_mut(&self.config.code) else {
            tracing::warn!(date = %bar.date, "sell intent rejected: no open position");
            rejected.push(RejectedIntent { date: bar.date, side: IntentSide::Sell, qty: intent.qty, reason: "no open position".into() });
            return;
        };
        if pos.qty.is_zero() {
            rejected.push(RejectedIntent { date: bar.date, side: IntentSide::Sell, qty: intent.qty, reason: "no open position".into() });
            return;
        }
        let sell_qty = intent.qty.min(pos.qty);
        let notional = sell_qty * bar.close;
        let exit_fee = notional * self.config.commission_rate;
        *cash += notional - exit_fee;

        let entry_fee_share = pos.avg_entry_fee_per_unit * sell_qty;
        let commission_cost = entry_fee_share + exit_fee;
        let profit_loss = (bar.close - pos.avg_cost) * sell_qty - commission_cost;
        let cost_basis = pos.avg_cost * sell_qty;
        let profit_loss_percent = if !cost_basis.is_zero() { (profit_loss / cost_basis).to_f64().unwrap_or(0.0) * 100.0 } else { 0.0 };
        let holding_period_days = (bar.date - pos.entry_date).num_days();

        trades.push(BacktestTrade {
            entry_date: pos.entry_date,
            exit_date: bar.date,
            entry_price: pos.avg_cost,
            exit_price: bar.close,
            qty: sell_qty,
            profit_loss,
            profit_loss_percent,
            holding_period_days,
            commission_cost,
            exit_reason: intent.reason.clone(),
        });

        pos.qty -= sell_qty;
        if pos.qty.is_zero() {
            book.remove(&self.config.code);
        }
    }

    fn summarize(
        &self,
        bars: &[Bar],
        final_cash: Decimal,
        book: &HashMap<String, OpenPosition>,
        equity_curve: Vec<EquityPoint>,
        trades: Vec<BacktestTrade>,
        rejected_intents: Vec<RejectedIntent>,
    ) -> BacktestResult {
        let last_close = bars.last().map(|b| b.close).unwrap_or(Decimal::ZERO);
        let final_capital = final_cash + book.values().map(|p| p.qty * last_close).sum::<Decimal>();
        let initial_capital = self.config.initial_capital;
        let total_return = final_capital - initial_capital;
        let total_return_percent = if !initial_capital.is_zero() {
            (total_return / initial_capital).to_f64().unwrap_or(0.0) * 100.0
        } else {
            0.0
        };

        let start_date = bars.first().map(|b| b.date).unwrap_or_default();
        let end_date = bars.last().map(|b| b.date).unwrap_or_default();
        let annualized_return_percent = metrics::cagr_percent(initial_capital, final_capital, start_date, end_date);

        let winning_trades = trades.iter().filter(|t| t.profit_loss > Decimal::ZERO).count();
        let losing_trades = trades.iter().filter(|t| t.profit_loss < Decimal::ZERO).count();
        let win_rate = if !trades.is_empty() { winning_trades as f64 / trades.len() as f64 * 100.0 } else { 0.0 };

        let gain_sum: Decimal = trades.iter().filter(|t| t.profit_loss > Decimal::ZERO).map(|t| t.profit_loss).sum();
        let loss_sum: Decimal = trades.iter().filter(|t| t.profit_loss < Decimal::ZERO).map(|t| t.profit_loss).sum();
        let profit_factor = if !loss_sum.is_zero() { Some((gain_sum.abs() / loss_sum.abs()).to_f64().unwrap_or(0.0)) } else { None };

        let returns = metrics::log_returns(&equity_curve);
        let sharpe_ratio = metrics::sharpe_ratio(&returns);
        let sortino_ratio = metrics::sortino_ratio(&returns);
        let max_drawdown_percent = metrics::max_drawdown_percent(&equity_curve);
        let calmar_ratio = metrics::calmar_ratio(annualized_return_percent, max_drawdown_percent);

        BacktestResult {
            strategy_name: self.config.strategy_name.clone(),
            code: self.config.code.clone(),
            start_date,
            end_date,
            initial_capital,
            final_capital,
            total_return,
            total_return_percent,
            annualized_return_percent,
            total_trades: trades.len(),
            winning_trades,
            losing_trades,
            win_rate,
            profit_factor,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown_percent,
            calmar_ratio,
            equity_curve,
            trades,
            rejected_intents,
            benchmark: None,
        }
    }
}
