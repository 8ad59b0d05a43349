//! Buy-and-hold comparison and an optional externally supplied benchmark
//! (supplemented feature, §2 of SPEC_FULL.md). Grounded on the teacher's
//! `BenchmarkComparison`/tracking-error computation in `engine.rs`, kept
//! additive: it does not change `BacktestResult`'s core fields.

use crate::models::{BacktestResult, BenchmarkComparison, EquityPoint};
use chrono::NaiveDate;
use core_types::Bar;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

fn period_return_percent(bars: &[Bar]) -> Option<f64> {
    let first = bars.first()?;
    let last = bars.last()?;
    if first.close.is_zero() {
        return None;
    }
    ((last.close / first.close - Decimal::ONE) * Decimal::from(100)).to_f64()
}

fn daily_returns_by_date(bars: &[Bar]) -> HashMap<NaiveDate, f64> {
    let mut out = HashMap::new();
    for w in bars.windows(2) {
        if let Some(r) = ((w[1].close / w[0].close) - Decimal::ONE).to_f64() {
            out.insert(w[1].date, r);
        }
    }
    out
}

fn information_ratio(equity_curve: &[EquityPoint], benchmark_bars: &[Bar]) -> Option<f64> {
    let bench_returns = daily_returns_by_date(benchmark_bars);
    let mut diffs = Vec::new();
    for w in equity_curve.windows(2) {
        let strat_return = ((w[1].equity / w[0].equity) - Decimal::ONE).to_f64()?;
        if let Some(&bench_return) = bench_returns.get(&w[1].date) {
            diffs.push(strat_return - bench_return);
        }
    }
    if diffs.len() < 2 {
        return None;
    }
    let n = diffs.len() as f64;
    let mean = diffs.iter().sum::<f64>() / n;
    let variance = diffs.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    let tracking_error = variance.sqrt();
    if tracking_error == 0.0 {
        None
    } else {
        Some((mean / tracking_error) * 252.0_f64.sqrt())
    }
}

pub fn compare_to_benchmark(bars: &[Bar], result: &BacktestResult, external_benchmark: Option<&[Bar]>) -> BenchmarkComparison {
    let buy_hold_return_percent = period_return_percent(bars).unwrap_or(0.0);
    let alpha = result.total_return_percent - buy_hold_return_percent;

    let (benchmark_return_percent, benchmark_alpha, information_ratio) = match external_benchmark {
        Some(bench) => {
            let bench_return = period_return_percent(bench);
            let bench_alpha = bench_return.map(|r| result.total_return_percent - r);
            let ir = information_ratio(&result.equity_curve, bench);
            (bench_return, bench_alpha, ir)
        }
        None => (None, None, None),
    };

    BenchmarkComparison { buy_hold_return_percent, alpha, benchmark_return_percent, benchmark_alpha, information_ratio }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn stub_result(total_return_percent: f64, equity_curve: Vec<EquityPoint>) -> BacktestResult {
        BacktestResult {
            strategy_name: "s".into(),
            code: "AAPL".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            initial_capital: Decimal::from(1000),
            final_capital: Decimal::from(1000),
            total_return: Decimal::ZERO,
            total_return_percent,
            annualized_return_percent: None,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            profit_factor: None,
            sharpe_ratio: None,
            sortino_ratio: None,
            max_drawdown_percent: 0.0,
            calmar_ratio: None,
            equity_curve,
            trades: Vec::new(),
            rejected_intents: Vec::new(),
            benchmark: None,
        }
    }

    #[test]
    fn buy_hold_alpha_is_strategy_minus_buy_hold() {
        let bars = vec![bar(1, 100), bar(2, 110), bar(3, 120)]; // buy-hold = +20%
        let result = stub_result(35.0, Vec::new());
        let cmp = compare_to_benchmark(&bars, &result, None);
        assert!((cmp.buy_hold_return_percent - 20.0).abs() < 1e-9);
        assert!((cmp.alpha - 15.0).abs() < 1e-9);
        assert!(cmp.information_ratio.is_none());
    }

    #[test]
    fn external_benchmark_populates_alpha_and_return() {
        let bars = vec![bar(1, 100), bar(2, 120)];
        let benchmark = vec![bar(1, 50), bar(2, 55)]; // +10%
        let result = stub_result(20.0, Vec::new());
        let cmp = compare_to_benchmark(&bars, &result, Some(&benchmark));
        assert!((cmp.benchmark_return_percent.unwrap() - 10.0).abs() < 1e-9);
        assert!((cmp.benchmark_alpha.unwrap() - 10.0).abs() < 1e-9);
    }
}
