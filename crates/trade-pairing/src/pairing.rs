//! LIFO round-trip pairing (spec.md §4.5), generalized from the teacher's
//! per-account lot stack (`portfolio-manager::trades::get_enhanced_metrics`,
//! `CostBasisMethod::Lifo`) to a per-`(account, market, code, instrument)`
//! queue, and from long-only to symmetric long/short: a fill on the same
//! side as the top-of-stack lot opens more exposure; a fill on the opposite
//! side closes against it, splitting the lot if the fill is larger.

use crate::multiplier::MultiplierTable;
use chrono::{DateTime, Utc};
use core_types::{FillSide, Instrument, Market, RoundTripTrade, TradeFill};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A lot left open at the end of the fill sequence with no closing fill yet
/// — a short-style residual if `side == Sell`, an ordinary open long
/// position if `side == Buy`.
#[derive(Debug, Clone)]
pub struct OpenLot {
    pub account: String,
    pub market: Market,
    pub code: String,
    pub instrument: Instrument,
    pub side: FillSide,
    pub qty: Decimal,
    pub price: Decimal,
    pub fee_share: Decimal,
    pub time: DateTime<Utc>,
}

struct StackLot {
    side: FillSide,
    qty: Decimal,
    price: Decimal,
    fee_share: Decimal,
    time: DateTime<Utc>,
}

/// Pairs `fills` into round-trip trades per `(account, market, code,
/// instrument)`, LIFO. Returns closed round trips and whatever exposure is
/// still open once every fill has been applied.
pub fn pair_fills(fills: &[TradeFill], multipliers: &MultiplierTable) -> (Vec<RoundTripTrade>, Vec<OpenLot>) {
    let mut groups: HashMap<(String, Market, String, Instrument), Vec<TradeFill>> = HashMap::new();
    for fill in fills {
        let key = (fill.account.clone(), fill.market, fill.code.clone(), fill.instrument());
        groups.entry(key).or_default().push(fill.clone());
    }

    let mut trades = Vec::new();
    let mut residuals = Vec::new();

    for ((account, market, code, instrument), mut group) in groups {
        group.sort_by(|a, b| a.trade_time.cmp(&b.trade_time).then(a.deal_id.cmp(&b.deal_id)));
        let multiplier = multipliers.lookup(market, &code, instrument);
        let mut stack: Vec<StackLot> = Vec::new();

        for fill in &group {
            let mut remaining = fill.qty;
            let total_fee = fill.fee.unwrap_or(Decimal::ZERO);
            let fee_per_unit = if fill.qty.is_zero() { Decimal::ZERO } else { total_fee / fill.qty };

            while remaining > Decimal::ZERO {
                let closes_top = matches!(stack.last(), Some(top) if top.side != fill.side);
                if !closes_top {
                    stack.push(StackLot {
                        side: fill.side,
                        qty: remaining,
                        price: fill.price,
                        fee_share: remaining * fee_per_unit,
                        time: fill.trade_time,
                    });
                    remaining = Decimal::ZERO;
                    continue;
                }

                let top = stack.last_mut().expect("closes_top implies a top lot");
                let consumed = remaining.min(top.qty);
                let entry_fee_share = if top.qty.is_zero() { Decimal::ZERO } else { consumed / top.qty * top.fee_share };
                let exit_fee_share = consumed * fee_per_unit;
                let fees = entry_fee_share + exit_fee_share;

                let side_sign = if top.side == FillSide::Buy { Decimal::ONE } else { -Decimal::ONE };
                let gross_pnl = (fill.price - top.price) * consumed * side_sign * multiplier;
                let net_pnl = gross_pnl - fees;
                let denom = top.price * consumed * multiplier;
                let pnl_ratio = if denom.is_zero() { 0.0 } else { (net_pnl / denom).to_f64().unwrap_or(0.0) };
                let hold_days = (fill.trade_time - top.time).num_days();

                trades.push(RoundTripTrade {
                    account: account.clone(),
                    market,
                    code: code.clone(),
                    instrument,
                    entry_time: top.time,
                    exit_time: fill.trade_time,
                    qty: consumed,
                    entry_price: top.price,
                    exit_price: fill.price,
                    gross_pnl,
                    fees,
                    net_pnl,
                    pnl_ratio,
                    hold_days,
                });

                remaining -= consumed;
                top.qty -= consumed;
                top.fee_share -= entry_fee_share;
                if top.qty <= Decimal::ZERO {
                    stack.pop();
                }
            }
        }

        for lot in stack {
            residuals.push(OpenLot {
                account: account.clone(),
                market,
                code: code.clone(),
                instrument,
                side: lot.side,
                qty: lot.qty,
                price: lot.price,
                fee_share: lot.fee_share,
                time: lot.time,
            });
        }
    }

    trades.sort_by(|a, b| a.exit_time.cmp(&b.exit_time));
    (trades, residuals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn fill(deal_id: &str, side: FillSide, qty: i64, price: i64, day: u32, fee: i64) -> TradeFill {
        TradeFill {
            account: "acct1".into(),
            deal_id: deal_id.into(),
            order_id: None,
            trade_time: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            market: Market::Us,
            code: "AAPL".into(),
            side,
            qty: Decimal::from(qty),
            price: Decimal::from(price),
            amount: None,
            fee: Some(Decimal::from(fee)),
            currency: None,
        }
    }

    #[test]
    fn simple_long_round_trip_computes_pnl_and_hold_days() {
        let fills = vec![fill("d1", FillSide::Buy, 100, 10, 1, 10), fill("d2", FillSide::Sell, 100, 15, 6, 15)];
        let (trades, residuals) = pair_fills(&fills, &MultiplierTable::new());
        assert!(residuals.is_empty());
        assert_eq!(trades.len(), 1);
        let t = &trades[0];
        // gross = (15-10)*100*1*1 = 500; fees = 10+15 = 25; net = 475
        assert_eq!(t.gross_pnl, dec!(500));
        assert_eq!(t.fees, dec!(25));
        assert_eq!(t.net_pnl, dec!(475));
        // pnl_ratio = 475 / (10*100*1) = 0.475
        assert!((t.pnl_ratio - 0.475).abs() < 1e-9);
        assert_eq!(t.hold_days, 5);
    }

    #[test]
    fn lifo_pops_most_recent_lot_first() {
        let fills = vec![
            fill("d1", FillSide::Buy, 100, 10, 1, 0),
            fill("d2", FillSide::Buy, 100, 20, 3, 0),
            fill("d3", FillSide::Sell, 100, 25, 5, 0),
        ];
        let (trades, residuals) = pair_fills(&fills, &MultiplierTable::new());
        assert_eq!(trades.len(), 1);
        // LIFO: the second buy (price 20, day 3) is closed, not the first.
        assert_eq!(trades[0].entry_price, dec!(20));
        assert_eq!(trades[0].hold_days, 2);
        assert_eq!(residuals.len(), 1);
        assert_eq!(residuals[0].price, dec!(10));
        assert_eq!(residuals[0].qty, dec!(100));
    }

    #[test]
    fn oversized_sell_splits_across_two_lots_and_leaves_a_short_residual() {
        let fills = vec![
            fill("d1", FillSide::Buy, 50, 10, 1, 0),
            fill("d2", FillSide::Sell, 120, 12, 2, 0),
        ];
        let (trades, residuals) = pair_fills(&fills, &MultiplierTable::new());
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].qty, dec!(50));
        assert_eq!(residuals.len(), 1);
        assert_eq!(residuals[0].side, FillSide::Sell);
        assert_eq!(residuals[0].qty, dec!(70));
        assert_eq!(residuals[0].price, dec!(12));
    }

    #[test]
    fn short_round_trip_flips_pnl_sign() {
        let fills = vec![fill("d1", FillSide::Sell, 100, 20, 1, 0), fill("d2", FillSide::Buy, 100, 15, 4, 0)];
        let (trades, _residuals) = pair_fills(&fills, &MultiplierTable::new());
        assert_eq!(trades.len(), 1);
        // short: profit when price falls. gross = (15-20)*100*(-1) = 500
        assert_eq!(trades[0].gross_pnl, dec!(500));
    }
}
