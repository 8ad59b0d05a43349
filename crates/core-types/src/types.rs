use crate::error::CoreError;
use crate::symbol::Market;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single daily OHLCV observation, keyed uniquely by `(market, code, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub market: Market,
    pub code: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub amount: Option<Decimal>,
    pub turnover_rate: Option<f64>,
    pub change_pct: Option<f64>,
    pub precomputed: Option<PrecomputedFields>,
}

/// Precomputed indicator snapshot optionally carried alongside a bar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedFields {
    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub obv: Option<f64>,
}

impl Bar {
    /// Validate the OHLCV invariants from spec.md §3. A violation is an
    /// `InternalAssert` — it signals corrupted upstream data, not a normal
    /// recoverable condition.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.low > self.open.min(self.close) {
            return Err(CoreError::InternalAssert(format!(
                "{} {}: low {} exceeds min(open,close)",
                self.code, self.date, self.low
            )));
        }
        if self.high < self.open.max(self.close) {
            return Err(CoreError::InternalAssert(format!(
                "{} {}: high {} below max(open,close)",
                self.code, self.date, self.high
            )));
        }
        if self.low > self.high {
            return Err(CoreError::InternalAssert(format!(
                "{} {}: low {} exceeds high {}",
                self.code, self.date, self.low, self.high
            )));
        }
        if self.volume < Decimal::ZERO {
            return Err(CoreError::InternalAssert(format!(
                "{} {}: negative volume {}",
                self.code, self.date, self.volume
            )));
        }
        Ok(())
    }
}

/// Checks that a bar series is sorted ascending by date, as every
/// indicator/pattern/VCP computation requires (spec.md §4.1).
pub fn require_sorted_ascending(bars: &[Bar]) -> Result<(), CoreError> {
    for w in bars.windows(2) {
        if w[1].date <= w[0].date {
            return Err(CoreError::InvalidInput(format!(
                "bars not sorted ascending by date: {} then {}",
                w[0].date, w[1].date
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

/// A daily position snapshot (spec.md §3). Never updated in place — one
/// row per `(account, snapshot_date, market, code)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub account: String,
    pub snapshot_date: NaiveDate,
    pub market: Market,
    pub code: String,
    pub qty: Decimal,
    pub can_sell_qty: Option<Decimal>,
    pub cost_price: Decimal,
    pub market_price: Decimal,
    pub side: PositionSide,
}

impl Position {
    pub fn market_value(&self) -> Decimal {
        self.qty * self.market_price
    }

    pub fn pl_value(&self) -> Decimal {
        let sign = match self.side {
            PositionSide::Long => Decimal::ONE,
            PositionSide::Short => -Decimal::ONE,
        };
        (self.market_price - self.cost_price) * self.qty * sign
    }

    pub fn pl_ratio(&self) -> Option<f64> {
        let denom = self.cost_price * self.qty;
        if denom.is_zero() {
            return None;
        }
        use rust_decimal::prelude::ToPrimitive;
        (self.pl_value() / denom).to_f64()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instrument {
    Stock,
    Option,
}

/// A single execution (trade fill). `deal_id` is the idempotency key,
/// unique per account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeFill {
    pub account: String,
    pub deal_id: String,
    pub order_id: Option<String>,
    pub trade_time: DateTime<Utc>,
    pub market: Market,
    pub code: String,
    pub side: FillSide,
    pub qty: Decimal,
    pub price: Decimal,
    pub amount: Option<Decimal>,
    pub fee: Option<Decimal>,
    pub currency: Option<String>,
}

impl TradeFill {
    pub fn instrument(&self) -> Instrument {
        if is_option_code(&self.code) {
            Instrument::Option
        } else {
            Instrument::Stock
        }
    }
}

/// Option symbols follow an OCC-like format: root symbol followed by a
/// 6-digit expiry (YYMMDD) and a C/P + strike block, e.g. `AAPL240119C00150000`.
pub fn is_option_code(code: &str) -> bool {
    let digits_and_cp = code.chars().rev().take_while(|c| c.is_ascii_digit()).count();
    if digits_and_cp < 8 {
        return false;
    }
    let cp_pos = code.len().saturating_sub(digits_and_cp + 1);
    matches!(code.as_bytes().get(cp_pos), Some(b'C') | Some(b'P'))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account: String,
    pub snapshot_date: NaiveDate,
    pub total_assets: Decimal,
    pub cash: Decimal,
    pub market_value: Decimal,
    pub frozen_cash: Option<Decimal>,
    pub buying_power: Option<Decimal>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub user: String,
    pub market: Market,
    pub code: String,
    pub name: Option<String>,
    pub group: Option<String>,
    pub notes: Option<String>,
    pub sort_order: i32,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncType {
    Positions,
    Trades,
    Klines,
    Watchlist,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    Success,
    Failed,
    Partial,
}

/// Append-only audit row for one sync action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLog {
    pub user: Option<String>,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub records_count: i64,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// A paired open+close sequence produced by the trade-pairing engine
/// (C9). Derived on demand; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundTripTrade {
    pub account: String,
    pub market: Market,
    pub code: String,
    pub instrument: Instrument,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub qty: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub gross_pnl: Decimal,
    pub fees: Decimal,
    pub net_pnl: Decimal,
    pub pnl_ratio: f64,
    pub hold_days: i64,
}
