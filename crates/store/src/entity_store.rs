//! C2 Entity Store: positions, trade fills, account snapshots, watchlist,
//! and sync logs — each with the idempotency/append semantics spec.md §3
//! assigns it. Grounded on the teacher's `portfolio-manager::portfolio`
//! and `portfolio-manager::trades` upsert/insert idioms.

use crate::codec::*;
use crate::db::Db;
use chrono::{DateTime, NaiveDate, Utc};
use core_types::{
    AccountSnapshot, CoreError, CoreResult, FillSide, Market, Position, PositionSide, SyncLog, SyncStatus, SyncType,
    TradeFill, WatchlistEntry,
};
use std::str::FromStr;

#[derive(Clone)]
pub struct EntityStore {
    db: Db,
}

fn transient(e: sqlx::Error) -> CoreError {
    CoreError::Transient(e.to_string())
}

impl EntityStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Inserts a fresh position snapshot. Positions are append-per-date
    /// (spec.md §3), never updated in place; `ON CONFLICT DO UPDATE` here
    /// only exists to make a retried write of the *same* snapshot
    /// idempotent, not to mutate history.
    pub async fn upsert_position(&self, p: &Position) -> CoreResult<()> {
        let market_value = p.market_value();
        let pl_value = p.pl_value();
        let pl_ratio = p.pl_ratio().unwrap_or(0.0);
        let side = match p.side {
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
        };

        sqlx::query(
            r#"
            INSERT INTO positions
                (account, snapshot_date, market, code, qty, can_sell_qty,
                 cost_price, market_price, market_value, pl_value, pl_ratio, side)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account, snapshot_date, market, code) DO UPDATE SET
                qty = excluded.qty,
                can_sell_qty = excluded.can_sell_qty,
                cost_price = excluded.cost_price,
                market_price = excluded.market_price,
                market_value = excluded.market_value,
                pl_value = excluded.pl_value,
                pl_ratio = excluded.pl_ratio,
                side = excluded.side
            "#,
        )
        .bind(&p.account)
        .bind(date_to_text(p.snapshot_date))
        .bind(p.market.to_string())
        .bind(&p.code)
        .bind(decimal_to_text(p.qty))
        .bind(opt_decimal_to_text(p.can_sell_qty))
        .bind(decimal_to_text(p.cost_price))
        .bind(decimal_to_text(p.market_price))
        .bind(decimal_to_text(market_value))
        .bind(decimal_to_text(pl_value))
        .bind(pl_ratio)
        .bind(side)
        .execute(self.db.pool())
        .await
        .map_err(transient)?;
        Ok(())
    }

    pub async fn positions_for_date(&self, account: &str, snapshot_date: NaiveDate) -> CoreResult<Vec<Position>> {
        let rows = sqlx::query(
            "SELECT account, snapshot_date, market, code, qty, can_sell_qty, cost_price, market_price, side \
             FROM positions WHERE account = ? AND snapshot_date = ? ORDER BY code ASC",
        )
        .bind(account)
        .bind(date_to_text(snapshot_date))
        .fetch_all(self.db.pool())
        .await
        .map_err(transient)?;

        rows.into_iter().map(row_to_position).collect()
    }

    /// Inserts a trade fill, deduplicated on `(account, deal_id)` — the
    /// idempotency key spec.md §3 names. A re-sync of an already-seen fill
    /// is a silent no-op, not an error.
    pub async fn insert_trade_fill(&self, f: &TradeFill) -> CoreResult<bool> {
        let side = match f.side {
            FillSide::Buy => "BUY",
            FillSide::Sell => "SELL",
        };
        let result = sqlx::query(
            r#"
            INSERT INTO trade_fills
                (account, deal_id, order_id, trade_time, market, code, side, qty, price, amount, fee, currency)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account, deal_id) DO NOTHING
            "#,
        )
        .bind(&f.account)
        .bind(&f.deal_id)
        .bind(&f.order_id)
        .bind(datetime_to_text(f.trade_time))
        .bind(f.market.to_string())
        .bind(&f.code)
        .bind(side)
        .bind(decimal_to_text(f.qty))
        .bind(decimal_to_text(f.price))
        .bind(opt_decimal_to_text(f.amount))
        .bind(opt_decimal_to_text(f.fee))
        .bind(&f.currency)
        .execute(self.db.pool())
        .await
        .map_err(transient)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn trade_fills_for_range(
        &self,
        account: &str,
        market: Market,
        code: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Vec<TradeFill>> {
        let rows = sqlx::query(
            "SELECT account, deal_id, order_id, trade_time, market, code, side, qty, price, amount, fee, currency \
             FROM trade_fills WHERE account = ? AND market = ? AND code = ? AND trade_time >= ? AND trade_time <= ? \
             ORDER BY trade_time ASC",
        )
        .bind(account)
        .bind(market.to_string())
        .bind(code)
        .bind(datetime_to_text(start))
        .bind(datetime_to_text(end))
        .fetch_all(self.db.pool())
        .await
        .map_err(transient)?;

        rows.into_iter().map(row_to_fill).collect()
    }

    pub async fn upsert_account_snapshot(&self, s: &AccountSnapshot) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO account_snapshots
                (account, snapshot_date, total_assets, cash, market_value, frozen_cash, buying_power, currency)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account, snapshot_date) DO UPDATE SET
                total_assets = excluded.total_assets,
                cash = excluded.cash,
                market_value = excluded.market_value,
                frozen_cash = excluded.frozen_cash,
                buying_power = excluded.buying_power,
                currency = excluded.currency
            "#,
        )
        .bind(&s.account)
        .bind(date_to_text(s.snapshot_date))
        .bind(decimal_to_text(s.total_assets))
        .bind(decimal_to_text(s.cash))
        .bind(decimal_to_text(s.market_value))
        .bind(opt_decimal_to_text(s.frozen_cash))
        .bind(opt_decimal_to_text(s.buying_power))
        .bind(&s.currency)
        .execute(self.db.pool())
        .await
        .map_err(transient)?;
        Ok(())
    }

    pub async fn upsert_watchlist_entry(&self, w: &WatchlistEntry) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO watchlist_entries (user, market, code, name, group_name, notes, sort_order, active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user, market, code) DO UPDATE SET
                name = excluded.name,
                group_name = excluded.group_name,
                notes = excluded.notes,
                sort_order = excluded.sort_order,
                active = excluded.active
            "#,
        )
        .bind(&w.user)
        .bind(w.market.to_string())
        .bind(&w.code)
        .bind(&w.name)
        .bind(&w.group)
        .bind(&w.notes)
        .bind(w.sort_order)
        .bind(w.active)
        .execute(self.db.pool())
        .await
        .map_err(transient)?;
        Ok(())
    }

    pub async fn watchlist_for_user(&self, user: &str) -> CoreResult<Vec<WatchlistEntry>> {
        let rows = sqlx::query(
            "SELECT user, market, code, name, group_name, notes, sort_order, active \
             FROM watchlist_entries WHERE user = ? ORDER BY sort_order ASC",
        )
        .bind(user)
        .fetch_all(self.db.pool())
        .await
        .map_err(transient)?;

        rows.into_iter().map(row_to_watchlist_entry).collect()
    }

    /// Appends a sync-log row and returns its id, for later completion via
    /// `finish_sync_log`.
    pub async fn start_sync_log(&self, log: &SyncLog) -> CoreResult<i64> {
        let sync_type = sync_type_str(log.sync_type);
        let status = sync_status_str(log.status);
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO sync_logs (user, sync_type, status, records_count, error, started_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&log.user)
        .bind(sync_type)
        .bind(status)
        .bind(log.records_count)
        .bind(&log.error)
        .bind(datetime_to_text(log.started_at))
        .bind(opt_datetime_to_text(log.finished_at))
        .fetch_one(self.db.pool())
        .await
        .map_err(transient)?;
        Ok(id)
    }

    pub async fn finish_sync_log(
        &self,
        id: i64,
        status: SyncStatus,
        records_count: i64,
        error: Option<String>,
        finished_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        sqlx::query(
            "UPDATE sync_logs SET status = ?, records_count = ?, error = ?, finished_at = ? WHERE id = ?",
        )
        .bind(sync_status_str(status))
        .bind(records_count)
        .bind(&error)
        .bind(datetime_to_text(finished_at))
        .bind(id)
        .execute(self.db.pool())
        .await
        .map_err(transient)?;
        Ok(())
    }
}

fn sync_type_str(t: SyncType) -> &'static str {
    match t {
        SyncType::Positions => "POSITIONS",
        SyncType::Trades => "TRADES",
        SyncType::Klines => "KLINES",
        SyncType::Watchlist => "WATCHLIST",
        SyncType::All => "ALL",
    }
}

fn sync_status_str(s: SyncStatus) -> &'static str {
    match s {
        SyncStatus::Success => "SUCCESS",
        SyncStatus::Failed => "FAILED",
        SyncStatus::Partial => "PARTIAL",
    }
}

fn row_to_position(row: sqlx::sqlite::SqliteRow) -> CoreResult<Position> {
    use sqlx::Row;
    let market_s: String = row.try_get("market").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let date_s: String = row.try_get("snapshot_date").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let qty_s: String = row.try_get("qty").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let can_sell_s: Option<String> = row.try_get("can_sell_qty").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let cost_s: String = row.try_get("cost_price").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let price_s: String = row.try_get("market_price").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let side_s: String = row.try_get("side").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;

    Ok(Position {
        account: row.try_get("account").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
        snapshot_date: text_to_date(&date_s)?,
        market: Market::from_str(&market_s)?,
        code: row.try_get("code").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
        qty: text_to_decimal(&qty_s)?,
        can_sell_qty: text_to_opt_decimal(can_sell_s)?,
        cost_price: text_to_decimal(&cost_s)?,
        market_price: text_to_decimal(&price_s)?,
        side: match side_s.as_str() {
            "LONG" => PositionSide::Long,
            "SHORT" => PositionSide::Short,
            other => return Err(CoreError::ProviderInvalid(format!("unknown position side {other}"))),
        },
    })
}

fn row_to_fill(row: sqlx::sqlite::SqliteRow) -> CoreResult<TradeFill> {
    use sqlx::Row;
    let market_s: String = row.try_get("market").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let trade_time_s: String = row.try_get("trade_time").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let qty_s: String = row.try_get("qty").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let price_s: String = row.try_get("price").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let amount_s: Option<String> = row.try_get("amount").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let fee_s: Option<String> = row.try_get("fee").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let side_s: String = row.try_get("side").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;

    Ok(TradeFill {
        account: row.try_get("account").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
        deal_id: row.try_get("deal_id").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
        order_id: row.try_get("order_id").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
        trade_time: text_to_datetime(&trade_time_s)?,
        market: Market::from_str(&market_s)?,
        code: row.try_get("code").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
        side: match side_s.as_str() {
            "BUY" => FillSide::Buy,
            "SELL" => FillSide::Sell,
            other => return Err(CoreError::ProviderInvalid(format!("unknown fill side {other}"))),
        },
        qty: text_to_decimal(&qty_s)?,
        price: text_to_decimal(&price_s)?,
        amount: text_to_opt_decimal(amount_s)?,
        fee: text_to_opt_decimal(fee_s)?,
        currency: row.try_get("currency").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
    })
}

fn row_to_watchlist_entry(row: sqlx::sqlite::SqliteRow) -> CoreResult<WatchlistEntry> {
    use sqlx::Row;
    let market_s: String = row.try_get("market").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    Ok(WatchlistEntry {
        user: row.try_get("user").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
        market: Market::from_str(&market_s)?,
        code: row.try_get("code").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
        name: row.try_get("name").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
        group: row.try_get("group_name").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
        notes: row.try_get("notes").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
        sort_order: row.try_get("sort_order").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
        active: row.try_get("active").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn fill(deal_id: &str) -> TradeFill {
        TradeFill {
            account: "acct1".into(),
            deal_id: deal_id.into(),
            order_id: None,
            trade_time: Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap(),
            market: Market::Us,
            code: "AAPL".into(),
            side: FillSide::Buy,
            qty: Decimal::from(10),
            price: Decimal::from(150),
            amount: None,
            fee: None,
            currency: Some("USD".into()),
        }
    }

    #[tokio::test]
    async fn duplicate_deal_id_is_a_noop() {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        let store = EntityStore::new(db);
        assert!(store.insert_trade_fill(&fill("D1")).await.unwrap());
        assert!(!store.insert_trade_fill(&fill("D1")).await.unwrap());

        let fills = store
            .trade_fills_for_range(
                "acct1",
                Market::Us,
                "AAPL",
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(fills.len(), 1);
    }

    #[tokio::test]
    async fn position_upsert_round_trips_pl() {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        let store = EntityStore::new(db);
        let pos = Position {
            account: "acct1".into(),
            snapshot_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            market: Market::Hk,
            code: "00700".into(),
            qty: Decimal::from(100),
            can_sell_qty: None,
            cost_price: Decimal::from(10),
            market_price: Decimal::from(12),
            side: PositionSide::Long,
        };
        store.upsert_position(&pos).await.unwrap();

        let rows = store.positions_for_date("acct1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pl_value(), Decimal::from(200));
    }
}
