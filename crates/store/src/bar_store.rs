//! C1 Bar Store: idempotent upsert and ordered retrieval of OHLCV bars,
//! keyed uniquely by `(market, code, date)` (spec.md §3). Grounded on the
//! teacher's `portfolio-manager::portfolio::add_position` upsert idiom
//! (`ON CONFLICT ... DO UPDATE ... RETURNING`).

use crate::codec::*;
use crate::db::Db;
use core_types::{Bar, CoreError, CoreResult, Market, PrecomputedFields};
use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Clone)]
pub struct BarStore {
    db: Db,
}

impl BarStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Upserts a batch of bars. Each bar is validated (spec.md §3
    /// invariants) before being written; a failing bar aborts the whole
    /// batch with `InternalAssert` so partial-bad-data never lands.
    pub async fn upsert_bars(&self, bars: &[Bar]) -> CoreResult<usize> {
        for b in bars {
            b.validate()?;
        }

        let mut written = 0usize;
        for b in bars {
            let precomputed = b.precomputed.clone().unwrap_or_default();
            let result = sqlx::query(
                r#"
                INSERT INTO bars
                    (market, code, date, open, high, low, close, volume,
                     amount, turnover_rate, change_pct, ma5, ma10, ma20, ma60, obv)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(market, code, date) DO UPDATE SET
                    open = excluded.open,
                    high = excluded.high,
                    low = excluded.low,
                    close = excluded.close,
                    volume = excluded.volume,
                    amount = excluded.amount,
                    turnover_rate = excluded.turnover_rate,
                    change_pct = excluded.change_pct,
                    ma5 = excluded.ma5,
                    ma10 = excluded.ma10,
                    ma20 = excluded.ma20,
                    ma60 = excluded.ma60,
                    obv = excluded.obv
                WHERE
                    bars.open IS NOT excluded.open
                    OR bars.high IS NOT excluded.high
                    OR bars.low IS NOT excluded.low
                    OR bars.close IS NOT excluded.close
                    OR bars.volume IS NOT excluded.volume
                    OR bars.amount IS NOT excluded.amount
                    OR bars.turnover_rate IS NOT excluded.turnover_rate
                    OR bars.change_pct IS NOT excluded.change_pct
                    OR bars.ma5 IS NOT excluded.ma5
                    OR bars.ma10 IS NOT excluded.ma10
                    OR bars.ma20 IS NOT excluded.ma20
                    OR bars.ma60 IS NOT excluded.ma60
                    OR bars.obv IS NOT excluded.obv
                "#,
            )
            .bind(b.market.to_string())
            .bind(&b.code)
            .bind(date_to_text(b.date))
            .bind(decimal_to_text(b.open))
            .bind(decimal_to_text(b.high))
            .bind(decimal_to_text(b.low))
            .bind(decimal_to_text(b.close))
            .bind(decimal_to_text(b.volume))
            .bind(opt_decimal_to_text(b.amount))
            .bind(b.turnover_rate)
            .bind(b.change_pct)
            .bind(precomputed.ma5)
            .bind(precomputed.ma10)
            .bind(precomputed.ma20)
            .bind(precomputed.ma60)
            .bind(precomputed.obv)
            .execute(self.db.pool())
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;
            if result.rows_affected() > 0 {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Fetches bars for one symbol in `[start, end]`, ordered ascending by
    /// date, ready for direct use by the indicator engine and VCP
    /// detector (which both require sorted input).
    pub async fn fetch_range(
        &self,
        market: Market,
        code: &str,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> CoreResult<Vec<Bar>> {
        let rows = sqlx::query(
            r#"
            SELECT market, code, date, open, high, low, close, volume,
                   amount, turnover_rate, change_pct, ma5, ma10, ma20, ma60, obv
            FROM bars
            WHERE market = ? AND code = ? AND date >= ? AND date <= ?
            ORDER BY date ASC
            "#,
        )
        .bind(market.to_string())
        .bind(code)
        .bind(date_to_text(start))
        .bind(date_to_text(end))
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        rows.into_iter().map(row_to_bar).collect()
    }

    /// Latest persisted date for a symbol, or `None` if no bars are stored
    /// yet. Used by the sync orchestrator to resume an incremental fetch
    /// from `latest + 1` (spec.md §4.7).
    pub async fn latest_date(&self, market: Market, code: &str) -> CoreResult<Option<chrono::NaiveDate>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT date FROM bars WHERE market = ? AND code = ? ORDER BY date DESC LIMIT 1")
            .bind(market.to_string())
            .bind(code)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;
        row.map(|(s,)| text_to_date(&s)).transpose()
    }
}

fn row_to_bar(row: sqlx::sqlite::SqliteRow) -> CoreResult<Bar> {
    use sqlx::Row;
    let market_s: String = row.try_get("market").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let market = Market::from_str(&market_s)?;
    let date_s: String = row.try_get("date").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let open_s: String = row.try_get("open").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let high_s: String = row.try_get("high").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let low_s: String = row.try_get("low").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let close_s: String = row.try_get("close").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let volume_s: String = row.try_get("volume").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let amount_s: Option<String> = row.try_get("amount").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;

    let ma5: Option<f64> = row.try_get("ma5").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let ma10: Option<f64> = row.try_get("ma10").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let ma20: Option<f64> = row.try_get("ma20").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let ma60: Option<f64> = row.try_get("ma60").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let obv: Option<f64> = row.try_get("obv").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?;
    let precomputed = if ma5.is_none() && ma10.is_none() && ma20.is_none() && ma60.is_none() && obv.is_none() {
        None
    } else {
        Some(PrecomputedFields { ma5, ma10, ma20, ma60, obv })
    };

    Ok(Bar {
        market,
        code: row.try_get("code").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
        date: text_to_date(&date_s)?,
        open: text_to_decimal(&open_s)?,
        high: text_to_decimal(&high_s)?,
        low: text_to_decimal(&low_s)?,
        close: text_to_decimal(&close_s)?,
        volume: text_to_decimal(&volume_s)?,
        amount: text_to_opt_decimal(amount_s)?,
        turnover_rate: row.try_get("turnover_rate").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
        change_pct: row.try_get("change_pct").map_err(|e| CoreError::ProviderInvalid(e.to_string()))?,
        precomputed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: u32, price: i64) -> Bar {
        Bar {
            market: Market::Us,
            code: "AAPL".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: Decimal::from(price),
            high: Decimal::from(price + 1),
            low: Decimal::from(price - 1),
            close: Decimal::from(price),
            volume: Decimal::from(1000),
            amount: None,
            turnover_rate: None,
            change_pct: None,
            precomputed: None,
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_and_overwrites() {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        let store = BarStore::new(db);

        store.upsert_bars(&[bar(1, 100)]).await.unwrap();
        store.upsert_bars(&[bar(1, 105)]).await.unwrap();

        let bars = store
            .fetch_range(Market::Us, "AAPL", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())
            .await
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, Decimal::from(105));
    }

    #[tokio::test]
    async fn upsert_of_an_identical_payload_reports_zero_written() {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        let store = BarStore::new(db);

        let first = store.upsert_bars(&[bar(1, 100), bar(2, 101), bar(3, 102)]).await.unwrap();
        assert_eq!(first, 3);

        let second = store.upsert_bars(&[bar(1, 100), bar(2, 101), bar(3, 102)]).await.unwrap();
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn fetch_range_returns_ascending_order() {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        let store = BarStore::new(db);
        store.upsert_bars(&[bar(3, 103), bar(1, 101), bar(2, 102)]).await.unwrap();

        let bars = store
            .fetch_range(Market::Us, "AAPL", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())
            .await
            .unwrap();
        assert_eq!(bars.iter().map(|b| b.date.day()).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn latest_date_tracks_the_most_recent_bar() {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        let store = BarStore::new(db);
        assert_eq!(store.latest_date(Market::Us, "AAPL").await.unwrap(), None);

        store.upsert_bars(&[bar(1, 100), bar(5, 110), bar(3, 105)]).await.unwrap();
        assert_eq!(store.latest_date(Market::Us, "AAPL").await.unwrap(), Some(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()));
    }

    #[tokio::test]
    async fn invalid_bar_is_rejected_before_any_write() {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        let store = BarStore::new(db);
        let mut bad = bar(1, 100);
        bad.volume = Decimal::from(-1);
        assert!(store.upsert_bars(&[bad]).await.is_err());

        let bars = store
            .fetch_range(Market::Us, "AAPL", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())
            .await
            .unwrap();
        assert!(bars.is_empty());
    }

    use chrono::Datelike;
}
