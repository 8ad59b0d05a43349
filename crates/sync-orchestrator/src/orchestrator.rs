//! C11 Sync Orchestrator (spec.md §4.7): coordinates ingest across the
//! Broker and Quote providers, logging each action as a `SyncLog` row.
//! Grounded on the teacher's `analysis-orchestrator::AnalysisOrchestrator`
//! for the fan-out-and-log shape, and `data-loader::main`'s
//! `Semaphore`-bounded `tokio::spawn` worker-pool idiom for
//! `sync_klines`'s per-symbol concurrency.

use crate::models::{today, SymbolFailure, SyncConfig, SyncOutcome};
use chrono::NaiveDate;
use core_types::{CoreResult, Market, Symbol, SyncLog, SyncStatus, SyncType};
use providers::{AccountHandle, BrokerProvider, BrokerSession, QuoteProvider};
use std::sync::Arc;
use store::{BarStore, EntityStore};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

pub struct SyncOrchestrator {
    entity_store: EntityStore,
    bar_store: BarStore,
    quote_provider: Arc<dyn QuoteProvider>,
    broker_provider: Arc<dyn BrokerProvider>,
    config: SyncConfig,
}

impl SyncOrchestrator {
    pub fn new(
        entity_store: EntityStore,
        bar_store: BarStore,
        quote_provider: Arc<dyn QuoteProvider>,
        broker_provider: Arc<dyn BrokerProvider>,
        config: SyncConfig,
    ) -> Self {
        Self { entity_store, bar_store, quote_provider, broker_provider, config }
    }

    async fn run_logged<'a, F, Fut>(&'a self, user: &str, sync_type: SyncType, body: F) -> CoreResult<SyncOutcome>
    where
        F: FnOnce() -> Fut + 'a,
        Fut: std::future::Future<Output = SyncOutcome> + 'a,
    {
        let started_at = chrono::Utc::now();
        let log = SyncLog {
            user: Some(user.to_string()),
            sync_type,
            status: SyncStatus::Partial,
            records_count: 0,
            error: None,
            started_at,
            finished_at: None,
        };
        let id = self.entity_store.start_sync_log(&log).await?;
        let outcome = body().await;
        self.entity_store
            .finish_sync_log(id, outcome.status, outcome.records_count, outcome.error.clone(), chrono::Utc::now())
            .await?;
        Ok(outcome)
    }

    /// For each active account, fetches current positions and upserts them
    /// keyed by `(account, snapshot_date=today, market, code)`.
    pub async fn sync_positions(&self, user: &str, accounts: &[AccountHandle], cancel: &CancellationToken) -> CoreResult<SyncOutcome> {
        self.run_logged(user, SyncType::Positions, || async {
            let mut records = 0i64;
            let mut failures = Vec::new();
            for acc in accounts {
                let session = BrokerSession::acquire(acc.account.clone());
                match tokio::time::timeout(self.config.broker_timeout, self.broker_provider.fetch_positions(&session, cancel)).await {
                    Ok(Ok(positions)) => {
                        for p in positions {
                            if let Err(e) = self.entity_store.upsert_position(&p).await {
                                failures.push(format!("{}: {e}", acc.account));
                                continue;
                            }
                            records += 1;
                        }
                    }
                    Ok(Err(e)) => failures.push(format!("{}: {e}", acc.account)),
                    Err(_) => failures.push(format!("{}: broker call timed out", acc.account)),
                }
            }
            outcome_from(records, accounts.len(), failures)
        })
        .await
    }

    /// Fetches today's deals plus deal history over `range` for each
    /// account, inserting fills deduplicated on `(account, deal_id)`.
    pub async fn sync_trades(
        &self,
        user: &str,
        accounts: &[AccountHandle],
        range: (NaiveDate, NaiveDate),
        cancel: &CancellationToken,
    ) -> CoreResult<SyncOutcome> {
        self.run_logged(user, SyncType::Trades, || async {
            let mut records = 0i64;
            let mut failures = Vec::new();
            for acc in accounts {
                let session = BrokerSession::acquire(acc.account.clone());

                let today_deals = tokio::time::timeout(self.config.broker_timeout, self.broker_provider.fetch_today_deals(&session, cancel)).await;
                let history_deals = tokio::time::timeout(
                    self.config.broker_timeout,
                    self.broker_provider.fetch_historical_deals(&session, range.0, range.1, cancel),
                )
                .await;

                for batch in [today_deals, history_deals] {
                    match batch {
                        Ok(Ok(fills)) => {
                            for f in fills {
                                match self.entity_store.insert_trade_fill(&f).await {
                                    Ok(true) => records += 1,
                                    Ok(false) => {} // already seen, silent no-op
                                    Err(e) => failures.push(format!("{}: {e}", acc.account)),
                                }
                            }
                        }
                        Ok(Err(e)) => failures.push(format!("{}: {e}", acc.account)),
                        Err(_) => failures.push(format!("{}: broker call timed out", acc.account)),
                    }
                }
            }
            outcome_from(records, accounts.len(), failures)
        })
        .await
    }

    /// For each symbol, fetches bars from the latest persisted date onward
    /// and upserts them, using a bounded worker pool so one symbol's
    /// failure never aborts the rest (spec.md §4.7, §5).
    pub async fn sync_klines(&self, user: &str, codes: &[String], days_back: i64, cancel: &CancellationToken) -> CoreResult<SyncOutcome> {
        self.run_logged(user, SyncType::Klines, || async {
            let mut symbols: Vec<(String, Symbol)> = Vec::with_capacity(codes.len());
            let mut failures: Vec<SymbolFailure> = Vec::new();
            for raw in codes {
                match Symbol::parse(raw) {
                    Ok(s) => symbols.push((raw.clone(), s)),
                    Err(e) => failures.push(SymbolFailure { code: raw.clone(), reason: e.to_string() }),
                }
            }

            let semaphore = Arc::new(Semaphore::new(self.config.kline_concurrency.max(1)));
            let mut handles = Vec::with_capacity(symbols.len());
            for (raw, symbol) in symbols {
                let semaphore = Arc::clone(&semaphore);
                let bar_store = self.bar_store.clone();
                let quote_provider = Arc::clone(&self.quote_provider);
                let cancel = cancel.clone();
                let timeout = self.config.bars_timeout;
                handles.push((
                    raw,
                    tokio::spawn(async move {
                        let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                        sync_one_symbol(&bar_store, quote_provider.as_ref(), &symbol, days_back, timeout, &cancel).await
                    }),
                ));
            }

            let mut records = 0i64;
            for (code, handle) in handles {
                match handle.await {
                    Ok(Ok(n)) => records += n,
                    Ok(Err(e)) => failures.push(SymbolFailure { code, reason: e }),
                    Err(e) => failures.push(SymbolFailure { code, reason: format!("worker panicked: {e}") }),
                }
            }

            let failure_strings: Vec<String> = failures.iter().map(|f| format!("{}: {}", f.code, f.reason)).collect();
            outcome_from(records, codes.len(), failure_strings)
        })
        .await
    }

    /// Reconciles the watchlist against the broker's current view: fresh
    /// entries are upserted active; previously-known entries no longer
    /// present are marked inactive in place (no deletes — spec.md §4.7).
    pub async fn sync_watchlist(&self, user: &str, cancel: &CancellationToken) -> CoreResult<SyncOutcome> {
        self.run_logged(user, SyncType::Watchlist, || async {
            let existing = match self.entity_store.watchlist_for_user(user).await {
                Ok(e) => e,
                Err(e) => return SyncOutcome::failed(e.to_string()),
            };
            let fresh = match tokio::time::timeout(self.config.broker_timeout, self.broker_provider.fetch_watchlist(user, cancel)).await {
                Ok(Ok(w)) => w,
                Ok(Err(e)) => return SyncOutcome::failed(e.to_string()),
                Err(_) => return SyncOutcome::failed("broker call timed out"),
            };

            let fresh_keys: std::collections::HashSet<(Market, String)> = fresh.iter().map(|w| (w.market, w.code.clone())).collect();
            let mut records = 0i64;
            let mut failures = Vec::new();

            for mut stale in existing {
                if stale.active && !fresh_keys.contains(&(stale.market, stale.code.clone())) {
                    stale.active = false;
                    if let Err(e) = self.entity_store.upsert_watchlist_entry(&stale).await {
                        failures.push(e.to_string());
                        continue;
                    }
                    records += 1;
                }
            }
            for entry in fresh {
                if let Err(e) = self.entity_store.upsert_watchlist_entry(&entry).await {
                    failures.push(e.to_string());
                    continue;
                }
                records += 1;
            }

            outcome_from(records, 1, failures)
        })
        .await
    }

    /// Runs `{positions, trades, watchlist, klines(positions ∪ watchlist)}`
    /// in order; any subcomponent failure yields `Partial` with
    /// `records_count` summing the successes (spec.md §4.7).
    pub async fn sync_all(
        &self,
        user: &str,
        accounts: &[AccountHandle],
        trade_range: (NaiveDate, NaiveDate),
        extra_codes: &[String],
        days_back: i64,
        cancel: &CancellationToken,
    ) -> CoreResult<SyncOutcome> {
        self.run_logged(user, SyncType::All, || async {
            let mut outcome = match self.sync_positions(user, accounts, cancel).await {
                Ok(o) => o,
                Err(e) => SyncOutcome::failed(e.to_string()),
            };
            outcome = outcome.then(match self.sync_trades(user, accounts, trade_range, cancel).await {
                Ok(o) => o,
                Err(e) => SyncOutcome::failed(e.to_string()),
            });
            outcome = outcome.then(match self.sync_watchlist(user, cancel).await {
                Ok(o) => o,
                Err(e) => SyncOutcome::failed(e.to_string()),
            });

            let watchlist_codes: Vec<String> = self
                .entity_store
                .watchlist_for_user(user)
                .await
                .unwrap_or_default()
                .into_iter()
                .filter(|w| w.active)
                .map(|w| format!("{}.{}", w.market, w.code))
                .collect();
            let mut codes = extra_codes.to_vec();
            codes.extend(watchlist_codes);
            codes.sort();
            codes.dedup();

            outcome.then(match self.sync_klines(user, &codes, days_back, cancel).await {
                Ok(o) => o,
                Err(e) => SyncOutcome::failed(e.to_string()),
            })
        })
        .await
    }
}

async fn sync_one_symbol(
    bar_store: &BarStore,
    quote_provider: &dyn QuoteProvider,
    symbol: &Symbol,
    days_back: i64,
    timeout: std::time::Duration,
    cancel: &CancellationToken,
) -> Result<i64, String> {
    let latest = bar_store.latest_date(symbol.market, &symbol.code).await.map_err(|e| e.to_string())?;
    let to = today();
    let from = match latest {
        Some(d) => d.succ_opt().unwrap_or(d),
        None => to - chrono::Duration::days(days_back),
    };
    if from > to {
        return Ok(0);
    }

    let bars = match tokio::time::timeout(timeout, quote_provider.fetch_bars(symbol.market, &symbol.code, from, to, cancel)).await {
        Ok(Ok(bars)) => bars,
        Ok(Err(e)) => return Err(e.to_string()),
        Err(_) => return Err("bars fetch timed out".to_string()),
    };
    if bars.is_empty() {
        return Ok(0);
    }
    let written = bar_store.upsert_bars(&bars).await.map_err(|e| e.to_string())?;
    Ok(written as i64)
}

fn outcome_from(records: i64, total_units: usize, failures: impl IntoIterator<Item = String>) -> SyncOutcome {
    let failures: Vec<String> = failures.into_iter().collect();
    if failures.is_empty() {
        SyncOutcome::success(records)
    } else if records > 0 || total_units == 0 {
        SyncOutcome { status: SyncStatus::Partial, records_count: records, error: Some(failures.join("; ")) }
    } else {
        SyncOutcome { status: SyncStatus::Failed, records_count: records, error: Some(failures.join("; ")) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use core_types::{AccountSnapshot, Bar, Position, PositionSide, TradeFill, WatchlistEntry};
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use store::Db;

    fn bar(market: Market, code: &str, day: u32, close: i64) -> Bar {
        Bar {
            market,
            code: code.into(),
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

    struct FakeQuoteProvider {
        responses: HashMap<String, CoreResult<Vec<Bar>>>,
    }

    #[async_trait]
    impl QuoteProvider for FakeQuoteProvider {
        async fn fetch_bars(
            &self,
            market: Market,
            code: &str,
            _from: NaiveDate,
            _to: NaiveDate,
            _cancel: &CancellationToken,
        ) -> CoreResult<Vec<Bar>> {
            let key = format!("{market}.{code}");
            match self.responses.get(&key) {
                Some(Ok(bars)) => Ok(bars.clone()),
                Some(Err(e)) => Err(e.clone()),
                None => Ok(Vec::new()),
            }
        }
    }

    #[derive(Default)]
    struct FakeBrokerProvider {
        positions: Vec<Position>,
        watchlist: Mutex<Vec<WatchlistEntry>>,
    }

    #[async_trait]
    impl BrokerProvider for FakeBrokerProvider {
        async fn list_accounts(&self, _user: &str, _cancel: &CancellationToken) -> CoreResult<Vec<AccountHandle>> {
            Ok(Vec::new())
        }

        async fn fetch_positions(&self, _session: &BrokerSession, _cancel: &CancellationToken) -> CoreResult<Vec<Position>> {
            Ok(self.positions.clone())
        }

        async fn fetch_account_info(&self, _session: &BrokerSession, _cancel: &CancellationToken) -> CoreResult<AccountSnapshot> {
            unimplemented!("not exercised by these tests")
        }

        async fn fetch_today_deals(&self, _session: &BrokerSession, _cancel: &CancellationToken) -> CoreResult<Vec<TradeFill>> {
            Ok(Vec::new())
        }

        async fn fetch_historical_deals(
            &self,
            _session: &BrokerSession,
            _from: NaiveDate,
            _to: NaiveDate,
            _cancel: &CancellationToken,
        ) -> CoreResult<Vec<TradeFill>> {
            Ok(Vec::new())
        }

        async fn fetch_watchlist(&self, _user: &str, _cancel: &CancellationToken) -> CoreResult<Vec<WatchlistEntry>> {
            Ok(self.watchlist.lock().unwrap().clone())
        }
    }

    async fn test_orchestrator(quote: FakeQuoteProvider, broker: FakeBrokerProvider) -> SyncOrchestrator {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        SyncOrchestrator::new(
            EntityStore::new(db.clone()),
            BarStore::new(db),
            Arc::new(quote),
            Arc::new(broker),
            SyncConfig::default(),
        )
    }

    #[tokio::test]
    async fn sync_klines_upserts_bars_and_reports_record_count() {
        let mut responses = HashMap::new();
        responses.insert("US.AAPL".to_string(), Ok(vec![bar(Market::Us, "AAPL", 1, 100), bar(Market::Us, "AAPL", 2, 101), bar(Market::Us, "AAPL", 3, 102)]));
        let orchestrator = test_orchestrator(FakeQuoteProvider { responses }, FakeBrokerProvider::default()).await;

        let cancel = CancellationToken::new();
        let outcome = orchestrator.sync_klines("alice", &["US.AAPL".to_string()], 30, &cancel).await.unwrap();
        assert_eq!(outcome.status, SyncStatus::Success);
        assert_eq!(outcome.records_count, 3);
    }

    #[tokio::test]
    async fn sync_klines_is_partial_when_one_symbol_fails() {
        let mut responses = HashMap::new();
        responses.insert("US.AAPL".to_string(), Ok(vec![bar(Market::Us, "AAPL", 1, 100)]));
        responses.insert("US.MSFT".to_string(), Err(CoreError::NotFound("no data for MSFT".into())));
        let orchestrator = test_orchestrator(FakeQuoteProvider { responses }, FakeBrokerProvider::default()).await;

        let cancel = CancellationToken::new();
        let outcome = orchestrator
            .sync_klines("alice", &["US.AAPL".to_string(), "US.MSFT".to_string()], 30, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome.status, SyncStatus::Partial);
        assert_eq!(outcome.records_count, 1);
        assert!(outcome.error.unwrap().contains("MSFT"));
    }

    #[tokio::test]
    async fn sync_klines_resumes_from_the_latest_persisted_date() {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        let bar_store = BarStore::new(db.clone());
        bar_store.upsert_bars(&[bar(Market::Us, "AAPL", 5, 100)]).await.unwrap();

        let mut responses = HashMap::new();
        // The fake ignores the requested range and always returns one more
        // bar; the point under test is that `latest_date` advanced past
        // day 5, so this bar lands without clobbering the seeded one.
        responses.insert("US.AAPL".to_string(), Ok(vec![bar(Market::Us, "AAPL", 6, 101)]));
        let orchestrator = SyncOrchestrator::new(
            EntityStore::new(db.clone()),
            bar_store,
            Arc::new(FakeQuoteProvider { responses }),
            Arc::new(FakeBrokerProvider::default()),
            SyncConfig::default(),
        );

        let cancel = CancellationToken::new();
        let outcome = orchestrator.sync_klines("alice", &["US.AAPL".to_string()], 30, &cancel).await.unwrap();
        assert_eq!(outcome.records_count, 1);

        let all = BarStore::new(db)
            .fetch_range(Market::Us, "AAPL", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn sync_watchlist_marks_entries_missing_from_the_broker_as_inactive() {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        let entity_store = EntityStore::new(db.clone());
        let stale = WatchlistEntry { user: "alice".into(), market: Market::Us, code: "MSFT".into(), name: None, group: None, notes: None, sort_order: 0, active: true };
        entity_store.upsert_watchlist_entry(&stale).await.unwrap();

        let fresh = WatchlistEntry { user: "alice".into(), market: Market::Us, code: "AAPL".into(), name: None, group: None, notes: None, sort_order: 1, active: true };
        let broker = FakeBrokerProvider { positions: Vec::new(), watchlist: Mutex::new(vec![fresh]) };
        let orchestrator = SyncOrchestrator::new(entity_store.clone(), BarStore::new(db), Arc::new(FakeQuoteProvider { responses: HashMap::new() }), Arc::new(broker), SyncConfig::default());

        let cancel = CancellationToken::new();
        orchestrator.sync_watchlist("alice", &cancel).await.unwrap();

        let all = entity_store.watchlist_for_user("alice").await.unwrap();
        let msft = all.iter().find(|w| w.code == "MSFT").unwrap();
        let aapl = all.iter().find(|w| w.code == "AAPL").unwrap();
        assert!(!msft.active, "entry missing from the broker's fresh fetch should be marked inactive");
        assert!(aapl.active);
    }

    #[tokio::test]
    async fn sync_positions_upserts_every_account_and_reports_success() {
        let positions = vec![Position {
            account: "acct1".into(),
            snapshot_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            market: Market::Us,
            code: "AAPL".into(),
            qty: Decimal::from(10),
            can_sell_qty: None,
            cost_price: Decimal::from(100),
            market_price: Decimal::from(110),
            side: PositionSide::Long,
        }];
        let broker = FakeBrokerProvider { positions, watchlist: Mutex::new(Vec::new()) };
        let orchestrator = test_orchestrator(FakeQuoteProvider { responses: HashMap::new() }, broker).await;

        let accounts = vec![AccountHandle { account: "acct1".into(), broker_acc_id: "b1".into(), market: Market::Us, currency: "USD".into() }];
        let cancel = CancellationToken::new();
        let outcome = orchestrator.sync_positions("alice", &accounts, &cancel).await.unwrap();
        assert_eq!(outcome.status, SyncStatus::Success);
        assert_eq!(outcome.records_count, 1);
    }
}
