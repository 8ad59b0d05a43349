//! C3 Quote Provider and C4 Broker Provider: narrow abstract interfaces the
//! sync orchestrator consumes. Concrete implementations (HTTP brokerage
//! clients, scraping, connection handshakes) are external collaborators
//! per spec.md §1/§6 and are not part of this workspace — only the trait
//! shape lives here.

use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{AccountSnapshot, CoreResult, Market, Position, TradeFill, WatchlistEntry};
use tokio_util::sync::CancellationToken;

/// One brokerage account as returned by `listAccounts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountHandle {
    pub account: String,
    pub broker_acc_id: String,
    pub market: Market,
    pub currency: String,
}

/// Scoped acquisition for a broker connection (spec.md §9: "model with
/// scoped acquisition that guarantees release on all exit paths"). The
/// session is already authenticated by the time the core receives it —
/// authentication itself happens outside the core.
pub struct BrokerSession {
    account: String,
}

impl BrokerSession {
    /// Acquire a session for an already-connected account. Dropping the
    /// session releases it, regardless of which exit path was taken.
    pub fn acquire(account: impl Into<String>) -> Self {
        let account = account.into();
        tracing::debug!(%account, "broker session acquired");
        Self { account }
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}

impl Drop for BrokerSession {
    fn drop(&mut self) {
        tracing::debug!(account = %self.account, "broker session released");
    }
}

/// Fetches daily bars for a symbol over a day range. Daily granularity
/// only; results must come back ascending by date and cover full calendar
/// days (spec.md §6).
///
/// Error policy on `fetch_bars`: `NotFound` when upstream has no data for
/// the symbol, `Transient` for network/timeout/rate-limit conditions (the
/// caller retries with exponential backoff up to a configured attempt
/// count — see `polygon-client`'s 429 retry loop for the idiom this
/// mirrors), `InvalidInput` for a malformed symbol or reversed date range,
/// `ProviderInvalid` for an unparseable payload.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_bars(
        &self,
        market: Market,
        code: &str,
        from: NaiveDate,
        to: NaiveDate,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<core_types::Bar>>;
}

/// Read-only brokerage operations. Order placement is explicitly out of
/// scope (spec.md Non-goals) — this trait has no `submit_order`/
/// `cancel_order`/`close_position` surface, unlike the broader
/// `BrokerClient` shape this is grounded on.
#[async_trait]
pub trait BrokerProvider: Send + Sync {
    async fn list_accounts(&self, user: &str, cancel: &CancellationToken) -> CoreResult<Vec<AccountHandle>>;

    async fn fetch_positions(
        &self,
        session: &BrokerSession,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<Position>>;

    async fn fetch_account_info(
        &self,
        session: &BrokerSession,
        cancel: &CancellationToken,
    ) -> CoreResult<AccountSnapshot>;

    async fn fetch_today_deals(
        &self,
        session: &BrokerSession,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<TradeFill>>;

    async fn fetch_historical_deals(
        &self,
        session: &BrokerSession,
        from: NaiveDate,
        to: NaiveDate,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<TradeFill>>;

    async fn fetch_watchlist(&self, user: &str, cancel: &CancellationToken) -> CoreResult<Vec<WatchlistEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_reports_its_account() {
        let s = BrokerSession::acquire("acct-1");
        assert_eq!(s.account(), "acct-1");
    }
}
