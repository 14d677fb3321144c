//! Persistence ports for markets, pricing, arbitrage, and cursors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ArbitrageOpportunity, InfoFiMarket, MarketType, NewMarket, PlayerAddress, PricingEntry};
use crate::error::Result;

/// One recorded market-creation attempt, kept for operator diagnosis.
#[derive(Debug, Clone)]
pub struct CreationAttempt {
    /// Season the market belongs to.
    pub season_id: u64,
    /// Player the market is for, in canonical lowercase form.
    pub player: PlayerAddress,
    /// 1-based attempt number within one creation flow.
    pub attempt: u32,
    /// How the attempt ended.
    pub outcome: AttemptOutcome,
    /// Transaction hash on submission, or the failure message.
    pub detail: Option<String>,
}

/// Terminal state of a single creation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The transaction was submitted; the `MarketCreated` listener takes
    /// over from here.
    Submitted,
    /// A retryable failure; the creator backs off and tries again.
    TransientFailure,
    /// The contract reverted; the pair is not retried for this process.
    PermanentFailure,
    /// Given up without a revert: retries exhausted or a fatal RPC error.
    /// Needs an operator, not another automatic retry.
    Abandoned,
}

impl AttemptOutcome {
    /// Stable string form written to the attempts table.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Submitted => "submitted",
            AttemptOutcome::TransientFailure => "transient_failure",
            AttemptOutcome::PermanentFailure => "permanent_failure",
            AttemptOutcome::Abandoned => "abandoned",
        }
    }
}

/// Storage operations for market rows and players.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Insert a market. Fails with [`crate::error::Error::DuplicateKey`] on
    /// the `(season, player, type)` unique index.
    async fn create_market(&self, market: NewMarket) -> Result<InfoFiMarket>;

    /// Whether a market row exists for the composite key. Address comparison
    /// is case-insensitive via the canonical lowercase form.
    async fn has_market(
        &self,
        season_id: u64,
        player: &PlayerAddress,
        market_type: MarketType,
    ) -> Result<bool>;

    /// Look up a market by its composite key.
    async fn get_market(
        &self,
        season_id: u64,
        player: &PlayerAddress,
        market_type: MarketType,
    ) -> Result<Option<InfoFiMarket>>;

    /// Look up a market by its assigned id.
    async fn get_market_by_id(&self, id: i64) -> Result<Option<InfoFiMarket>>;

    /// Look up a market by its deployed FPMM address (lowercased).
    async fn get_market_by_contract(&self, contract_address: &str) -> Result<Option<InfoFiMarket>>;

    /// All markets of a season, in id order.
    async fn list_markets_by_season(&self, season_id: u64) -> Result<Vec<InfoFiMarket>>;

    /// Seasons that still have at least one active, unsettled market.
    async fn active_season_ids(&self) -> Result<Vec<u64>>;

    /// All deployed FPMM addresses across active markets.
    async fn deployed_fpmm_addresses(&self) -> Result<Vec<String>>;

    /// Write a new probability. Returns `false` (and writes nothing) when the
    /// stored value already matches.
    async fn update_market_probability(&self, id: i64, probability_bps: u16) -> Result<bool>;

    async fn update_market_contract_address(&self, id: i64, contract_address: &str) -> Result<()>;

    /// Mark every market of the season settled and inactive. Returns the
    /// number of rows touched.
    async fn settle_season_markets(&self, season_id: u64) -> Result<usize>;

    /// Ensure a player row exists; replays are a no-op.
    async fn get_or_create_player(&self, player: &PlayerAddress) -> Result<()>;

    /// Append one creation attempt to the diagnosis log.
    async fn record_creation_attempt(&self, attempt: &CreationAttempt) -> Result<()>;
}

/// Storage operations for the pricing cache.
#[async_trait]
pub trait PricingStore: Send + Sync {
    /// Insert or replace the cache row for `entry.market_id`.
    async fn upsert(&self, entry: &PricingEntry) -> Result<()>;

    /// Current cache row for a market, if any.
    async fn get(&self, market_id: i64) -> Result<Option<PricingEntry>>;
}

/// Append-only arbitrage records.
#[async_trait]
pub trait ArbitrageStore: Send + Sync {
    /// Append a record and return its assigned id.
    async fn insert(&self, opportunity: &ArbitrageOpportunity) -> Result<i64>;

    /// Creation time of the most recent record for `market_id`. The caller
    /// enforces the deduplication window against this.
    async fn latest_created_at(&self, market_id: i64) -> Result<Option<DateTime<Utc>>>;
}

/// Per-(network, event-type) block cursors.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Last fully handled block, or `None` before the first observation.
    async fn cursor(&self, network_key: &str, event_type: &str) -> Result<Option<u64>>;

    /// Advance the cursor. Writes ≤ the stored value are ignored; returns
    /// whether the cursor actually moved.
    async fn advance(&self, network_key: &str, event_type: &str, block: u64) -> Result<bool>;
}
