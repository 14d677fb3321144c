//! Ports onto the chain. Implemented by the alloy client; faked in tests.

use alloy::primitives::Address;
use alloy::rpc::types::Log;
use async_trait::async_trait;

use crate::domain::{EventKind, SeasonSnapshot};
use crate::error::Result;

/// Raw log access with transparent range chunking.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Current chain head.
    async fn block_number(&self) -> Result<u64>;

    /// Fetch logs of `kind` emitted by `addresses` over `[from, to]`,
    /// sorted by `(block_number, log_index)`.
    async fn logs(
        &self,
        addresses: &[Address],
        kind: EventKind,
        from: u64,
        to: u64,
    ) -> Result<Vec<Log>>;
}

/// Read-only views on the raffle contract.
#[async_trait]
pub trait RaffleReader: Send + Sync {
    /// Participant set and ticket total for a season.
    async fn season_snapshot(&self, season_id: u64) -> Result<SeasonSnapshot>;

    /// Current ticket count of one participant.
    async fn participant_tickets(&self, season_id: u64, player: Address) -> Result<u64>;
}

/// Probability writes to the on-chain oracle.
///
/// Implementations serialize submissions per account; callers may await
/// sequentially without worrying about nonce collisions.
#[async_trait]
pub trait OracleWriter: Send + Sync {
    /// Returns the transaction hash of the confirmed write.
    async fn update_raffle_probability(&self, market_id: i64, probability_bps: u16)
        -> Result<String>;
}

/// Market-creation surface of the factory contract.
#[async_trait]
pub trait MarketFactory: Send + Sync {
    /// Submit `onPositionUpdate` with the explicit creation gas limit.
    /// Returns the transaction hash (or sponsored-call bundle id).
    async fn submit_market_creation(
        &self,
        season_id: u64,
        player: Address,
        old_tickets: u64,
        new_tickets: u64,
        total_tickets: u64,
    ) -> Result<String>;

    /// `getPlayerMarket` view: the deployed FPMM address, if any.
    async fn player_market(&self, season_id: u64, player: Address) -> Result<Option<Address>>;
}

/// Price reads from a deployed FPMM.
#[async_trait]
pub trait FpmmReader: Send + Sync {
    /// `(yes_bps, no_bps)` from `getPrices()`.
    async fn prices(&self, fpmm: Address) -> Result<(u16, u16)>;
}
