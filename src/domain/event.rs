//! Decoded chain events and their cursor identities.

use alloy::primitives::{Address, B256};

use super::market::MarketType;

/// The event types the listener set tracks.
///
/// `as_str` doubles as the `event_type` half of the cursor key, so renaming a
/// variant string resets that listener's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PositionUpdate,
    MarketCreated,
    Trade,
    PriceUpdated,
    SeasonStarted,
    SeasonCompleted,
}

impl EventKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PositionUpdate => "PositionUpdate",
            EventKind::MarketCreated => "MarketCreated",
            EventKind::Trade => "Trade",
            EventKind::PriceUpdated => "PriceUpdated",
            EventKind::SeasonStarted => "SeasonStarted",
            EventKind::SeasonCompleted => "SeasonCompleted",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `PositionUpdate` from the bonding curve.
#[derive(Debug, Clone)]
pub struct PositionChange {
    pub season_id: u64,
    pub player: Address,
    pub old_tickets: u64,
    pub new_tickets: u64,
    pub total_tickets: u64,
    pub probability_bps: u16,
}

/// `MarketCreated` from the market factory.
#[derive(Debug, Clone)]
pub struct MarketDeployed {
    pub season_id: u64,
    pub player: Address,
    pub market_type: MarketType,
    pub condition_id: B256,
    pub fpmm_address: Address,
}

/// `Trade` from an FPMM.
#[derive(Debug, Clone)]
pub struct FpmmTrade {
    pub fpmm_address: Address,
    pub trader: Address,
    pub buy_yes: bool,
    pub amount_in: u64,
    pub amount_out: u64,
}

/// `PriceUpdated` from the oracle.
#[derive(Debug, Clone)]
pub struct OraclePriceUpdate {
    pub market_id: i64,
    pub raffle_bps: u16,
    pub market_bps: u16,
    pub hybrid_bps: u16,
}

/// Season lifecycle markers routed to the supervisor.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    SeasonStarted(u64),
    SeasonCompleted {
        season_id: u64,
        winners: Vec<Address>,
    },
}
