//! InfoFi market domain types.

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};

/// Lowercased hex form of a player address.
///
/// The stored representation is the canonical identity: every comparison,
/// unique index, and lookup operates on this form, so checksum-cased inputs
/// from different RPC providers all collapse to one player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerAddress(String);

impl PlayerAddress {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Address> for PlayerAddress {
    fn from(address: Address) -> Self {
        Self(address.to_string().to_lowercase())
    }
}

impl std::fmt::Display for PlayerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed set of market instruments the factory can deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketType {
    WinnerPrediction,
}

impl MarketType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::WinnerPrediction => "WINNER_PREDICTION",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "WINNER_PREDICTION" => Some(MarketType::WinnerPrediction),
            _ => None,
        }
    }

    /// Decode the right-padded ASCII `bytes32` the factory emits.
    pub fn from_bytes32(raw: &B256) -> Option<Self> {
        let text = raw.as_slice();
        let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
        Self::parse(std::str::from_utf8(&text[..end]).ok()?)
    }

    #[must_use]
    pub fn to_bytes32(&self) -> B256 {
        let mut out = [0u8; 32];
        let text = self.as_str().as_bytes();
        out[..text.len()].copy_from_slice(text);
        B256::from(out)
    }
}

impl std::fmt::Display for MarketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted per-player prediction market.
#[derive(Debug, Clone)]
pub struct InfoFiMarket {
    /// Auto-assigned monotonic id; the key for oracle writes, the pricing
    /// cache, and stream subscriptions.
    pub id: i64,
    pub season_id: u64,
    pub player: PlayerAddress,
    pub market_type: MarketType,
    pub initial_probability_bps: u16,
    pub current_probability_bps: u16,
    /// Deployed FPMM address, once known.
    pub contract_address: Option<String>,
    pub is_active: bool,
    pub is_settled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a market row.
#[derive(Debug, Clone)]
pub struct NewMarket {
    pub season_id: u64,
    pub player: PlayerAddress,
    pub market_type: MarketType,
    pub probability_bps: u16,
    pub contract_address: Option<String>,
}
