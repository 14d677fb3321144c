//! Read-only season state derived from the chain.

use alloy::primitives::Address;

/// Snapshot of a season's participant set at one point in time.
///
/// The core never mutates a season; this is a pure read model used by the
/// position handler to recompute every participant's probability.
#[derive(Debug, Clone)]
pub struct SeasonSnapshot {
    pub season_id: u64,
    pub total_tickets: u64,
    pub participants: Vec<Address>,
    pub is_active: bool,
}
