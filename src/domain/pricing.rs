//! Pricing-cache entries and the hybrid blend.

use chrono::{DateTime, Utc};

use super::probability::{hybrid_price_bps, HybridWeights};

/// One row of the pricing cache: the blended view of a single market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingEntry {
    pub market_id: i64,
    pub raffle_bps: u16,
    pub sentiment_bps: u16,
    pub hybrid_bps: u16,
    pub weights: HybridWeights,
    pub last_updated: DateTime<Utc>,
}

impl PricingEntry {
    /// Blend a raffle probability with traded sentiment under `weights`.
    #[must_use]
    pub fn blend(market_id: i64, raffle_bps: u16, sentiment_bps: u16, weights: HybridWeights) -> Self {
        Self {
            market_id,
            raffle_bps,
            sentiment_bps,
            hybrid_bps: hybrid_price_bps(weights, raffle_bps, sentiment_bps),
            weights,
            last_updated: Utc::now(),
        }
    }

    /// Entry for a market that has not traded yet.
    ///
    /// Sentiment is seeded to the raffle probability so `hybrid == raffle`
    /// until the first FPMM trade moves the market leg.
    #[must_use]
    pub fn seeded(market_id: i64, raffle_bps: u16, weights: HybridWeights) -> Self {
        Self::blend(market_id, raffle_bps, raffle_bps, weights)
    }
}
