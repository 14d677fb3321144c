//! Basis-point probability arithmetic.
//!
//! All probabilities and blend weights in the engine are integers in
//! `[0, 10000]`. Arithmetic is done in `u128` so intermediate products never
//! overflow, and division always floors.

use serde::Deserialize;

use crate::error::{Error, Result};

/// One hundred percent, in basis points.
pub const BPS_SCALE: u64 = 10_000;

/// Win probability of a position, floored to basis points.
///
/// Returns 0 when `total_tickets` is 0 (an empty season has no winners).
#[must_use]
pub fn win_probability_bps(tickets: u64, total_tickets: u64) -> u16 {
    if total_tickets == 0 {
        return 0;
    }
    let bps = (u128::from(tickets) * u128::from(BPS_SCALE)) / u128::from(total_tickets);
    // tickets > total_tickets never happens on a consistent chain; clamp so a
    // torn read cannot produce an out-of-range probability.
    bps.min(u128::from(BPS_SCALE)) as u16
}

/// Weight pair for the hybrid price blend. Must sum to exactly 10000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HybridWeights {
    pub raffle_bps: u16,
    pub market_bps: u16,
}

impl HybridWeights {
    pub fn new(raffle_bps: u16, market_bps: u16) -> Result<Self> {
        let weights = Self {
            raffle_bps,
            market_bps,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<()> {
        if u64::from(self.raffle_bps) + u64::from(self.market_bps) != BPS_SCALE {
            return Err(Error::Config(format!(
                "hybrid weights must sum to {BPS_SCALE}, got {} + {}",
                self.raffle_bps, self.market_bps
            )));
        }
        Ok(())
    }
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            raffle_bps: 7_000,
            market_bps: 3_000,
        }
    }
}

/// Weighted blend of raffle probability and market sentiment.
///
/// `hybrid = (raffle_weight * raffle + market_weight * sentiment) / 10000`,
/// floored. With valid inputs the result is always in `[0, 10000]`.
#[must_use]
pub fn hybrid_price_bps(weights: HybridWeights, raffle_bps: u16, sentiment_bps: u16) -> u16 {
    let blended = u128::from(weights.raffle_bps) * u128::from(raffle_bps)
        + u128::from(weights.market_bps) * u128::from(sentiment_bps);
    (blended / u128::from(BPS_SCALE)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_floors() {
        // 1 / 3 of 10000 = 3333.33.. -> 3333
        assert_eq!(win_probability_bps(1, 3), 3333);
        assert_eq!(win_probability_bps(100, 10_000), 100);
        assert_eq!(win_probability_bps(99, 10_000), 99);
    }

    #[test]
    fn zero_total_means_zero_probability() {
        assert_eq!(win_probability_bps(0, 0), 0);
        assert_eq!(win_probability_bps(500, 0), 0);
    }

    #[test]
    fn full_ownership_is_ten_thousand() {
        assert_eq!(win_probability_bps(42, 42), 10_000);
    }

    #[test]
    fn torn_read_is_clamped() {
        assert_eq!(win_probability_bps(11, 10), 10_000);
    }

    #[test]
    fn probability_is_always_in_range() {
        for tickets in [0u64, 1, 7, 999, 10_000, u64::MAX / 2] {
            for total in [1u64, 3, 9_999, 10_000, u64::MAX] {
                let bps = win_probability_bps(tickets, total);
                assert!(bps <= 10_000, "bps {bps} out of range");
            }
        }
    }

    #[test]
    fn season_probabilities_sum_within_rounding() {
        // Invariant: sum of floored per-participant probabilities never
        // exceeds 10000, and undershoots by at most one bp per participant.
        let positions = [1_234u64, 2_345, 3_456, 777, 2_188];
        let total: u64 = positions.iter().sum();
        let sum: u64 = positions
            .iter()
            .map(|&t| u64::from(win_probability_bps(t, total)))
            .sum();
        assert!(sum <= BPS_SCALE);
        assert!(sum >= BPS_SCALE - positions.len() as u64);
    }

    #[test]
    fn default_weights_are_seventy_thirty() {
        let weights = HybridWeights::default();
        assert_eq!(weights.raffle_bps, 7_000);
        assert_eq!(weights.market_bps, 3_000);
        weights.validate().unwrap();
    }

    #[test]
    fn weights_must_sum_to_scale() {
        assert!(HybridWeights::new(7_000, 3_001).is_err());
        assert!(HybridWeights::new(0, 10_000).is_ok());
    }

    #[test]
    fn hybrid_blend_matches_formula() {
        let weights = HybridWeights::default();
        // (7000 * 2500 + 3000 * 2700) / 10000 = 2560
        assert_eq!(hybrid_price_bps(weights, 2_500, 2_700), 2_560);
    }

    #[test]
    fn hybrid_blend_rounding_case() {
        let weights = HybridWeights::default();
        // (7000 * 3333 + 3000 * 6667) / 10000 = 4333.2 -> 4333
        let hybrid = hybrid_price_bps(weights, 3_333, 6_667);
        assert!((i32::from(hybrid) - 4_333).abs() <= 1);
    }

    #[test]
    fn hybrid_blend_is_deterministic() {
        let weights = HybridWeights::default();
        assert_eq!(
            hybrid_price_bps(weights, 4_321, 1_234),
            hybrid_price_bps(weights, 4_321, 1_234),
        );
    }

    #[test]
    fn hybrid_blend_law_holds_across_inputs() {
        let weights = HybridWeights::default();
        for raffle in (0..=10_000u16).step_by(997) {
            for sentiment in (0..=10_000u16).step_by(1_003) {
                let hybrid = i64::from(hybrid_price_bps(weights, raffle, sentiment));
                let exact = (7_000 * i64::from(raffle) + 3_000 * i64::from(sentiment)) / 10_000;
                assert!((hybrid - exact).abs() <= 1);
                assert!((0..=10_000).contains(&hybrid));
            }
        }
    }
}
