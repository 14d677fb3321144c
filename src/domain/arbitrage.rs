//! Arbitrage detection between raffle-implied odds and FPMM prices.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::market::{InfoFiMarket, PlayerAddress};

/// A recorded observation that the two venues disagree on a player's odds.
#[derive(Debug, Clone)]
pub struct ArbitrageOpportunity {
    pub season_id: u64,
    pub player: PlayerAddress,
    pub market_id: i64,
    pub raffle_pct: Decimal,
    pub market_pct: Decimal,
    pub price_difference_pct: Decimal,
    pub profitability_pct: Decimal,
    pub strategy_text: String,
    pub created_at: DateTime<Utc>,
}

/// Basis points rendered as a two-decimal percentage.
#[must_use]
pub fn bps_to_pct(bps: u16) -> Decimal {
    Decimal::new(i64::from(bps), 2)
}

/// Compare raffle odds against the FPMM YES price and build an opportunity
/// when the spread reaches `threshold_bps`.
///
/// Profitability is the spread relative to the cheaper side: buying the
/// underpriced leg and selling the overpriced one captures the difference on
/// the capital tied up in the cheap leg.
#[must_use]
pub fn detect(
    market: &InfoFiMarket,
    raffle_bps: u16,
    sentiment_bps: u16,
    threshold_bps: u16,
) -> Option<ArbitrageOpportunity> {
    let raffle_pct = bps_to_pct(raffle_bps);
    let market_pct = bps_to_pct(sentiment_bps);
    let difference = (raffle_pct - market_pct).abs();
    if difference < bps_to_pct(threshold_bps) {
        return None;
    }

    let cheaper = raffle_pct.min(market_pct);
    if cheaper.is_zero() {
        // A zero-priced side means the market has no meaningful quote yet.
        return None;
    }
    let profitability = (difference / cheaper * Decimal::ONE_HUNDRED).round_dp(2);

    let strategy_text = if raffle_pct < market_pct {
        format!(
            "Buy raffle position at {raffle_pct}% and sell YES on the market at {market_pct}%"
        )
    } else {
        format!(
            "Buy YES on the market at {market_pct}% and sell raffle position at {raffle_pct}%"
        )
    };

    Some(ArbitrageOpportunity {
        season_id: market.season_id,
        player: market.player.clone(),
        market_id: market.id,
        raffle_pct,
        market_pct,
        price_difference_pct: difference,
        profitability_pct: profitability,
        strategy_text,
        created_at: Utc::now(),
    })
}
