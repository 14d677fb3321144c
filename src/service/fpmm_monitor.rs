//! Hybrid pricing and arbitrage monitoring.
//!
//! [`PricingEngine`] holds the per-market refresh step: read the FPMM quote,
//! blend it with the raffle probability, upsert the pricing cache, and record
//! a deduplicated arbitrage opportunity when the venues disagree. One
//! [`SeasonMonitor`] loop runs per active season and walks its markets on a
//! fixed cadence; the `Trade` listener reuses the same step for an immediate
//! refresh of a single market.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::price_hub::PriceStreamHub;
use crate::domain::{arbitrage, HybridWeights, InfoFiMarket, PricingEntry};
use crate::error::{Error, Result};
use crate::port::chain::FpmmReader;
use crate::port::store::{ArbitrageStore, MarketStore, PricingStore};

/// How long an oracle price-slot observation counts as authoritative before
/// the monitor falls back to the database row.
const ORACLE_FRESHNESS_MS: i64 = 60_000;

pub struct PricingEngine {
    markets: Arc<dyn MarketStore>,
    pricing: Arc<dyn PricingStore>,
    arbitrage: Arc<dyn ArbitrageStore>,
    fpmm: Arc<dyn FpmmReader>,
    hub: Arc<PriceStreamHub>,
    weights: HybridWeights,
    arbitrage_threshold_bps: u16,
    dedup_window: chrono::Duration,
}

impl PricingEngine {
    #[must_use]
    pub fn new(
        markets: Arc<dyn MarketStore>,
        pricing: Arc<dyn PricingStore>,
        arbitrage: Arc<dyn ArbitrageStore>,
        fpmm: Arc<dyn FpmmReader>,
        hub: Arc<PriceStreamHub>,
        weights: HybridWeights,
        arbitrage_threshold_bps: u16,
        dedup_window: Duration,
    ) -> Self {
        Self {
            markets,
            pricing,
            arbitrage,
            fpmm,
            hub,
            weights,
            arbitrage_threshold_bps,
            dedup_window: chrono::Duration::from_std(dedup_window)
                .unwrap_or_else(|_| chrono::Duration::seconds(300)),
        }
    }

    /// Refresh one market. Returns whether an arbitrage row was inserted.
    pub async fn refresh_market(&self, market: &InfoFiMarket) -> Result<bool> {
        let Some(contract) = market.contract_address.as_deref() else {
            // Not deployed yet; the MarketCreated listener seeds the cache.
            return Ok(false);
        };
        let fpmm_address: Address = contract
            .parse()
            .map_err(|e| Error::Parse(format!("bad fpmm address {contract}: {e}")))?;

        let (yes_bps, _no_bps) = self.fpmm.prices(fpmm_address).await?;
        let raffle_bps = self.current_raffle_bps(market);

        let entry = PricingEntry::blend(market.id, raffle_bps, yes_bps, self.weights);
        self.pricing.upsert(&entry).await?;
        debug!(
            market_id = market.id,
            raffle_bps,
            sentiment_bps = yes_bps,
            hybrid_bps = entry.hybrid_bps,
            "pricing cache refreshed"
        );

        let Some(opportunity) =
            arbitrage::detect(market, raffle_bps, yes_bps, self.arbitrage_threshold_bps)
        else {
            return Ok(false);
        };

        let last = self.arbitrage.latest_created_at(market.id).await?;
        let within_window =
            last.is_some_and(|at| opportunity.created_at - at < self.dedup_window);
        if within_window {
            return Ok(false);
        }

        self.arbitrage.insert(&opportunity).await?;
        info!(
            market_id = market.id,
            spread_pct = %opportunity.price_difference_pct,
            profitability_pct = %opportunity.profitability_pct,
            strategy = %opportunity.strategy_text,
            "arbitrage opportunity recorded"
        );
        Ok(true)
    }

    /// One monitor pass over a season's active markets. Errors on a single
    /// market are logged and do not stop the pass; the cancel signal is
    /// polled between markets.
    pub async fn refresh_season(
        &self,
        season_id: u64,
        cancelled: impl Fn() -> bool,
    ) -> Result<()> {
        for market in self.markets.list_markets_by_season(season_id).await? {
            if cancelled() {
                break;
            }
            if !market.is_active || market.is_settled {
                continue;
            }
            if let Err(error) = self.refresh_market(&market).await {
                warn!(market_id = market.id, error = %error, "market refresh failed");
            }
        }
        Ok(())
    }

    /// Immediate refresh for the market behind a just-traded FPMM.
    pub async fn refresh_by_fpmm(&self, fpmm_address: Address) -> Result<()> {
        let needle = fpmm_address.to_string().to_lowercase();
        match self.markets.get_market_by_contract(&needle).await? {
            Some(market) => {
                self.refresh_market(&market).await?;
                Ok(())
            }
            None => {
                debug!(fpmm = %needle, "trade on unknown fpmm; ignoring");
                Ok(())
            }
        }
    }

    /// Raffle leg of the blend: the oracle slot when it is fresh, otherwise
    /// the database row maintained by the position handler.
    fn current_raffle_bps(&self, market: &InfoFiMarket) -> u16 {
        if let Some(cached) = self.hub.snapshot(market.id) {
            let age_ms = Utc::now().timestamp_millis() - cached.updated_at_ms;
            if age_ms <= ORACLE_FRESHNESS_MS {
                return cached.raffle_bps;
            }
        }
        market.current_probability_bps
    }
}

/// Supervised per-season monitor loop.
pub struct SeasonMonitor;

impl SeasonMonitor {
    pub fn spawn(
        engine: Arc<PricingEngine>,
        season_id: u64,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
        mut stop: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(season_id, "fpmm monitor started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let watch_shutdown = shutdown.clone();
                        let watch_stop = stop.clone();
                        let cancelled = move || *watch_shutdown.borrow() || *watch_stop.borrow();
                        if let Err(error) = engine.refresh_season(season_id, cancelled).await {
                            warn!(season_id, error = %error, "monitor pass failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            info!(season_id, "fpmm monitor stopped");
        })
    }
}
