//! Log handlers, one per registered event type.
//!
//! Handlers decode a raw log and route it to the owning service. A log that
//! fails to decode is skipped with a warning (the chain cannot be retried
//! into emitting a different payload); infrastructure failures return `Err`
//! so the listener retries the whole range from the same cursor.

use std::sync::Arc;

use alloy::primitives::Address;
use alloy::rpc::types::Log;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::fpmm_monitor::PricingEngine;
use super::listener::LogHandler;
use super::market_creator::MarketCreator;
use super::position::PositionEngine;
use super::price_hub::PriceStreamHub;
use crate::adapter::chain::contracts;
use crate::domain::{
    win_probability_bps, EventKind, HybridWeights, LifecycleEvent, NewMarket, PlayerAddress,
    PricingEntry,
};
use crate::error::{Error, Result};
use crate::port::chain::RaffleReader;
use crate::port::store::{MarketStore, PricingStore};

/// `PositionUpdate` → market creation check + full-season recompute.
pub struct PositionUpdateHandler {
    curve: Address,
    positions: Arc<PositionEngine>,
    creator: Arc<MarketCreator>,
}

impl PositionUpdateHandler {
    #[must_use]
    pub fn new(curve: Address, positions: Arc<PositionEngine>, creator: Arc<MarketCreator>) -> Self {
        Self {
            curve,
            positions,
            creator,
        }
    }
}

#[async_trait]
impl LogHandler for PositionUpdateHandler {
    fn kind(&self) -> EventKind {
        EventKind::PositionUpdate
    }

    async fn addresses(&self) -> Result<Vec<Address>> {
        Ok(vec![self.curve])
    }

    async fn handle(&self, log: &Log) -> Result<()> {
        let change = match contracts::decode_position_update(log) {
            Ok(change) => change,
            Err(error) => {
                warn!(error = %error, "undecodable PositionUpdate; skipping");
                return Ok(());
            }
        };
        info!(
            season_id = change.season_id,
            player = %change.player,
            old_tickets = change.old_tickets,
            new_tickets = change.new_tickets,
            probability_bps = change.probability_bps,
            "position update"
        );

        // Creation runs on its own task: its backoff schedule must never
        // stall the listener loop.
        let creator = Arc::clone(&self.creator);
        let triggering = change.clone();
        tokio::spawn(async move {
            if let Err(error) = creator.on_position_change(&triggering).await {
                warn!(error = %error, "market creation check failed");
            }
        });

        let outcome = self.positions.recompute(change.season_id).await?;
        debug!(
            season_id = change.season_id,
            rows_updated = outcome.rows_updated,
            oracle_writes = outcome.oracle_writes,
            failed_reads = outcome.failed_reads,
            "season probabilities recomputed"
        );

        // Catch-up: eligible players discovered without a market row.
        for uncovered in outcome.uncovered {
            let creator = Arc::clone(&self.creator);
            let season_id = change.season_id;
            let total_tickets = outcome.total_tickets;
            tokio::spawn(async move {
                if let Err(error) = creator
                    .ensure_market(
                        season_id,
                        uncovered.player,
                        uncovered.tickets,
                        uncovered.tickets,
                        total_tickets,
                    )
                    .await
                {
                    warn!(error = %error, "catch-up market creation failed");
                }
            });
        }
        Ok(())
    }
}

/// `MarketCreated` → idempotent market insert + pricing-cache seed.
pub struct MarketCreatedHandler {
    factory: Address,
    markets: Arc<dyn MarketStore>,
    pricing: Arc<dyn PricingStore>,
    raffle: Arc<dyn RaffleReader>,
    weights: HybridWeights,
}

impl MarketCreatedHandler {
    #[must_use]
    pub fn new(
        factory: Address,
        markets: Arc<dyn MarketStore>,
        pricing: Arc<dyn PricingStore>,
        raffle: Arc<dyn RaffleReader>,
        weights: HybridWeights,
    ) -> Self {
        Self {
            factory,
            markets,
            pricing,
            raffle,
            weights,
        }
    }
}

#[async_trait]
impl LogHandler for MarketCreatedHandler {
    fn kind(&self) -> EventKind {
        EventKind::MarketCreated
    }

    async fn addresses(&self) -> Result<Vec<Address>> {
        Ok(vec![self.factory])
    }

    async fn handle(&self, log: &Log) -> Result<()> {
        let deployed = match contracts::decode_market_created(log) {
            Ok(deployed) => deployed,
            Err(error) => {
                warn!(error = %error, "undecodable MarketCreated; skipping");
                return Ok(());
            }
        };
        let player = PlayerAddress::from(deployed.player);
        let fpmm = deployed.fpmm_address.to_string().to_lowercase();

        // Initial probability is whatever the chain reports at the moment the
        // row is first observed.
        let snapshot = self.raffle.season_snapshot(deployed.season_id).await?;
        let tickets = self
            .raffle
            .participant_tickets(deployed.season_id, deployed.player)
            .await?;
        let probability_bps = win_probability_bps(tickets, snapshot.total_tickets);

        let market = match self
            .markets
            .create_market(NewMarket {
                season_id: deployed.season_id,
                player: player.clone(),
                market_type: deployed.market_type,
                probability_bps,
                contract_address: Some(fpmm.clone()),
            })
            .await
        {
            Ok(market) => {
                info!(
                    market_id = market.id,
                    season_id = deployed.season_id,
                    player = %player,
                    fpmm = %fpmm,
                    probability_bps,
                    "market row created"
                );
                market
            }
            Err(Error::DuplicateKey(_)) => {
                // Replayed or concurrently handled; the row is the truth.
                let existing = self
                    .markets
                    .get_market(deployed.season_id, &player, deployed.market_type)
                    .await?
                    .ok_or_else(|| {
                        Error::Database("duplicate market reported but row missing".into())
                    })?;
                if existing.contract_address.is_none() {
                    self.markets
                        .update_market_contract_address(existing.id, &fpmm)
                        .await?;
                }
                debug!(market_id = existing.id, "MarketCreated replay; row already exists");
                existing
            }
            Err(error) => return Err(error),
        };

        self.markets.get_or_create_player(&player).await?;

        // Seed only when absent so a replay never clobbers live sentiment.
        if self.pricing.get(market.id).await?.is_none() {
            self.pricing
                .upsert(&PricingEntry::seeded(
                    market.id,
                    market.current_probability_bps,
                    self.weights,
                ))
                .await?;
        }
        Ok(())
    }
}

/// `Trade` → immediate sentiment refresh for the traded market.
pub struct TradeHandler {
    markets: Arc<dyn MarketStore>,
    engine: Arc<PricingEngine>,
}

impl TradeHandler {
    #[must_use]
    pub fn new(markets: Arc<dyn MarketStore>, engine: Arc<PricingEngine>) -> Self {
        Self { markets, engine }
    }
}

#[async_trait]
impl LogHandler for TradeHandler {
    fn kind(&self) -> EventKind {
        EventKind::Trade
    }

    /// The watched set grows as FPMMs deploy; re-read it every poll.
    async fn addresses(&self) -> Result<Vec<Address>> {
        let addresses = self.markets.deployed_fpmm_addresses().await?;
        Ok(addresses
            .iter()
            .filter_map(|raw| raw.parse().ok())
            .collect())
    }

    async fn handle(&self, log: &Log) -> Result<()> {
        let trade = match contracts::decode_trade(log) {
            Ok(trade) => trade,
            Err(error) => {
                warn!(error = %error, "undecodable Trade; skipping");
                return Ok(());
            }
        };
        debug!(
            fpmm = %trade.fpmm_address,
            trader = %trade.trader,
            buy_yes = trade.buy_yes,
            "fpmm trade observed"
        );
        // Best-effort: the periodic monitor reconciles if this read fails,
        // so one flaky FPMM never stalls the Trade cursor.
        if let Err(error) = self.engine.refresh_by_fpmm(trade.fpmm_address).await {
            warn!(fpmm = %trade.fpmm_address, error = %error, "post-trade refresh failed");
        }
        Ok(())
    }
}

/// `PriceUpdated` → stream hub cache + fan-out.
pub struct PriceUpdatedHandler {
    oracle: Address,
    hub: Arc<PriceStreamHub>,
}

impl PriceUpdatedHandler {
    #[must_use]
    pub fn new(oracle: Address, hub: Arc<PriceStreamHub>) -> Self {
        Self { oracle, hub }
    }
}

#[async_trait]
impl LogHandler for PriceUpdatedHandler {
    fn kind(&self) -> EventKind {
        EventKind::PriceUpdated
    }

    async fn addresses(&self) -> Result<Vec<Address>> {
        Ok(vec![self.oracle])
    }

    async fn handle(&self, log: &Log) -> Result<()> {
        let update = match contracts::decode_price_updated(log) {
            Ok(update) => update,
            Err(error) => {
                warn!(error = %error, "undecodable PriceUpdated; skipping");
                return Ok(());
            }
        };
        self.hub.on_oracle_price_updated(
            update.market_id,
            update.raffle_bps,
            update.market_bps,
            update.hybrid_bps,
        );
        Ok(())
    }
}

/// `SeasonStarted` → lifecycle message to the supervisor.
pub struct SeasonStartedHandler {
    raffle: Address,
    lifecycle: mpsc::Sender<LifecycleEvent>,
}

impl SeasonStartedHandler {
    #[must_use]
    pub fn new(raffle: Address, lifecycle: mpsc::Sender<LifecycleEvent>) -> Self {
        Self { raffle, lifecycle }
    }
}

#[async_trait]
impl LogHandler for SeasonStartedHandler {
    fn kind(&self) -> EventKind {
        EventKind::SeasonStarted
    }

    async fn addresses(&self) -> Result<Vec<Address>> {
        Ok(vec![self.raffle])
    }

    async fn handle(&self, log: &Log) -> Result<()> {
        let season_id = match contracts::decode_season_started(log) {
            Ok(season_id) => season_id,
            Err(error) => {
                warn!(error = %error, "undecodable SeasonStarted; skipping");
                return Ok(());
            }
        };
        info!(season_id, "season started");
        // A closed channel only happens during shutdown.
        let _ = self
            .lifecycle
            .send(LifecycleEvent::SeasonStarted(season_id))
            .await;
        Ok(())
    }
}

/// `SeasonCompleted` → settle market rows + lifecycle message.
pub struct SeasonCompletedHandler {
    raffle: Address,
    markets: Arc<dyn MarketStore>,
    lifecycle: mpsc::Sender<LifecycleEvent>,
}

impl SeasonCompletedHandler {
    #[must_use]
    pub fn new(
        raffle: Address,
        markets: Arc<dyn MarketStore>,
        lifecycle: mpsc::Sender<LifecycleEvent>,
    ) -> Self {
        Self {
            raffle,
            markets,
            lifecycle,
        }
    }
}

#[async_trait]
impl LogHandler for SeasonCompletedHandler {
    fn kind(&self) -> EventKind {
        EventKind::SeasonCompleted
    }

    async fn addresses(&self) -> Result<Vec<Address>> {
        Ok(vec![self.raffle])
    }

    async fn handle(&self, log: &Log) -> Result<()> {
        let (season_id, winners) = match contracts::decode_season_completed(log) {
            Ok(decoded) => decoded,
            Err(error) => {
                warn!(error = %error, "undecodable SeasonCompleted; skipping");
                return Ok(());
            }
        };
        let settled = self.markets.settle_season_markets(season_id).await?;
        info!(season_id, winners = winners.len(), settled, "season completed");
        let _ = self
            .lifecycle
            .send(LifecycleEvent::SeasonCompleted { season_id, winners })
            .await;
        Ok(())
    }
}
