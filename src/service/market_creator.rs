//! Threshold-triggered market creation.
//!
//! The creator never writes a market row itself: it submits the factory
//! transaction and lets the `MarketCreated` listener perform the idempotent
//! insert. That keeps the database consistent with chain state even when a
//! submission lands but the process restarts before the event is observed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{MarketType, PlayerAddress, PositionChange};
use crate::error::{Error, Result};
use crate::port::chain::MarketFactory;
use crate::port::store::{AttemptOutcome, CreationAttempt, MarketStore};

pub struct MarketCreator {
    factory: Arc<dyn MarketFactory>,
    markets: Arc<dyn MarketStore>,
    threshold_bps: u16,
    retry_delays: Vec<Duration>,
    /// `(season, player)` pairs whose creation reverted; not retried for the
    /// lifetime of this process. The chain-side `MarketCreated` event remains
    /// the reconciliation path if the revert was "already created".
    permanent_failures: Mutex<HashSet<(u64, PlayerAddress)>>,
}

impl MarketCreator {
    #[must_use]
    pub fn new(
        factory: Arc<dyn MarketFactory>,
        markets: Arc<dyn MarketStore>,
        threshold_bps: u16,
        retry_delays: Vec<Duration>,
    ) -> Self {
        Self {
            factory,
            markets,
            threshold_bps,
            retry_delays,
            permanent_failures: Mutex::new(HashSet::new()),
        }
    }

    /// Entry point for a live `PositionUpdate`. Only positions at or above
    /// the threshold are eligible; everything below returns immediately.
    pub async fn on_position_change(&self, change: &PositionChange) -> Result<()> {
        if change.probability_bps < self.threshold_bps {
            return Ok(());
        }
        self.ensure_market(
            change.season_id,
            change.player,
            change.old_tickets,
            change.new_tickets,
            change.total_tickets,
        )
        .await
    }

    /// Submit the creation transaction unless a market already exists.
    ///
    /// Catch-up callers (an eligible player discovered without a row) pass
    /// `old_tickets == new_tickets`; the factory treats it as a standing
    /// position that crossed while unobserved.
    pub async fn ensure_market(
        &self,
        season_id: u64,
        player: Address,
        old_tickets: u64,
        new_tickets: u64,
        total_tickets: u64,
    ) -> Result<()> {
        let player_key = PlayerAddress::from(player);
        if self
            .permanent_failures
            .lock()
            .contains(&(season_id, player_key.clone()))
        {
            return Ok(());
        }
        if self
            .markets
            .has_market(season_id, &player_key, MarketType::WinnerPrediction)
            .await?
        {
            return Ok(());
        }

        // The chain may be ahead of the database after a restart; if the
        // factory already knows this market, the listener will insert it.
        match self.factory.player_market(season_id, player).await {
            Ok(Some(fpmm)) => {
                debug!(season_id, player = %player_key, fpmm = %fpmm, "market already on chain");
                return Ok(());
            }
            Ok(None) => {}
            Err(error) => {
                warn!(error = %error, "getPlayerMarket check failed; submitting anyway");
            }
        }

        let total_attempts = self.retry_delays.len() as u32 + 1;
        for attempt in 1..=total_attempts {
            match self
                .factory
                .submit_market_creation(season_id, player, old_tickets, new_tickets, total_tickets)
                .await
            {
                Ok(tx) => {
                    info!(season_id, player = %player_key, tx = %tx, "market creation submitted");
                    self.record(season_id, &player_key, attempt, AttemptOutcome::Submitted, Some(tx))
                        .await;
                    return Ok(());
                }
                Err(Error::ContractRevert { reason }) => {
                    warn!(
                        season_id,
                        player = %player_key,
                        reason = %reason,
                        "market creation reverted; recorded as permanent"
                    );
                    self.record(
                        season_id,
                        &player_key,
                        attempt,
                        AttemptOutcome::PermanentFailure,
                        Some(reason),
                    )
                    .await;
                    self.permanent_failures
                        .lock()
                        .insert((season_id, player_key));
                    return Ok(());
                }
                Err(error) if error.is_transient() && attempt < total_attempts => {
                    let delay = self.retry_delays[(attempt - 1) as usize];
                    warn!(
                        season_id,
                        player = %player_key,
                        attempt,
                        error = %error,
                        retry_in_secs = delay.as_secs(),
                        "market creation failed; backing off"
                    );
                    self.record(
                        season_id,
                        &player_key,
                        attempt,
                        AttemptOutcome::TransientFailure,
                        Some(error.to_string()),
                    )
                    .await;
                    tokio::time::sleep(delay).await;
                }
                // Fatal error, or retries exhausted: give up without
                // poisoning the pair, so the next position event may try
                // again once the cause is fixed.
                Err(error) => {
                    warn!(
                        season_id,
                        player = %player_key,
                        attempt,
                        error = %error,
                        "market creation abandoned"
                    );
                    self.record(
                        season_id,
                        &player_key,
                        attempt,
                        AttemptOutcome::Abandoned,
                        Some(error.to_string()),
                    )
                    .await;
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    async fn record(
        &self,
        season_id: u64,
        player: &PlayerAddress,
        attempt: u32,
        outcome: AttemptOutcome,
        detail: Option<String>,
    ) {
        let record = CreationAttempt {
            season_id,
            player: player.clone(),
            attempt,
            outcome,
            detail,
        };
        if let Err(error) = self.markets.record_creation_attempt(&record).await {
            warn!(error = %error, "failed to record creation attempt");
        }
    }
}
