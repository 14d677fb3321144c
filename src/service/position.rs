//! Position handler: full-season probability recompute.
//!
//! Runs for every `PositionUpdate` event, not just threshold crossings: one
//! buy changes every other participant's probability, so the whole season is
//! re-derived from the chain, diffed against the stored rows, and only the
//! changed markets are written and pushed to the oracle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::domain::{win_probability_bps, InfoFiMarket, PlayerAddress, SeasonSnapshot};
use crate::error::Result;
use crate::port::chain::{OracleWriter, RaffleReader};
use crate::port::store::MarketStore;

const PARTICIPANT_READ_RETRIES: u32 = 3;
const PARTICIPANT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// A participant at or above the creation threshold with no market row yet.
/// Surfaced to the market creator for catch-up enrolment.
#[derive(Debug, Clone)]
pub struct UncoveredPlayer {
    pub player: Address,
    pub tickets: u64,
}

/// What one recompute pass did.
#[derive(Debug, Default)]
pub struct RecomputeOutcome {
    pub total_tickets: u64,
    pub participants: usize,
    pub failed_reads: usize,
    pub rows_updated: usize,
    pub oracle_writes: usize,
    pub uncovered: Vec<UncoveredPlayer>,
}

pub struct PositionEngine {
    raffle: Arc<dyn RaffleReader>,
    oracle: Arc<dyn OracleWriter>,
    markets: Arc<dyn MarketStore>,
    threshold_bps: u16,
    batch_size: usize,
}

impl PositionEngine {
    #[must_use]
    pub fn new(
        raffle: Arc<dyn RaffleReader>,
        oracle: Arc<dyn OracleWriter>,
        markets: Arc<dyn MarketStore>,
        threshold_bps: u16,
        batch_size: usize,
    ) -> Self {
        Self {
            raffle,
            oracle,
            markets,
            threshold_bps,
            batch_size: batch_size.max(1),
        }
    }

    /// Recompute every participant's probability for `season_id`.
    ///
    /// A second pass with no chain change is a no-op: nothing diffs, so no
    /// rows are written and no oracle transactions go out. A failed
    /// participant read is skipped after its retries; the partial update is
    /// reconciled by the next position event.
    pub async fn recompute(&self, season_id: u64) -> Result<RecomputeOutcome> {
        let snapshot = self.raffle.season_snapshot(season_id).await?;
        let positions = self.read_positions(&snapshot).await;

        let by_player: HashMap<String, InfoFiMarket> = self
            .markets
            .list_markets_by_season(season_id)
            .await?
            .into_iter()
            .map(|market| (market.player.as_str().to_string(), market))
            .collect();

        let mut outcome = RecomputeOutcome {
            total_tickets: snapshot.total_tickets,
            participants: snapshot.participants.len(),
            ..RecomputeOutcome::default()
        };
        let mut oracle_queue: Vec<(i64, u16)> = Vec::new();

        for (player, tickets) in positions {
            let Some(tickets) = tickets else {
                outcome.failed_reads += 1;
                continue;
            };
            let probability_bps = win_probability_bps(tickets, snapshot.total_tickets);
            let key = PlayerAddress::from(player);

            match by_player.get(key.as_str()) {
                Some(market) => {
                    if market.current_probability_bps != probability_bps
                        && self
                            .markets
                            .update_market_probability(market.id, probability_bps)
                            .await?
                    {
                        outcome.rows_updated += 1;
                        // Oracle slots only track enrolled probabilities.
                        if probability_bps >= self.threshold_bps {
                            oracle_queue.push((market.id, probability_bps));
                        }
                    }
                }
                None => {
                    if probability_bps >= self.threshold_bps {
                        outcome.uncovered.push(UncoveredPlayer { player, tickets });
                    }
                }
            }
        }

        // Writes go through the client's per-account serializer; awaiting in
        // sequence here keeps the queue bounded without extra machinery.
        for (market_id, probability_bps) in oracle_queue {
            match self
                .oracle
                .update_raffle_probability(market_id, probability_bps)
                .await
            {
                Ok(tx) => {
                    outcome.oracle_writes += 1;
                    debug!(market_id, probability_bps, tx = %tx, "oracle probability updated");
                }
                Err(error) => {
                    warn!(
                        market_id,
                        error = %error,
                        "oracle write failed; the next position event reconciles"
                    );
                }
            }
        }

        Ok(outcome)
    }

    /// Bounded-parallelism ticket reads: at most `batch_size` in flight.
    async fn read_positions(&self, snapshot: &SeasonSnapshot) -> Vec<(Address, Option<u64>)> {
        if snapshot.total_tickets == 0 {
            // Every probability is zero regardless of holdings.
            return snapshot.participants.iter().map(|&p| (p, Some(0))).collect();
        }

        stream::iter(snapshot.participants.iter().copied())
            .map(|player| async move {
                (
                    player,
                    self.read_with_retry(snapshot.season_id, player).await,
                )
            })
            .buffer_unordered(self.batch_size)
            .collect()
            .await
    }

    async fn read_with_retry(&self, season_id: u64, player: Address) -> Option<u64> {
        for attempt in 1..=PARTICIPANT_READ_RETRIES {
            match self.raffle.participant_tickets(season_id, player).await {
                Ok(tickets) => return Some(tickets),
                Err(error) if attempt < PARTICIPANT_READ_RETRIES => {
                    debug!(%player, attempt, error = %error, "participant read failed; retrying");
                    tokio::time::sleep(PARTICIPANT_RETRY_DELAY).await;
                }
                Err(error) => {
                    warn!(%player, error = %error, "participant read failed; skipping this pass");
                }
            }
        }
        None
    }
}
