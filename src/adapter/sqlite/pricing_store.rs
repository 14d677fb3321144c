//! SQLite pricing-cache store implementation.

use diesel::prelude::*;

use super::connection::{checkout, map_db_error, DbPool};
use super::market_store::parse_timestamp;
use super::model::PricingRow;
use super::schema::pricing_cache;
use crate::domain::{HybridWeights, PricingEntry};
use crate::error::{Error, Result};
use crate::port::store::PricingStore;

/// SQLite-backed pricing cache.
pub struct SqlitePricingStore {
    pool: DbPool,
}

impl SqlitePricingStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn to_row(entry: &PricingEntry) -> PricingRow {
        PricingRow {
            market_id: entry.market_id,
            raffle_bps: i32::from(entry.raffle_bps),
            sentiment_bps: i32::from(entry.sentiment_bps),
            hybrid_bps: i32::from(entry.hybrid_bps),
            raffle_weight_bps: i32::from(entry.weights.raffle_bps),
            market_weight_bps: i32::from(entry.weights.market_bps),
            last_updated: entry.last_updated.to_rfc3339(),
        }
    }

    fn from_row(row: PricingRow) -> Result<PricingEntry> {
        Ok(PricingEntry {
            market_id: row.market_id,
            raffle_bps: to_bps(row.raffle_bps)?,
            sentiment_bps: to_bps(row.sentiment_bps)?,
            hybrid_bps: to_bps(row.hybrid_bps)?,
            weights: HybridWeights::new(to_bps(row.raffle_weight_bps)?, to_bps(row.market_weight_bps)?)?,
            last_updated: parse_timestamp(&row.last_updated)?,
        })
    }
}

fn to_bps(raw: i32) -> Result<u16> {
    u16::try_from(raw).map_err(|_| Error::Parse(format!("bps value {raw} out of range")))
}

#[async_trait::async_trait]
impl PricingStore for SqlitePricingStore {
    async fn upsert(&self, entry: &PricingEntry) -> Result<()> {
        let mut conn = checkout(&self.pool)?;
        diesel::replace_into(pricing_cache::table)
            .values(Self::to_row(entry))
            .execute(&mut conn)
            .map_err(|e| map_db_error("upsert pricing", e))?;
        Ok(())
    }

    async fn get(&self, market_id: i64) -> Result<Option<PricingEntry>> {
        let mut conn = checkout(&self.pool)?;
        let row: Option<PricingRow> = pricing_cache::table
            .find(market_id)
            .first(&mut conn)
            .optional()
            .map_err(|e| map_db_error("get pricing", e))?;
        row.map(Self::from_row).transpose()
    }
}
