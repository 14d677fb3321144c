//! SQLite arbitrage-record store implementation.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;

use super::connection::{checkout, map_db_error, DbPool};
use super::market_store::{parse_timestamp, season_to_i64};
use super::model::NewArbitrageRow;
use super::schema::arbitrage;
use crate::domain::ArbitrageOpportunity;
use crate::error::Result;
use crate::port::store::ArbitrageStore;

/// SQLite-backed append-only arbitrage log.
///
/// Percentages are stored as decimal text so the recorded spread survives
/// round-tripping exactly.
pub struct SqliteArbitrageStore {
    pool: DbPool,
}

impl SqliteArbitrageStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ArbitrageStore for SqliteArbitrageStore {
    async fn insert(&self, opportunity: &ArbitrageOpportunity) -> Result<i64> {
        let row = NewArbitrageRow {
            season_id: season_to_i64(opportunity.season_id)?,
            player_address: opportunity.player.as_str().to_string(),
            market_id: opportunity.market_id,
            raffle_pct: opportunity.raffle_pct.to_string(),
            market_pct: opportunity.market_pct.to_string(),
            price_diff_pct: opportunity.price_difference_pct.to_string(),
            profitability_pct: opportunity.profitability_pct.to_string(),
            strategy_text: opportunity.strategy_text.clone(),
            created_at: opportunity.created_at.to_rfc3339(),
        };

        let mut conn = checkout(&self.pool)?;
        diesel::insert_into(arbitrage::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| map_db_error("insert arbitrage", e))?;

        let id: i64 = arbitrage::table
            .select(diesel::dsl::max(arbitrage::id))
            .first::<Option<i64>>(&mut conn)
            .map_err(|e| map_db_error("read arbitrage id", e))?
            .unwrap_or_default();
        Ok(id)
    }

    async fn latest_created_at(&self, market_id: i64) -> Result<Option<DateTime<Utc>>> {
        let mut conn = checkout(&self.pool)?;
        let latest: Option<String> = arbitrage::table
            .filter(arbitrage::market_id.eq(market_id))
            .order(arbitrage::created_at.desc())
            .select(arbitrage::created_at)
            .first(&mut conn)
            .optional()
            .map_err(|e| map_db_error("latest arbitrage", e))?;
        latest.as_deref().map(parse_timestamp).transpose()
    }
}

/// Parse a stored percentage column back into a decimal. Exposed for report
/// tooling and tests.
pub fn parse_pct(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| crate::error::Error::Parse(e.to_string()))
}
