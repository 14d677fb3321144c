//! SQLite market store implementation.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::connection::{checkout, map_db_error, DbPool};
use super::model::{MarketRow, NewAttemptRow, NewMarketRow, PlayerRow};
use super::schema::{market_creation_attempts, markets, players};
use crate::domain::{InfoFiMarket, MarketType, NewMarket, PlayerAddress};
use crate::error::{Error, Result};
use crate::port::store::{CreationAttempt, MarketStore};

/// SQLite-backed market store.
///
/// The unique index on `(season_id, lower(player_address), market_type)` is
/// the last line of defense against duplicate creation across concurrent
/// handlers; violations surface as [`Error::DuplicateKey`].
pub struct SqliteMarketStore {
    pool: DbPool,
}

impl SqliteMarketStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn from_row(row: MarketRow) -> Result<InfoFiMarket> {
        let market_type = MarketType::parse(&row.market_type)
            .ok_or_else(|| Error::Parse(format!("unknown market type {}", row.market_type)))?;
        Ok(InfoFiMarket {
            id: row.id,
            season_id: u64::try_from(row.season_id)
                .map_err(|_| Error::Parse(format!("negative season id {}", row.season_id)))?,
            player: PlayerAddress::new(&row.player_address),
            market_type,
            initial_probability_bps: to_bps(row.initial_probability_bps)?,
            current_probability_bps: to_bps(row.current_probability_bps)?,
            contract_address: row.contract_address,
            is_active: row.is_active,
            is_settled: row.is_settled,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

fn to_bps(raw: i32) -> Result<u16> {
    u16::try_from(raw)
        .ok()
        .filter(|&bps| bps <= 10_000)
        .ok_or_else(|| Error::Parse(format!("probability {raw} out of basis-point range")))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Parse(e.to_string()))
}

pub(crate) fn season_to_i64(season_id: u64) -> Result<i64> {
    i64::try_from(season_id)
        .map_err(|_| Error::Parse(format!("season id {season_id} overflows storage")))
}

#[async_trait::async_trait]
impl MarketStore for SqliteMarketStore {
    async fn create_market(&self, market: NewMarket) -> Result<InfoFiMarket> {
        let now = Utc::now().to_rfc3339();
        let row = NewMarketRow {
            season_id: season_to_i64(market.season_id)?,
            player_address: market.player.as_str().to_string(),
            market_type: market.market_type.as_str().to_string(),
            initial_probability_bps: i32::from(market.probability_bps),
            current_probability_bps: i32::from(market.probability_bps),
            contract_address: market.contract_address,
            is_active: true,
            is_settled: false,
            created_at: now.clone(),
            updated_at: now,
        };

        let mut conn = checkout(&self.pool)?;
        diesel::insert_into(markets::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| map_db_error("insert market", e))?;

        let inserted: MarketRow = markets::table
            .filter(markets::season_id.eq(row.season_id))
            .filter(markets::player_address.eq(&row.player_address))
            .filter(markets::market_type.eq(&row.market_type))
            .first(&mut conn)
            .map_err(|e| map_db_error("read back market", e))?;
        Self::from_row(inserted)
    }

    async fn has_market(
        &self,
        season_id: u64,
        player: &PlayerAddress,
        market_type: MarketType,
    ) -> Result<bool> {
        Ok(self.get_market(season_id, player, market_type).await?.is_some())
    }

    async fn get_market(
        &self,
        season_id: u64,
        player: &PlayerAddress,
        market_type: MarketType,
    ) -> Result<Option<InfoFiMarket>> {
        let mut conn = checkout(&self.pool)?;
        let row: Option<MarketRow> = markets::table
            .filter(markets::season_id.eq(season_to_i64(season_id)?))
            .filter(markets::player_address.eq(player.as_str()))
            .filter(markets::market_type.eq(market_type.as_str()))
            .first(&mut conn)
            .optional()
            .map_err(|e| map_db_error("get market", e))?;
        row.map(Self::from_row).transpose()
    }

    async fn get_market_by_id(&self, id: i64) -> Result<Option<InfoFiMarket>> {
        let mut conn = checkout(&self.pool)?;
        let row: Option<MarketRow> = markets::table
            .find(id)
            .first(&mut conn)
            .optional()
            .map_err(|e| map_db_error("get market by id", e))?;
        row.map(Self::from_row).transpose()
    }

    async fn get_market_by_contract(&self, contract_address: &str) -> Result<Option<InfoFiMarket>> {
        let needle = contract_address.to_lowercase();
        let mut conn = checkout(&self.pool)?;
        let row: Option<MarketRow> = markets::table
            .filter(markets::contract_address.eq(&needle))
            .first(&mut conn)
            .optional()
            .map_err(|e| map_db_error("get market by contract", e))?;
        row.map(Self::from_row).transpose()
    }

    async fn list_markets_by_season(&self, season_id: u64) -> Result<Vec<InfoFiMarket>> {
        let mut conn = checkout(&self.pool)?;
        let rows: Vec<MarketRow> = markets::table
            .filter(markets::season_id.eq(season_to_i64(season_id)?))
            .order(markets::id.asc())
            .load(&mut conn)
            .map_err(|e| map_db_error("list markets", e))?;
        rows.into_iter().map(Self::from_row).collect()
    }

    async fn active_season_ids(&self) -> Result<Vec<u64>> {
        let mut conn = checkout(&self.pool)?;
        let ids: Vec<i64> = markets::table
            .filter(markets::is_active.eq(true))
            .filter(markets::is_settled.eq(false))
            .select(markets::season_id)
            .distinct()
            .load(&mut conn)
            .map_err(|e| map_db_error("active seasons", e))?;
        Ok(ids.into_iter().filter_map(|id| u64::try_from(id).ok()).collect())
    }

    async fn deployed_fpmm_addresses(&self) -> Result<Vec<String>> {
        let mut conn = checkout(&self.pool)?;
        let addresses: Vec<Option<String>> = markets::table
            .filter(markets::is_active.eq(true))
            .filter(markets::contract_address.is_not_null())
            .select(markets::contract_address)
            .load(&mut conn)
            .map_err(|e| map_db_error("deployed fpmms", e))?;
        Ok(addresses.into_iter().flatten().collect())
    }

    async fn update_market_probability(&self, id: i64, probability_bps: u16) -> Result<bool> {
        let mut conn = checkout(&self.pool)?;
        let touched = diesel::update(
            markets::table
                .filter(markets::id.eq(id))
                .filter(markets::current_probability_bps.ne(i32::from(probability_bps))),
        )
        .set((
            markets::current_probability_bps.eq(i32::from(probability_bps)),
            markets::updated_at.eq(Utc::now().to_rfc3339()),
        ))
        .execute(&mut conn)
        .map_err(|e| map_db_error("update probability", e))?;
        Ok(touched > 0)
    }

    async fn update_market_contract_address(&self, id: i64, contract_address: &str) -> Result<()> {
        let mut conn = checkout(&self.pool)?;
        diesel::update(markets::table.find(id))
            .set((
                markets::contract_address.eq(contract_address.to_lowercase()),
                markets::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(&mut conn)
            .map_err(|e| map_db_error("update contract address", e))?;
        Ok(())
    }

    async fn settle_season_markets(&self, season_id: u64) -> Result<usize> {
        let mut conn = checkout(&self.pool)?;
        let touched = diesel::update(
            markets::table
                .filter(markets::season_id.eq(season_to_i64(season_id)?))
                .filter(markets::is_settled.eq(false)),
        )
        .set((
            markets::is_settled.eq(true),
            markets::is_active.eq(false),
            markets::updated_at.eq(Utc::now().to_rfc3339()),
        ))
        .execute(&mut conn)
        .map_err(|e| map_db_error("settle season", e))?;
        Ok(touched)
    }

    async fn get_or_create_player(&self, player: &PlayerAddress) -> Result<()> {
        let mut conn = checkout(&self.pool)?;
        let row = PlayerRow {
            address: player.as_str().to_string(),
            first_seen: Utc::now().to_rfc3339(),
        };
        diesel::insert_or_ignore_into(players::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| map_db_error("upsert player", e))?;
        Ok(())
    }

    async fn record_creation_attempt(&self, attempt: &CreationAttempt) -> Result<()> {
        let mut conn = checkout(&self.pool)?;
        let row = NewAttemptRow {
            season_id: season_to_i64(attempt.season_id)?,
            player_address: attempt.player.as_str().to_string(),
            attempt: attempt.attempt as i32,
            outcome: attempt.outcome.as_str().to_string(),
            detail: attempt.detail.clone(),
            created_at: Utc::now().to_rfc3339(),
        };
        diesel::insert_into(market_creation_attempts::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| map_db_error("record attempt", e))?;
        Ok(())
    }
}
