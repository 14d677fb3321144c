//! Database row types for Diesel ORM.

use diesel::prelude::*;

use super::schema::{arbitrage, event_cursors, market_creation_attempts, markets, players, pricing_cache};

/// Database row for a market (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = markets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MarketRow {
    pub id: i64,
    pub season_id: i64,
    pub player_address: String,
    pub market_type: String,
    pub initial_probability_bps: i32,
    pub current_probability_bps: i32,
    pub contract_address: Option<String>,
    pub is_active: bool,
    pub is_settled: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Database row for a market (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = markets)]
pub struct NewMarketRow {
    pub season_id: i64,
    pub player_address: String,
    pub market_type: String,
    pub initial_probability_bps: i32,
    pub current_probability_bps: i32,
    pub contract_address: Option<String>,
    pub is_active: bool,
    pub is_settled: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Database row for a pricing-cache entry.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = pricing_cache)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PricingRow {
    pub market_id: i64,
    pub raffle_bps: i32,
    pub sentiment_bps: i32,
    pub hybrid_bps: i32,
    pub raffle_weight_bps: i32,
    pub market_weight_bps: i32,
    pub last_updated: String,
}

/// Database row for an arbitrage record (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = arbitrage)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ArbitrageRow {
    pub id: i64,
    pub season_id: i64,
    pub player_address: String,
    pub market_id: i64,
    pub raffle_pct: String,
    pub market_pct: String,
    pub price_diff_pct: String,
    pub profitability_pct: String,
    pub strategy_text: String,
    pub created_at: String,
}

/// Database row for an arbitrage record (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = arbitrage)]
pub struct NewArbitrageRow {
    pub season_id: i64,
    pub player_address: String,
    pub market_id: i64,
    pub raffle_pct: String,
    pub market_pct: String,
    pub price_diff_pct: String,
    pub profitability_pct: String,
    pub strategy_text: String,
    pub created_at: String,
}

/// Database row for an event cursor.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = event_cursors)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CursorRow {
    pub network_key: String,
    pub event_type: String,
    pub last_block: i64,
}

/// Database row for a player.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = players)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PlayerRow {
    pub address: String,
    pub first_seen: String,
}

/// Database row for a market-creation attempt (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = market_creation_attempts)]
pub struct NewAttemptRow {
    pub season_id: i64,
    pub player_address: String,
    pub attempt: i32,
    pub outcome: String,
    pub detail: Option<String>,
    pub created_at: String,
}
