//! Diesel table definitions for the core schema.

diesel::table! {
    markets (id) {
        id -> BigInt,
        season_id -> BigInt,
        player_address -> Text,
        market_type -> Text,
        initial_probability_bps -> Integer,
        current_probability_bps -> Integer,
        contract_address -> Nullable<Text>,
        is_active -> Bool,
        is_settled -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    pricing_cache (market_id) {
        market_id -> BigInt,
        raffle_bps -> Integer,
        sentiment_bps -> Integer,
        hybrid_bps -> Integer,
        raffle_weight_bps -> Integer,
        market_weight_bps -> Integer,
        last_updated -> Text,
    }
}

diesel::table! {
    arbitrage (id) {
        id -> BigInt,
        season_id -> BigInt,
        player_address -> Text,
        market_id -> BigInt,
        raffle_pct -> Text,
        market_pct -> Text,
        price_diff_pct -> Text,
        profitability_pct -> Text,
        strategy_text -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    event_cursors (network_key, event_type) {
        network_key -> Text,
        event_type -> Text,
        last_block -> BigInt,
    }
}

diesel::table! {
    players (address) {
        address -> Text,
        first_seen -> Text,
    }
}

diesel::table! {
    market_creation_attempts (id) {
        id -> BigInt,
        season_id -> BigInt,
        player_address -> Text,
        attempt -> Integer,
        outcome -> Text,
        detail -> Nullable<Text>,
        created_at -> Text,
    }
}
