//! Outbound adapters: the alloy chain client and the Diesel SQLite stores.

pub mod chain;
pub mod sqlite;
