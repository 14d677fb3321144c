//! SQLite persistence adapter (Diesel ORM).

pub mod connection;
pub mod model;
pub mod schema;

mod arbitrage_store;
mod cursor_store;
mod market_store;
mod pricing_store;

pub use arbitrage_store::SqliteArbitrageStore;
pub use connection::{create_pool, run_migrations, DbPool};
pub use cursor_store::SqliteCursorStore;
pub use market_store::SqliteMarketStore;
pub use pricing_store::SqlitePricingStore;
