//! Pure domain types and arithmetic. No I/O lives here.

pub mod arbitrage;
pub mod event;
pub mod market;
pub mod pricing;
pub mod probability;
pub mod season;

pub use arbitrage::ArbitrageOpportunity;
pub use event::{
    EventKind, FpmmTrade, LifecycleEvent, MarketDeployed, OraclePriceUpdate, PositionChange,
};
pub use market::{InfoFiMarket, MarketType, NewMarket, PlayerAddress};
pub use pricing::PricingEntry;
pub use probability::{hybrid_price_bps, win_probability_bps, HybridWeights, BPS_SCALE};
pub use season::SeasonSnapshot;
