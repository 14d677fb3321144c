//! Long-running services: listeners, recompute, creation, monitoring, streaming.

pub mod fpmm_monitor;
pub mod handlers;
pub mod listener;
pub mod market_creator;
pub mod position;
pub mod price_hub;

pub use fpmm_monitor::{PricingEngine, SeasonMonitor};
pub use listener::{ListenerTask, LogHandler};
pub use market_creator::MarketCreator;
pub use position::{PositionEngine, RecomputeOutcome, UncoveredPlayer};
pub use price_hub::{
    CachedPrice, PriceMessage, PriceMessageKind, PriceStreamHub, SubscriberHandle, SubscriptionKey,
};
