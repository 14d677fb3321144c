//! Ports around the application core.
//!
//! Services depend on these traits, never on the alloy provider or Diesel
//! directly; the adapters implement them and the test suites fake them.

pub mod chain;
pub mod store;

pub use chain::{FpmmReader, LogSource, MarketFactory, OracleWriter, RaffleReader};
pub use store::{
    ArbitrageStore, AttemptOutcome, CreationAttempt, CursorStore, MarketStore, PricingStore,
};
