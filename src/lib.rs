//! infofi-engine - off-chain coordination backbone for a hybrid raffle +
//! prediction-market platform.
//!
//! The engine watches an append-only stream of chain events, keeps an
//! authoritative off-chain view of per-player win probabilities and hybrid
//! market prices, mirrors that view into the on-chain oracle, and records
//! arbitrage opportunities between the raffle's implied odds and traded
//! prices.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── domain/      # pure types and bps arithmetic
//! ├── port/        # traits at the seams (chain access, stores)
//! ├── adapter/     # alloy chain client, Diesel SQLite stores
//! ├── service/     # listeners, position handler, market creator,
//! │                # fpmm monitor, price stream hub
//! └── app/         # configuration + supervisor
//! ```

pub mod adapter;
pub mod app;
pub mod domain;
pub mod error;
pub mod port;
pub mod service;
