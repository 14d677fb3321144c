//! EVM chain adapter (alloy HTTP provider).

pub mod client;
pub mod contracts;
pub mod logs;

pub use client::{ChainClientConfig, ContractAddressBook, EvmClient};
