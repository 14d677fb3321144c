//! Application layer: configuration and the supervisor.

pub mod config;
pub mod supervisor;

pub use config::{Config, LoggingConfig, NetworkKey, NetworkProfile};
pub use supervisor::Supervisor;
