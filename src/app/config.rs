//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file with environment variable
//! overrides for deployment-specific values: `NETWORK_KEY` selects the
//! network profile, `BACKEND_PRIVATE_KEY` carries the signing key, and
//! `PAYMASTER_URL` enables sponsored market creation.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::domain::HybridWeights;
use crate::error::{Error, Result};

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Which network profile the process runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NetworkKey {
    #[default]
    Local,
    Testnet,
    Mainnet,
}

impl NetworkKey {
    /// Canonical form; also the `network_key` half of every cursor row.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkKey::Local => "LOCAL",
            NetworkKey::Testnet => "TESTNET",
            NetworkKey::Mainnet => "MAINNET",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_uppercase().as_str() {
            "LOCAL" => Ok(NetworkKey::Local),
            "TESTNET" => Ok(NetworkKey::Testnet),
            "MAINNET" => Ok(NetworkKey::Mainnet),
            other => Err(Error::Config(format!("unknown network key {other}"))),
        }
    }
}

impl std::fmt::Display for NetworkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl LoggingConfig {
    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        match self.format.as_str() {
            "json" => fmt().json().with_env_filter(filter).init(),
            _ => fmt().with_env_filter(filter).init(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

/// Deployed contract addresses for one network.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractAddresses {
    #[serde(default = "default_address")]
    pub raffle: String,
    #[serde(default = "default_address")]
    pub curve: String,
    #[serde(default = "default_address")]
    pub factory: String,
    #[serde(default = "default_address")]
    pub oracle: String,
    #[serde(default = "default_address")]
    pub fpmm_manager: String,
    #[serde(default = "default_address")]
    pub sof: String,
}

impl Default for ContractAddresses {
    fn default() -> Self {
        Self {
            raffle: default_address(),
            curve: default_address(),
            factory: default_address(),
            oracle: default_address(),
            fpmm_manager: default_address(),
            sof: default_address(),
        }
    }
}

fn default_address() -> String {
    ZERO_ADDRESS.into()
}

/// One network profile.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkProfile {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Optional websocket endpoint; unused by the polling path but kept so
    /// profiles round-trip operator configs.
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_avg_block_time")]
    pub avg_block_time_sec: u64,
    #[serde(default = "default_lookback_blocks")]
    pub default_lookback_blocks: u64,
    /// Per-network poll override; falls back to the listener default.
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub addresses: ContractAddresses,
}

impl Default for NetworkProfile {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            ws_url: None,
            chain_id: default_chain_id(),
            avg_block_time_sec: default_avg_block_time(),
            default_lookback_blocks: default_lookback_blocks(),
            poll_interval_ms: None,
            addresses: ContractAddresses::default(),
        }
    }
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".into()
}

fn default_chain_id() -> u64 {
    31_337
}

fn default_avg_block_time() -> u64 {
    2
}

fn default_lookback_blocks() -> u64 {
    1_000
}

/// Listener tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_log_chunk_max")]
    pub log_chunk_max: u64,
    #[serde(default = "default_log_chunk_min")]
    pub log_chunk_min: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            log_chunk_max: default_log_chunk_max(),
            log_chunk_min: default_log_chunk_min(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_log_chunk_max() -> u64 {
    10_000
}

fn default_log_chunk_min() -> u64 {
    500
}

/// Per-call RPC limits.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
        }
    }
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

fn default_confirmation_timeout_ms() -> u64 {
    60_000
}

/// Market-creation policy.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketsConfig {
    #[serde(default = "default_threshold_bps")]
    pub threshold_bps: u16,
    #[serde(default = "default_creation_gas_limit")]
    pub creation_gas_limit: u64,
    #[serde(default = "default_retry_delays")]
    pub creation_retry_delays_sec: Vec<u64>,
}

impl Default for MarketsConfig {
    fn default() -> Self {
        Self {
            threshold_bps: default_threshold_bps(),
            creation_gas_limit: default_creation_gas_limit(),
            creation_retry_delays_sec: default_retry_delays(),
        }
    }
}

fn default_threshold_bps() -> u16 {
    100
}

fn default_creation_gas_limit() -> u64 {
    5_000_000
}

fn default_retry_delays() -> Vec<u64> {
    vec![5, 15, 45]
}

/// Hybrid pricing and arbitrage policy.
#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_raffle_weight")]
    pub raffle_weight_bps: u16,
    #[serde(default = "default_market_weight")]
    pub market_weight_bps: u16,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    #[serde(default = "default_arbitrage_threshold")]
    pub arbitrage_threshold_bps: u16,
    #[serde(default = "default_dedup_window_sec")]
    pub arbitrage_dedup_window_sec: u64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            raffle_weight_bps: default_raffle_weight(),
            market_weight_bps: default_market_weight(),
            refresh_interval_ms: default_refresh_interval_ms(),
            arbitrage_threshold_bps: default_arbitrage_threshold(),
            arbitrage_dedup_window_sec: default_dedup_window_sec(),
        }
    }
}

fn default_raffle_weight() -> u16 {
    7_000
}

fn default_market_weight() -> u16 {
    3_000
}

fn default_refresh_interval_ms() -> u64 {
    10_000
}

fn default_arbitrage_threshold() -> u16 {
    200
}

fn default_dedup_window_sec() -> u64 {
    300
}

/// Position handler tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    10
}

/// Price stream tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_subscriber_buffer() -> usize {
    32
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network_key: NetworkKey,
    #[serde(default = "default_networks")]
    pub networks: BTreeMap<String, NetworkProfile>,
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub markets: MarketsConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub position: PositionConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    /// Enables sponsored market creation when set (env: `PAYMASTER_URL`).
    #[serde(default)]
    pub paymaster_url: Option<String>,
    /// Never read from the config file; env `BACKEND_PRIVATE_KEY` only.
    #[serde(skip)]
    pub backend_private_key: Option<String>,
}

fn default_networks() -> BTreeMap<String, NetworkProfile> {
    let mut networks = BTreeMap::new();
    networks.insert("LOCAL".to_string(), NetworkProfile::default());
    networks
}

fn default_database_path() -> String {
    "infofi.db".into()
}

fn default_shutdown_grace_ms() -> u64 {
    10_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network_key: NetworkKey::default(),
            networks: default_networks(),
            database: default_database_path(),
            logging: LoggingConfig::default(),
            listener: ListenerConfig::default(),
            rpc: RpcConfig::default(),
            markets: MarketsConfig::default(),
            pricing: PricingConfig::default(),
            position: PositionConfig::default(),
            stream: StreamConfig::default(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            paymaster_url: None,
            backend_private_key: None,
        }
    }
}

impl Config {
    /// Load from a TOML file, apply environment overrides, and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.as_ref().display()))
        })?;
        let mut config = Self::parse_toml(&contents)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn parse_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    fn apply_env(&mut self) {
        if let Ok(raw) = std::env::var("NETWORK_KEY") {
            if let Ok(key) = NetworkKey::parse(&raw) {
                self.network_key = key;
            }
        }
        if let Ok(key) = std::env::var("BACKEND_PRIVATE_KEY") {
            if !key.trim().is_empty() {
                self.backend_private_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("PAYMASTER_URL") {
            if !url.trim().is_empty() {
                self.paymaster_url = Some(url);
            }
        }
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            if !path.trim().is_empty() {
                self.database = path;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.hybrid_weights()?;
        if !self.networks.contains_key(self.network_key.as_str()) {
            return Err(Error::Config(format!(
                "no profile for network {}",
                self.network_key
            )));
        }
        if self.listener.log_chunk_min == 0
            || self.listener.log_chunk_min > self.listener.log_chunk_max
        {
            return Err(Error::Config(format!(
                "log chunk bounds invalid: min {} max {}",
                self.listener.log_chunk_min, self.listener.log_chunk_max
            )));
        }
        if self.markets.creation_retry_delays_sec.is_empty() {
            return Err(Error::Config("creation retry delays cannot be empty".into()));
        }
        Ok(())
    }

    /// Profile for the active network key.
    pub fn network(&self) -> Result<&NetworkProfile> {
        self.networks
            .get(self.network_key.as_str())
            .ok_or_else(|| Error::Config(format!("no profile for network {}", self.network_key)))
    }

    pub fn hybrid_weights(&self) -> Result<HybridWeights> {
        HybridWeights::new(self.pricing.raffle_weight_bps, self.pricing.market_weight_bps)
    }

    /// Poll cadence for the active network: the profile override when set,
    /// otherwise the listener default.
    pub fn poll_interval(&self) -> Result<Duration> {
        let profile = self.network()?;
        Ok(Duration::from_millis(
            profile
                .poll_interval_ms
                .unwrap_or(self.listener.poll_interval_ms),
        ))
    }

    pub fn creation_retry_delays(&self) -> Vec<Duration> {
        self.markets
            .creation_retry_delays_sec
            .iter()
            .map(|&secs| Duration::from_secs(secs))
            .collect()
    }

    pub fn backend_private_key(&self) -> Result<&str> {
        self.backend_private_key
            .as_deref()
            .ok_or_else(|| Error::Config("BACKEND_PRIVATE_KEY is not set".into()))
    }

    pub fn init_logging(&self) {
        self.logging.init();
    }
}
