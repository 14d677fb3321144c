//! Component lifecycle: wiring, startup order, and graceful shutdown.
//!
//! The supervisor owns every background task. Construction follows the
//! dependency DAG: stores and the chain client are leaves; the listeners,
//! position engine, market creator, and pricing engine sit on top of them;
//! the stream hub is fed by the oracle listener; per-season monitors come and
//! go with the season lifecycle events.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use super::config::{Config, ContractAddresses};
use crate::adapter::chain::{ChainClientConfig, ContractAddressBook, EvmClient};
use crate::adapter::sqlite::{
    create_pool, run_migrations, SqliteArbitrageStore, SqliteCursorStore, SqliteMarketStore,
    SqlitePricingStore,
};
use crate::domain::{EventKind, LifecycleEvent};
use crate::error::{Error, Result};
use crate::port::chain::{FpmmReader, LogSource, MarketFactory, OracleWriter, RaffleReader};
use crate::port::store::{ArbitrageStore, CursorStore, MarketStore, PricingStore};
use crate::service::handlers::{
    MarketCreatedHandler, PositionUpdateHandler, PriceUpdatedHandler, SeasonCompletedHandler,
    SeasonStartedHandler, TradeHandler,
};
use crate::service::{
    ListenerTask, LogHandler, MarketCreator, PositionEngine, PriceStreamHub, PricingEngine,
    SeasonMonitor,
};

/// A running per-season monitor: its stop signal and task handle.
type MonitorEntry = (watch::Sender<bool>, JoinHandle<()>);

pub struct Supervisor;

impl Supervisor {
    /// Run the whole engine until the shutdown signal flips.
    pub async fn run(config: Config, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let profile = config.network()?.clone();
        let weights = config.hybrid_weights()?;
        let poll_interval = config.poll_interval()?;
        let network_key = config.network_key.as_str().to_string();
        info!(
            network = %network_key,
            rpc = %profile.rpc_url,
            database = %config.database,
            "starting coordination engine"
        );

        // Leaves first: persistent store, then the chain client.
        let pool = create_pool(&config.database)?;
        run_migrations(&pool)?;
        let market_store: Arc<dyn MarketStore> = Arc::new(SqliteMarketStore::new(pool.clone()));
        let pricing_store: Arc<dyn PricingStore> = Arc::new(SqlitePricingStore::new(pool.clone()));
        let arbitrage_store: Arc<dyn ArbitrageStore> =
            Arc::new(SqliteArbitrageStore::new(pool.clone()));
        let cursor_store: Arc<dyn CursorStore> = Arc::new(SqliteCursorStore::new(pool));

        let address_book = parse_address_book(&profile.addresses)?;
        let client = Arc::new(EvmClient::connect(ChainClientConfig {
            rpc_url: profile.rpc_url.clone(),
            chain_id: profile.chain_id,
            backend_private_key: config.backend_private_key()?.to_string(),
            addresses: address_book,
            rpc_call_timeout: Duration::from_millis(config.rpc.call_timeout_ms),
            write_confirmation_timeout: Duration::from_millis(config.rpc.confirmation_timeout_ms),
            log_chunk_max: config.listener.log_chunk_max,
            log_chunk_min: config.listener.log_chunk_min,
            market_creation_gas_limit: config.markets.creation_gas_limit,
            paymaster_url: config.paymaster_url.clone(),
        })?);
        info!(backend = %client.backend_address(), "chain client connected");

        // Services on top of the leaves.
        let hub = Arc::new(PriceStreamHub::new(config.stream.subscriber_buffer));
        let creator = Arc::new(MarketCreator::new(
            Arc::clone(&client) as Arc<dyn MarketFactory>,
            Arc::clone(&market_store),
            config.markets.threshold_bps,
            config.creation_retry_delays(),
        ));
        let positions = Arc::new(PositionEngine::new(
            Arc::clone(&client) as Arc<dyn RaffleReader>,
            Arc::clone(&client) as Arc<dyn OracleWriter>,
            Arc::clone(&market_store),
            config.markets.threshold_bps,
            config.position.batch_size,
        ));
        let pricing_engine = Arc::new(PricingEngine::new(
            Arc::clone(&market_store),
            Arc::clone(&pricing_store),
            Arc::clone(&arbitrage_store),
            Arc::clone(&client) as Arc<dyn FpmmReader>,
            Arc::clone(&hub),
            weights,
            config.pricing.arbitrage_threshold_bps,
            Duration::from_secs(config.pricing.arbitrage_dedup_window_sec),
        ));

        let (lifecycle_tx, mut lifecycle_rx) = mpsc::channel::<LifecycleEvent>(16);

        // One listener per event type.
        let handlers: Vec<Arc<dyn LogHandler>> = vec![
            Arc::new(PositionUpdateHandler::new(
                address_book.curve,
                Arc::clone(&positions),
                Arc::clone(&creator),
            )),
            Arc::new(MarketCreatedHandler::new(
                address_book.factory,
                Arc::clone(&market_store),
                Arc::clone(&pricing_store),
                Arc::clone(&client) as Arc<dyn RaffleReader>,
                weights,
            )),
            Arc::new(TradeHandler::new(
                Arc::clone(&market_store),
                Arc::clone(&pricing_engine),
            )),
            Arc::new(PriceUpdatedHandler::new(address_book.oracle, Arc::clone(&hub))),
            Arc::new(SeasonStartedHandler::new(
                address_book.raffle,
                lifecycle_tx.clone(),
            )),
            Arc::new(SeasonCompletedHandler::new(
                address_book.raffle,
                Arc::clone(&market_store),
                lifecycle_tx,
            )),
        ];
        // Listener exits are observed in the lifecycle loop below, so a
        // fatal death is acknowledged when it happens.
        let mut listener_tasks = FuturesUnordered::new();
        for handler in handlers {
            let kind = handler.kind();
            let listener = ListenerTask::new(
                network_key.clone(),
                Arc::clone(&client) as Arc<dyn LogSource>,
                Arc::clone(&cursor_store),
                handler,
                poll_interval,
                profile.default_lookback_blocks,
                shutdown.clone(),
            );
            let handle = listener.spawn();
            listener_tasks.push(async move { (kind, handle.await) });
        }

        let heartbeat = PriceStreamHub::spawn_heartbeat(
            Arc::clone(&hub),
            Duration::from_secs(config.stream.heartbeat_secs),
            shutdown.clone(),
        );

        // One monitor per season that already has active markets.
        let monitor_interval = Duration::from_millis(config.pricing.refresh_interval_ms);
        let mut monitors: HashMap<u64, MonitorEntry> = HashMap::new();
        for season_id in market_store.active_season_ids().await? {
            spawn_monitor(
                &mut monitors,
                season_id,
                Arc::clone(&pricing_engine),
                monitor_interval,
                &shutdown,
            );
        }
        info!(
            listeners = listener_tasks.len(),
            monitors = monitors.len(),
            "engine running"
        );

        // Lifecycle loop: seasons come and go, listener exits are surfaced
        // as they happen; shutdown breaks out.
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some((kind, result)) = listener_tasks.next() => {
                    log_listener_exit(kind, result);
                }
                event = lifecycle_rx.recv() => {
                    match event {
                        Some(LifecycleEvent::SeasonStarted(season_id)) => {
                            spawn_monitor(
                                &mut monitors,
                                season_id,
                                Arc::clone(&pricing_engine),
                                monitor_interval,
                                &shutdown,
                            );
                        }
                        Some(LifecycleEvent::SeasonCompleted { season_id, winners }) => {
                            info!(season_id, winners = winners.len(), "stopping season monitor");
                            if let Some((stop, handle)) = monitors.remove(&season_id) {
                                let _ = stop.send(true);
                                let _ = handle.await;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        info!("shutting down; draining tasks");
        let drain = async {
            for (_, (stop, handle)) in monitors.drain() {
                let _ = stop.send(true);
                let _ = handle.await;
            }
            let _ = heartbeat.await;
            while let Some((kind, result)) = listener_tasks.next().await {
                log_listener_exit(kind, result);
            }
        };
        let grace = Duration::from_millis(config.shutdown_grace_ms);
        if tokio::time::timeout(grace, drain).await.is_err() {
            warn!(
                grace_ms = config.shutdown_grace_ms,
                "grace window elapsed; abandoning in-flight tasks"
            );
        }
        info!("engine stopped");
        Ok(())
    }
}

fn log_listener_exit(kind: EventKind, result: std::result::Result<Result<()>, JoinError>) {
    match result {
        Ok(Ok(())) => info!(event = %kind, "listener task finished"),
        Ok(Err(error)) => {
            error!(event = %kind, error = %error, "listener died on fatal error; not restarted");
        }
        Err(join_error) => error!(event = %kind, error = %join_error, "listener task panicked"),
    }
}

fn spawn_monitor(
    monitors: &mut HashMap<u64, MonitorEntry>,
    season_id: u64,
    engine: Arc<PricingEngine>,
    interval: Duration,
    shutdown: &watch::Receiver<bool>,
) {
    if monitors.contains_key(&season_id) {
        return;
    }
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = SeasonMonitor::spawn(engine, season_id, interval, shutdown.clone(), stop_rx);
    monitors.insert(season_id, (stop_tx, handle));
}

fn parse_address_book(addresses: &ContractAddresses) -> Result<ContractAddressBook> {
    Ok(ContractAddressBook {
        raffle: parse_address("raffle", &addresses.raffle)?,
        curve: parse_address("curve", &addresses.curve)?,
        factory: parse_address("factory", &addresses.factory)?,
        oracle: parse_address("oracle", &addresses.oracle)?,
        fpmm_manager: parse_address("fpmm_manager", &addresses.fpmm_manager)?,
        sof: parse_address("sof", &addresses.sof)?,
    })
}

fn parse_address(name: &str, raw: &str) -> Result<Address> {
    raw.parse()
        .map_err(|e| Error::Config(format!("invalid {name} address {raw}: {e}")))
}
