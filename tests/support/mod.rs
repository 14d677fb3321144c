//! Shared test fixtures: a scripted chain fake and in-memory stores.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use alloy::primitives::{Address, LogData, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use parking_lot::Mutex;

use infofi_engine::adapter::chain::contracts::{
    self, MarketCreated, PositionUpdate, PriceUpdated, SeasonCompleted, SeasonStarted, Trade,
};
use infofi_engine::adapter::sqlite::{
    create_pool, run_migrations, SqliteArbitrageStore, SqliteCursorStore, SqliteMarketStore,
    SqlitePricingStore,
};
use infofi_engine::domain::{EventKind, SeasonSnapshot};
use infofi_engine::error::{Error, Result};
use infofi_engine::port::chain::{FpmmReader, LogSource, MarketFactory, OracleWriter, RaffleReader};
use infofi_engine::service::listener::LogHandler;

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

/// Fresh in-memory stores sharing one pool, migrations applied.
pub struct Stores {
    pub markets: Arc<SqliteMarketStore>,
    pub pricing: Arc<SqlitePricingStore>,
    pub arbitrage: Arc<SqliteArbitrageStore>,
    pub cursors: Arc<SqliteCursorStore>,
}

pub fn memory_stores() -> Stores {
    let pool = create_pool(":memory:").expect("pool");
    run_migrations(&pool).expect("migrations");
    Stores {
        markets: Arc::new(SqliteMarketStore::new(pool.clone())),
        pricing: Arc::new(SqlitePricingStore::new(pool.clone())),
        arbitrage: Arc::new(SqliteArbitrageStore::new(pool.clone())),
        cursors: Arc::new(SqliteCursorStore::new(pool)),
    }
}

// ---------------------------------------------------------------------------
// Log construction helpers
// ---------------------------------------------------------------------------

pub fn wrap_log(address: Address, block: u64, index: u64, data: LogData) -> Log {
    Log {
        inner: alloy::primitives::Log { address, data },
        block_number: Some(block),
        log_index: Some(index),
        ..Default::default()
    }
}

#[allow(clippy::too_many_arguments)]
pub fn position_update_log(
    curve: Address,
    block: u64,
    index: u64,
    season_id: u64,
    player: Address,
    old_tickets: u64,
    new_tickets: u64,
    total_tickets: u64,
    probability_bps: u16,
) -> Log {
    let event = PositionUpdate {
        seasonId: U256::from(season_id),
        player,
        oldTickets: U256::from(old_tickets),
        newTickets: U256::from(new_tickets),
        totalTickets: U256::from(total_tickets),
        probabilityBps: U256::from(probability_bps),
    };
    wrap_log(curve, block, index, event.encode_log_data())
}

pub fn market_created_log(
    factory: Address,
    block: u64,
    index: u64,
    season_id: u64,
    player: Address,
    fpmm: Address,
) -> Log {
    let event = MarketCreated {
        seasonId: U256::from(season_id),
        player,
        marketType: infofi_engine::domain::MarketType::WinnerPrediction.to_bytes32(),
        conditionId: B256::repeat_byte(0xcd),
        fpmmAddress: fpmm,
    };
    wrap_log(factory, block, index, event.encode_log_data())
}

pub fn price_updated_log(
    oracle: Address,
    block: u64,
    index: u64,
    market_id: i64,
    raffle_bps: u16,
    market_bps: u16,
    hybrid_bps: u16,
) -> Log {
    let event = PriceUpdated {
        marketId: U256::from(market_id.unsigned_abs()),
        raffleBps: U256::from(raffle_bps),
        marketBps: U256::from(market_bps),
        hybridBps: U256::from(hybrid_bps),
    };
    wrap_log(oracle, block, index, event.encode_log_data())
}

pub fn trade_log(fpmm: Address, block: u64, index: u64, trader: Address, buy_yes: bool) -> Log {
    let event = Trade {
        trader,
        buyYes: buy_yes,
        amountIn: U256::from(100u64),
        amountOut: U256::from(95u64),
    };
    wrap_log(fpmm, block, index, event.encode_log_data())
}

pub fn season_started_log(raffle: Address, block: u64, index: u64, season_id: u64) -> Log {
    let event = SeasonStarted {
        seasonId: U256::from(season_id),
    };
    wrap_log(raffle, block, index, event.encode_log_data())
}

pub fn season_completed_log(
    raffle: Address,
    block: u64,
    index: u64,
    season_id: u64,
    winners: Vec<Address>,
) -> Log {
    let event = SeasonCompleted {
        seasonId: U256::from(season_id),
        winners,
    };
    wrap_log(raffle, block, index, event.encode_log_data())
}

// ---------------------------------------------------------------------------
// Scripted chain fake
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ChainState {
    pub head: u64,
    pub logs: Vec<Log>,
    /// Ranges `logs()` was asked for, in call order.
    pub log_queries: Vec<(u64, u64)>,
    /// Inject this many transient `logs()` failures before succeeding.
    pub log_failures: u32,
    pub seasons: HashMap<u64, FakeSeason>,
    /// Inject transient failures for specific participant reads.
    pub ticket_failures: HashMap<(u64, Address), u32>,
    pub oracle_writes: Vec<(i64, u16)>,
    pub creations: Vec<(u64, Address, u64, u64, u64)>,
    /// Scripted outcomes for `submit_market_creation`; `Ok` when exhausted.
    pub creation_outcomes: VecDeque<std::result::Result<String, Error>>,
    pub player_markets: HashMap<(u64, Address), Address>,
    pub fpmm_prices: HashMap<Address, (u16, u16)>,
}

#[derive(Clone, Default)]
pub struct FakeSeason {
    pub total_tickets: u64,
    pub participants: Vec<Address>,
    pub tickets: HashMap<Address, u64>,
    pub is_active: bool,
}

#[derive(Default)]
pub struct FakeChain {
    pub state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().head = head;
    }

    pub fn push_log(&self, log: Log) {
        self.state.lock().logs.push(log);
    }

    pub fn set_season(&self, season_id: u64, total_tickets: u64, holdings: &[(Address, u64)]) {
        let season = FakeSeason {
            total_tickets,
            participants: holdings.iter().map(|(player, _)| *player).collect(),
            tickets: holdings.iter().copied().collect(),
            is_active: true,
        };
        self.state.lock().seasons.insert(season_id, season);
    }

    pub fn set_prices(&self, fpmm: Address, yes_bps: u16, no_bps: u16) {
        self.state.lock().fpmm_prices.insert(fpmm, (yes_bps, no_bps));
    }

    pub fn oracle_writes(&self) -> Vec<(i64, u16)> {
        self.state.lock().oracle_writes.clone()
    }

    pub fn creations(&self) -> Vec<(u64, Address, u64, u64, u64)> {
        self.state.lock().creations.clone()
    }

    pub fn log_queries(&self) -> Vec<(u64, u64)> {
        self.state.lock().log_queries.clone()
    }
}

#[async_trait]
impl LogSource for FakeChain {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.state.lock().head)
    }

    async fn logs(
        &self,
        addresses: &[Address],
        kind: EventKind,
        from: u64,
        to: u64,
    ) -> Result<Vec<Log>> {
        let mut state = self.state.lock();
        state.log_queries.push((from, to));
        if state.log_failures > 0 {
            state.log_failures -= 1;
            return Err(Error::RpcTransient("injected log failure".into()));
        }
        let topic = contracts::topic0(kind);
        let mut matched: Vec<Log> = state
            .logs
            .iter()
            .filter(|log| {
                log.topic0() == Some(&topic)
                    && addresses.contains(&log.inner.address)
                    && log.block_number.is_some_and(|b| b >= from && b <= to)
            })
            .cloned()
            .collect();
        matched.sort_by_key(|log| (log.block_number.unwrap(), log.log_index.unwrap()));
        Ok(matched)
    }
}

#[async_trait]
impl RaffleReader for FakeChain {
    async fn season_snapshot(&self, season_id: u64) -> Result<SeasonSnapshot> {
        let state = self.state.lock();
        let season = state
            .seasons
            .get(&season_id)
            .ok_or_else(|| Error::RpcTransient(format!("unknown season {season_id}")))?;
        Ok(SeasonSnapshot {
            season_id,
            total_tickets: season.total_tickets,
            participants: season.participants.clone(),
            is_active: season.is_active,
        })
    }

    async fn participant_tickets(&self, season_id: u64, player: Address) -> Result<u64> {
        let mut state = self.state.lock();
        if let Some(remaining) = state.ticket_failures.get_mut(&(season_id, player)) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::RpcTransient("injected read failure".into()));
            }
        }
        Ok(state
            .seasons
            .get(&season_id)
            .and_then(|season| season.tickets.get(&player).copied())
            .unwrap_or(0))
    }
}

#[async_trait]
impl OracleWriter for FakeChain {
    async fn update_raffle_probability(
        &self,
        market_id: i64,
        probability_bps: u16,
    ) -> Result<String> {
        let mut state = self.state.lock();
        state.oracle_writes.push((market_id, probability_bps));
        Ok(format!("0xtx{:04}", state.oracle_writes.len()))
    }
}

#[async_trait]
impl MarketFactory for FakeChain {
    async fn submit_market_creation(
        &self,
        season_id: u64,
        player: Address,
        old_tickets: u64,
        new_tickets: u64,
        total_tickets: u64,
    ) -> Result<String> {
        let mut state = self.state.lock();
        let outcome = state
            .creation_outcomes
            .pop_front()
            .unwrap_or_else(|| Ok("0xcreate".into()));
        if outcome.is_ok() {
            state
                .creations
                .push((season_id, player, old_tickets, new_tickets, total_tickets));
        }
        outcome
    }

    async fn player_market(&self, season_id: u64, player: Address) -> Result<Option<Address>> {
        Ok(self
            .state
            .lock()
            .player_markets
            .get(&(season_id, player))
            .copied())
    }
}

#[async_trait]
impl FpmmReader for FakeChain {
    async fn prices(&self, fpmm: Address) -> Result<(u16, u16)> {
        self.state
            .lock()
            .fpmm_prices
            .get(&fpmm)
            .copied()
            .ok_or_else(|| Error::RpcTransient(format!("no prices for {fpmm}")))
    }
}

// ---------------------------------------------------------------------------
// Recording handler for listener-mechanics tests
// ---------------------------------------------------------------------------

pub struct RecordingHandler {
    kind: EventKind,
    addresses: Vec<Address>,
    pub seen: Mutex<Vec<(u64, u64)>>,
    /// Fail this many `handle` calls before succeeding.
    pub handle_failures: Mutex<u32>,
}

impl RecordingHandler {
    pub fn new(kind: EventKind, addresses: Vec<Address>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            addresses,
            seen: Mutex::new(Vec::new()),
            handle_failures: Mutex::new(0),
        })
    }
}

#[async_trait]
impl LogHandler for RecordingHandler {
    fn kind(&self) -> EventKind {
        self.kind
    }

    async fn addresses(&self) -> Result<Vec<Address>> {
        Ok(self.addresses.clone())
    }

    async fn handle(&self, log: &Log) -> Result<()> {
        {
            let mut failures = self.handle_failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::RpcTransient("injected handler failure".into()));
            }
        }
        self.seen
            .lock()
            .push((log.block_number.unwrap(), log.log_index.unwrap()));
        Ok(())
    }
}
