//! Typed contract surfaces and log decoding.
//!
//! All on-chain interfaces the engine consumes are declared here with the
//! `sol!` macro; calls are hand-encoded `TransactionRequest`s, so no filter
//! or batching machinery exists anywhere in the transport.

use alloy::primitives::{B256, U256};
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;

use crate::domain::{
    EventKind, FpmmTrade, MarketDeployed, MarketType, OraclePriceUpdate, PositionChange,
};
use crate::error::{Error, Result};

sol! {
    // Bonding curve
    event PositionUpdate(uint256 indexed seasonId, address indexed player, uint256 oldTickets, uint256 newTickets, uint256 totalTickets, uint256 probabilityBps);

    // Raffle
    event SeasonStarted(uint256 indexed seasonId);
    event SeasonCompleted(uint256 indexed seasonId, address[] winners);
    function getSeasonDetails(uint256 seasonId) external view returns (uint256 startTime, uint256 endTime, uint256 totalTickets, bool active);
    function getParticipants(uint256 seasonId) external view returns (address[] memory participants);
    function getParticipantPosition(uint256 seasonId, address player) external view returns (uint256 ticketCount, uint256 lastUpdateBlock);

    // Market factory
    event MarketCreated(uint256 indexed seasonId, address indexed player, bytes32 marketType, bytes32 conditionId, address fpmmAddress);
    function onPositionUpdate(uint256 seasonId, address player, uint256 oldTickets, uint256 newTickets, uint256 totalTickets) external;
    function getPlayerMarket(uint256 seasonId, address player) external view returns (bool created, bytes32 conditionId, address fpmmAddress);

    // Oracle
    event PriceUpdated(uint256 indexed marketId, uint256 raffleBps, uint256 marketBps, uint256 hybridBps);
    function updateRaffleProbability(uint256 marketId, uint256 probabilityBps) external;

    // FPMM
    event Trade(address indexed trader, bool buyYes, uint256 amountIn, uint256 amountOut);
    function getPrices() external view returns (uint256 yesBps, uint256 noBps);
}

/// Signature hash used as `topic0` when filtering logs of `kind`.
#[must_use]
pub fn topic0(kind: EventKind) -> B256 {
    match kind {
        EventKind::PositionUpdate => PositionUpdate::SIGNATURE_HASH,
        EventKind::MarketCreated => MarketCreated::SIGNATURE_HASH,
        EventKind::Trade => Trade::SIGNATURE_HASH,
        EventKind::PriceUpdated => PriceUpdated::SIGNATURE_HASH,
        EventKind::SeasonStarted => SeasonStarted::SIGNATURE_HASH,
        EventKind::SeasonCompleted => SeasonCompleted::SIGNATURE_HASH,
    }
}

pub(crate) fn as_u64(value: U256, field: &str) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(Error::Parse(format!("{field} overflows u64: {value}")));
    }
    Ok(value.to::<u64>())
}

pub(crate) fn as_bps(value: U256, field: &str) -> Result<u16> {
    let raw = as_u64(value, field)?;
    u16::try_from(raw)
        .ok()
        .filter(|&bps| bps <= 10_000)
        .ok_or_else(|| Error::Parse(format!("{field} out of basis-point range: {raw}")))
}

pub fn decode_position_update(log: &Log) -> Result<PositionChange> {
    let event = PositionUpdate::decode_log(&log.inner)
        .map_err(|e| Error::Parse(format!("PositionUpdate: {e}")))?
        .data;
    Ok(PositionChange {
        season_id: as_u64(event.seasonId, "seasonId")?,
        player: event.player,
        old_tickets: as_u64(event.oldTickets, "oldTickets")?,
        new_tickets: as_u64(event.newTickets, "newTickets")?,
        total_tickets: as_u64(event.totalTickets, "totalTickets")?,
        probability_bps: as_bps(event.probabilityBps, "probabilityBps")?,
    })
}

pub fn decode_market_created(log: &Log) -> Result<MarketDeployed> {
    let event = MarketCreated::decode_log(&log.inner)
        .map_err(|e| Error::Parse(format!("MarketCreated: {e}")))?
        .data;
    let market_type = MarketType::from_bytes32(&event.marketType)
        .ok_or_else(|| Error::Parse(format!("unknown market type {}", event.marketType)))?;
    Ok(MarketDeployed {
        season_id: as_u64(event.seasonId, "seasonId")?,
        player: event.player,
        market_type,
        condition_id: event.conditionId,
        fpmm_address: event.fpmmAddress,
    })
}

pub fn decode_trade(log: &Log) -> Result<FpmmTrade> {
    let decoded =
        Trade::decode_log(&log.inner).map_err(|e| Error::Parse(format!("Trade: {e}")))?;
    Ok(FpmmTrade {
        fpmm_address: decoded.address,
        trader: decoded.data.trader,
        buy_yes: decoded.data.buyYes,
        // Amounts are display-only; saturate rather than reject the log.
        amount_in: as_u64(decoded.data.amountIn, "amountIn").unwrap_or(u64::MAX),
        amount_out: as_u64(decoded.data.amountOut, "amountOut").unwrap_or(u64::MAX),
    })
}

pub fn decode_price_updated(log: &Log) -> Result<OraclePriceUpdate> {
    let event = PriceUpdated::decode_log(&log.inner)
        .map_err(|e| Error::Parse(format!("PriceUpdated: {e}")))?
        .data;
    let market_id = as_u64(event.marketId, "marketId")?;
    Ok(OraclePriceUpdate {
        market_id: i64::try_from(market_id)
            .map_err(|_| Error::Parse(format!("marketId {market_id} overflows i64")))?,
        raffle_bps: as_bps(event.raffleBps, "raffleBps")?,
        market_bps: as_bps(event.marketBps, "marketBps")?,
        hybrid_bps: as_bps(event.hybridBps, "hybridBps")?,
    })
}

pub fn decode_season_started(log: &Log) -> Result<u64> {
    let event = SeasonStarted::decode_log(&log.inner)
        .map_err(|e| Error::Parse(format!("SeasonStarted: {e}")))?
        .data;
    as_u64(event.seasonId, "seasonId")
}

pub fn decode_season_completed(log: &Log) -> Result<(u64, Vec<alloy::primitives::Address>)> {
    let event = SeasonCompleted::decode_log(&log.inner)
        .map_err(|e| Error::Parse(format!("SeasonCompleted: {e}")))?
        .data;
    Ok((as_u64(event.seasonId, "seasonId")?, event.winners))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, LogData};

    fn wrap(address: Address, data: alloy::primitives::LogData) -> Log {
        Log {
            inner: alloy::primitives::Log { address, data },
            block_number: Some(1),
            log_index: Some(0),
            ..Default::default()
        }
    }

    fn encode<E: SolEvent>(event: &E) -> LogData {
        event.encode_log_data()
    }

    #[test]
    fn topic0_is_distinct_per_event() {
        let kinds = [
            EventKind::PositionUpdate,
            EventKind::MarketCreated,
            EventKind::Trade,
            EventKind::PriceUpdated,
            EventKind::SeasonStarted,
            EventKind::SeasonCompleted,
        ];
        for a in kinds {
            for b in kinds {
                if a != b {
                    assert_ne!(topic0(a), topic0(b));
                }
            }
        }
    }

    #[test]
    fn position_update_roundtrips() {
        let curve = Address::repeat_byte(0x11);
        let player = Address::repeat_byte(0x22);
        let log = wrap(
            curve,
            encode(&PositionUpdate {
                seasonId: U256::from(1),
                player,
                oldTickets: U256::from(0),
                newTickets: U256::from(100),
                totalTickets: U256::from(10_000),
                probabilityBps: U256::from(100),
            }),
        );

        let change = decode_position_update(&log).unwrap();
        assert_eq!(change.season_id, 1);
        assert_eq!(change.player, player);
        assert_eq!(change.new_tickets, 100);
        assert_eq!(change.probability_bps, 100);
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let log = wrap(
            Address::repeat_byte(0x11),
            encode(&PositionUpdate {
                seasonId: U256::from(1),
                player: Address::repeat_byte(0x22),
                oldTickets: U256::from(0),
                newTickets: U256::from(1),
                totalTickets: U256::from(1),
                probabilityBps: U256::from(10_001),
            }),
        );
        assert!(decode_position_update(&log).is_err());
    }

    #[test]
    fn market_created_roundtrips() {
        let fpmm = Address::repeat_byte(0x33);
        let log = wrap(
            Address::repeat_byte(0x44),
            encode(&MarketCreated {
                seasonId: U256::from(2),
                player: Address::repeat_byte(0x22),
                marketType: MarketType::WinnerPrediction.to_bytes32(),
                conditionId: B256::repeat_byte(0x55),
                fpmmAddress: fpmm,
            }),
        );

        let deployed = decode_market_created(&log).unwrap();
        assert_eq!(deployed.season_id, 2);
        assert_eq!(deployed.market_type, MarketType::WinnerPrediction);
        assert_eq!(deployed.fpmm_address, fpmm);
    }

    #[test]
    fn trade_keeps_the_emitting_fpmm() {
        let fpmm = Address::repeat_byte(0x66);
        let log = wrap(
            fpmm,
            encode(&Trade {
                trader: Address::repeat_byte(0x22),
                buyYes: true,
                amountIn: U256::from(500),
                amountOut: U256::from(480),
            }),
        );

        let trade = decode_trade(&log).unwrap();
        assert_eq!(trade.fpmm_address, fpmm);
        assert!(trade.buy_yes);
    }

    #[test]
    fn season_completed_carries_winners() {
        let winners = vec![Address::repeat_byte(0x22), Address::repeat_byte(0x23)];
        let log = wrap(
            Address::repeat_byte(0x44),
            encode(&SeasonCompleted {
                seasonId: U256::from(3),
                winners: winners.clone(),
            }),
        );

        let (season_id, decoded) = decode_season_completed(&log).unwrap();
        assert_eq!(season_id, 3);
        assert_eq!(decoded, winners);
    }
}
