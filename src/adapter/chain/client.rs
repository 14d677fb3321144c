//! EVM chain client over a plain HTTP provider.
//!
//! The transport deliberately has no request batching and no multicall
//! coalescing: public RPCs expire server-side log filters within seconds
//! under batched polling, so every log query is a raw `eth_getLogs` with an
//! explicit block range, and every read is a standalone `eth_call`.

use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use super::contracts::{
    self, as_bps, as_u64, getParticipantPositionCall, getParticipantsCall, getPlayerMarketCall,
    getPricesCall, getSeasonDetailsCall, onPositionUpdateCall, updateRaffleProbabilityCall,
};
use super::logs::fetch_chunked;
use crate::domain::{EventKind, SeasonSnapshot};
use crate::error::{Error, Result};
use crate::port::chain::{FpmmReader, LogSource, MarketFactory, OracleWriter, RaffleReader};

/// Deployed contract addresses for one network.
#[derive(Debug, Clone, Copy)]
pub struct ContractAddressBook {
    pub raffle: Address,
    pub curve: Address,
    pub factory: Address,
    pub oracle: Address,
    pub fpmm_manager: Address,
    pub sof: Address,
}

/// Everything the client needs to talk to one network.
#[derive(Debug, Clone)]
pub struct ChainClientConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub backend_private_key: String,
    pub addresses: ContractAddressBook,
    pub rpc_call_timeout: Duration,
    pub write_confirmation_timeout: Duration,
    pub log_chunk_max: u64,
    pub log_chunk_min: u64,
    pub market_creation_gas_limit: u64,
    pub paymaster_url: Option<String>,
}

/// Typed chain access with per-account write serialization.
///
/// The backend account's nonce space is owned by `write_gate`: a write holds
/// the gate from submission until its one-confirmation receipt, so two tasks
/// can never race the same nonce.
pub struct EvmClient {
    provider: DynProvider,
    backend: Address,
    config: ChainClientConfig,
    write_gate: Mutex<()>,
}

impl EvmClient {
    pub fn connect(config: ChainClientConfig) -> Result<Self> {
        let url: Url = config
            .rpc_url
            .parse()
            .map_err(|e| Error::Config(format!("invalid rpc url {}: {e}", config.rpc_url)))?;
        let signer: PrivateKeySigner = config
            .backend_private_key
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid backend key: {e}")))?;
        let backend = signer.address();
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(url)
            .erased();

        Ok(Self {
            provider,
            backend,
            config,
            write_gate: Mutex::new(()),
        })
    }

    /// Address of the backend account used for writes.
    #[must_use]
    pub fn backend_address(&self) -> Address {
        self.backend
    }

    async fn read(&self, to: Address, data: Vec<u8>) -> Result<Bytes> {
        let tx = TransactionRequest::default().to(to).input(data.into());
        timeout(self.config.rpc_call_timeout, self.provider.call(tx))
            .await
            .map_err(|_| Error::RpcTransient("eth_call timed out".into()))?
            .map_err(classify_rpc)
    }

    /// Submit a write and wait for its one-confirmation receipt, holding the
    /// per-account gate for the whole window.
    async fn submit(&self, to: Address, data: Vec<u8>, gas_limit: Option<u64>) -> Result<String> {
        let _gate = self.write_gate.lock().await;

        let mut tx = TransactionRequest::default()
            .from(self.backend)
            .to(to)
            .input(data.into());
        if let Some(gas) = gas_limit {
            tx = tx.gas_limit(gas);
        }

        let pending = timeout(
            self.config.rpc_call_timeout,
            self.provider.send_transaction(tx),
        )
        .await
        .map_err(|_| Error::RpcTransient("transaction submission timed out".into()))?
        .map_err(classify_rpc)?;

        let tx_hash = *pending.tx_hash();
        let receipt = timeout(self.config.write_confirmation_timeout, pending.get_receipt())
            .await
            .map_err(|_| Error::RpcTransient("confirmation timed out".into()))?
            .map_err(classify_rpc)?;

        if !receipt.status() {
            return Err(Error::ContractRevert {
                reason: "transaction reverted on-chain".into(),
            });
        }
        debug!(tx = %tx_hash, to = %to, "write confirmed");
        Ok(format!("{tx_hash:#x}"))
    }

    /// ERC-5792-style sponsored submission through the configured paymaster.
    async fn submit_sponsored(&self, to: Address, data: &[u8], paymaster: &str) -> Result<String> {
        let params = serde_json::json!([{
            "version": "1.0",
            "chainId": format!("0x{:x}", self.config.chain_id),
            "from": self.backend,
            "calls": [{
                "to": to,
                "data": format!("0x{}", alloy::hex::encode(data)),
            }],
            "capabilities": {
                "paymasterService": { "url": paymaster },
            },
        }]);

        let response: serde_json::Value = timeout(
            self.config.rpc_call_timeout,
            self.provider.raw_request("wallet_sendCalls".into(), params),
        )
        .await
        .map_err(|_| Error::RpcTransient("wallet_sendCalls timed out".into()))?
        .map_err(classify_rpc)?;

        let bundle_id = response
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| response.to_string());
        Ok(bundle_id)
    }
}

/// Map a transport/provider failure onto the crate error kinds.
pub(crate) fn classify_rpc<E: std::fmt::Display>(error: E) -> Error {
    let message = error.to_string();
    let lower = message.to_lowercase();

    if lower.contains("revert") {
        return Error::ContractRevert { reason: message };
    }
    if lower.contains("nonce too low") || lower.contains("replacement transaction") {
        return Error::NonceConflict;
    }
    if lower.contains("out of gas")
        || lower.contains("intrinsic gas too low")
        || lower.contains("gas required exceeds")
    {
        return Error::OutOfGas;
    }
    if lower.contains("unauthorized")
        || lower.contains("api key")
        || lower.contains("401")
        || lower.contains("403")
        || lower.contains("method not found")
        || lower.contains("method not supported")
    {
        return Error::RpcFatal(message);
    }
    // Everything else (timeouts, 5xx, "filter not found", oversized ranges)
    // is worth retrying.
    Error::RpcTransient(message)
}

#[async_trait]
impl LogSource for EvmClient {
    async fn block_number(&self) -> Result<u64> {
        timeout(self.config.rpc_call_timeout, self.provider.get_block_number())
            .await
            .map_err(|_| Error::RpcTransient("eth_blockNumber timed out".into()))?
            .map_err(classify_rpc)
    }

    async fn logs(
        &self,
        addresses: &[Address],
        kind: EventKind,
        from: u64,
        to: u64,
    ) -> Result<Vec<Log>> {
        let topic = contracts::topic0(kind);
        let fetch = |start: u64, end: u64| {
            let filter = Filter::new()
                .address(addresses.to_vec())
                .event_signature(topic)
                .from_block(start)
                .to_block(end);
            async move {
                timeout(self.config.rpc_call_timeout, self.provider.get_logs(&filter))
                    .await
                    .map_err(|_| Error::RpcTransient("eth_getLogs timed out".into()))?
                    .map_err(classify_rpc)
            }
        };
        fetch_chunked(
            from,
            to,
            self.config.log_chunk_max,
            self.config.log_chunk_min,
            &fetch,
        )
        .await
    }
}

#[async_trait]
impl RaffleReader for EvmClient {
    async fn season_snapshot(&self, season_id: u64) -> Result<SeasonSnapshot> {
        let raffle = self.config.addresses.raffle;

        let details_bytes = self
            .read(
                raffle,
                getSeasonDetailsCall {
                    seasonId: U256::from(season_id),
                }
                .abi_encode(),
            )
            .await?;
        let details = getSeasonDetailsCall::abi_decode_returns(&details_bytes)
            .map_err(|e| Error::Parse(format!("getSeasonDetails: {e}")))?;

        let participants_bytes = self
            .read(
                raffle,
                getParticipantsCall {
                    seasonId: U256::from(season_id),
                }
                .abi_encode(),
            )
            .await?;
        let participants = getParticipantsCall::abi_decode_returns(&participants_bytes)
            .map_err(|e| Error::Parse(format!("getParticipants: {e}")))?;

        Ok(SeasonSnapshot {
            season_id,
            total_tickets: as_u64(details.totalTickets, "totalTickets")?,
            participants,
            is_active: details.active,
        })
    }

    async fn participant_tickets(&self, season_id: u64, player: Address) -> Result<u64> {
        let bytes = self
            .read(
                self.config.addresses.raffle,
                getParticipantPositionCall {
                    seasonId: U256::from(season_id),
                    player,
                }
                .abi_encode(),
            )
            .await?;
        let position = getParticipantPositionCall::abi_decode_returns(&bytes)
            .map_err(|e| Error::Parse(format!("getParticipantPosition: {e}")))?;
        as_u64(position.ticketCount, "ticketCount")
    }
}

#[async_trait]
impl OracleWriter for EvmClient {
    async fn update_raffle_probability(
        &self,
        market_id: i64,
        probability_bps: u16,
    ) -> Result<String> {
        let data = updateRaffleProbabilityCall {
            marketId: U256::from(market_id.unsigned_abs()),
            probabilityBps: U256::from(probability_bps),
        }
        .abi_encode();
        self.submit(self.config.addresses.oracle, data, None).await
    }
}

#[async_trait]
impl MarketFactory for EvmClient {
    async fn submit_market_creation(
        &self,
        season_id: u64,
        player: Address,
        old_tickets: u64,
        new_tickets: u64,
        total_tickets: u64,
    ) -> Result<String> {
        let data = onPositionUpdateCall {
            seasonId: U256::from(season_id),
            player,
            oldTickets: U256::from(old_tickets),
            newTickets: U256::from(new_tickets),
            totalTickets: U256::from(total_tickets),
        }
        .abi_encode();

        if let Some(paymaster) = self.config.paymaster_url.clone() {
            match self
                .submit_sponsored(self.config.addresses.factory, &data, &paymaster)
                .await
            {
                Ok(bundle_id) => return Ok(bundle_id),
                Err(error) => {
                    warn!(error = %error, "sponsored submission failed; falling back to signed path");
                }
            }
        }

        // Market deployment needs ~4.2M gas and estimation has been observed
        // to under-budget it, hence the explicit limit.
        self.submit(
            self.config.addresses.factory,
            data,
            Some(self.config.market_creation_gas_limit),
        )
        .await
    }

    async fn player_market(&self, season_id: u64, player: Address) -> Result<Option<Address>> {
        let bytes = self
            .read(
                self.config.addresses.factory,
                getPlayerMarketCall {
                    seasonId: U256::from(season_id),
                    player,
                }
                .abi_encode(),
            )
            .await?;
        let market = getPlayerMarketCall::abi_decode_returns(&bytes)
            .map_err(|e| Error::Parse(format!("getPlayerMarket: {e}")))?;
        if market.created && !market.fpmmAddress.is_zero() {
            Ok(Some(market.fpmmAddress))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl FpmmReader for EvmClient {
    async fn prices(&self, fpmm: Address) -> Result<(u16, u16)> {
        let bytes = self.read(fpmm, getPricesCall {}.abi_encode()).await?;
        let prices = getPricesCall::abi_decode_returns(&bytes)
            .map_err(|e| Error::Parse(format!("getPrices: {e}")))?;
        Ok((
            as_bps(prices.yesBps, "yesBps")?,
            as_bps(prices.noBps, "noBps")?,
        ))
    }
}
