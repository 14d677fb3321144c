//! MarketCreated reconciliation: idempotent insert + pricing-cache seed.

mod support;

use std::sync::Arc;

use infofi_engine::domain::{HybridWeights, MarketType, NewMarket, PlayerAddress, PricingEntry};
use infofi_engine::port::chain::RaffleReader;
use infofi_engine::port::store::{MarketStore, PricingStore};
use infofi_engine::service::handlers::MarketCreatedHandler;
use infofi_engine::service::listener::LogHandler;

use support::{addr, market_created_log, memory_stores, FakeChain};

fn handler(
    chain: &Arc<FakeChain>,
    markets: Arc<dyn MarketStore>,
    pricing: Arc<dyn PricingStore>,
) -> MarketCreatedHandler {
    MarketCreatedHandler::new(
        addr(0x44),
        markets,
        pricing,
        Arc::clone(chain) as Arc<dyn RaffleReader>,
        HybridWeights::default(),
    )
}

#[tokio::test]
async fn first_crosser_creates_the_row_and_seeds_pricing() {
    let stores = memory_stores();
    let markets: Arc<dyn MarketStore> = stores.markets.clone();
    let pricing: Arc<dyn PricingStore> = stores.pricing.clone();
    let chain = FakeChain::new();
    let (player, fpmm) = (addr(0xa1), addr(0xfe));
    chain.set_season(1, 10_000, &[(player, 100)]);

    let handler = handler(&chain, markets.clone(), pricing.clone());
    handler
        .handle(&market_created_log(addr(0x44), 120, 0, 1, player, fpmm))
        .await
        .unwrap();

    let market = markets
        .get_market(1, &PlayerAddress::from(player), MarketType::WinnerPrediction)
        .await
        .unwrap()
        .expect("row created");
    assert_eq!(market.initial_probability_bps, 100);
    assert_eq!(market.current_probability_bps, 100);
    assert!(market.is_active);
    assert_eq!(
        market.contract_address.as_deref(),
        Some(fpmm.to_string().to_lowercase().as_str())
    );

    // Sentiment is seeded to the raffle probability: hybrid == raffle.
    let entry = pricing.get(market.id).await.unwrap().expect("cache seeded");
    assert_eq!(entry.raffle_bps, 100);
    assert_eq!(entry.sentiment_bps, 100);
    assert_eq!(entry.hybrid_bps, 100);
}

#[tokio::test]
async fn replaying_the_log_changes_nothing() {
    let stores = memory_stores();
    let markets: Arc<dyn MarketStore> = stores.markets.clone();
    let pricing: Arc<dyn PricingStore> = stores.pricing.clone();
    let chain = FakeChain::new();
    let (player, fpmm) = (addr(0xa1), addr(0xfe));
    chain.set_season(1, 10_000, &[(player, 100)]);

    let handler = handler(&chain, markets.clone(), pricing.clone());
    let log = market_created_log(addr(0x44), 120, 0, 1, player, fpmm);
    handler.handle(&log).await.unwrap();

    let market_id = markets
        .get_market(1, &PlayerAddress::from(player), MarketType::WinnerPrediction)
        .await
        .unwrap()
        .unwrap()
        .id;
    // Live sentiment moves before the replay arrives.
    pricing
        .upsert(&PricingEntry::blend(market_id, 100, 2_000, HybridWeights::default()))
        .await
        .unwrap();

    handler.handle(&log).await.unwrap();

    assert_eq!(markets.list_markets_by_season(1).await.unwrap().len(), 1);
    let entry = pricing.get(market_id).await.unwrap().unwrap();
    assert_eq!(entry.sentiment_bps, 2_000, "replay must not clobber live sentiment");
}

#[tokio::test]
async fn an_existing_row_without_a_contract_gets_backfilled() {
    let stores = memory_stores();
    let markets: Arc<dyn MarketStore> = stores.markets.clone();
    let pricing: Arc<dyn PricingStore> = stores.pricing.clone();
    let chain = FakeChain::new();
    let (player, fpmm) = (addr(0xa1), addr(0xfe));
    chain.set_season(1, 10_000, &[(player, 150)]);

    let existing = markets
        .create_market(NewMarket {
            season_id: 1,
            player: PlayerAddress::from(player),
            market_type: MarketType::WinnerPrediction,
            probability_bps: 150,
            contract_address: None,
        })
        .await
        .unwrap();

    let handler = handler(&chain, markets.clone(), pricing);
    handler
        .handle(&market_created_log(addr(0x44), 120, 0, 1, player, fpmm))
        .await
        .unwrap();

    let reloaded = markets.get_market_by_id(existing.id).await.unwrap().unwrap();
    assert_eq!(
        reloaded.contract_address.as_deref(),
        Some(fpmm.to_string().to_lowercase().as_str())
    );
    assert_eq!(markets.list_markets_by_season(1).await.unwrap().len(), 1);
}
