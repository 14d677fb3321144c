//! In-memory price cache with per-market subscriber fan-out.
//!
//! The hub is the single writer of the cache; the oracle's `PriceUpdated`
//! listener feeds it. Subscribers own a bounded receiver per the channel
//! re-architecture: a full or closed channel drops the subscription instead
//! of ever backing up the writer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// What a subscriber is listening to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKey {
    Market(i64),
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceMessageKind {
    Initial,
    Update,
    Heartbeat,
}

/// Wire message emitted to stream subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceMessage {
    #[serde(rename = "type")]
    pub kind: PriceMessageKind,
    pub market_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raffle_bps: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment_bps: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hybrid_bps: Option<u16>,
    pub ts: i64,
}

/// Latest known price of one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedPrice {
    pub raffle_bps: u16,
    pub sentiment_bps: u16,
    pub hybrid_bps: u16,
    pub updated_at_ms: i64,
}

impl CachedPrice {
    fn message(&self, kind: PriceMessageKind, market_id: i64) -> PriceMessage {
        PriceMessage {
            kind,
            market_id,
            raffle_bps: Some(self.raffle_bps),
            sentiment_bps: Some(self.sentiment_bps),
            hybrid_bps: Some(self.hybrid_bps),
            ts: self.updated_at_ms,
        }
    }
}

/// Token returned by [`PriceStreamHub::subscribe`]; pass it back to
/// [`PriceStreamHub::unsubscribe`] to detach.
#[derive(Debug, Clone, Copy)]
pub struct SubscriberHandle {
    key: SubscriptionKey,
    id: u64,
}

type Bucket = HashMap<u64, mpsc::Sender<PriceMessage>>;

pub struct PriceStreamHub {
    cache: RwLock<HashMap<i64, CachedPrice>>,
    subscribers: RwLock<HashMap<SubscriptionKey, Bucket>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl PriceStreamHub {
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Apply an oracle `PriceUpdated` observation and fan it out.
    pub fn on_oracle_price_updated(
        &self,
        market_id: i64,
        raffle_bps: u16,
        sentiment_bps: u16,
        hybrid_bps: u16,
    ) {
        let cached = CachedPrice {
            raffle_bps,
            sentiment_bps,
            hybrid_bps,
            updated_at_ms: Utc::now().timestamp_millis(),
        };
        self.cache.write().insert(market_id, cached);

        let message = cached.message(PriceMessageKind::Update, market_id);
        self.fan_out(SubscriptionKey::Market(market_id), &message);
        self.fan_out(SubscriptionKey::All, &message);
    }

    /// Attach a subscriber. The receiver is seeded with an `initial` message
    /// for every cached market the key covers, then receives updates until
    /// the handle is dropped via [`Self::unsubscribe`] or the channel breaks.
    pub fn subscribe(&self, key: SubscriptionKey) -> (SubscriberHandle, mpsc::Receiver<PriceMessage>) {
        let (tx, rx) = mpsc::channel(self.buffer);

        {
            let cache = self.cache.read();
            match key {
                SubscriptionKey::Market(market_id) => {
                    if let Some(cached) = cache.get(&market_id) {
                        let _ = tx.try_send(cached.message(PriceMessageKind::Initial, market_id));
                    }
                }
                SubscriptionKey::All => {
                    for (&market_id, cached) in cache.iter() {
                        let _ = tx.try_send(cached.message(PriceMessageKind::Initial, market_id));
                    }
                }
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().entry(key).or_default().insert(id, tx);
        (SubscriberHandle { key, id }, rx)
    }

    pub fn unsubscribe(&self, handle: SubscriberHandle) {
        let mut subscribers = self.subscribers.write();
        if let Some(bucket) = subscribers.get_mut(&handle.key) {
            bucket.remove(&handle.id);
            if bucket.is_empty() {
                subscribers.remove(&handle.key);
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self, market_id: i64) -> Option<CachedPrice> {
        self.cache.read().get(&market_id).copied()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().values().map(Bucket::len).sum()
    }

    /// Send a heartbeat to every subscriber so idle intermediaries keep the
    /// connection open.
    pub fn heartbeat(&self) {
        let ts = Utc::now().timestamp_millis();
        let keys: Vec<SubscriptionKey> = self.subscribers.read().keys().copied().collect();
        for key in keys {
            let market_id = match key {
                SubscriptionKey::Market(id) => id,
                SubscriptionKey::All => 0,
            };
            let message = PriceMessage {
                kind: PriceMessageKind::Heartbeat,
                market_id,
                raffle_bps: None,
                sentiment_bps: None,
                hybrid_bps: None,
                ts,
            };
            self.fan_out(key, &message);
        }
    }

    /// Best-effort delivery to one bucket; broken or lagging subscribers are
    /// dropped so the writer never blocks.
    fn fan_out(&self, key: SubscriptionKey, message: &PriceMessage) {
        let mut dead = Vec::new();
        {
            let subscribers = self.subscribers.read();
            let Some(bucket) = subscribers.get(&key) else {
                return;
            };
            for (&id, tx) in bucket {
                if tx.try_send(message.clone()).is_err() {
                    dead.push(id);
                }
            }
        }
        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write();
            if let Some(bucket) = subscribers.get_mut(&key) {
                for id in &dead {
                    bucket.remove(id);
                }
                if bucket.is_empty() {
                    subscribers.remove(&key);
                }
            }
            debug!(dropped = dead.len(), ?key, "dropped broken subscribers");
        }
    }

    /// Spawn the heartbeat loop.
    pub fn spawn_heartbeat(
        hub: Arc<Self>,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => hub.heartbeat(),
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("price stream heartbeat stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_is_seeded_from_the_cache() {
        let hub = PriceStreamHub::new(8);
        hub.on_oracle_price_updated(7, 2_500, 2_700, 2_560);

        let (_handle, mut rx) = hub.subscribe(SubscriptionKey::Market(7));
        let seed = rx.try_recv().unwrap();
        assert_eq!(seed.kind, PriceMessageKind::Initial);
        assert_eq!(seed.market_id, 7);
        assert_eq!(seed.raffle_bps, Some(2_500));
        assert_eq!(seed.hybrid_bps, Some(2_560));
    }

    #[test]
    fn subscribe_without_cache_gets_no_seed() {
        let hub = PriceStreamHub::new(8);
        let (_handle, mut rx) = hub.subscribe(SubscriptionKey::Market(7));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn updates_reach_market_and_all_buckets() {
        let hub = PriceStreamHub::new(8);
        let (_a, mut market_rx) = hub.subscribe(SubscriptionKey::Market(7));
        let (_b, mut all_rx) = hub.subscribe(SubscriptionKey::All);
        let (_c, mut other_rx) = hub.subscribe(SubscriptionKey::Market(8));

        hub.on_oracle_price_updated(7, 5_000, 5_000, 5_000);

        assert_eq!(market_rx.try_recv().unwrap().kind, PriceMessageKind::Update);
        assert_eq!(all_rx.try_recv().unwrap().market_id, 7);
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn subscribe_then_unsubscribe_restores_the_count() {
        let hub = PriceStreamHub::new(8);
        assert_eq!(hub.subscriber_count(), 0);

        let (handle, _rx) = hub.subscribe(SubscriptionKey::Market(7));
        assert_eq!(hub.subscriber_count(), 1);

        hub.unsubscribe(handle);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn lagging_subscriber_is_dropped_not_blocked_on() {
        let hub = PriceStreamHub::new(1);
        let (_handle, _rx) = hub.subscribe(SubscriptionKey::Market(7));

        // First update fills the buffer; the second finds it full and drops
        // the subscriber.
        hub.on_oracle_price_updated(7, 1_000, 1_000, 1_000);
        hub.on_oracle_price_updated(7, 2_000, 2_000, 2_000);

        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn closed_receiver_is_dropped_on_next_write() {
        let hub = PriceStreamHub::new(8);
        let (_handle, rx) = hub.subscribe(SubscriptionKey::Market(7));
        drop(rx);

        hub.on_oracle_price_updated(7, 1_000, 1_000, 1_000);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn snapshot_reflects_the_last_write() {
        let hub = PriceStreamHub::new(8);
        assert!(hub.snapshot(7).is_none());

        hub.on_oracle_price_updated(7, 1_000, 2_000, 1_300);
        hub.on_oracle_price_updated(7, 1_100, 2_000, 1_370);

        let cached = hub.snapshot(7).unwrap();
        assert_eq!(cached.raffle_bps, 1_100);
        assert_eq!(cached.hybrid_bps, 1_370);
    }

    #[test]
    fn heartbeat_reaches_every_subscriber() {
        let hub = PriceStreamHub::new(8);
        let (_a, mut market_rx) = hub.subscribe(SubscriptionKey::Market(7));
        let (_b, mut all_rx) = hub.subscribe(SubscriptionKey::All);

        hub.heartbeat();

        assert_eq!(market_rx.try_recv().unwrap().kind, PriceMessageKind::Heartbeat);
        assert_eq!(all_rx.try_recv().unwrap().kind, PriceMessageKind::Heartbeat);
    }

    #[test]
    fn wire_shape_matches_the_streaming_contract() {
        let message = PriceMessage {
            kind: PriceMessageKind::Update,
            market_id: 7,
            raffle_bps: Some(5_000),
            sentiment_bps: Some(4_800),
            hybrid_bps: Some(4_940),
            ts: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "update");
        assert_eq!(json["marketId"], 7);
        assert_eq!(json["raffleBps"], 5_000);
        assert_eq!(json["hybridBps"], 4_940);

        let heartbeat = PriceMessage {
            kind: PriceMessageKind::Heartbeat,
            market_id: 0,
            raffle_bps: None,
            sentiment_bps: None,
            hybrid_bps: None,
            ts: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&heartbeat).unwrap();
        assert_eq!(json["type"], "heartbeat");
        assert!(json.get("raffleBps").is_none());
    }
}
