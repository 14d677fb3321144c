//! Cursor-driven polling listener.
//!
//! One [`ListenerTask`] runs per event type. Each poll reads the cursor,
//! fetches `[cursor + 1, head]` through the chunked log path, hands every log
//! to the registered handler in `(block_number, log_index)` order, and only
//! then advances the cursor. A restart therefore re-enters at the gap and
//! scans it with the same code that serves live polling.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::rpc::types::Log;
use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::EventKind;
use crate::error::Result;
use crate::port::chain::LogSource;
use crate::port::store::CursorStore;

/// Per-event-type log processing.
///
/// `handle` MUST be idempotent on `(block_number, log_index)`: a range is
/// replayed in full after a transient failure, and re-delivery of up to one
/// poll window is possible after a restart.
#[async_trait]
pub trait LogHandler: Send + Sync {
    fn kind(&self) -> EventKind;

    /// Contract addresses to filter on. Re-evaluated every poll so handlers
    /// tracking dynamically deployed contracts (FPMMs) pick up new ones.
    async fn addresses(&self) -> Result<Vec<Address>>;

    async fn handle(&self, log: &Log) -> Result<()>;
}

pub struct ListenerTask {
    network_key: String,
    client: Arc<dyn LogSource>,
    cursors: Arc<dyn CursorStore>,
    handler: Arc<dyn LogHandler>,
    poll_interval: Duration,
    lookback_blocks: u64,
    shutdown: watch::Receiver<bool>,
}

impl ListenerTask {
    #[must_use]
    pub fn new(
        network_key: String,
        client: Arc<dyn LogSource>,
        cursors: Arc<dyn CursorStore>,
        handler: Arc<dyn LogHandler>,
        poll_interval: Duration,
        lookback_blocks: u64,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            network_key,
            client,
            cursors,
            handler,
            poll_interval,
            lookback_blocks,
            shutdown,
        }
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) -> Result<()> {
        let kind = self.handler.kind();
        info!(network = %self.network_key, event = %kind, "listener started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            match self.poll_once().await {
                Ok(()) => {}
                Err(error) if error.is_fatal() => {
                    error!(event = %kind, error = %error, "listener stopped on fatal error");
                    return Err(error);
                }
                Err(error) => {
                    warn!(event = %kind, error = %error, "poll failed; retrying from the same cursor");
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(event = %kind, "listener stopped");
        Ok(())
    }

    /// One poll: fetch the open range, handle every log, advance the cursor.
    ///
    /// The cursor only moves after the whole range is handled, so any failure
    /// leaves it untouched and the next poll retries the same `from` block.
    pub async fn poll_once(&self) -> Result<()> {
        let kind = self.handler.kind();
        let head = self.client.block_number().await?;
        let from = match self.cursors.cursor(&self.network_key, kind.as_str()).await? {
            Some(cursor) => cursor + 1,
            None => head.saturating_sub(self.lookback_blocks),
        };
        if head < from {
            return Ok(());
        }

        let addresses = self.handler.addresses().await?;
        if addresses.is_empty() {
            return Ok(());
        }

        let logs = self.client.logs(&addresses, kind, from, head).await?;
        for log in &logs {
            self.handler.handle(log).await?;
        }

        self.cursors
            .advance(&self.network_key, kind.as_str(), head)
            .await?;
        if !logs.is_empty() {
            debug!(event = %kind, from, to = head, count = logs.len(), "range handled");
        }
        Ok(())
    }
}
