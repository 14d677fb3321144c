//! Chunked log fetching.
//!
//! Public RPC endpoints reject wide `eth_getLogs` ranges and expire
//! server-side filters under batched polling, so ranges are split into
//! bounded windows up front and a failing window is halved and retried until
//! it bottoms out at the minimum chunk size.

use alloy::rpc::types::Log;
use futures_util::future::BoxFuture;
use std::future::Future;

use crate::error::Result;

/// Fetch `[from, to]` through `fetch`, splitting into windows of at most
/// `chunk_max` blocks. Returns all logs sorted by `(block_number, log_index)`.
pub async fn fetch_chunked<'a, F, Fut>(
    from: u64,
    to: u64,
    chunk_max: u64,
    chunk_min: u64,
    fetch: &'a F,
) -> Result<Vec<Log>>
where
    F: Fn(u64, u64) -> Fut + Sync,
    Fut: Future<Output = Result<Vec<Log>>> + Send + 'a,
{
    let chunk_max = chunk_max.max(1);
    let mut logs = Vec::new();
    let mut start = from;
    while start <= to {
        let end = start.saturating_add(chunk_max - 1).min(to);
        logs.extend(fetch_window(start, end, chunk_min, fetch).await?);
        match end.checked_add(1) {
            Some(next) => start = next,
            None => break,
        }
    }
    logs.sort_by_key(|log| (log.block_number.unwrap_or_default(), log.log_index.unwrap_or_default()));
    Ok(logs)
}

/// Fetch one window, halving on transient failure down to `chunk_min`.
fn fetch_window<'a, F, Fut>(
    from: u64,
    to: u64,
    chunk_min: u64,
    fetch: &'a F,
) -> BoxFuture<'a, Result<Vec<Log>>>
where
    F: Fn(u64, u64) -> Fut + Sync,
    Fut: Future<Output = Result<Vec<Log>>> + Send + 'a,
{
    Box::pin(async move {
        match fetch(from, to).await {
            Ok(logs) => Ok(logs),
            Err(error) => {
                let span = to - from + 1;
                if !error.is_transient() || span <= chunk_min.max(1) {
                    return Err(error);
                }
                let mid = from + span / 2;
                let mut logs = fetch_window(from, mid - 1, chunk_min, fetch).await?;
                logs.extend(fetch_window(mid, to, chunk_min, fetch).await?);
                Ok(logs)
            }
        }
    })
}
