//! The current-day snapshot slot and the background task that keeps it
//! fresh. The refresh task is the slot's only writer and replaces it
//! wholesale, so readers never observe a half-built snapshot. A failed
//! refresh leaves the previous warm snapshot serving and retries after a
//! short backoff; the loop never exits.

use crate::models::Snapshot;
use crate::source::{DispatchSource, assemble_day};
use crate::today_yyyymmdd;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

pub const REFRESH_FAILURE_BACKOFF: Duration = Duration::from_secs(5);

/// Single-slot holder for the live snapshot, injected into request handlers.
/// Starts cold (empty shell with no update timestamp) and turns warm on the
/// first successful refresh.
pub struct LiveSegmentCache {
    slot: RwLock<Snapshot>,
}

impl LiveSegmentCache {
    pub fn new() -> LiveSegmentCache {
        LiveSegmentCache {
            slot: RwLock::new(Snapshot::cold_live()),
        }
    }

    pub fn current(&self) -> Snapshot {
        self.slot.read().unwrap().clone()
    }

    pub fn replace(&self, snapshot: Snapshot) {
        *self.slot.write().unwrap() = snapshot;
    }

    pub fn is_warm(&self) -> bool {
        self.slot.read().unwrap().updated_at_ms.is_some()
    }
}

impl Default for LiveSegmentCache {
    fn default() -> Self {
        LiveSegmentCache::new()
    }
}

/// One refresh cycle: rebuild today's segments from scratch and swap them in.
pub async fn refresh_live_once<S: DispatchSource>(
    source: &S,
    cache: &LiveSegmentCache,
) -> anyhow::Result<()> {
    let day = today_yyyymmdd();
    let (route_count, segments) = assemble_day(source, day).await?;
    cache.replace(Snapshot::live(day, route_count, segments));
    Ok(())
}

pub async fn run_live_refresh_loop<S: DispatchSource>(
    source: S,
    cache: Arc<LiveSegmentCache>,
    poll_interval: Duration,
    failure_backoff: Duration,
) {
    loop {
        match refresh_live_once(&source, &cache).await {
            Ok(()) => {
                let current = cache.current();
                log::info!(
                    "live refresh ok: day {:?}, {} routes, {} segments",
                    current.day,
                    current.routes,
                    current.segments_count
                );
                tokio::time::sleep(poll_interval).await;
            }
            Err(e) => {
                log::warn!("live refresh failed, keeping previous snapshot: {}", e);
                tokio::time::sleep(failure_backoff).await;
            }
        }
    }
}
