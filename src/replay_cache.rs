//! Memoized replay snapshots for past service days. A replay build is a
//! pure function of the requested date; the cache only absorbs repeated
//! requests within a configurable TTL. Concurrent rebuilds of the same
//! date are allowed to race: both build, the later insert wins, both
//! results are correct.

use crate::date_to_yyyymmdd;
use crate::models::Snapshot;
use crate::source::{DispatchSource, assemble_day};
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct ReplayEntry {
    snapshot: Snapshot,
    expires_at: Instant,
}

pub struct ReplayCache {
    ttl: Duration,
    entries: DashMap<String, ReplayEntry>,
}

impl ReplayCache {
    /// A zero TTL disables memoization entirely; every request rebuilds.
    pub fn new(ttl: Duration) -> ReplayCache {
        ReplayCache {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub async fn snapshot_for_date<S: DispatchSource>(
        &self,
        source: &S,
        date: &str,
    ) -> anyhow::Result<Snapshot> {
        if !self.ttl.is_zero() {
            if let Some(entry) = self.entries.get(date) {
                if entry.expires_at > Instant::now() {
                    return Ok(entry.snapshot.clone());
                }
            }
        }

        let day = date_to_yyyymmdd(date)?;
        let (route_count, segments) = assemble_day(source, day).await?;
        let snapshot = Snapshot::replay(date, day, route_count, segments);

        if !self.ttl.is_zero() {
            self.entries.insert(
                date.to_string(),
                ReplayEntry {
                    snapshot: snapshot.clone(),
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReservationRow, RouteRow};
    use ahash::AHashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct CountingSource {
        route_calls: Arc<AtomicUsize>,
    }

    impl CountingSource {
        fn new() -> CountingSource {
            CountingSource {
                route_calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl DispatchSource for CountingSource {
        async fn routes_for_day(&self, _day: u32) -> anyhow::Result<Vec<RouteRow>> {
            self.route_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn reservations_by_dispatch(
            &self,
            _dispatch_ids: &[String],
        ) -> anyhow::Result<AHashMap<String, ReservationRow>> {
            Ok(AHashMap::new())
        }
    }

    #[tokio::test]
    async fn test_second_request_within_ttl_serves_stored_snapshot() {
        let source = CountingSource::new();
        let cache = ReplayCache::new(Duration::from_secs(3600));

        let first = cache.snapshot_for_date(&source, "2025-07-29").await.unwrap();
        let second = cache.snapshot_for_date(&source, "2025-07-29").await.unwrap();

        assert_eq!(source.route_calls.load(Ordering::SeqCst), 1);
        // Stored snapshot returned unchanged, build stamp included.
        assert_eq!(first, second);
        assert_eq!(first.mode, "replay");
        assert_eq!(first.day, Some(20250729));
        assert_eq!(first.date.as_deref(), Some("2025-07-29"));
    }

    #[tokio::test]
    async fn test_distinct_dates_build_separately() {
        let source = CountingSource::new();
        let cache = ReplayCache::new(Duration::from_secs(3600));

        cache.snapshot_for_date(&source, "2025-07-29").await.unwrap();
        cache.snapshot_for_date(&source, "2025-07-30").await.unwrap();

        assert_eq!(source.route_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_rebuilds_every_request() {
        let source = CountingSource::new();
        let cache = ReplayCache::new(Duration::ZERO);

        cache.snapshot_for_date(&source, "2025-07-29").await.unwrap();
        cache.snapshot_for_date(&source, "2025-07-29").await.unwrap();

        assert_eq!(source.route_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_rebuild() {
        let source = CountingSource::new();
        let cache = ReplayCache::new(Duration::from_millis(20));

        cache.snapshot_for_date(&source, "2025-07-29").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.snapshot_for_date(&source, "2025-07-29").await.unwrap();

        assert_eq!(source.route_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_malformed_date_surfaces_as_build_error() {
        let source = CountingSource::new();
        let cache = ReplayCache::new(Duration::from_secs(3600));

        assert!(cache.snapshot_for_date(&source, "yesterday").await.is_err());
        assert!(cache.snapshot_for_date(&source, "2025-13-01").await.is_err());
        assert_eq!(source.route_calls.load(Ordering::SeqCst), 0);
    }
}
