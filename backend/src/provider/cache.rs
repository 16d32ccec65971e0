use std::{num::NonZeroUsize, sync::Mutex};

use async_trait::async_trait;
use lru::LruCache;

use super::{ProviderError, SegmentFetcher};
use crate::models::{Coordinate, RouteSegment};

type PairKey = [u64; 4];

fn pair_key(from: Coordinate, to: Coordinate) -> PairKey {
    [
        from.lat.to_bits(),
        from.lon.to_bits(),
        to.lat.to_bits(),
        to.lon.to_bits(),
    ]
}

/// Memoizes successful segments per exact coordinate pair.
///
/// Anchor pairs never move, so after the first synthesis every later one is
/// served from memory. Failures are not cached and get retried next time.
pub struct CachedFetcher<F> {
    inner: F,
    cache: Mutex<LruCache<PairKey, RouteSegment>>,
}

impl<F: SegmentFetcher> CachedFetcher<F> {
    pub fn new(inner: F, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<F: SegmentFetcher> SegmentFetcher for CachedFetcher<F> {
    async fn fetch_segment(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<RouteSegment, ProviderError> {
        let key = pair_key(from, to);

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(segment) = cache.get(&key) {
                tracing::debug!("segment cache hit for {:?} -> {:?}", from, to);
                return Ok(segment.clone());
            }
        }

        let segment = self.inner.fetch_segment(from, to).await?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, segment.clone());
        }

        Ok(segment)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SegmentFetcher for CountingFetcher {
        async fn fetch_segment(
            &self,
            from: Coordinate,
            to: Coordinate,
        ) -> Result<RouteSegment, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::NoRoute);
            }
            Ok(RouteSegment {
                points: vec![from, to],
                instructions: Vec::new(),
            })
        }
    }

    fn coords() -> (Coordinate, Coordinate) {
        (
            Coordinate { lat: 1.0, lon: 2.0 },
            Coordinate { lat: 3.0, lon: 4.0 },
        )
    }

    #[tokio::test]
    async fn repeats_are_served_from_cache() {
        let fetcher = CachedFetcher::new(
            CountingFetcher {
                calls: AtomicUsize::new(0),
                fail: false,
            },
            NonZeroUsize::new(8).unwrap(),
        );
        let (from, to) = coords();

        let first = fetcher.fetch_segment(from, to).await.unwrap();
        let second = fetcher.fetch_segment(from, to).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.len(), 1);

        // direction matters: the reverse pair is a different road segment
        fetcher.fetch_segment(to, from).await.unwrap();
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let fetcher = CachedFetcher::new(
            CountingFetcher {
                calls: AtomicUsize::new(0),
                fail: true,
            },
            NonZeroUsize::new(8).unwrap(),
        );
        let (from, to) = coords();

        assert!(fetcher.fetch_segment(from, to).await.is_err());
        assert!(fetcher.fetch_segment(from, to).await.is_err());
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 2);
        assert!(fetcher.is_empty());
    }
}
