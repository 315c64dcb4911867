use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::models::MarketQuote;
use crate::services::odds_feed::OddsProvider;

struct CacheState {
    quotes: HashMap<String, MarketQuote>,
    fetched_at: Option<Instant>,
}

/// 60-second (configurable) TTL cache over the odds feed, keyed by
/// `match_id` (§4.3). The mutex doubles as the single-flight guard: a
/// refresh runs with the lock held, so concurrent callers queue on the
/// lock rather than each issuing their own feed call.
pub struct MarketCache {
    provider: Arc<dyn OddsProvider>,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl MarketCache {
    pub fn new(provider: Arc<dyn OddsProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            state: Mutex::new(CacheState {
                quotes: HashMap::new(),
                fetched_at: None,
            }),
        }
    }

    /// Returns the current market snapshot, refreshing from the feed if
    /// `force` is set, the cache is empty, or the TTL has elapsed. Always
    /// returns the best snapshot available — a failed refresh just leaves
    /// the prior (possibly stale) snapshot in place.
    pub async fn get_live_market(&self, force: bool) -> HashMap<String, MarketQuote> {
        let mut state = self.state.lock().await;

        let stale = match state.fetched_at {
            None => true,
            Some(t) => t.elapsed() > self.ttl,
        };

        if force || state.quotes.is_empty() || stale {
            let fresh = self.provider.fetch_odds().await;
            if !fresh.is_empty() {
                state.quotes = fresh.into_iter().map(|q| (q.match_id.clone(), q)).collect();
                state.fetched_at = Some(Instant::now());
            } else if state.fetched_at.is_none() {
                // First fetch came back empty: stamp the time anyway so we
                // don't hammer the feed every call while it's down.
                state.fetched_at = Some(Instant::now());
            }
        }

        state.quotes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl OddsProvider for CountingProvider {
        fn name(&self) -> &str {
            "Counting"
        }

        async fn fetch_odds(&self) -> Vec<MarketQuote> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            vec![MarketQuote::new("Counting", "Home", "Away", 2.0, 2.0, None)]
        }
    }

    #[tokio::test]
    async fn single_flight_collapses_concurrent_storm() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(MarketCache::new(provider.clone(), Duration::from_secs(60)));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.get_live_market(false).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_snapshot_triggers_one_more_fetch() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let cache = MarketCache::new(provider.clone(), Duration::from_millis(10));

        cache.get_live_market(false).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.get_live_market(false).await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
