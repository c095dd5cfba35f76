use crate::{cache::CacheKey, Error};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Configuration for request deduplication
#[derive(Clone, Debug)]
pub struct DeduplicationConfig {
    /// Upper bound on a single upstream fetch; `None` waits indefinitely
    pub request_timeout: Option<Duration>,
    /// Whether deduplication is enabled
    pub enabled: bool,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            request_timeout: None,
            enabled: true,
        }
    }
}

type Outcome<T> = Option<Result<T, Error>>;

/// A fetch currently running for some key
struct InFlight<T> {
    started_at: DateTime<Utc>,
    waiters: usize,
    result: watch::Receiver<Outcome<T>>,
}

/// Removes the in-flight entry when the leader finishes or is dropped
struct LeaderGuard<'a, T> {
    pending: &'a DashMap<CacheKey, InFlight<T>>,
    key: &'a CacheKey,
}

impl<T> Drop for LeaderGuard<'_, T> {
    fn drop(&mut self) {
        self.pending.remove(self.key);
    }
}

/// Withdraws a waiter from the count of the generation it joined, whether it
/// got a result or was cancelled
struct WaiterGuard<'a, T> {
    pending: &'a DashMap<CacheKey, InFlight<T>>,
    key: &'a CacheKey,
    generation: watch::Receiver<Outcome<T>>,
}

impl<T> Drop for WaiterGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(mut in_flight) = self.pending.get_mut(self.key) {
            if in_flight.result.same_channel(&self.generation) {
                in_flight.waiters = in_flight.waiters.saturating_sub(1);
            }
        }
    }
}

enum Role<T> {
    Leader(watch::Sender<Outcome<T>>),
    Waiter(watch::Receiver<Outcome<T>>),
}

/// Request deduplication system.
///
/// When multiple identical requests come in, only the first one is executed
/// and its result, success or error, is shared with everyone who joined while
/// it ran. Once it completes the key is idle again and the next request starts
/// a fresh fetch.
pub struct RequestDeduplicator<T> {
    pending: DashMap<CacheKey, InFlight<T>>,
    config: DeduplicationConfig,
}

impl<T: Clone> RequestDeduplicator<T> {
    pub fn new(config: DeduplicationConfig) -> Self {
        Self {
            pending: DashMap::new(),
            config,
        }
    }

    /// Run `fetch_fn` for `key` unless a fetch for it is already in flight,
    /// in which case wait for that one and return its result.
    pub async fn execute<F, Fut>(&self, key: CacheKey, fetch_fn: F) -> Result<T, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        if !self.config.enabled {
            return self.run_fetch(fetch_fn).await;
        }

        // Claim or join under the shard lock so two callers can never both lead
        let role = match self.pending.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let in_flight = entry.get_mut();
                in_flight.waiters += 1;
                log::debug!(
                    "Request already pending for key: {} ({} waiters)",
                    key,
                    in_flight.waiters
                );
                Role::Waiter(in_flight.result.clone())
            }
            Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(None);
                entry.insert(InFlight {
                    started_at: Utc::now(),
                    waiters: 0,
                    result: rx,
                });
                Role::Leader(tx)
            }
        };

        match role {
            Role::Waiter(rx) => {
                let _guard = WaiterGuard {
                    pending: &self.pending,
                    key: &key,
                    generation: rx.clone(),
                };
                Self::wait_for(&key, rx).await
            }
            Role::Leader(tx) => {
                log::debug!("Executing new request for key: {}", key);
                let guard = LeaderGuard {
                    pending: &self.pending,
                    key: &key,
                };

                let result = self.run_fetch(fetch_fn).await;

                // Publish before clearing so anyone who joined still sees this generation
                tx.send_replace(Some(result.clone()));
                drop(guard);

                result
            }
        }
    }

    async fn run_fetch<F, Fut>(&self, fetch_fn: F) -> Result<T, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch_fn())
                .await
                .unwrap_or(Err(Error::Timeout)),
            None => fetch_fn().await,
        }
    }

    async fn wait_for(key: &CacheKey, mut rx: watch::Receiver<Outcome<T>>) -> Result<T, Error> {
        loop {
            if let Some(result) = rx.borrow_and_update().as_ref() {
                log::debug!("Received deduplicated result for key: {}", key);
                return result.clone();
            }
            if rx.changed().await.is_err() {
                log::warn!("Leader dropped for key: {}", key);
                return Err(Error::FetchAbandoned);
            }
        }
    }

    /// Get statistics about pending requests
    pub fn stats(&self) -> DeduplicationStats {
        let now = Utc::now();
        let mut stats = DeduplicationStats::default();

        for entry in self.pending.iter() {
            stats.pending_requests += 1;
            stats.total_waiters += entry.value().waiters;
            let age = (now - entry.value().started_at).to_std().unwrap_or_default();
            stats.oldest_pending = stats.oldest_pending.max(Some(age));
        }

        stats
    }

    pub fn is_pending(&self, key: &CacheKey) -> bool {
        self.pending.contains_key(key)
    }
}

/// Statistics for request deduplication
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeduplicationStats {
    pub pending_requests: usize,
    /// Callers currently waiting on a leader, excluding the leaders themselves
    pub total_waiters: usize,
    pub oldest_pending: Option<Duration>,
}

/// Thread-safe wrapper for the deduplicator
pub type SharedRequestDeduplicator<T> = Arc<RequestDeduplicator<T>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn deduplicator() -> SharedRequestDeduplicator<String> {
        Arc::new(RequestDeduplicator::new(DeduplicationConfig::default()))
    }

    #[tokio::test]
    async fn test_request_deduplication() {
        let deduplicator = deduplicator();
        let execution_count = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::new("test", "artist");

        // Execute multiple identical requests concurrently
        let mut handles = vec![];
        for _ in 0..5 {
            let deduplicator = deduplicator.clone();
            let key = key.clone();
            let execution_count = execution_count.clone();

            handles.push(tokio::spawn(async move {
                deduplicator
                    .execute(key, || async move {
                        execution_count.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok("lyrics".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok("lyrics".to_string()));
        }

        // Should have executed only once due to deduplication
        assert_eq!(execution_count.load(Ordering::SeqCst), 1);
        assert!(!deduplicator.is_pending(&key));
    }

    #[tokio::test]
    async fn test_simultaneous_slow_fetch_shares_result() {
        let deduplicator = deduplicator();
        let execution_count = Arc::new(AtomicUsize::new(0));

        let slow_fetch = |count: Arc<AtomicUsize>| {
            move || async move {
                count.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok("shared".to_string())
            }
        };

        let start = Instant::now();
        let (first, second) = tokio::join!(
            deduplicator.execute(CacheKey::from("a:b"), slow_fetch(execution_count.clone())),
            deduplicator.execute(CacheKey::from("a:b"), slow_fetch(execution_count.clone())),
        );
        let elapsed = start.elapsed();

        assert_eq!(first, second);
        assert_eq!(first, Ok("shared".to_string()));
        assert_eq!(execution_count.load(Ordering::SeqCst), 1);
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_error_shared_with_all_waiters() {
        let deduplicator = deduplicator();
        let execution_count = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::new("broken", "upstream");

        let mut handles = vec![];
        for _ in 0..4 {
            let deduplicator = deduplicator.clone();
            let key = key.clone();
            let execution_count = execution_count.clone();

            handles.push(tokio::spawn(async move {
                deduplicator
                    .execute(key, || async move {
                        execution_count.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err::<String, _>(Error::Upstream("status 500".to_string()))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(
                handle.await.unwrap(),
                Err(Error::Upstream("status 500".to_string()))
            );
        }
        assert_eq!(execution_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_keys_not_deduplicated() {
        let deduplicator = deduplicator();
        let execution_count = Arc::new(AtomicUsize::new(0));

        let count1 = execution_count.clone();
        let count2 = execution_count.clone();
        let (r1, r2) = tokio::join!(
            deduplicator.execute(CacheKey::new("test1", "x"), || async move {
                count1.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok("one".to_string())
            }),
            deduplicator.execute(CacheKey::new("test2", "x"), || async move {
                count2.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok("two".to_string())
            }),
        );

        assert_eq!(r1, Ok("one".to_string()));
        assert_eq!(r2, Ok("two".to_string()));
        assert_eq!(execution_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_next_generation_fetches_again() {
        let deduplicator = deduplicator();
        let execution_count = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::new("again", "x");

        for _ in 0..2 {
            let count = execution_count.clone();
            let result = deduplicator
                .execute(key.clone(), || async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok("value".to_string())
                })
                .await;
            assert_eq!(result, Ok("value".to_string()));
        }

        assert_eq!(execution_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_reported_to_every_waiter() {
        let deduplicator = Arc::new(RequestDeduplicator::<String>::new(DeduplicationConfig {
            request_timeout: Some(Duration::from_millis(30)),
            enabled: true,
        }));
        let key = CacheKey::new("stalled", "upstream");

        let stalled = || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok("never".to_string())
        };
        let (r1, r2) = tokio::join!(
            deduplicator.execute(key.clone(), stalled),
            deduplicator.execute(key.clone(), stalled),
        );

        assert_eq!(r1, Err(Error::Timeout));
        assert_eq!(r2, Err(Error::Timeout));
        assert!(!deduplicator.is_pending(&key));
    }

    #[tokio::test]
    async fn test_cancelled_leader_releases_waiters() {
        let deduplicator = deduplicator();
        let key = CacheKey::new("cancelled", "leader");

        let leader = {
            let deduplicator = deduplicator.clone();
            let key = key.clone();
            tokio::spawn(async move {
                deduplicator
                    .execute(key, || async {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        Ok("never".to_string())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(deduplicator.is_pending(&key));

        let waiter = {
            let deduplicator = deduplicator.clone();
            let key = key.clone();
            tokio::spawn(async move {
                deduplicator
                    .execute(key, || async { Ok("unused".to_string()) })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(deduplicator.stats().total_waiters, 1);

        leader.abort();

        assert_eq!(waiter.await.unwrap(), Err(Error::FetchAbandoned));
        assert!(!deduplicator.is_pending(&key));
    }

    #[tokio::test]
    async fn test_cancelled_waiter_leaves_count() {
        let deduplicator = deduplicator();
        let key = CacheKey::new("impatient", "caller");

        let leader = {
            let deduplicator = deduplicator.clone();
            let key = key.clone();
            tokio::spawn(async move {
                deduplicator
                    .execute(key, || async {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok("eventually".to_string())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let waiter = {
            let deduplicator = deduplicator.clone();
            let key = key.clone();
            tokio::spawn(async move {
                deduplicator
                    .execute(key, || async { Ok("unused".to_string()) })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(deduplicator.stats().total_waiters, 1);

        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());

        let stats = deduplicator.stats();
        assert_eq!(stats.pending_requests, 1);
        assert_eq!(stats.total_waiters, 0);

        assert_eq!(leader.await.unwrap(), Ok("eventually".to_string()));
        assert!(!deduplicator.is_pending(&key));
    }

    #[tokio::test]
    async fn test_finished_waiters_leave_count() {
        let deduplicator = deduplicator();
        let key = CacheKey::new("patient", "callers");

        let slow = || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok("done".to_string())
        };
        let (r1, r2, r3) = tokio::join!(
            deduplicator.execute(key.clone(), slow),
            deduplicator.execute(key.clone(), slow),
            deduplicator.execute(key.clone(), slow),
        );

        assert_eq!(r1, r2);
        assert_eq!(r2, r3);
        assert_eq!(deduplicator.stats(), DeduplicationStats::default());
    }

    #[tokio::test]
    async fn test_disabled_runs_every_fetch() {
        let deduplicator = Arc::new(RequestDeduplicator::<String>::new(DeduplicationConfig {
            request_timeout: None,
            enabled: false,
        }));
        let execution_count = Arc::new(AtomicUsize::new(0));

        let count1 = execution_count.clone();
        let count2 = execution_count.clone();
        let _ = tokio::join!(
            deduplicator.execute(CacheKey::from("a:b"), || async move {
                count1.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok("x".to_string())
            }),
            deduplicator.execute(CacheKey::from("a:b"), || async move {
                count2.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok("x".to_string())
            }),
        );

        assert_eq!(execution_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stats_track_pending_requests() {
        let deduplicator = deduplicator();
        assert_eq!(deduplicator.stats(), DeduplicationStats::default());

        let handle = {
            let deduplicator = deduplicator.clone();
            tokio::spawn(async move {
                deduplicator
                    .execute(CacheKey::from("slow:one"), || async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok("done".to_string())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stats = deduplicator.stats();
        assert_eq!(stats.pending_requests, 1);
        assert_eq!(stats.total_waiters, 0);
        assert!(stats.oldest_pending.is_some());

        handle.await.unwrap().unwrap();
        assert_eq!(deduplicator.stats().pending_requests, 0);
    }
}
