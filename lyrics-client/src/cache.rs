use crate::LyricsQuery;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration as StdDuration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Configuration for the cache system
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// How long to keep lyrics in cache
    pub ttl: Duration,
    /// How often the background sweep evicts expired entries
    pub sweep_interval: StdDuration,
    /// Maximum number of cached entries
    pub max_entries: usize,
    /// Whether caching is enabled
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(10),
            sweep_interval: StdDuration::from_secs(5 * 60),
            max_entries: 1000,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration
    pub fn new(ttl: Duration, max_entries: usize, sweep_interval: StdDuration) -> Self {
        Self {
            ttl,
            sweep_interval,
            max_entries,
            enabled: true,
        }
    }
}

/// Cached lyrics with expiry metadata
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(value: String, ttl: Duration) -> Self {
        let created_at = Utc::now();
        Self {
            value,
            created_at,
            // TTLs past the representable range never expire
            expires_at: created_at
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        !self.is_expired_at(Utc::now())
    }
}

/// Normalized identifier for a song/artist pair
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub struct CacheKey(String);

impl CacheKey {
    pub const SEPARATOR: char = ':';

    /// Build the key for a song/artist pair; letter case never matters
    pub fn new(song: &str, artist: &str) -> Self {
        Self(format!(
            "{}{}{}",
            song.to_lowercase(),
            Self::SEPARATOR,
            artist.to_lowercase()
        ))
    }

    pub fn from_query(query: &LyricsQuery) -> Self {
        Self::new(query.song(), query.artist())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    /// Wraps an already normalized key verbatim
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// In-memory cache implementation using DashMap for thread safety
pub struct LyricsCache {
    cache: DashMap<CacheKey, CacheEntry>,
    pub config: CacheConfig,
}

impl LyricsCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: DashMap::new(),
            config,
        }
    }

    /// Get cached lyrics if present and not expired
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        if !self.config.enabled {
            return None;
        }

        if let Some(cached) = self.cache.get(key) {
            if cached.is_valid() {
                log::debug!("Cache hit for key: {}", key);
                return Some(cached.value.clone());
            }
        } else {
            log::debug!("Cache miss for key: {}", key);
            return None;
        }

        // The read guard is released by now; removing under it would deadlock the shard
        log::debug!("Cache expired for key: {}", key);
        self.cache.remove_if(key, |_, entry| !entry.is_valid());
        None
    }

    /// Store lyrics in cache, replacing any previous entry for the key
    pub fn put(&self, key: CacheKey, value: String, ttl: Duration) {
        if !self.config.enabled || self.config.max_entries == 0 {
            return;
        }

        if !self.cache.contains_key(&key) && self.cache.len() >= self.config.max_entries {
            self.evict_expired();

            if self.cache.len() >= self.config.max_entries {
                self.evict_oldest();
            }
        }

        log::debug!("Stored in cache with key: {}", key);
        self.cache.insert(key, CacheEntry::new(value, ttl));
    }

    /// Remove expired entries from cache, returning how many were dropped
    pub fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let mut evicted = 0;

        self.cache.retain(|_, entry| {
            let keep = !entry.is_expired_at(now);
            if !keep {
                evicted += 1;
            }
            keep
        });

        log::debug!("Evicted {} expired cache entries", evicted);
        evicted
    }

    /// Remove oldest entries when at capacity
    fn evict_oldest(&self) {
        let mut entries: Vec<_> = self
            .cache
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().created_at))
            .collect();

        entries.sort_by_key(|(_, created_at)| *created_at);

        // Remove oldest 25% of entries
        let to_remove = (self.config.max_entries / 4).max(1);
        for (key, _) in entries.into_iter().take(to_remove) {
            self.cache.remove(&key);
        }

        log::debug!("Evicted {} oldest cache entries", to_remove);
    }

    /// Clear all cache entries
    pub fn clear(&self) {
        self.cache.clear();
        log::info!("Cache cleared");
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let total_entries = self.cache.len();
        let expired_entries = self
            .cache
            .iter()
            .filter(|entry| entry.value().is_expired_at(now))
            .count();

        CacheStats {
            total_entries,
            valid_entries: total_entries.saturating_sub(expired_entries),
            expired_entries,
            max_entries: self.config.max_entries,
        }
    }

    /// Spawn the periodic sweep on the current tokio runtime.
    ///
    /// The task holds only a weak reference, so it also ends once the cache is
    /// dropped. Returns `None` when the cache is disabled or the interval is zero.
    pub fn spawn_sweeper(self: &Arc<Self>) -> Option<SweepHandle> {
        let period = self.config.sweep_interval;
        if !self.config.enabled || period.is_zero() {
            log::info!("Cache sweep disabled");
            return None;
        }

        let cache = Arc::downgrade(self);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(sweep_loop(cache, period, shutdown_rx));

        log::info!("Started cache sweep every {:?}", period);
        Some(SweepHandle {
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }
}

async fn sweep_loop(
    cache: Weak<LyricsCache>,
    period: StdDuration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut interval = tokio::time::interval(period);
    // Skip the first tick (immediate)
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let Some(cache) = cache.upgrade() else {
                    log::debug!("Cache dropped, stopping sweep");
                    break;
                };
                let evicted = cache.evict_expired();
                if evicted > 0 {
                    log::info!(
                        "Cache sweep evicted {} entries, {} remaining",
                        evicted,
                        cache.len()
                    );
                }
            }
            _ = &mut shutdown_rx => {
                log::debug!("Cache sweep shutting down");
                break;
            }
        }
    }
}

/// Owns the background sweep task; dropping it stops the sweep
pub struct SweepHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Signal the sweep to stop and wait for it to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(err) = (&mut self.task).await {
            log::warn!("Cache sweep task ended abnormally: {}", err);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub max_entries: usize,
}

/// Thread-safe wrapper for the cache
pub type SharedLyricsCache = Arc<LyricsCache>;
