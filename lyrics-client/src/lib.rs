pub mod cache;
pub mod deduplication;
mod error;
pub mod provider;
mod query;


use cache::{CacheConfig, CacheKey, LyricsCache, SharedLyricsCache, SweepHandle};
use deduplication::{DeduplicationConfig, RequestDeduplicator, SharedRequestDeduplicator};
pub use error::Error;
pub use provider::lyrics_ovh::LyricsOvh;
pub use provider::LyricsProvider;
pub use query::LyricsQuery;
use std::sync::Arc;

// Re-export cache types
pub use cache::CacheStats;
pub use deduplication::DeduplicationStats;

/// Looks up lyrics through a provider, with optional caching and
/// deduplication of concurrent identical lookups
#[derive(Clone)]
pub struct LyricsClient {
    provider: Arc<dyn LyricsProvider>,
    cache: Option<SharedLyricsCache>,
    deduplicator: Option<SharedRequestDeduplicator<String>>,
}

impl LyricsClient {
    /// Create a new LyricsClient with no caching or deduplication
    pub fn new(provider: impl LyricsProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
            cache: None,
            deduplicator: None,
        }
    }

    /// Create a new LyricsClient with caching and deduplication enabled
    pub fn with_cache(
        provider: impl LyricsProvider + 'static,
        cache_config: CacheConfig,
        deduplication_config: DeduplicationConfig,
    ) -> Self {
        Self {
            provider: Arc::new(provider),
            cache: Some(Arc::new(LyricsCache::new(cache_config))),
            deduplicator: Some(Arc::new(RequestDeduplicator::new(deduplication_config))),
        }
    }

    /// Look up the lyrics for a query.
    ///
    /// Cached lyrics are returned directly. Otherwise the lookup joins any
    /// in-flight fetch for the same song, and a successful fetch is cached.
    /// Failures are never cached.
    pub async fn lyrics(&self, query: &LyricsQuery) -> Result<String, Error> {
        let cache_key = CacheKey::from_query(query);

        // Try cache first
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&cache_key) {
                log::info!("Returning cached lyrics for: {}", cache_key);
                return Ok(cached);
            }
        }

        let fetch_key = cache_key.clone();
        let fetch = move || self.fetch_and_cache(fetch_key, query);

        match &self.deduplicator {
            Some(deduplicator) => deduplicator.execute(cache_key, fetch).await,
            None => fetch().await,
        }
    }

    /// Body of a single upstream fetch.
    ///
    /// Checks the cache once more, since a previous fetch may have stored the
    /// lyrics after this caller's first lookup missed.
    async fn fetch_and_cache(
        &self,
        key: CacheKey,
        query: &LyricsQuery,
    ) -> Result<String, Error> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&key) {
                log::debug!("Lyrics for {} were cached while waiting to fetch", key);
                return Ok(cached);
            }
        }

        let lyrics = self.provider.fetch(query).await?;
        if let Some(cache) = &self.cache {
            cache.put(key, lyrics.clone(), cache.config.ttl);
        }
        Ok(lyrics)
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Start the background cache sweep if caching is enabled
    pub fn start_sweeper(&self) -> Option<SweepHandle> {
        self.cache.as_ref().and_then(|cache| cache.spawn_sweeper())
    }

    /// Get cache statistics if caching is enabled
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }

    /// Get statistics about in-flight lookups if deduplication is enabled
    pub fn deduplication_stats(&self) -> Option<DeduplicationStats> {
        self.deduplicator.as_ref().map(|deduplicator| deduplicator.stats())
    }

    /// Clear cache if caching is enabled
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }
}
