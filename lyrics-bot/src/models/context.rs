use getset::Getters;
use log::info;
use lyrics_client::cache::SweepHandle;
use lyrics_client::{LyricsClient, LyricsOvh};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::config::Config;

#[derive(Getters)]
#[get = "pub"]
pub struct Context {
    lyrics_client: LyricsClient,
    config: Config,
    #[getset(skip)]
    sweeper: Mutex<Option<SweepHandle>>,
}

impl Context {
    /// Build the shared bot state and start the cache sweep.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: Config) -> Self {
        let provider = LyricsOvh::new(config.api_url().as_str());
        let lyrics_client = if *config.cache().enabled() {
            LyricsClient::with_cache(
                provider,
                config.cache().cache_config(),
                config.cache().deduplication_config(),
            )
        } else {
            LyricsClient::new(provider)
        };
        let sweeper = lyrics_client.start_sweeper();

        info!(
            "Initialized LyricsClient for {} (caching: {}, TTL: {}s, max entries: {})",
            lyrics_client.provider_name(),
            config.cache().enabled(),
            config.cache().ttl_secs(),
            config.cache().max_entries()
        );

        Self {
            lyrics_client,
            config,
            sweeper: Mutex::new(sweeper),
        }
    }

    /// Stop background work owned by the context
    pub async fn shutdown(&self) {
        if let Some(sweeper) = self.sweeper.lock().await.take() {
            info!("Stopping cache sweep");
            sweeper.shutdown().await;
        }
    }
}

pub type ContextPointer = Arc<Context>;
