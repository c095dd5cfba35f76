use chrono::Duration;
use futures::future::join_all;
use lyrics_client::cache::CacheConfig;
use lyrics_client::deduplication::DeduplicationConfig;
use lyrics_client::{LyricsClient, LyricsOvh, LyricsQuery};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    let client = LyricsClient::with_cache(
        LyricsOvh::default(),
        CacheConfig::new(Duration::minutes(10), 500, std::time::Duration::from_secs(60)),
        DeduplicationConfig::default(),
    );
    let sweeper = client.start_sweeper();
    let query = LyricsQuery::new("Imagine", "John Lennon");

    // Concurrent lookups share one upstream request
    let start = std::time::Instant::now();
    let lookups = (0..5).map(|_| client.lyrics(&query));
    let results = join_all(lookups).await;
    println!("5 concurrent lookups took: {:?}", start.elapsed());
    println!("All identical: {}", results.windows(2).all(|w| w[0] == w[1]));

    // Second round is served from cache
    let start = std::time::Instant::now();
    let cached = client.lyrics(&LyricsQuery::new("IMAGINE", "john lennon")).await;
    println!("Cached lookup took: {:?}", start.elapsed());

    match cached {
        Ok(lyrics) => println!("{}", lyrics.lines().next().unwrap_or_default()),
        Err(err) => println!("Lookup failed: {}", err),
    }

    if let Some(stats) = client.cache_stats() {
        println!("Cache stats: {:?}", stats);
    }

    if let Some(sweeper) = sweeper {
        sweeper.shutdown().await;
    }
    Ok(())
}
