pub mod lyrics_ovh;

use crate::{Error, LyricsQuery};
use async_trait::async_trait;

/// An upstream service able to look up the lyrics for a song
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Fetch plain-text lyrics, or `Error::NotFound` when the service has none
    async fn fetch(&self, query: &LyricsQuery) -> Result<String, Error>;

    fn name(&self) -> &'static str;
}
