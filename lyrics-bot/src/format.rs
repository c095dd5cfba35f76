//! Discord markdown for bot replies.

use lyrics_client::{Error, LyricsClient, LyricsQuery};

/// Song title as a level 1 header, artist as a level 2 header, lyrics as plain text
pub fn format_song(title: &str, artist: &str, lyrics: &str) -> String {
    format!("# {}\n## By {}\n\n{}", title, artist, lyrics)
}

pub fn format_error(msg: &str) -> String {
    format!("# Error!!!\n{}", msg)
}

/// Turn a lookup outcome into the text sent back to the user
pub fn format_reply(query: &LyricsQuery, result: &Result<String, Error>) -> String {
    match result {
        Ok(lyrics) => format_song(query.song(), query.artist(), lyrics),
        Err(Error::NotFound) => {
            log::info!("Song not found by API: {:?}", query);
            format_error(&format!(
                "Song `{}` by `{}` **not found**",
                query.song(),
                query.artist()
            ))
        }
        Err(err) => {
            log::error!("Error fetching from lyrics API: {}", err);
            format_error("Internal error, could not fetch from lyrics API")
        }
    }
}

/// Look up `query` and format whatever comes back
pub async fn lyrics_reply(client: &LyricsClient, query: &LyricsQuery) -> String {
    let result = client.lyrics(query).await;
    format_reply(query, &result)
}
