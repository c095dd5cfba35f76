//! Parsing of `!lyrics <song> by <artist>` messages.

use lyrics_client::LyricsQuery;
use thiserror::Error;

pub const PING: &str = "!lyrics";

const BY: &[u8] = b" by ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Incorrect command format. The correct format is !lyrics <song> by <artist>")]
    IncorrectFormat,
}

/// Parse a chat message.
///
/// Returns `None` unless the first word is exactly `!lyrics`. The song and
/// artist are split on the last ` by `, so titles such as "Stand by Me" work.
pub fn parse(content: &str) -> Option<Result<LyricsQuery, ParseError>> {
    let content = content.trim();
    let (ping, rest) = content
        .split_once(char::is_whitespace)
        .unwrap_or((content, ""));

    if ping != PING {
        return None;
    }

    Some(parse_query(rest.trim()))
}

fn parse_query(rest: &str) -> Result<LyricsQuery, ParseError> {
    // The separator is ASCII, so any match starts on a char boundary
    let at = rest
        .as_bytes()
        .windows(BY.len())
        .rposition(|window| window.eq_ignore_ascii_case(BY))
        .ok_or(ParseError::IncorrectFormat)?;

    let song = rest[..at].trim();
    let artist = rest[at + BY.len()..].trim();
    if song.is_empty() || artist.is_empty() {
        return Err(ParseError::IncorrectFormat);
    }

    Ok(LyricsQuery::new(song, artist))
}
