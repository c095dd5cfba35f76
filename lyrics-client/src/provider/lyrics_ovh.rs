use super::LyricsProvider;
use crate::{Error, LyricsQuery};
use ::utils::surf_logging::SurfLogging;
use async_trait::async_trait;
use serde::Deserialize;
use surf::Client;

pub const DEFAULT_BASE_URL: &str = "https://api.lyrics.ovh/v1";

const NOT_FOUND_MARKER: &str = "No lyrics found";

/// Response body of the lyrics.ovh API
#[derive(Debug, Default, Deserialize)]
struct LyricsResponse {
    #[serde(default)]
    lyrics: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for https://lyrics.ovh
#[derive(Clone)]
pub struct LyricsOvh {
    http: Client,
    base_url: String,
}

impl Default for LyricsOvh {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl LyricsOvh {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new().with(SurfLogging),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/{artist}/{song}` with both segments percent-encoded
    pub fn request_url(&self, query: &LyricsQuery) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            urlencoding::encode(query.artist()),
            urlencoding::encode(query.song())
        )
    }
}

/// Map an HTTP status and body from the API onto the lookup outcome
pub(crate) fn interpret_response(status: u16, body: &str) -> Result<String, Error> {
    if status != 200 {
        if body.contains(NOT_FOUND_MARKER) {
            return Err(Error::NotFound);
        }
        return Err(Error::Upstream(format!(
            "API request failed with status {}: {}",
            status, body
        )));
    }

    let response: LyricsResponse = serde_json::from_str(body)?;
    match response {
        LyricsResponse {
            lyrics: Some(lyrics),
            ..
        } => Ok(lyrics),
        LyricsResponse { error: Some(_), .. } => Err(Error::NotFound),
        _ => Err(Error::Upstream("response contained no lyrics".to_string())),
    }
}

#[async_trait]
impl LyricsProvider for LyricsOvh {
    async fn fetch(&self, query: &LyricsQuery) -> Result<String, Error> {
        let url = self.request_url(query);

        let mut response = self
            .http
            .get(&url)
            .await
            .map_err(|e| Error::Upstream(format!("failed to make API request: {}", e)))?;
        let status = response.status() as u16;
        let body = response
            .body_string()
            .await
            .map_err(|e| Error::Upstream(format!("failed to read response body: {}", e)))?;

        let result = interpret_response(status, &body);
        if let Err(err) = &result {
            log::debug!("{} lookup for {:?} failed: {}", self.name(), query, err);
        }
        result
    }

    fn name(&self) -> &'static str {
        "lyrics.ovh"
    }
}
