use thiserror::Error;

/// Outcome of a failed lyrics lookup.
///
/// `Clone` so a single fetch result can be handed to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The upstream API has no lyrics for the query
    #[error("song not found")]
    NotFound,
    /// Transport, status or parse failure talking to the upstream API
    #[error("upstream lookup failed: {0}")]
    Upstream(String),
    /// The fetch did not finish within the configured timeout
    #[error("upstream lookup timed out")]
    Timeout,
    /// The fetch driving this key was dropped before it produced a result
    #[error("in-flight fetch was abandoned")]
    FetchAbandoned,
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Upstream(format!("failed to parse JSON: {}", err))
    }
}
