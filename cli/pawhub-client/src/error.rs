//! Error handling for shelter service operations.

use thiserror::Error;

/// Common error type for shelter API calls.
///
/// Classification drives control flow: [ApiError::AuthRequired] is never
/// retried and tells the caller to route the user through the login flow,
/// while transient failures are retried inside the client and only surface
/// as [ApiError::ExhaustedRetries] once the retry budget is spent.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not authenticated with the shelter service")]
    AuthRequired,
    #[error("request failed after {attempts} attempts")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        source: TransientError,
    },
    #[error("invalid request url")]
    InvalidUrl(#[source] url::ParseError),
    #[error("failed to parse response")]
    Response(#[source] reqwest::Error),
    #[error("{0}")]
    Other(String),
}

/// One failed attempt inside the retry loop.
#[derive(Debug, Error)]
pub enum TransientError {
    #[error("request failed")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),
}

/// Errors produced by search execution.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("minimum age {min} exceeds maximum age {max}")]
    InvalidAgeRange { min: u32, max: u32 },
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors produced by match derivation.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Rejected before any network call is made.
    #[error("no favorites to match from")]
    NoFavorites,
    #[error("no dogs available to match")]
    NoCandidates,
    #[error("matched dog {0} could not be resolved")]
    UnresolvedMatch(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}
