use thiserror::Error;

/// Errors surfaced by the store, the normalizer and the AI client.
///
/// None of these are retried internally; each one degrades a single user
/// action and is reported once to the caller.
#[derive(Error, Debug)]
pub enum CinemaError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API key is missing")]
    CredentialMissing,

    #[error("API key was rejected: {0}")]
    CredentialInvalid(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for CinemaError {
    fn from(err: std::io::Error) -> Self {
        CinemaError::StorageUnavailable(err.to_string())
    }
}

impl From<reqwest::Error> for CinemaError {
    fn from(err: reqwest::Error) -> Self {
        // request URLs stay out of error text
        CinemaError::UpstreamUnavailable(err.without_url().to_string())
    }
}

pub type Result<T> = std::result::Result<T, CinemaError>;
