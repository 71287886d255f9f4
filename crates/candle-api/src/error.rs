//! Error types for the candle API client.

use std::fmt;

/// Result type alias for candle API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the candle API client.
#[derive(Debug)]
pub enum Error {
    /// HTTP request failed
    Http(reqwest::Error),
    /// JSON serialization/deserialization error
    Json(serde_json::Error),
    /// Endpoint answered with a non-success status
    Api {
        /// HTTP status code
        status: u16,
        /// Error detail taken from the response body
        body: String,
    },
    /// Backend reported a storage failure through the `X-DB-Error` header
    Storage(String),
    /// Invalid parameter provided
    InvalidParameter(String),
    /// Timeout waiting for response
    Timeout,
    /// URL parsing error
    UrlParse(url::ParseError),
}

impl Error {
    /// True for failures a caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::Timeout | Error::Storage(_) => true,
            Error::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::UrlParse(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
            Error::Api { status, body } => write!(f, "API error [{status}]: {body}"),
            Error::Storage(msg) => write!(f, "Backend storage error: {msg}"),
            Error::InvalidParameter(msg) => write!(f, "Invalid parameter: {msg}"),
            Error::Timeout => write!(f, "Request timed out"),
            Error::UrlParse(e) => write!(f, "URL parse error: {e}"),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(err)
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::UrlParse(err)
    }
}
