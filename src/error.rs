//! Error types for ytscribe.

use thiserror::Error;

/// Classification of a failed transcript fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Malformed video ID. Never retried.
    InvalidInput,
    /// The upstream confirmed there are no captions. Never retried.
    NotAvailable,
    /// The upstream explicitly signalled throttling.
    UpstreamRateLimited,
    /// Network or parse failure.
    TransportFailure,
    /// A deadline elapsed.
    Timeout,
}

impl FetchErrorKind {
    /// Whether another attempt can change the outcome.
    pub fn is_retryable(self) -> bool {
        matches!(self, FetchErrorKind::TransportFailure | FetchErrorKind::Timeout)
    }
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchErrorKind::InvalidInput => write!(f, "invalid input"),
            FetchErrorKind::NotAvailable => write!(f, "not available"),
            FetchErrorKind::UpstreamRateLimited => write!(f, "rate limited"),
            FetchErrorKind::TransportFailure => write!(f, "transport failure"),
            FetchErrorKind::Timeout => write!(f, "timeout"),
        }
    }
}

/// A classified transcript fetch failure.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::InvalidInput, message)
    }

    pub fn not_available(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::NotAvailable, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::UpstreamRateLimited, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::TransportFailure, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Timeout, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return FetchError::timeout(format!("Upstream request timed out: {}", e));
        }

        match e.status().map(|s| s.as_u16()) {
            Some(429) => FetchError::rate_limited(format!("Upstream returned 429: {}", e)),
            Some(404) | Some(410) => FetchError::not_available(format!("Upstream returned not found: {}", e)),
            _ => FetchError::transport(format!("HTTP error: {}", e)),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::transport(format!("Malformed upstream JSON: {}", e))
    }
}

/// Library-level error type for ytscribe operations.
#[derive(Error, Debug)]
pub enum ScribeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transcript fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),
}

/// Result type alias for ytscribe operations.
pub type Result<T> = std::result::Result<T, ScribeError>;
