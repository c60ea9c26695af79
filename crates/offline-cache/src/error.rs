//! Error types for the offline cache manager

use std::fmt;

use crate::lifecycle::WorkerState;

#[derive(Debug)]
pub enum OfflineCacheError {
    Http(Box<reqwest::Error>),
    Network(String),
    UnexpectedStatus(u16),
    InvalidUrl(String),
    InvalidRequest(String),
    Json(String),
    UnknownSyncTag(String),
    InvalidTransition {
        from: WorkerState,
        to: WorkerState,
    },
    Encoding(String),
    StoreFull(String),
}

impl fmt::Display for OfflineCacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfflineCacheError::Http(err) => write!(f, "HTTP error: {}", err),
            OfflineCacheError::Network(msg) => write!(f, "Network error: {}", msg),
            OfflineCacheError::UnexpectedStatus(status) => {
                write!(f, "Upstream returned status {}", status)
            }
            OfflineCacheError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
            OfflineCacheError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            OfflineCacheError::Json(msg) => write!(f, "JSON error: {}", msg),
            OfflineCacheError::UnknownSyncTag(tag) => write!(f, "Unknown sync tag: {}", tag),
            OfflineCacheError::InvalidTransition { from, to } => {
                write!(f, "Invalid worker state transition: {} -> {}", from, to)
            }
            OfflineCacheError::Encoding(msg) => write!(f, "Encoding error: {}", msg),
            OfflineCacheError::StoreFull(store) => {
                write!(f, "Store {} cannot hold more deferred requests", store)
            }
        }
    }
}

impl std::error::Error for OfflineCacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OfflineCacheError::Http(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl OfflineCacheError {
    /// Whether the error came from the transport rather than from a response
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            OfflineCacheError::Http(_) | OfflineCacheError::Network(_)
        )
    }
}

impl From<reqwest::Error> for OfflineCacheError {
    fn from(err: reqwest::Error) -> Self {
        OfflineCacheError::Http(Box::new(err))
    }
}

impl From<url::ParseError> for OfflineCacheError {
    fn from(err: url::ParseError) -> Self {
        OfflineCacheError::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for OfflineCacheError {
    fn from(err: serde_json::Error) -> Self {
        OfflineCacheError::Json(err.to_string())
    }
}

impl From<base64::DecodeError> for OfflineCacheError {
    fn from(err: base64::DecodeError) -> Self {
        OfflineCacheError::Encoding(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OfflineCacheError>;
