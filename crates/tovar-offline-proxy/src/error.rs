//! Error types for the Tovar Taxi offline proxy

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use offline_cache::OfflineCacheError;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum ProxyError {
    Cache(OfflineCacheError),
    BadRequest(String),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Cache(err) => write!(f, "Cache error: {}", err),
            ProxyError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ProxyError::Io(err) => write!(f, "IO error: {}", err),
            ProxyError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::Cache(err) => Some(err),
            ProxyError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Cache(OfflineCacheError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            ProxyError::Cache(OfflineCacheError::UnknownSyncTag(_))
            | ProxyError::Cache(OfflineCacheError::InvalidRequest(_))
            | ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Cache(OfflineCacheError::StoreFull(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Cache(err) if err.is_network() => StatusCode::BAD_GATEWAY,
            ProxyError::Cache(OfflineCacheError::UnexpectedStatus(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Internal server error");
            "Internal server error".to_string()
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request failed");
            self.to_string()
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

impl From<OfflineCacheError> for ProxyError {
    fn from(err: OfflineCacheError) -> Self {
        ProxyError::Cache(err)
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ProxyError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ProxyError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
