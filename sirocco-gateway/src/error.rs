//! Gateway error types.
//!
//! Handlers return [`GatewayError`]; the dispatcher converts it into the
//! wire error envelope. The connection is never terminated for a logical
//! error.

use thiserror::Error;

use sirocco_core::error::{ErrorCode, ErrorEnvelope};

use crate::collab::CollabError;
use crate::session::SessionId;

/// Gateway-level error carrying a wire error code.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed payload or missing required field.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Token rejected.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No handler registered for the method.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// Collaborator not reachable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Collaborator reachable but the query errored.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Query produced nothing.
    #[error("no data: {0}")]
    NoData(String),

    /// Session referenced after destruction.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the wire error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidParams(_) => ErrorCode::InvalidParams,
            Self::AuthFailed(_) => ErrorCode::AuthFailed,
            Self::UnknownMethod(_) => ErrorCode::UnknownMethod,
            Self::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
            Self::QueryFailed(_) => ErrorCode::QueryFailed,
            Self::NoData(_) => ErrorCode::NoData,
            Self::UnknownSession(_) | Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Converts into the wire envelope.
    #[must_use]
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.code(), self.to_string())
    }
}

impl From<CollabError> for GatewayError {
    fn from(err: CollabError) -> Self {
        match err {
            CollabError::Unavailable(reason) => Self::ServiceUnavailable(reason),
            CollabError::Query(reason) => Self::QueryFailed(reason),
        }
    }
}

/// Result alias for handler bodies.
pub type HandlerResult = Result<serde_json::Value, GatewayError>;

/// Decodes a typed request from a frame body, mapping decode failures to
/// `INVALID_PARAMS`.
pub fn decode_request<T: serde::de::DeserializeOwned>(
    body: serde_json::Value,
) -> Result<T, GatewayError> {
    serde_json::from_value(body).map_err(|e| GatewayError::InvalidParams(e.to_string()))
}
