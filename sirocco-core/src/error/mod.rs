//! Wire-level error codes and the error envelope.
//!
//! Every logical failure crossing the wire is expressed as
//! `{ "error": { "code": ..., "message": ... } }`; the connection itself is
//! never terminated for a logical error.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The closed set of wire error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed payload, missing required field, out-of-range value.
    #[error("invalid parameters")]
    InvalidParams,
    /// Token rejected.
    #[error("authentication failed")]
    AuthFailed,
    /// Protected method on an unauthenticated session.
    #[error("authentication required")]
    AuthRequired,
    /// Per-session throttling policy fired.
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    /// No handler registered for the method.
    #[error("unknown method")]
    UnknownMethod,
    /// Collaborator not reachable.
    #[error("service unavailable")]
    ServiceUnavailable,
    /// Collaborator reachable but the query errored.
    #[error("query failed")]
    QueryFailed,
    /// Query succeeded but produced nothing.
    #[error("no data")]
    NoData,
    /// Uncaught fault at the dispatcher boundary.
    #[error("internal error")]
    InternalError,
}

impl ErrorCode {
    /// Returns the stable wire string for this code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidParams => "INVALID_PARAMS",
            Self::AuthFailed => "AUTH_FAILED",
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::UnknownMethod => "UNKNOWN_METHOD",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::QueryFailed => "QUERY_FAILED",
            Self::NoData => "NO_DATA",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// The `{ error: { code, message } }` wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Error payload.
    pub error: ErrorBody,
}

/// Inner body of the error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ErrorEnvelope {
    /// Creates an envelope from a code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error.code.as_str(), self.error.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_wire_strings() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::RateLimitExceeded).unwrap(),
            "\"RATE_LIMIT_EXCEEDED\""
        );
        assert_eq!(ErrorCode::InvalidParams.as_str(), "INVALID_PARAMS");
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = ErrorEnvelope::new(ErrorCode::UnknownMethod, "no such method: foo");
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["error"]["code"], "UNKNOWN_METHOD");
        assert_eq!(json["error"]["message"], "no such method: foo");
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = ErrorEnvelope::new(ErrorCode::NoData, "empty");
        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: ErrorEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.error.code, ErrorCode::NoData);
    }
}
