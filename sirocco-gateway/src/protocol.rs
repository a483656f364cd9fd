//! Framed wire protocol.
//!
//! Every frame is a self-describing keyed map `(method, seq?, body)`
//! encoded as MessagePack with field names preserved. Payload semantics
//! are handler-specific; the body is an arbitrary keyed-map / scalar /
//! array value.
//!
//! Frames carrying a `seq` participate in QoS-1 delivery; the peer
//! acknowledges them with an `ack` frame whose body is `{ "seq": n }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use sirocco_core::error::{ErrorCode, ErrorEnvelope};

/// Method name of acknowledgement frames.
pub const ACK_METHOD: &str = "ack";

/// Errors produced by the frame codec.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame could not be encoded.
    #[error("frame encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Inbound bytes were not a valid frame.
    #[error("frame decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// A single wire frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Routing method, e.g. `orders.place`.
    pub method: String,

    /// QoS-1 sequence number; absent on fire-and-forget frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,

    /// Handler-specific payload.
    #[serde(default)]
    pub body: Value,
}

impl Frame {
    /// Creates a fire-and-forget frame.
    #[must_use]
    pub fn new(method: impl Into<String>, body: Value) -> Self {
        Self {
            method: method.into(),
            seq: None,
            body,
        }
    }

    /// Attaches a QoS-1 sequence number.
    #[must_use]
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    /// Builds an acknowledgement frame for the given sequence.
    #[must_use]
    pub fn ack(seq: u64) -> Self {
        Self::new(ACK_METHOD, serde_json::json!({ "seq": seq }))
    }

    /// Builds an error-envelope frame under the given method.
    #[must_use]
    pub fn error(method: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        let envelope = ErrorEnvelope::new(code, message);
        // The envelope shape always serializes.
        let body = serde_json::to_value(envelope).unwrap_or(Value::Null);
        Self::new(method, body)
    }

    /// Returns true if this is an acknowledgement frame.
    #[must_use]
    pub fn is_ack(&self) -> bool {
        self.method == ACK_METHOD
    }

    /// Extracts the acknowledged sequence from an `ack` frame body.
    #[must_use]
    pub fn ack_seq(&self) -> Option<u64> {
        if !self.is_ack() {
            return None;
        }
        self.body.get("seq").and_then(Value::as_u64)
    }

    /// Encodes the frame as a named MessagePack map.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Decodes a frame from MessagePack bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let frame = Frame::new("orders.place", serde_json::json!({"qty": 1})).with_seq(7);
        let bytes = frame.encode().unwrap();
        let decoded = Frame::decode(&bytes).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.seq, Some(7));
    }

    #[test]
    fn test_seq_absent_on_fire_and_forget() {
        let frame = Frame::new("market.tick", serde_json::json!({"symbol": "BTC-USD"}));
        let decoded = Frame::decode(&frame.encode().unwrap()).unwrap();
        assert_eq!(decoded.seq, None);
    }

    #[test]
    fn test_ack_frame() {
        let ack = Frame::ack(42);
        assert!(ack.is_ack());
        assert_eq!(ack.ack_seq(), Some(42));

        let not_ack = Frame::new("hello", Value::Null);
        assert_eq!(not_ack.ack_seq(), None);
    }

    #[test]
    fn test_error_frame_shape() {
        let frame = Frame::error("orders.place", ErrorCode::RateLimitExceeded, "too fast");
        assert_eq!(frame.body["error"]["code"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(frame.body["error"]["message"], "too fast");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Frame::decode(&[0xff, 0x00, 0x13]).is_err());
    }

    #[test]
    fn test_field_names_preserved() {
        // Named encoding keeps the map keys on the wire; a peer without
        // our struct layout can still read them.
        let frame = Frame::new("hello", serde_json::json!({"clientId": "c1"}));
        let bytes = frame.encode().unwrap();
        let raw: serde_json::Value = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(raw["method"], "hello");
        assert_eq!(raw["body"]["clientId"], "c1");
    }
}
