//! Authentication and handshake identity extraction.
//!
//! This module provides:
//! - [`TokenVerifier`] - the demo pattern-based token contract
//! - [`SessionToken`] - the 16-byte resumable-session token
//! - [`HandshakeInspector`] - identity extraction and authorization for
//!   the connection handshake

use sha2::{Digest, Sha256};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Stable reason string returned when the handshake is rejected.
pub const HANDSHAKE_REJECT_REASON: &str = "trading authentication failed";

/// A verified principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Resolved user id.
    pub user_id: String,
    /// Granted roles, most privileged first.
    pub roles: Vec<String>,
}

impl Principal {
    /// Returns true if the principal carries the given role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Demo token verifier.
///
/// Tokens are opaque strings mapped by pattern; an empty token always
/// fails.
#[derive(Debug, Clone, Default)]
pub struct TokenVerifier;

impl TokenVerifier {
    /// Verifies a token, returning the principal it names.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<Principal> {
        if token.is_empty() {
            return None;
        }

        let (user_id, roles): (&str, &[&str]) = if token.contains("admin") {
            ("admin-user-789", &["admin", "trader", "viewer"])
        } else if token.contains("trader") {
            ("trader-user-123", &["trader", "viewer"])
        } else if token.contains("viewer") {
            ("viewer-user-456", &["viewer"])
        } else if token.contains("demo") {
            ("demo-user-001", &["viewer"])
        } else {
            let prefix: String = token.chars().take(8).collect();
            return Some(Principal {
                user_id: format!("authenticated-user-{prefix}"),
                roles: vec!["viewer".to_string()],
            });
        };

        Some(Principal {
            user_id: user_id.to_string(),
            roles: roles.iter().map(ToString::to_string).collect(),
        })
    }
}

/// A 16-byte session-resume token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(pub [u8; 16]);

impl SessionToken {
    /// Derives a token from the first 128 bits of
    /// `SHA-256(userId ":" deviceId ":" nowMs ":" secret)`.
    #[must_use]
    pub fn generate(user_id: &str, device_id: i64, secret: &str) -> Self {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let raw = format!("{user_id}:{device_id}:{now_ms}:{secret}");
        let digest = Sha256::digest(raw.as_bytes());
        let mut token = [0u8; 16];
        token.copy_from_slice(&digest[..16]);
        Self(token)
    }

    /// Parses the 32-hex-character wire form.
    #[must_use]
    pub fn parse_hex(hex_str: &str) -> Option<Self> {
        if hex_str.len() != 32 {
            return None;
        }
        let bytes = hex::decode(hex_str).ok()?;
        let mut token = [0u8; 16];
        token.copy_from_slice(&bytes);
        Some(Self(token))
    }

    /// Returns the lowercase-hex wire form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Identity extracted from the connection handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Client identifier (from `clientId` or derived from `token`).
    pub client_id: String,
    /// Numeric device identifier.
    pub device_id: i64,
    /// Resumable-session token.
    pub session_token: SessionToken,
}

/// Handshake rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeReject;

impl HandshakeReject {
    /// The stable reason string sent to the peer.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        HANDSHAKE_REJECT_REASON
    }
}

/// Extracts and authorizes a [`ClientIdentity`] from handshake metadata.
///
/// Recognized query parameters: `clientId`, `deviceId`, `token`,
/// `sessionToken` (32 hex chars). Header fallback: `x-device-id`.
#[derive(Debug, Clone)]
pub struct HandshakeInspector {
    verifier: TokenVerifier,
    jwt_secret: String,
}

impl HandshakeInspector {
    /// Creates an inspector with the given token-derivation secret.
    #[must_use]
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            verifier: TokenVerifier,
            jwt_secret: jwt_secret.into(),
        }
    }

    /// Extracts an identity candidate from query parameters and headers.
    pub fn extract(
        &self,
        query: &HashMap<String, String>,
        headers: &HashMap<String, String>,
    ) -> Result<ClientIdentity, HandshakeReject> {
        let mut client_id = query.get("clientId").cloned().unwrap_or_default();
        let mut device_id = query.get("deviceId").cloned().unwrap_or_default();
        let token = query.get("token").cloned().unwrap_or_default();
        let session_token_hex = query.get("sessionToken").cloned().unwrap_or_default();

        // A verifying bearer token names the user even without clientId.
        if !token.is_empty() {
            if let Some(principal) = self.verifier.verify(&token) {
                debug!(user_id = %principal.user_id, "handshake token verified");
                client_id = principal.user_id;
            }
        }

        if device_id.is_empty() {
            if let Some(header) = headers.get("x-device-id") {
                device_id.clone_from(header);
            }
        }

        if client_id.is_empty() {
            return Err(HandshakeReject);
        }

        if device_id.is_empty() {
            device_id = format!("trading-device-{client_id}");
        }

        let device_id = device_id_to_int(&device_id);

        let session_token = match SessionToken::parse_hex(&session_token_hex) {
            Some(token) => token,
            None => SessionToken::generate(&client_id, device_id, &self.jwt_secret),
        };

        Ok(ClientIdentity {
            client_id,
            device_id,
            session_token,
        })
    }

    /// Authorizes the extracted identity.
    ///
    /// Authorization of well-formed identities is unconditional here;
    /// method-level access control happens in the middleware chain.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn authorize(&self, identity: &ClientIdentity) -> bool {
        !identity.client_id.is_empty()
    }
}

/// Converts a device id string to an integer, hashing non-numeric values.
fn device_id_to_int(device_id: &str) -> i64 {
    device_id.parse::<i64>().unwrap_or_else(|_| {
        let mut hasher = DefaultHasher::new();
        device_id.hash(&mut hasher);
        (hasher.finish() % 1_000_000) as i64
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_verify_patterns() {
        let verifier = TokenVerifier;
        assert_eq!(
            verifier.verify("my-trader-token").unwrap().user_id,
            "trader-user-123"
        );
        assert_eq!(
            verifier.verify("admin-xyz").unwrap().roles,
            vec!["admin", "trader", "viewer"]
        );
        assert_eq!(
            verifier.verify("viewer-1").unwrap().user_id,
            "viewer-user-456"
        );
        assert_eq!(verifier.verify("demo").unwrap().user_id, "demo-user-001");
    }

    #[test]
    fn test_verify_fallback_prefix() {
        let principal = TokenVerifier.verify("opaque-token-value").unwrap();
        assert_eq!(principal.user_id, "authenticated-user-opaque-t");
        assert_eq!(principal.roles, vec!["viewer"]);
    }

    #[test]
    fn test_verify_empty_fails() {
        assert!(TokenVerifier.verify("").is_none());
    }

    #[test]
    fn test_session_token_hex_roundtrip() {
        let token = SessionToken::generate("u1", 42, "secret");
        let hex_form = token.to_hex();
        assert_eq!(hex_form.len(), 32);
        assert_eq!(SessionToken::parse_hex(&hex_form), Some(token));
    }

    #[test]
    fn test_session_token_rejects_bad_hex() {
        assert!(SessionToken::parse_hex("short").is_none());
        assert!(SessionToken::parse_hex(&"zz".repeat(16)).is_none());
    }

    #[test]
    fn test_extract_with_client_id() {
        let inspector = HandshakeInspector::new("secret");
        let identity = inspector
            .extract(&query(&[("clientId", "c1"), ("deviceId", "7")]), &HashMap::new())
            .unwrap();
        assert_eq!(identity.client_id, "c1");
        assert_eq!(identity.device_id, 7);
        assert!(inspector.authorize(&identity));
    }

    #[test]
    fn test_extract_derives_client_from_token() {
        let inspector = HandshakeInspector::new("secret");
        let identity = inspector
            .extract(&query(&[("token", "trader-abc")]), &HashMap::new())
            .unwrap();
        assert_eq!(identity.client_id, "trader-user-123");
    }

    #[test]
    fn test_extract_rejects_anonymous() {
        let inspector = HandshakeInspector::new("secret");
        assert!(inspector.extract(&HashMap::new(), &HashMap::new()).is_err());
    }

    #[test]
    fn test_extract_device_header_fallback() {
        let inspector = HandshakeInspector::new("secret");
        let mut headers = HashMap::new();
        headers.insert("x-device-id".to_string(), "99".to_string());
        let identity = inspector
            .extract(&query(&[("clientId", "c1")]), &headers)
            .unwrap();
        assert_eq!(identity.device_id, 99);
    }

    #[test]
    fn test_extract_hashes_non_numeric_device() {
        let inspector = HandshakeInspector::new("secret");
        let identity = inspector
            .extract(
                &query(&[("clientId", "c1"), ("deviceId", "tablet-a")]),
                &HashMap::new(),
            )
            .unwrap();
        assert!(identity.device_id >= 0);
        assert!(identity.device_id < 1_000_000);
    }

    #[test]
    fn test_extract_reuses_presented_session_token() {
        let inspector = HandshakeInspector::new("secret");
        let presented = SessionToken::generate("c1", 1, "secret");
        let identity = inspector
            .extract(
                &query(&[("clientId", "c1"), ("sessionToken", &presented.to_hex())]),
                &HashMap::new(),
            )
            .unwrap();
        assert_eq!(identity.session_token, presented);
    }
}
