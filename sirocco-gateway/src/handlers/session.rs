//! Authentication and session lifecycle handlers.

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::error::{decode_request, GatewayError, HandlerResult};
use crate::session::{FieldValue, Session};
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HelloRequest {
    #[serde(default)]
    token: String,
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    device_id: String,
}

/// `hello` - verifies the token and authenticates the session.
///
/// On success the session fields `userId`, `clientId`, `deviceId`,
/// `roles`, and `authenticated` are set and the resume token is returned
/// in its 32-hex wire form.
pub async fn hello(state: Arc<GatewayState>, session: Arc<Session>, body: Value) -> HandlerResult {
    let request: HelloRequest = decode_request(body)?;

    if request.token.is_empty() || request.client_id.is_empty() {
        return Err(GatewayError::InvalidParams(
            "missing required parameters: token, clientId".to_string(),
        ));
    }

    let principal = state
        .verifier
        .verify(&request.token)
        .ok_or_else(|| GatewayError::AuthFailed("invalid or expired token".to_string()))?;

    info!(session_id = %session.id(), user_id = %principal.user_id, "session authenticated");

    session.set_field("userId", principal.user_id.clone(), true);
    session.set_field("clientId", request.client_id, true);
    session.set_field("deviceId", request.device_id, true);
    session.set_field("roles", FieldValue::List(principal.roles.clone()), true);
    session.set_field("authenticated", "true", true);

    Ok(json!({
        "sessionId": session.id().to_string(),
        "userId": principal.user_id,
        "roles": principal.roles,
        "token": session.identity().session_token.to_hex(),
        "sessionExpiryMs": state.config.session.ttl_ms,
        "message": "Welcome to the Sirocco trading gateway",
    }))
}

/// `logout` - clears authentication and leaves every room.
pub async fn logout(state: Arc<GatewayState>, session: Arc<Session>, _body: Value) -> HandlerResult {
    session.set_field("authenticated", "false", true);
    session.remove_field("userId");
    state.rooms.leave_all(session.id());

    info!(session_id = %session.id(), "session logged out");
    Ok(json!({
        "sessionId": session.id().to_string(),
        "message": "Successfully logged out",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ClientIdentity, SessionToken};
    use crate::rooms::ALERTS_ROOM;

    fn fixture() -> (Arc<GatewayState>, Arc<Session>) {
        let state = Arc::new(GatewayState::for_tests());
        let (session, _) = state.sessions.bind(ClientIdentity {
            client_id: "c1".to_string(),
            device_id: 1,
            session_token: SessionToken([3; 16]),
        });
        (state, session)
    }

    #[tokio::test]
    async fn test_hello_authenticates_trader() {
        let (state, session) = fixture();
        let body = json!({"token": "trader-abc", "clientId": "c1", "deviceId": "1"});

        let response = hello(state, session.clone(), body).await.unwrap();

        assert_eq!(response["userId"], "trader-user-123");
        assert_eq!(response["roles"], json!(["trader", "viewer"]));
        assert_eq!(response["token"].as_str().unwrap().len(), 32);
        assert!(session.is_authenticated());
        assert_eq!(session.field_str("userId").as_deref(), Some("trader-user-123"));
    }

    #[tokio::test]
    async fn test_hello_missing_params() {
        let (state, session) = fixture();
        let err = hello(state, session, json!({"token": "trader-abc"}))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_hello_empty_token_fails_auth() {
        let (state, session) = fixture();
        let err = hello(state, session, json!({"token": "", "clientId": "c1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_logout_clears_auth_and_rooms() {
        let (state, session) = fixture();
        hello(
            state.clone(),
            session.clone(),
            json!({"token": "demo", "clientId": "c1"}),
        )
        .await
        .unwrap();
        state.rooms.join(ALERTS_ROOM, session.id());

        logout(state.clone(), session.clone(), Value::Null)
            .await
            .unwrap();

        assert!(!session.is_authenticated());
        assert!(session.field_str("userId").is_none());
        assert!(state.rooms.rooms_of(session.id()).is_empty());
    }
}
