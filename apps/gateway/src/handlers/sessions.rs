// [apps/gateway/src/handlers/sessions.rs]
/*!
 * =================================================================
 * APARATO: SESSION STORE HANDLERS (ESTRATO L4)
 * RESPONSABILIDAD: HANDSHAKE DE EMPAREJAMIENTO ENTRE DISPOSITIVOS
 * =================================================================
 */

use axum::extract::{Json, Path, State};
use chrono::Utc;
use passkey_domain_models::RawEnvelope;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::envelope::VerifiedEnvelope;
use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionPayload {
    #[serde(flatten)]
    envelope: RawEnvelope,
    session_id: String,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionPayload>,
) -> Result<Json<Value>, ApiError> {
    state.metrics.record_query();
    let result = create_session_inner(&state, payload).await;
    if result.is_err() {
        state.metrics.record_error();
    }
    result
}

async fn create_session_inner(state: &AppState, payload: CreateSessionPayload) -> Result<Json<Value>, ApiError> {
    let verified = VerifiedEnvelope::parse(&payload.envelope, Utc::now())?;
    let session = state
        .session_repository
        .create_session(
            &payload.session_id,
            &verified.verified_account,
            &verified.verified_owner,
            &payload.envelope.signature,
        )
        .await?;
    Ok(Json(serde_json::to_value(&session).map_err(|e| ApiError::Internal(e.to_string()))?))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.metrics.record_query();
    let result = get_session_inner(&state, session_id).await;
    if result.is_err() {
        state.metrics.record_error();
    }
    result
}

async fn get_session_inner(state: &AppState, session_id: String) -> Result<Json<Value>, ApiError> {
    let session = state
        .session_repository
        .get_session(&session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {session_id} not found")))?;

    let now = Utc::now();
    let mut value = serde_json::to_value(&session).map_err(|e| ApiError::Internal(e.to_string()))?;
    value["status"] = json!(session.effective_status(now));
    Ok(Json(value))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSessionPayload {
    #[serde(flatten)]
    envelope: RawEnvelope,
    device_data: Value,
}

pub async fn complete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<CompleteSessionPayload>,
) -> Result<Json<Value>, ApiError> {
    state.metrics.record_query();
    let result = complete_session_inner(&state, session_id, payload).await;
    if result.is_err() {
        state.metrics.record_error();
    }
    result
}

async fn complete_session_inner(
    state: &AppState,
    session_id: String,
    payload: CompleteSessionPayload,
) -> Result<Json<Value>, ApiError> {
    let verified = VerifiedEnvelope::parse(&payload.envelope, Utc::now())?;

    // The completing device authenticates with a credential it already
    // registered; if it names that credential, bump its lastUsedAt once
    // the session itself is confirmed completed.
    let credential_id = payload
        .device_data
        .get("credentialId")
        .and_then(Value::as_str)
        .map(str::to_string);

    let completed = state
        .session_repository
        .complete_session(&session_id, payload.device_data)
        .await?;

    if !completed {
        return Err(ApiError::Validation(format!(
            "session {session_id} is not pending"
        )));
    }

    if let Some(credential_id) = credential_id {
        if let Some(device) = state
            .device_repository
            .get_device_by_credential_id(&verified.verified_account, &credential_id)
            .await?
        {
            state
                .device_repository
                .update_device_last_used(&verified.verified_account, &device.device_id)
                .await?;
        }
    }

    Ok(Json(json!({ "completed": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::{get, post};
    use axum::Router;
    use passkey_infra_db::TursoClient;
    use sha3::{Digest, Keccak256};
    use tower::ServiceExt;

    async fn setup_state() -> AppState {
        let client = TursoClient::connect(":memory:", None).await.unwrap();
        AppState::new(client, Config::from_env())
    }

    fn router(state: AppState) -> Router {
        Router::new()
            .route("/api/sessions", post(create_session))
            .route("/api/sessions/:session_id", get(get_session))
            .with_state(state)
    }

    fn sign(message: &str, secret_key: &secp256k1::SecretKey) -> String {
        let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
        let mut hasher = Keccak256::new();
        hasher.update(prefix.as_bytes());
        hasher.update(message.as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();

        let secp = secp256k1::Secp256k1::new();
        let msg = secp256k1::Message::from_digest_slice(&digest).unwrap();
        let (recovery_id, compact) = secp.sign_ecdsa_recoverable(&msg, secret_key).serialize_compact();
        let mut wire = compact.to_vec();
        wire.push(27 + recovery_id.to_i32() as u8);
        hex::encode(wire)
    }

    #[tokio::test]
    async fn unknown_session_id_returns_404() {
        let state = setup_state().await;
        let app = router(state);

        let response = app
            .oneshot(Request::builder().uri("/api/sessions/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_session_with_a_valid_envelope_returns_a_pending_session() {
        let state = setup_state().await;
        let secp = secp256k1::Secp256k1::new();
        let secret_key = secp256k1::SecretKey::from_slice(&[0x33; 32]).unwrap();
        let owner = passkey_infra_crypto::recover_signer(b"x", &sign("x", &secret_key)).unwrap();
        let _ = &secp;

        let message = format!("link account 0xaccount to owner {}", owner.as_lowercase_hex());
        let body = json!({
            "accountAddress": "0xaccount",
            "ownerAddress": owner.as_lowercase_hex(),
            "signature": sign(&message, &secret_key),
            "message": message,
            "timestamp": Utc::now().timestamp(),
            "sessionId": "s-http-1",
        });

        let app = router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sessions")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn completing_a_session_touches_the_authenticating_devices_last_used() {
        let state = setup_state().await;
        let secp = secp256k1::Secp256k1::new();
        let secret_key = secp256k1::SecretKey::from_slice(&[0x66; 32]).unwrap();
        let owner = passkey_infra_crypto::recover_signer(b"x", &sign("x", &secret_key)).unwrap();
        let _ = &secp;
        let account = "0xaccount2222";

        let device = state
            .device_repository
            .add_device(
                account,
                "dev-1",
                "Mac",
                "platform",
                "cred-1",
                "cmF3MQ==",
                "0xaa",
                "0xbb",
                None,
                None,
                None,
                None,
                &passkey_domain_models::AttestationMetadata::default(),
            )
            .await
            .unwrap();
        assert!(device.last_used_at.is_none());

        state
            .session_repository
            .create_session("s-complete-1", account, &owner.as_lowercase_hex(), "0xsig")
            .await
            .unwrap();

        let message = format!("link account {account} to owner {}", owner.as_lowercase_hex());
        let payload = CompleteSessionPayload {
            envelope: RawEnvelope {
                account_address: account.to_string(),
                owner_address: owner.as_lowercase_hex().to_string(),
                signature: sign(&message, &secret_key),
                message,
                timestamp: Utc::now().timestamp(),
            },
            device_data: json!({ "credentialId": "cred-1" }),
        };

        let result = complete_session_inner(&state, "s-complete-1".to_string(), payload).await.unwrap();
        assert_eq!(result.0["completed"], true);

        let devices = state.device_repository.get_devices(account).await.unwrap();
        assert!(devices[0].last_used_at.is_some());
    }
}
