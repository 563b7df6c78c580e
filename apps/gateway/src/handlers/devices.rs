// [apps/gateway/src/handlers/devices.rs]
/*!
 * =================================================================
 * APARATO: DEVICE REGISTRY HANDLERS (ESTRATO L4)
 * RESPONSABILIDAD: ADD / LIST / REMOVE DE PASSKEYS POR CUENTA
 * =================================================================
 */

use axum::extract::{Json, Path, Query, State};
use chrono::Utc;
use passkey_domain_models::{AttestationMetadata, Device, MdsDeviceMetadata, RawEnvelope};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::envelope::VerifiedEnvelope;
use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyPayload {
    x: String,
    y: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialPayload {
    id: String,
    raw_id: String,
    public_key: PublicKeyPayload,
    attestation_object: Option<String>,
    client_data_json: Option<String>,
    aaguid: Option<String>,
    format: Option<String>,
    is_hardware_backed: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDevicePayload {
    #[serde(flatten)]
    envelope: RawEnvelope,
    device_id: String,
    device_name: String,
    device_type: String,
    credential: CredentialPayload,
    proposal_hash: Option<String>,
    proposal_tx_hash: Option<String>,
}

pub async fn add_device(
    State(state): State<AppState>,
    Json(payload): Json<AddDevicePayload>,
) -> Result<Json<Value>, ApiError> {
    state.metrics.record_query();
    let result = add_device_inner(&state, payload).await;
    if result.is_err() {
        state.metrics.record_error();
    }
    result
}

async fn add_device_inner(state: &AppState, payload: AddDevicePayload) -> Result<Json<Value>, ApiError> {
    let verified = VerifiedEnvelope::parse(&payload.envelope, Utc::now())?;

    // isHardwareBacked normalizes to true when the client does not report it.
    let attestation_metadata = AttestationMetadata {
        aaguid: payload.credential.aaguid.clone(),
        format: payload.credential.format.clone(),
        is_hardware_backed: payload.credential.is_hardware_backed.unwrap_or(true),
        authenticator_name: None,
    };

    let device = state
        .device_repository
        .add_device(
            &verified.verified_account,
            &payload.device_id,
            &payload.device_name,
            &payload.device_type,
            &payload.credential.id,
            &payload.credential.raw_id,
            &payload.credential.public_key.x,
            &payload.credential.public_key.y,
            payload.credential.attestation_object.as_deref(),
            payload.credential.client_data_json.as_deref(),
            payload.proposal_hash.as_deref(),
            payload.proposal_tx_hash.as_deref(),
            &attestation_metadata,
        )
        .await?;

    Ok(Json(json!({
        "accountAddress": device.account_address,
        "deviceId": device.device_id,
        "proposalHash": device.state.proposal_hash(),
        "attestationMetadata": device.attestation_metadata,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceQueryEnvelope {
    owner_address: String,
    signature: String,
    message: String,
    timestamp: i64,
}

pub async fn get_devices(
    State(state): State<AppState>,
    Path(account_address): Path<String>,
    Query(query): Query<DeviceQueryEnvelope>,
) -> Result<Json<Vec<Value>>, ApiError> {
    state.metrics.record_query();
    let result = get_devices_inner(&state, account_address, query).await;
    if result.is_err() {
        state.metrics.record_error();
    }
    result
}

async fn get_devices_inner(
    state: &AppState,
    account_address: String,
    query: DeviceQueryEnvelope,
) -> Result<Json<Vec<Value>>, ApiError> {
    let envelope = RawEnvelope {
        account_address: account_address.clone(),
        owner_address: query.owner_address,
        signature: query.signature,
        message: query.message,
        timestamp: query.timestamp,
    };
    let verified = VerifiedEnvelope::parse(&envelope, Utc::now())?;

    let devices = state.device_repository.get_devices(&verified.verified_account).await?;
    let mut enriched = Vec::with_capacity(devices.len());
    for device in devices {
        enriched.push(enrich_with_mds(state, device).await?);
    }
    Ok(Json(enriched))
}

/// Resolves MDS metadata for a device lazily: if the stored column is still
/// the default (never resolved), consults the cache/fallback table and
/// persists the result so subsequent reads skip the lookup. The resolved
/// `name` (getMetadataJoin's display name, whether from a real MDS hit or
/// the static fallback table) always lands on the attestation's
/// `authenticatorName`; `mdsMetadata` carries only fields that come from an
/// actual MDS entry, so a fallback-only resolution leaves them null.
async fn enrich_with_mds(state: &AppState, mut device: Device) -> Result<Value, ApiError> {
    if device.mds_metadata.description.is_none() && device.mds_metadata.is_fido2_certified.is_none() {
        if let Some(aaguid) = device.attestation_metadata.aaguid.clone() {
            let record = state.mds_cache.lookup_with_fallback(&aaguid);
            let mds_metadata = MdsDeviceMetadata {
                description: record.description,
                is_fido2_certified: record.is_fido2_certified,
                certification_level: record.certification_level,
                mds_last_updated: state.mds_cache.last_updated(),
            };
            device.attestation_metadata.authenticator_name = Some(record.name);
            state
                .device_repository
                .update_device_mds_metadata(
                    &device.account_address,
                    &device.device_id,
                    &mds_metadata,
                    &device.attestation_metadata,
                )
                .await?;
            device.mds_metadata = mds_metadata;
        }
    }
    Ok(serde_json::to_value(&device).map_err(|e| ApiError::Internal(e.to_string()))?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveDevicePayload {
    #[serde(flatten)]
    envelope: RawEnvelope,
    device_id: String,
}

pub async fn remove_device(
    State(state): State<AppState>,
    Json(payload): Json<RemoveDevicePayload>,
) -> Result<Json<Value>, ApiError> {
    state.metrics.record_query();
    let result = remove_device_inner(&state, payload).await;
    if result.is_err() {
        state.metrics.record_error();
    }
    result
}

async fn remove_device_inner(state: &AppState, payload: RemoveDevicePayload) -> Result<Json<Value>, ApiError> {
    let verified = VerifiedEnvelope::parse(&payload.envelope, Utc::now())?;
    let removed = state
        .device_repository
        .remove_device(&verified.verified_account, &payload.device_id)
        .await?;

    if !removed {
        return Err(ApiError::NotFound(format!("device {} not found", payload.device_id)));
    }
    Ok(Json(json!({ "removed": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use passkey_infra_db::TursoClient;
    use sha3::{Digest, Keccak256};
    use tower::ServiceExt;

    async fn setup_state() -> AppState {
        let client = TursoClient::connect(":memory:", None).await.unwrap();
        AppState::new(client, Config::from_env())
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
    async fn registering_the_first_device_returns_a_null_proposal_hash() {
        let state = setup_state().await;
        let secp = secp256k1::Secp256k1::new();
        let secret_key = secp256k1::SecretKey::from_slice(&[0x44; 32]).unwrap();
        let owner = passkey_infra_crypto::recover_signer(b"x", &sign("x", &secret_key)).unwrap();
        let _ = &secp;

        let account = "0xaccount1111";
        let message = format!("link account {account} to owner {}", owner.as_lowercase_hex());
        let body = json!({
            "accountAddress": account,
            "ownerAddress": owner.as_lowercase_hex(),
            "signature": sign(&message, &secret_key),
            "message": message,
            "timestamp": Utc::now().timestamp(),
            "deviceId": "dev-1",
            "deviceName": "Mac",
            "deviceType": "platform",
            "credential": {
                "id": "cred-1",
                "rawId": "cmF3MQ==",
                "publicKey": {"x": "0xaa", "y": "0xbb"},
            },
        });

        let app = Router::new().route("/api/passkeys", post(add_device)).with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/passkeys")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
