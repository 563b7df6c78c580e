// [apps/gateway/src/handlers/admin.rs]
/*!
 * =================================================================
 * APARATO: ADMIN / TELEMETRY HANDLERS (ESTRATO L4)
 * RESPONSABILIDAD: ESTADÍSTICAS DE SERVICIO Y RESPALDO MANUAL
 * =================================================================
 */

use std::path::Path as FsPath;

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use passkey_domain_models::RawEnvelope;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::envelope::VerifiedEnvelope;
use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminEnvelopeQuery {
    account_address: String,
    owner_address: String,
    signature: String,
    message: String,
    timestamp: i64,
}

impl From<AdminEnvelopeQuery> for RawEnvelope {
    fn from(query: AdminEnvelopeQuery) -> Self {
        RawEnvelope {
            account_address: query.account_address,
            owner_address: query.owner_address,
            signature: query.signature,
            message: query.message,
            timestamp: query.timestamp,
        }
    }
}

pub async fn stats(State(state): State<AppState>, Query(query): Query<AdminEnvelopeQuery>) -> Result<Json<Value>, ApiError> {
    state.metrics.record_query();
    let result = stats_inner(&state, query).await;
    if result.is_err() {
        state.metrics.record_error();
    }
    result
}

async fn stats_inner(state: &AppState, query: AdminEnvelopeQuery) -> Result<Json<Value>, ApiError> {
    VerifiedEnvelope::parse(&query.into(), Utc::now())?;

    let total_credentials = state.device_repository.count_all().await?;
    let (oldest_credential, newest_credential) = state.device_repository.oldest_and_newest().await?;
    let metrics_snapshot = state.metrics.snapshot();

    Ok(Json(json!({
        "total_credentials": total_credentials,
        "oldest_credential": oldest_credential,
        "newest_credential": newest_credential,
        "queryCount": metrics_snapshot.query_count,
        "errorCount": metrics_snapshot.error_count,
        "lastBackupTime": metrics_snapshot.last_backup_time,
        "dbPath": state.config.database_path,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminBackupPayload {
    #[serde(flatten)]
    envelope: RawEnvelope,
}

pub async fn backup(State(state): State<AppState>, Json(payload): Json<AdminBackupPayload>) -> Result<Json<Value>, ApiError> {
    state.metrics.record_query();
    let result = backup_inner(&state, payload).await;
    if result.is_err() {
        state.metrics.record_error();
    }
    result
}

async fn backup_inner(state: &AppState, payload: AdminBackupPayload) -> Result<Json<Value>, ApiError> {
    VerifiedEnvelope::parse(&payload.envelope, Utc::now())?;

    if !state.config.manual_backup_allowed() {
        warn!("manual backup requested while disabled in production");
        return Err(ApiError::AdminDisabled);
    }

    let now = Utc::now();
    let destination = FsPath::new(&state.config.backup_dir).join(format!("passkeys-{}.db", now.to_rfc3339()));
    state.database_client.backup(&state.config.database_path, &destination).await?;
    state.metrics.record_backup(now);

    Ok(Json(json!({ "path": destination.to_string_lossy() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Environment};
    use passkey_infra_db::TursoClient;
    use sha3::{Digest, Keccak256};

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
    async fn manual_backup_is_rejected_when_disabled_in_production() {
        let client = TursoClient::connect(":memory:", None).await.unwrap();
        let mut config = Config::from_env();
        config.environment = Environment::Production;
        config.admin_backup_enabled = false;
        let state = AppState::new(client, config);

        let secret_key = secp256k1::SecretKey::from_slice(&[0x55; 32]).unwrap();
        let owner = passkey_infra_crypto::recover_signer(b"x", &sign("x", &secret_key)).unwrap();
        let message = format!("link account 0xaccount to owner {}", owner.as_lowercase_hex());

        let payload = AdminBackupPayload {
            envelope: RawEnvelope {
                account_address: "0xaccount".to_string(),
                owner_address: owner.as_lowercase_hex().to_string(),
                signature: sign(&message, &secret_key),
                message,
                timestamp: Utc::now().timestamp(),
            },
        };

        let err = backup_inner(&state, payload).await.unwrap_err();
        assert!(matches!(err, ApiError::AdminDisabled));
    }
}
