// [libs/infra/db/src/repositories/session_repository.rs]
/*!
 * =================================================================
 * APARATO: SESSION STORE REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: HANDSHAKE DE EMPAREJAMIENTO ENTRE DISPOSITIVOS
 * =================================================================
 */

use chrono::{DateTime, Duration, Utc};
use libsql::params;
use passkey_domain_models::{Session, SessionStatus};
use tracing::instrument;

use crate::client::TursoClient;
use crate::errors::DbError;

const SESSION_TTL_MINUTES: i64 = 10;
const COMPLETED_RETENTION_HOURS: i64 = 24;

#[derive(Clone)]
pub struct SessionRepository {
    client: TursoClient,
}

impl SessionRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, signature))]
    pub async fn create_session(
        &self,
        session_id: &str,
        account_address: &str,
        owner_address: &str,
        signature: &str,
    ) -> Result<Session, DbError> {
        let connection = self.client.get_connection()?;
        let now = Utc::now();
        let expires_at = now + Duration::minutes(SESSION_TTL_MINUTES);

        connection
            .execute(
                r#"
                INSERT INTO sessions (session_id, account_address, owner_address, signature, status, created_at, expires_at)
                VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6)
                "#,
                params![
                    session_id,
                    account_address.to_lowercase(),
                    owner_address.to_lowercase(),
                    signature,
                    now.to_rfc3339(),
                    expires_at.to_rfc3339(),
                ],
            )
            .await?;

        Ok(Session {
            session_id: session_id.to_string(),
            account_address: account_address.to_lowercase(),
            owner_address: owner_address.to_lowercase(),
            signature: signature.to_string(),
            status: SessionStatus::Pending,
            device_data: None,
            created_at: now,
            completed_at: None,
            expires_at,
        })
    }

    /// Returns the session with `effective_status` already applied — the
    /// persisted row is never mutated by a read.
    #[instrument(skip(self))]
    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT session_id, account_address, owner_address, signature, status,
                       device_data, created_at, completed_at, expires_at
                FROM sessions WHERE session_id = ?1
                "#,
                params![session_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_session(&row)?)),
            None => Ok(None),
        }
    }

    /// Atomic: only mutates a row whose persisted status is still
    /// `pending`. Returns whether a row was mutated.
    #[instrument(skip(self, device_data))]
    pub async fn complete_session(
        &self,
        session_id: &str,
        device_data: serde_json::Value,
    ) -> Result<bool, DbError> {
        let connection = self.client.get_connection()?;
        let device_data_json = serde_json::to_string(&device_data).map_err(|e| DbError::MappingError(e.to_string()))?;

        let rows_affected = connection
            .execute(
                r#"
                UPDATE sessions
                SET status = 'completed', completed_at = ?1, device_data = ?2
                WHERE session_id = ?3 AND status = 'pending'
                "#,
                params![Utc::now().to_rfc3339(), device_data_json, session_id],
            )
            .await?;

        Ok(rows_affected > 0)
    }

    /// Deletes expired-and-still-pending rows, plus completed rows past
    /// the retention window. Run periodically by the session GC task.
    #[instrument(skip(self))]
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, DbError> {
        let connection = self.client.get_connection()?;
        let now = Utc::now();
        let completed_cutoff = now - Duration::hours(COMPLETED_RETENTION_HOURS);

        let rows_affected = connection
            .execute(
                r#"
                DELETE FROM sessions
                WHERE (status = 'pending' AND expires_at < ?1)
                   OR (status = 'completed' AND completed_at < ?2)
                "#,
                params![now.to_rfc3339(), completed_cutoff.to_rfc3339()],
            )
            .await?;

        Ok(rows_affected)
    }
}

fn row_to_session(row: &libsql::Row) -> Result<Session, DbError> {
    let status_raw: String = row.get(4).map_err(|e| DbError::MappingError(e.to_string()))?;
    let status = match status_raw.as_str() {
        "pending" => SessionStatus::Pending,
        "completed" => SessionStatus::Completed,
        _ => SessionStatus::Expired,
    };

    let device_data_raw: Option<String> = row.get(5).map_err(|e| DbError::MappingError(e.to_string()))?;
    let device_data = device_data_raw.and_then(|raw| serde_json::from_str(&raw).ok());

    Ok(Session {
        session_id: row.get(0).map_err(|e| DbError::MappingError(e.to_string()))?,
        account_address: row.get(1).map_err(|e| DbError::MappingError(e.to_string()))?,
        owner_address: row.get(2).map_err(|e| DbError::MappingError(e.to_string()))?,
        signature: row.get(3).map_err(|e| DbError::MappingError(e.to_string()))?,
        status,
        device_data,
        created_at: parse_timestamp(row.get::<String>(6).map_err(|e| DbError::MappingError(e.to_string()))?)?,
        completed_at: row
            .get::<Option<String>>(7)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .map(parse_timestamp)
            .transpose()?,
        expires_at: parse_timestamp(row.get::<String>(8).map_err(|e| DbError::MappingError(e.to_string()))?)?,
    })
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::MappingError(format!("malformed timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips_as_pending() {
        let client = TursoClient::connect(":memory:", None).await.unwrap();
        let repo = SessionRepository::new(client);

        repo.create_session("s-1", "0xAAAA", "0xBBBB", "0xsig").await.unwrap();
        let session = repo.get_session("s-1").await.unwrap().expect("session exists");

        assert_eq!(session.account_address, "0xaaaa");
        assert_eq!(session.effective_status(Utc::now()), SessionStatus::Pending);
    }

    #[tokio::test]
    async fn complete_session_is_atomic_and_rejects_second_call() {
        let client = TursoClient::connect(":memory:", None).await.unwrap();
        let repo = SessionRepository::new(client);

        repo.create_session("s-2", "0xAAAA", "0xBBBB", "0xsig").await.unwrap();
        let first = repo
            .complete_session("s-2", serde_json::json!({"qx": "1", "qy": "2"}))
            .await
            .unwrap();
        assert!(first);

        let second = repo
            .complete_session("s-2", serde_json::json!({"qx": "1", "qy": "2"}))
            .await
            .unwrap();
        assert!(!second);
    }
}
