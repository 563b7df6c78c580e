// [libs/infra/db/src/repositories/mds_repository.rs]
/*!
 * =================================================================
 * APARATO: MDS BLOB REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA DEL ÚLTIMO BLOB MDS VÁLIDO
 *
 * Una única fila lógica bajo `key = 'current'`; upsert via
 * `ON CONFLICT DO UPDATE`, el mismo patrón que el resto del stack
 * usa para el estado global de sistema de llave/valor.
 * =================================================================
 */

use libsql::params;
use passkey_domain_models::MdsBlob;
use serde_json::Value;
use tracing::instrument;

use crate::client::TursoClient;
use crate::errors::DbError;

const MDS_BLOB_KEY: &str = "current";

#[derive(Clone)]
pub struct MdsRepository {
    client: TursoClient,
}

impl MdsRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, blob))]
    pub async fn save_blob(&self, blob: &MdsBlob) -> Result<(), DbError> {
        let connection = self.client.get_connection()?;
        let payload_json = serde_json::to_string(&blob.payload).map_err(|e| DbError::MappingError(e.to_string()))?;

        connection
            .execute(
                r#"
                INSERT INTO mds_cache (key, payload_json, last_updated, next_update, blob_number, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?3)
                ON CONFLICT (key) DO UPDATE SET
                    payload_json = excluded.payload_json,
                    last_updated = excluded.last_updated,
                    next_update = excluded.next_update,
                    blob_number = excluded.blob_number,
                    updated_at = excluded.updated_at
                "#,
                params![
                    MDS_BLOB_KEY,
                    payload_json,
                    blob.last_updated.to_rfc3339(),
                    blob.next_update.map(|dt| dt.to_rfc3339()),
                    blob.blob_number,
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn load_blob(&self) -> Result<Option<MdsBlob>, DbError> {
        let connection = self.client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT payload_json, last_updated, next_update, blob_number FROM mds_cache WHERE key = ?1",
                params![MDS_BLOB_KEY],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let payload_json: String = row.get(0).map_err(|e| DbError::MappingError(e.to_string()))?;
        let payload: Value = serde_json::from_str(&payload_json).map_err(|e| DbError::MappingError(e.to_string()))?;
        let last_updated_raw: String = row.get(1).map_err(|e| DbError::MappingError(e.to_string()))?;
        let next_update_raw: Option<String> = row.get(2).map_err(|e| DbError::MappingError(e.to_string()))?;
        let blob_number: Option<i64> = row.get(3).map_err(|e| DbError::MappingError(e.to_string()))?;

        Ok(Some(MdsBlob {
            payload,
            last_updated: parse_timestamp(&last_updated_raw)?,
            next_update: next_update_raw.as_deref().map(parse_timestamp).transpose()?,
            blob_number,
        }))
    }
}

fn parse_timestamp(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, DbError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| DbError::MappingError(format!("malformed timestamp '{raw}': {e}")))
}
