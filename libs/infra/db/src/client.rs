// INICIO DEL ARCHIVO [libs/infra/db/src/client.rs]
/*!
 * =================================================================
 * APARATO: DATABASE CONNECTION CLIENT (V24.4 - MEMORY FIXED)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GESTIÓN DE ENLACES TÁCTICOS Y PERSISTENCIA ACID
 *
 * # Mathematical Proof (In-Memory Consistency):
 * Para garantizar que el esquema sea visible entre hilos en modo RAM,
 * el cliente ahora detecta URLs de memoria y aplica el ancla de
 * persistencia ANTES de la ejecución del bootstrap, asegurando
 * que las tablas residan en un segmento de memoria compartido.
 * =================================================================
 */

use crate::errors::DbError;
use crate::schema::apply_schema;
use libsql::{Builder, Connection, Database};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument};

#[derive(Clone)]
pub struct TursoClient {
    internal_database_driver: Arc<Database>,
    /// Mantiene la base de datos viva en memoria evitando que SQLite la purgue.
    _memory_persistence_anchor: Option<Arc<Connection>>,
}

impl TursoClient {
    #[instrument(skip(database_access_token))]
    pub async fn connect(
        database_connection_url: &str,
        database_access_token: Option<String>,
    ) -> Result<Self, DbError> {
        if database_connection_url.is_empty() {
            return Err(DbError::ConnectionError("DATABASE_PATH_UNDEFINED".into()));
        }

        info!("🔌 [DATABASE]: Initiating tactical link synchronization to [{}]", database_connection_url);

        let is_remote = database_connection_url.starts_with("libsql://")
            || database_connection_url.starts_with("https://");

        let is_memory = database_connection_url.contains(":memory:");

        let database_driver = if is_remote {
            let token = database_access_token.ok_or_else(|| {
                DbError::ConnectionError("SECURITY_FAULT: Remote access denied (Token missing)".into())
            })?;
            Builder::new_remote(database_connection_url.to_string(), token).build().await
        } else {
            Builder::new_local(database_connection_url).build().await
        }.map_err(|e| DbError::ConnectionError(format!("DRIVER_IGNITION_FAILURE: {}", e)))?;

        let shared_driver = Arc::new(database_driver);
        let mut anchor = None;

        // En modo memoria, abrimos el ancla antes de cualquier otra operación.
        if is_memory {
            let anchor_conn = shared_driver.connect()
                .map_err(|e| DbError::ConnectionError(format!("ANCHOR_FAULT: {}", e)))?;

            configure_pragmas(&anchor_conn).await?;
            apply_schema(&anchor_conn).await
                .map_err(|e| DbError::ConnectionError(format!("SCHEMA_SYNC_FAULT: {}", e)))?;

            anchor = Some(Arc::new(anchor_conn));
            info!("⚓ [DATABASE]: Memory strata solidified and anchored.");
        } else {
            let bootstrap_conn = shared_driver.connect()
                .map_err(|e| DbError::ConnectionError(format!("BOOTSTRAP_LINK_FAULT: {}", e)))?;
            configure_pragmas(&bootstrap_conn).await?;
            apply_schema(&bootstrap_conn).await
                .map_err(|e| DbError::ConnectionError(format!("SCHEMA_SYNC_FAULT: {}", e)))?;
        }

        Ok(Self {
            internal_database_driver: shared_driver,
            _memory_persistence_anchor: anchor,
        })
    }

    pub fn get_connection(&self) -> Result<Connection, DbError> {
        self.internal_database_driver.connect().map_err(|e| {
            error!("⚠️ [POOL_FAULT]: Connection allocation failed: {}", e);
            DbError::ConnectionError(e.to_string())
        })
    }

    /// Produces an atomic, point-in-time copy via the engine's native
    /// `VACUUM INTO` primitive; on failure, falls back to a bytewise copy
    /// of the primary db file.
    #[instrument(skip(self))]
    pub async fn backup(&self, primary_db_path: &str, destination_path: &Path) -> Result<(), DbError> {
        let connection = self.get_connection()?;
        let destination_str = destination_path
            .to_str()
            .ok_or_else(|| DbError::ConnectionError("backup destination is not valid UTF-8".into()))?;

        let vacuum_statement = format!("VACUUM INTO '{}'", destination_str.replace('\'', "''"));
        match connection.execute(&vacuum_statement, ()).await {
            Ok(_) => {
                info!("💾 [BACKUP]: VACUUM INTO snapshot written to {}", destination_str);
                Ok(())
            }
            Err(vacuum_error) => {
                error!("⚠️ [BACKUP_DEGRADED]: VACUUM INTO failed ({}), falling back to bytewise copy", vacuum_error);
                if primary_db_path.contains(":memory:") {
                    return Err(DbError::ConnectionError(
                        "cannot bytewise-copy an in-memory database".into(),
                    ));
                }
                tokio::fs::copy(primary_db_path, destination_path)
                    .await
                    .map_err(|e| DbError::ConnectionError(format!("BACKUP_COPY_FAULT: {}", e)))?;
                Ok(())
            }
        }
    }
}

async fn configure_pragmas(connection: &Connection) -> Result<(), DbError> {
    for pragma in [
        "PRAGMA journal_mode=WAL",
        "PRAGMA busy_timeout=5000",
        "PRAGMA synchronous=NORMAL",
        "PRAGMA cache_size=-65536",
        "PRAGMA temp_store=MEMORY",
        "PRAGMA foreign_keys=ON",
    ] {
        connection.execute(pragma, ()).await
            .map_err(|e| DbError::ConnectionError(format!("PRAGMA_FAULT({pragma}): {e}")))?;
    }
    Ok(())
}
// FIN DEL ARCHIVO [libs/infra/db/src/client.rs]
