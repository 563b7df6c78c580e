/**
 * =================================================================
 * APARATO: SOVEREIGN DATABASE SCHEMA (V151.0 - KNOWLEDGE STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 * Define las entidades base del servicio de credenciales.
 */
const TACTICAL_TABLES: &[(&str, &str)] = &[
    ("TABLE_DEVICES", r#"
        CREATE TABLE IF NOT EXISTS devices (
            device_id TEXT PRIMARY KEY,
            account_address TEXT NOT NULL,
            device_name TEXT NOT NULL,
            device_type TEXT,
            credential_id TEXT NOT NULL UNIQUE,
            raw_id TEXT NOT NULL,
            public_key_x TEXT NOT NULL,
            public_key_y TEXT NOT NULL,
            attestation_object TEXT,
            client_data_json TEXT,
            state TEXT NOT NULL DEFAULT 'active',
            proposal_hash TEXT,
            proposal_tx_hash TEXT,
            attestation_metadata TEXT,
            mds_metadata TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            last_used_at DATETIME
        );
    "#),
    ("TABLE_SESSIONS", r#"
        CREATE TABLE IF NOT EXISTS sessions (
            session_id TEXT PRIMARY KEY,
            account_address TEXT NOT NULL,
            owner_address TEXT NOT NULL,
            signature TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            device_data TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            completed_at DATETIME,
            expires_at DATETIME NOT NULL
        );
    "#),
    ("TABLE_MDS_CACHE", r#"
        CREATE TABLE IF NOT EXISTS mds_cache (
            key TEXT PRIMARY KEY,
            payload_json TEXT NOT NULL,
            last_updated DATETIME NOT NULL,
            next_update DATETIME,
            blob_number INTEGER,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
];

/**
 * ESTRATO 2: EVOLUCIÓN (Mutaciones de Columna)
 * Asegura que las tablas existentes se adapten a nuevas capacidades sin
 * perder datos en despliegues ya vivos.
 */
const EVOLUTIONARY_STRATA: &[(&str, &str)] = &[
    ("DEVICE_STATE", "ALTER TABLE devices ADD COLUMN state TEXT DEFAULT 'active'"),
    ("DEVICE_PROPOSAL_HASH", "ALTER TABLE devices ADD COLUMN proposal_hash TEXT"),
    ("DEVICE_PROPOSAL_TX_HASH", "ALTER TABLE devices ADD COLUMN proposal_tx_hash TEXT"),
    ("DEVICE_LAST_USED", "ALTER TABLE devices ADD COLUMN last_used_at DATETIME"),
    ("DEVICE_MDS_METADATA", "ALTER TABLE devices ADD COLUMN mds_metadata TEXT"),
    ("SESSION_DEVICE_DATA", "ALTER TABLE sessions ADD COLUMN device_data TEXT"),
];

/**
 * ESTRATO 3: ENDURECIMIENTO (Índices de Aceleración)
 * Optimiza el acceso a los patrones de consulta del gateway de
 * autenticación y del registro de dispositivos.
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_DEVICES_ACCOUNT", "CREATE INDEX IF NOT EXISTS idx_devices_account ON devices(account_address);"),
    ("IDX_DEVICES_ACCOUNT_STATE", "CREATE INDEX IF NOT EXISTS idx_devices_account_state ON devices(account_address, state);"),
    ("IDX_DEVICES_CREDENTIAL", "CREATE INDEX IF NOT EXISTS idx_devices_credential ON devices(credential_id);"),
    ("IDX_DEVICES_PROPOSAL", "CREATE INDEX IF NOT EXISTS idx_devices_proposal ON devices(proposal_hash);"),
    ("IDX_SESSIONS_STATUS", "CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);"),
    ("IDX_SESSIONS_EXPIRES", "CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);"),
];

/**
 * Ejecuta la secuencia maestra de sincronización del esquema estructural.
 *
 * # Errors:
 * Retorna error si alguna tabla base falla en solidificarse, indicando
 * un colapso en el enlace con el motor de persistencia.
 */
#[instrument(skip(database_connection))]
pub async fn apply_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA_ENGINE]: Initiating structural synchronization V151.0...");

    solidify_base_strata(database_connection).await?;
    execute_evolutionary_repair(database_connection).await?;
    harden_access_layer(database_connection).await?;

    info!("✅ [SCHEMA_ENGINE]: Tactical Ledger V151.0 level and certified.");
    Ok(())
}

async fn solidify_base_strata(db: &Connection) -> Result<()> {
    for (identifier, sql) in TACTICAL_TABLES {
        debug!("  ↳ Solidifying: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_SOLIDIFICATION_FAULT: {}", identifier))?;
    }
    Ok(())
}

async fn execute_evolutionary_repair(db: &Connection) -> Result<()> {
    for (identifier, sql) in EVOLUTIONARY_STRATA {
        match db.execute(*sql, ()).await {
            Ok(_) => info!("  🟢 [REPAIR_OK]: Applied evolutionary stratum {}", identifier),
            Err(e) => {
                let message = e.to_string();
                if message.contains("duplicate column name") {
                    debug!("  ⚪ [REPAIR_SKIP]: {} already level.", identifier);
                } else {
                    warn!("  ⚠️ [REPAIR_BYPASS]: {} check incomplete: {}", identifier, message);
                }
            }
        }
    }
    Ok(())
}

async fn harden_access_layer(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("  ↳ Hardening: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_HARDENING_FAULT: {}", identifier))?;
    }
    Ok(())
}
