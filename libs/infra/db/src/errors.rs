// [libs/infra/db/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG (V180.7 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace físico o de red con el cluster libSQL.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo en la configuración del entorno (Variables vacías o malformadas).
    #[error("[L3_DB_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el Dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    /// Error al comprometer cambios en una secuencia multi-tabla.
    #[error("[L3_DB_FAULT]: TRANSACTION_COLLAPSE -> {0}")]
    TransactionError(String),

    // --- ESTRATO DE DISPOSITIVOS (DEVICE REGISTRY) ---

    /// El dispositivo solicitado no existe en las tablas activas.
    #[error("[L3_DEVICE_FAULT]: DEVICE_NOT_FOUND")]
    DeviceNotFound,

    /// Ya existe un dispositivo activo con ese credentialId o deviceId.
    #[error("[L3_DEVICE_FAULT]: DEVICE_CONFLICT -> {0}")]
    DeviceConflict(String),

    /// El dispositivo no se encuentra en un estado apto para la operación
    /// solicitada (p. ej. activar un dispositivo ya retirado).
    #[error("[L3_DEVICE_FAULT]: INVALID_STATE_TRANSITION -> {0}")]
    InvalidState(String),

    // --- ESTRATO DE SESIONES ---

    /// La sesión solicitada no existe.
    #[error("[L3_SESSION_FAULT]: SESSION_NOT_FOUND")]
    SessionNotFound,

    /// La sesión ya fue completada o ha expirado; la operación no aplica.
    #[error("[L3_SESSION_FAULT]: SESSION_NOT_PENDING")]
    SessionNotPending,

    // --- ESTRATO DE VALIDACIÓN DE ENTRADA ---

    /// Los datos recibidos no cumplen una invariante de dominio antes de
    /// siquiera llegar al motor SQL (longitud, formato, rango).
    #[error("[L3_VALIDATION_FAULT]: {0}")]
    Validation(String),
}

impl DbError {
    /// True when the failure is transient and a caller-level retry is
    /// reasonable (lock contention, busy timeout exceeded).
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::QueryError(e) => {
                let message = e.to_string();
                message.contains("database is locked") || message.contains("busy")
            }
            _ => false,
        }
    }
}
