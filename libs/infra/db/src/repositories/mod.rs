// [libs/infra/db/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY ACCESS MATRIX
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ORQUESTACIÓN DE SUBSISTEMAS DE PERSISTENCIA
 * =================================================================
 */

/// Ciclo de vida de dispositivos passkey enlazados a cuentas.
pub mod device_repository;
/// Handshake de emparejamiento entre dispositivos.
pub mod session_repository;
/// Último blob MDS válido conocido.
pub mod mds_repository;

pub use device_repository::DeviceRepository;
pub use mds_repository::MdsRepository;
pub use session_repository::SessionRepository;
