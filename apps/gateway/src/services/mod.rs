// [apps/gateway/src/services/mod.rs]
/*!
 * =================================================================
 * APARATO: BACKGROUND SERVICES (ESTRATO L4)
 * =================================================================
 */

pub mod scheduler;

pub use scheduler::{spawn_backup_task, spawn_mds_refresh_task, spawn_session_gc_task};
