// [apps/gateway/src/handlers/mod.rs]
/*!
 * =================================================================
 * APARATO: HTTP ADAPTERS (ESTRATO L4)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE LOS PUNTOS DE ENTRADA
 * =================================================================
 */

pub mod admin;
pub mod devices;
pub mod health;
pub mod sessions;
