// [apps/gateway/src/lib.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY LIBRARY ROOT (ESTRATO L3)
 * RESPONSABILIDAD: DEFINICIÓN DEL ÁRBOL DE MÓDULOS
 * =================================================================
 */

pub mod config;
pub mod envelope;
pub mod errors;
pub mod handlers;
pub mod kernel;
pub mod middleware;
pub mod rate_limit;
pub mod routes;
pub mod services;
pub mod state;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::kernel::GatewayKernel;
    pub use crate::state::AppState;
}
