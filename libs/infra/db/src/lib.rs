pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::TursoClient;
pub use errors::DbError;
pub use repositories::{DeviceRepository, MdsRepository, SessionRepository};
