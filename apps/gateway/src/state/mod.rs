// [apps/gateway/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: COMPOSITION ROOT DE REPOSITORIOS Y SUBSISTEMAS
 * =================================================================
 */

use std::sync::Arc;

use passkey_domain_models::Metrics;
use passkey_infra_db::repositories::{DeviceRepository, MdsRepository, SessionRepository};
use passkey_infra_db::TursoClient;
use passkey_infra_mds::{MdsCache, TrustTlsOnly};

use crate::config::Config;
use crate::rate_limit::RateLimiter;

/// Shared, thread-safe application state. Cloning is cheap — every field is
/// either an `Arc` or a handle type that wraps one internally.
#[derive(Clone)]
pub struct AppState {
    pub database_client: TursoClient,
    pub device_repository: Arc<DeviceRepository>,
    pub session_repository: Arc<SessionRepository>,
    pub mds_repository: Arc<MdsRepository>,
    pub mds_cache: Arc<MdsCache>,
    pub metrics: Arc<Metrics>,
    pub rate_limiter: Arc<RateLimiter>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(database_client: TursoClient, config: Config) -> Self {
        Self {
            device_repository: Arc::new(DeviceRepository::new(database_client.clone())),
            session_repository: Arc::new(SessionRepository::new(database_client.clone())),
            mds_repository: Arc::new(MdsRepository::new(database_client.clone())),
            mds_cache: Arc::new(MdsCache::new(Box::new(TrustTlsOnly))),
            metrics: Arc::new(Metrics::default()),
            rate_limiter: Arc::new(RateLimiter::new()),
            config: Arc::new(config),
            database_client,
        }
    }
}
