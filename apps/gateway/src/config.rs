// [apps/gateway/src/config.rs]
/*!
 * =================================================================
 * APARATO: RUNTIME CONFIGURATION (ESTRATO L3)
 * RESPONSABILIDAD: CARGA Y VALIDACIÓN DE VARIABLES DE ENTORNO
 * =================================================================
 */

use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: Environment,
    pub frontend_url: Option<String>,
    pub database_path: String,
    pub backup_dir: String,
    pub backup_interval_hours: u64,
    pub mds_refresh_interval_hours: u64,
    pub session_gc_interval_secs: u64,
    pub admin_backup_enabled: bool,
}

impl Config {
    /// Loads configuration from the process environment, applying the
    /// defaults named in the service's documented env-var table. Panics at
    /// startup (not at request time) if a production-only requirement is
    /// missing — `FRONTEND_URL` when `NODE_ENV=production`.
    pub fn from_env() -> Self {
        let environment = match env::var("NODE_ENV").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        };

        let frontend_url = env::var("FRONTEND_URL").ok();
        if environment == Environment::Production && frontend_url.is_none() {
            panic!("CRITICAL_CONFIG_FAULT: FRONTEND_URL must be set when NODE_ENV=production");
        }

        Self {
            port: env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(3000),
            environment,
            frontend_url,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/passkeys.db".to_string()),
            backup_dir: env::var("BACKUP_DIR").unwrap_or_else(|_| "./data/backups".to_string()),
            backup_interval_hours: env::var("BACKUP_INTERVAL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            mds_refresh_interval_hours: env::var("MDS_REFRESH_INTERVAL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            session_gc_interval_secs: env::var("SESSION_GC_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            admin_backup_enabled: env::var("ADMIN_BACKUP_ENABLED")
                .ok()
                .map(|v| v == "true")
                .unwrap_or(false),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Manual backup is allowed outside production, or inside production
    /// when explicitly opted in via `ADMIN_BACKUP_ENABLED`.
    pub fn manual_backup_allowed(&self) -> bool {
        !self.is_production() || self.admin_backup_enabled
    }
}

const FIDO_MDS_URL: &str = "https://mds3.fidoalliance.org/";

pub fn mds_endpoint() -> &'static str {
    FIDO_MDS_URL
}
