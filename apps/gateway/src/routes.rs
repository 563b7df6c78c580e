// [apps/gateway/src/routes.rs]
/*!
 * =================================================================
 * APARATO: ROUTING TOPOLOGY (ESTRATO L3)
 * RESPONSABILIDAD: DEFINICIÓN DE RUTAS HTTP Y POLÍTICA DE CORS
 * =================================================================
 */

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::{middleware, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{Config, Environment};
use crate::handlers::{admin, devices, health, sessions};
use crate::middleware::rate_limit_guard;
use crate::state::AppState;

/// Development-mode origins permitted beyond the configured frontend URL:
/// localhost on any port, and Vercel/ngrok-style ephemeral preview domains.
fn is_development_origin(origin: &HeaderValue) -> bool {
    let Ok(origin) = origin.to_str() else { return false };
    origin.starts_with("http://localhost:")
        || origin.starts_with("http://127.0.0.1:")
        || origin.ends_with(".vercel.app")
        || origin.ends_with(".ngrok.io")
        || origin.ends_with(".ngrok-free.app")
}

fn cors_layer(config: &Config) -> CorsLayer {
    let environment = config.environment;
    let frontend_url = config.frontend_url.clone();

    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        if let Some(frontend_url) = &frontend_url {
            if origin.as_bytes() == frontend_url.as_bytes() {
                return true;
            }
        }
        environment == Environment::Development && is_development_origin(origin)
    });

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let api_routes = Router::new()
        .route("/passkeys", post(devices::add_device))
        .route("/passkeys/:account_address", get(devices::get_devices))
        .route("/passkeys", delete(devices::remove_device))
        .route("/sessions", post(sessions::create_session))
        .route("/sessions/:session_id", get(sessions::get_session))
        .route("/sessions/:session_id/complete", post(sessions::complete_session))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/backup", post(admin::backup))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_guard));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api_routes)
        .layer(cors_layer(&config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
