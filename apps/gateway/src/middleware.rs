// [apps/gateway/src/middleware.rs]
/*!
 * =================================================================
 * APARATO: PERIMETER GUARDS (ESTRATO L4)
 * RESPONSABILIDAD: LIMITACIÓN DE TASA POR IP DE ORIGEN
 *
 * Envelope verification is not a generic header guard here — the
 * envelope travels in the request body or query string depending on
 * the verb, so it is parsed per-handler via `VerifiedEnvelope::parse`
 * rather than a blanket middleware layer.
 * =================================================================
 */

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::errors::ApiError;
use crate::state::AppState;

pub async fn rate_limit_guard(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.rate_limiter.check(addr.ip()) {
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(req).await)
}
