// [apps/gateway/src/handlers/health.rs]
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Instant;

static PROCESS_STARTED_AT: OnceLock<Instant> = OnceLock::new();

pub async fn health() -> Json<Value> {
    let started_at = PROCESS_STARTED_AT.get_or_init(Instant::now);
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime": started_at.elapsed().as_secs(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_ok_status_with_a_timestamp_and_uptime() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].is_string());
        assert!(body["uptime"].is_u64());
    }
}
