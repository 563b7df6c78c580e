// [apps/gateway/src/services/scheduler.rs]
/*!
 * =================================================================
 * APARATO: BACKGROUND SCHEDULER (ESTRATO L4)
 * RESPONSABILIDAD: BACKUP, MDS REFRESH Y SESSION GC PERIÓDICOS
 *
 * Cada tarea es un daemon independiente con su propio ticker,
 * cancelado cooperativamente por el mismo canal `watch` de apagado —
 * nunca un "timer global" compartido.
 * =================================================================
 */

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{info, warn};

use passkey_infra_mds::log_refresh_failure;

use crate::config::mds_endpoint;
use crate::state::AppState;

const MDS_TTL_HOURS: i64 = 24;

pub fn spawn_backup_task(state: AppState, mut shutdown: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(state.config.backup_interval_hours * 3600));
        ticker.tick().await; // consume the immediate first tick; backup runs on the interval, not at boot

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Utc::now();
                    let destination = Path::new(&state.config.backup_dir).join(format!("passkeys-{}.db", now.to_rfc3339()));
                    match state.database_client.backup(&state.config.database_path, &destination).await {
                        Ok(()) => state.metrics.record_backup(now),
                        Err(e) => warn!("scheduled backup failed: {}", e),
                    }
                }
                _ = shutdown.changed() => {
                    info!("backup task shutting down");
                    break;
                }
            }
        }
    });
}

/// Runs once immediately (the interval's first tick resolves without delay)
/// and then every `mds_refresh_interval_hours`; each run still honors the
/// 24h TTL before actually touching the network.
pub fn spawn_mds_refresh_task(state: AppState, mut shutdown: watch::Receiver<bool>) {
    tokio::spawn(async move {
        if let Ok(Some(blob)) = state.mds_repository.load_blob().await {
            if let Err(e) = state.mds_cache.load_persisted(blob) {
                warn!("failed to load persisted MDS blob: {}", e);
            }
        }

        let mut ticker = interval(Duration::from_secs(state.config.mds_refresh_interval_hours * 3600));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    refresh_mds_if_stale(&state).await;
                }
                _ = shutdown.changed() => {
                    info!("MDS refresh task shutting down");
                    break;
                }
            }
        }
    });
}

async fn refresh_mds_if_stale(state: &AppState) {
    if let Some(last_updated) = state.mds_cache.last_updated() {
        if Utc::now() - last_updated < chrono::Duration::hours(MDS_TTL_HOURS) {
            return;
        }
    }

    match state.mds_cache.fetch_and_refresh(mds_endpoint()).await {
        Ok(blob) => {
            if let Err(e) = state.mds_repository.save_blob(&blob).await {
                warn!("MDS blob refreshed but failed to persist: {}", e);
            }
        }
        Err(e) => log_refresh_failure(&e),
    }
}

/// Also sweeps the rate limiter's per-IP window map on the same cadence —
/// it has no dedicated timer, and session GC's interval is a reasonable
/// cadence to keep that map from growing unboundedly in a long-lived
/// deployment.
pub fn spawn_session_gc_task(state: AppState, mut shutdown: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(state.config.session_gc_interval_secs));
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match state.session_repository.cleanup_expired_sessions().await {
                        Ok(removed) if removed > 0 => info!("session GC removed {} expired rows", removed),
                        Ok(_) => {}
                        Err(e) => warn!("session GC failed: {}", e),
                    }
                    state.rate_limiter.sweep();
                }
                _ = shutdown.changed() => {
                    info!("session GC task shutting down");
                    break;
                }
            }
        }
    });
}
