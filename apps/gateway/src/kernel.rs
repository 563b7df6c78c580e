// [apps/gateway/src/kernel.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY KERNEL (ESTRATO L1-APP)
 * RESPONSABILIDAD: COMPOSITION ROOT E IGNICIÓN DEL SERVIDOR HTTP
 * =================================================================
 */

use std::net::{IpAddr, SocketAddr};

use passkey_infra_db::TursoClient;
use tokio::sync::watch;
use tracing::{error, info, instrument};

use crate::config::Config;
use crate::routes::build_router;
use crate::services::{spawn_backup_task, spawn_mds_refresh_task, spawn_session_gc_task};
use crate::state::AppState;

pub struct GatewayKernel {
    port: u16,
    state: AppState,
}

impl GatewayKernel {
    #[instrument(skip(config))]
    pub async fn ignite(config: Config) -> Self {
        let database_client = TursoClient::connect(&config.database_path, None)
            .await
            .expect("FATAL: database connection failed during ignition");

        let port = config.port;
        Self {
            port,
            state: AppState::new(database_client, config),
        }
    }

    /// Spawns the three background schedulers, binds the TCP listener, and
    /// serves until an OS termination signal arrives, then stops the
    /// timers before the process exits.
    pub async fn launch(self) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        spawn_backup_task(self.state.clone(), shutdown_rx.clone());
        spawn_mds_refresh_task(self.state.clone(), shutdown_rx.clone());
        spawn_session_gc_task(self.state.clone(), shutdown_rx.clone());

        let router = build_router(self.state.clone()).into_make_service_with_connect_info::<SocketAddr>();

        let bind_address = SocketAddr::new("0.0.0.0".parse::<IpAddr>().unwrap(), self.port);
        let listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .expect("CRITICAL_FAULT: failed to bind network port");

        info!("gateway listening on {}", bind_address);

        let server = axum::serve(listener, router).with_graceful_shutdown(wait_for_termination_signal());

        let exit_code = match server.await {
            Ok(()) => 0,
            Err(e) => {
                error!("server loop failed: {}", e);
                1
            }
        };

        // Stop the timers before the process exits so no scheduled task can
        // observe a connection mid-close. Sending on an already-closed
        // channel (double shutdown) is a documented no-op.
        let _ = shutdown_tx.send(true);
        info!("gateway shutdown complete");
        std::process::exit(exit_code);
    }
}

async fn wait_for_termination_signal() {
    let interrupt = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
