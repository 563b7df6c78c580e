// [apps/gateway/src/main.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY MAIN ENTRY POINT (ESTRATO L3)
 * RESPONSABILIDAD: BOOTSTRAP DE ENTORNO E IGNICIÓN DEL KERNEL
 * =================================================================
 */

use passkey_gateway::prelude::*;

use dotenvy::dotenv;
use passkey_shared_telemetry::init_tracing;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_tracing("passkey_gateway");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(4 * 1024 * 1024)
        .build()?;

    runtime.block_on(async {
        let config = Config::from_env();
        info!("starting gateway on port {}", config.port);

        let kernel = GatewayKernel::ignite(config).await;
        kernel.launch().await;
    });

    Ok(())
}
