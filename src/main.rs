use domain::{ListenableRegistry, MemorySessionStore};
use gateway::{Gateway, GatewayConfig};
use hub::Hub;
use log::{error, info};
use messages::Registry;
use service::config::{Config, PermissionPolicy};
use service::logging::Logger;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!("Starting pubsub gateway...");

    let hub = Arc::new(Hub::new(config.broadcast_capacity));

    let sessions = match config.sessions_file() {
        Some(path) => match MemorySessionStore::from_file(path) {
            Ok(sessions) => Arc::new(sessions),
            Err(e) => {
                error!("Failed to load sessions from {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => Arc::new(MemorySessionStore::new()),
    };

    // Listenable entity types are registered by applications embedding the
    // gateway crates. On its own the binary relays generic messages only.
    let listenables = Arc::new(ListenableRegistry::new());

    let mut handles = Vec::new();

    let relay = Gateway::new(
        gateway_config(&config, "relay", config.relay_permission),
        hub.clone(),
        Arc::new(Registry::with_defaults(listenables)),
        sessions.clone(),
    );
    handles.push(serve(relay, &config.relay_address()).await);

    if let Some(address) = config.control_address() {
        let control = Gateway::new(
            gateway_config(&config, "control", config.control_permission),
            hub.clone(),
            Arc::new(Registry::generic_only()),
            sessions.clone(),
        );
        handles.push(serve(control, &address).await);
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!("Gateway task failed: {e}");
        }
    }
}

fn gateway_config(config: &Config, name: &str, policy: PermissionPolicy) -> GatewayConfig {
    match GatewayConfig::from_config(config, name, policy) {
        Ok(gateway_config) => gateway_config,
        Err(e) => {
            error!("Invalid hello message: {e}");
            std::process::exit(1);
        }
    }
}

async fn serve(gateway: Gateway, address: &str) -> JoinHandle<()> {
    match gateway.bind(address).await {
        Ok((_, handle)) => handle,
        Err(e) => {
            error!("Failed to start gateway on {address}: {e}");
            std::process::exit(1);
        }
    }
}
