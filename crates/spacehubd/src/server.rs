//! Wiring and serving.

use std::net::SocketAddr;
use std::sync::Arc;

use spacehub_api::{ApiState, build_router};
use spacehub_env::EnvConfigManager;
use spacehub_events::BroadcastPublisher;
use spacehub_lifecycle::SpaceAppLifecycle;
use spacehub_logs::LogRelay;
use spacehub_state::StateStore;
use spacehub_vault::{MemoryVault, SecureConfigStore, VaultKvStore};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::config::DaemonConfig;

/// Everything the API needs, plus the publisher for audit subscribers.
pub struct Services {
    pub api: ApiState,
    pub publisher: Arc<BroadcastPublisher>,
}

/// Build the services over an already opened store.
pub fn wire(config: &DaemonConfig, store: StateStore) -> anyhow::Result<Services> {
    let vault: Arc<dyn SecureConfigStore> = match &config.vault {
        Some(vault) => {
            info!(address = %vault.address, mount = %vault.mount, "using vault KV store");
            Arc::new(VaultKvStore::new(vault.clone())?)
        }
        None => {
            warn!("no [vault] section, secrets are kept in memory only");
            Arc::new(MemoryVault::new())
        }
    };

    let publisher = Arc::new(BroadcastPublisher::new(config.topics.clone()));
    let permissions = Arc::new(config.permissions.clone());

    let lifecycle = Arc::new(SpaceAppLifecycle::new(
        store.clone(),
        publisher.clone(),
        permissions.clone(),
        config.lifecycle.clone(),
    ));
    let env = EnvConfigManager::new(
        store.clone(),
        vault,
        publisher.clone(),
        permissions,
        lifecycle.clone(),
        config.env.clone(),
    )?;
    let relay = LogRelay::new(config.logs.clone())?;

    Ok(Services {
        api: ApiState {
            store,
            lifecycle,
            env: Arc::new(env),
            relay: Arc::new(relay),
        },
        publisher,
    })
}

/// Run the daemon until Ctrl-C.
pub async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    info!("Spacehub daemon starting");

    std::fs::create_dir_all(&config.server.data_dir)?;
    let db_path = config.server.data_dir.join("spacehub.redb");
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let services = wire(&config, store)?;

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Event audit log ────────────────────────────────────────

    let audit_handle = tokio::spawn(audit_events(services.publisher.subscribe(), shutdown_rx));

    // ── API server ─────────────────────────────────────────────

    let router = build_router(services.api);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = audit_handle.await;
    info!("Spacehub daemon stopped");
    Ok(())
}

/// Log every published event until shutdown.
async fn audit_events(
    mut events: broadcast::Receiver<spacehub_events::Envelope>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            received = events.recv() => match received {
                Ok(envelope) => {
                    info!(
                        target: "spacehub::events",
                        topic = %envelope.topic,
                        payload = %envelope.payload,
                        published_at = envelope.published_at,
                        "event"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "audit log fell behind the event bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}
