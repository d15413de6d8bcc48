//! conductord: desired-state API server for a container scheduler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use conductor_api::{ApiState, Credentials, ServerOptions};
use conductor_core::config::{ConductorConfig, StoreBackend};
use conductor_services::store::{EtcdStore, MemoryStore, Store};
use conductor_services::{TaskWatcher, WatcherConfig};

mod heartbeat;

use heartbeat::nats::NatsBus;
use heartbeat::{Heartbeat, HeartbeatConfig, RegistryMessage};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = ConductorConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = ConductorConfig::load().context("failed to load config")?;
    config.validate().context("invalid configuration")?;
    let listen_addr = config.listen_addr()?;

    tracing::info!(
        listen = %listen_addr,
        backend = ?config.store.backend,
        register_with_router = config.heartbeat.register_with_router,
        "conductord starting"
    );

    // ── Store ────────────────────────────────────────────────────────────────
    let store: Arc<dyn Store> = match config.store.backend {
        StoreBackend::Etcd => Arc::new(
            EtcdStore::connect(
                &config.store.etcd_cluster,
                Duration::from_secs(config.store.request_timeout_secs),
            )
            .await
            .context("failed to connect to etcd")?,
        ),
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; nothing survives a restart");
            Arc::new(MemoryStore::new())
        }
    };

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let options = ServerOptions {
        credentials: Credentials::from_config(&config.server.username, &config.server.password),
        cors_enabled: config.server.cors_enabled,
    };
    let app = conductor_api::router(ApiState::new(Arc::clone(&store)), &options);
    let api_task = tokio::spawn(conductor_api::serve(
        app,
        listen_addr,
        shutdown_tx.subscribe(),
    ));

    let watcher_task = tokio::spawn(
        TaskWatcher::new(
            Arc::clone(&store),
            WatcherConfig::from(&config.task_watcher),
            shutdown_tx.subscribe(),
        )
        .run(),
    );

    let heartbeat_task = if config.heartbeat.register_with_router {
        let settings = &config.heartbeat;
        match NatsBus::connect(
            &settings.nats_addresses,
            &settings.nats_username,
            &settings.nats_password,
        )
        .await
        {
            Ok(bus) => {
                let message = RegistryMessage {
                    host: heartbeat::advertised_host(listen_addr, &settings.nats_addresses),
                    port: listen_addr.port(),
                    uris: settings.domain_names.clone(),
                };
                let hb = Heartbeat::new(
                    Arc::new(bus),
                    &message,
                    HeartbeatConfig::from(settings),
                    shutdown_tx.subscribe(),
                )
                .context("failed to encode registry message")?;
                Some(tokio::spawn(hb.run()))
            }
            Err(e) => {
                tracing::error!(error = %e, "router registration disabled");
                None
            }
        }
    } else {
        None
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = api_task           => tracing::error!("API server exited: {:?}", r),
        r = watcher_task       => tracing::error!("task watcher exited: {:?}", r),
    }
    let _ = shutdown_tx.send(());

    // Let the heartbeat unregister before the runtime goes away.
    if let Some(task) = heartbeat_task {
        if tokio::time::timeout(Duration::from_secs(2), task).await.is_err() {
            tracing::warn!("heartbeat did not unregister in time");
        }
    }

    Ok(())
}
