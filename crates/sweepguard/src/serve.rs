// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sweepguard serve` command implementation.
//!
//! Wires the SQLite store, the protected-chat cache, the auto-delete engine,
//! and the Telegram transport together, then runs the intake loop until a
//! shutdown signal arrives. Shutdown order matters: transport first (no new
//! events), then the engine (drains in-flight chunks and the persistence
//! queue), then the store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sweepguard_config::SweepConfig;
use sweepguard_core::{DeleteApi, Inbound, MembershipStore, PendingStore, SweepError};
use sweepguard_engine::{AutoDeleteEngine, ProtectedChatCache};
use sweepguard_storage::SqliteStore;
use sweepguard_telegram::TelegramTransport;

/// Runs the `sweepguard serve` command.
pub async fn run_serve(config: SweepConfig) -> Result<(), SweepError> {
    init_tracing(&config.service.log_level);

    info!(name = %config.service.name, "starting sweepguard");

    if let Some(addr) = &config.service.metrics_listen {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| SweepError::Config(format!("invalid metrics_listen address {addr:?}")))?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| SweepError::Internal(format!("failed to install metrics exporter: {e}")))?;
        info!(%addr, "prometheus exporter listening");
    }

    let store = Arc::new(SqliteStore::open(&config.storage).await?);
    let cache = Arc::new(ProtectedChatCache::new(
        Arc::clone(&store) as Arc<dyn MembershipStore>
    ));
    let (transport, mut inbound_rx) = TelegramTransport::new(&config.telegram)?;
    let transport = Arc::new(transport);

    let cancel = install_signal_handler();

    let engine = AutoDeleteEngine::new(
        &config.engine,
        Arc::clone(&transport) as Arc<dyn DeleteApi>,
        Arc::clone(&cache),
        Some(Arc::clone(&store) as Arc<dyn PendingStore>),
        cancel.clone(),
    );

    // Warm the cache before intake so early messages are not dropped, then
    // reload whatever survived the last run.
    cache.refresh().await;
    engine.restore().await?;

    let cache_task = tokio::spawn(Arc::clone(&cache).run(
        Duration::from_secs(config.engine.cache_refresh_seconds),
        cancel.clone(),
    ));
    let engine_task = tokio::spawn(Arc::clone(&engine).run());
    let transport_task = {
        let transport = Arc::clone(&transport);
        let cancel = cancel.clone();
        tokio::spawn(async move { transport.run(cancel).await })
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = inbound_rx.recv() => {
                let Some(inbound) = received else { break };
                match inbound {
                    Inbound::Message(event) => engine.handle_event(&event),
                    Inbound::MembershipGranted(chat_id) => {
                        cache.mark_active(chat_id);
                        if let Err(error) = store.set_chat_active(chat_id, true).await {
                            warn!(%error, chat_id, "failed to persist membership grant");
                        }
                    }
                    Inbound::MembershipRevoked(chat_id) => {
                        cache.mark_inactive(chat_id);
                        if let Err(error) = store.set_chat_active(chat_id, false).await {
                            warn!(%error, chat_id, "failed to persist membership revocation");
                        }
                    }
                }
            }
        }
    }

    info!("shutting down");
    let _ = transport_task.await;
    let _ = engine_task.await;
    let _ = cache_task.await;
    store.close().await?;
    info!("sweepguard stopped");
    Ok(())
}

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is
/// received.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sweepguard={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
