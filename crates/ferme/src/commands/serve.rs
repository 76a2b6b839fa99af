//! HTTP server command implementation.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{Mutex, broadcast};
use tracing::{info, warn};

use ferme::build_info::BuildInfo;
use ferme::client::FermeClient;
use ferme::config::Config;
use ferme::notify::{NotificationWorker, PermissionGate, WorkerHandle, build_deliveries};
use ferme::reminder::{DailySchedule, Dispatcher, ReminderScheduler, ReminderSupervisor};
use ferme::server::{self, AppState};
use ferme::store::file::{FileBlobStore, FileDocumentStore, FilePermissionStore};
use ferme::store::{BlobStore, DocumentStore, PermissionStore};
use ferme::task::{DueSoonWindow, TaskRepository};
use ferme_notify_protocol::WorkerEvent;

/// Commands queued for the notification worker before reminders are dropped.
const WORKER_QUEUE: usize = 64;

pub async fn run(
    config_path: &str,
    host_override: Option<IpAddr>,
    port_override: Option<u16>,
) -> Result<()> {
    let mut config = Config::load(config_path).await?;

    // CLI overrides config
    if let Some(host) = host_override {
        config.server.host = host.to_string();
    }
    if let Some(port) = port_override {
        config.server.port = port;
    }

    let paths = config.paths(Path::new(config_path));
    tokio::fs::create_dir_all(&paths.blobs)
        .await
        .with_context(|| format!("Failed to create {}", paths.blobs.display()))?;

    // Stores
    let documents: Arc<dyn DocumentStore> = Arc::new(FileDocumentStore::new(&paths.documents));
    let blobs: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(
        &paths.blobs,
        config.storage.public_base_url.clone(),
    ));
    let permission_store: Arc<dyn PermissionStore> =
        Arc::new(FilePermissionStore::new(&paths.permission_file));
    info!(
        documents = %paths.documents.display(),
        blobs = %paths.blobs.display(),
        "Storage ready"
    );

    // Notifications
    let permission = PermissionGate::load(permission_store, config.notifications.enabled).await?;
    info!(permission = %permission.current(), "Notification permission loaded");

    let deliveries = build_deliveries(&config.notifications.deliveries)
        .context("Failed to set up notification deliveries")?;
    let worker = NotificationWorker::new(deliveries).start(WORKER_QUEUE);
    tokio::spawn(log_worker_events(worker.subscribe()));

    // Reminders
    let due_soon = DueSoonWindow::new(config.reminders.due_soon_days);
    let dispatcher = Dispatcher::new(permission.clone(), worker.outbox(), due_soon);
    let schedule = DailySchedule::new(config.reminders.fire_at()?);
    let scheduler = ReminderScheduler::new(dispatcher, schedule);
    let reminders = scheduler.status();

    let supervisor = if config.reminders.enabled {
        Some(ReminderSupervisor::spawn(documents.clone(), scheduler))
    } else {
        info!("Daily reminders disabled");
        None
    };

    // Create shutdown channel for HTTP-triggered shutdown
    let (shutdown_tx, shutdown_rx) = server::shutdown_channel();

    let state = AppState {
        workspace: paths.workspace.clone(),
        tasks: TaskRepository::new(documents),
        blobs,
        blobs_dir: paths.blobs.clone(),
        permission,
        worker: worker.clone(),
        reminders,
        due_soon,
        admin_token: config.server.admin_token.clone(),
        api_token: config.server.api_token.clone(),
        max_connections: config.server.max_connections,
        shutdown_tx: Arc::new(Mutex::new(Some(shutdown_tx))),
    };

    let app = server::build_app(state, config.server.request_timeout_seconds);

    let ip: IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::new(ip, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(addr = %addr, build = %BuildInfo::CURRENT, "Starting server");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_rx))
    .await?;

    shutdown_services(supervisor, &worker).await;

    info!("Server stopped");
    Ok(())
}

/// Stop a running server by calling the shutdown endpoint.
pub async fn stop(config_path: &str, port_override: Option<u16>) -> Result<()> {
    let config = Config::load(config_path).await?;
    let url = super::local_url(&config.server, port_override);

    let client = FermeClient::new(&url);

    // Check if server is running
    if client.health().await.is_err() {
        anyhow::bail!("No server running at {}", url);
    }

    client
        .shutdown(config.server.admin_token.as_deref())
        .await
        .context("Failed to stop server")?;

    println!("Shutdown initiated for server at {}", url);
    Ok(())
}

async fn shutdown_services(supervisor: Option<ReminderSupervisor>, worker: &WorkerHandle) {
    // Stop reminders first so nothing is queued to a stopped worker.
    if let Some(supervisor) = supervisor {
        supervisor.shutdown().await;
    }
    worker.shutdown().await;
}

/// Surface worker events that have no other consumer.
async fn log_worker_events(mut events: broadcast::Receiver<WorkerEvent>) {
    loop {
        match events.recv().await {
            Ok(WorkerEvent::OpenView { url }) => info!(url = %url, "Open view requested"),
            Ok(WorkerEvent::FocusView { view_id, url }) => {
                info!(view_id = %view_id, url = %url, "Focus view requested");
            }
            Ok(WorkerEvent::Error { code, message }) => {
                warn!(code = %code, message = %message, "Notification worker error");
            }
            Ok(WorkerEvent::Shutdown { .. }) | Err(broadcast::error::RecvError::Closed) => break,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Worker event log lagged");
            }
        }
    }
}

async fn shutdown_signal(http_shutdown: tokio::sync::oneshot::Receiver<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
        _ = http_shutdown => info!("Received shutdown request via HTTP, shutting down..."),
    }
}
