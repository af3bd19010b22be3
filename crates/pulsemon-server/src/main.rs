use anyhow::{Context, Result};
use ipnet::IpNet;
use pulsemon_common::crypto;
use pulsemon_common::proto::metrics_service_server::MetricsServiceServer;
use pulsemon_server::state::{AppState, Security};
use pulsemon_server::{app, config, grpc};
use pulsemon_storage::database::DatabaseStorage;
use pulsemon_storage::memory::MemoryStorage;
use pulsemon_storage::Storage;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tonic::transport::Server as TonicServer;
use tracing_subscriber::EnvFilter;

/// How long in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pulsemon=info".parse()?))
        .init();

    let config = config::load()?;

    let mut database: Option<Arc<DatabaseStorage>> = None;
    let storage: Arc<dyn Storage> = if !config.database_dsn.is_empty() {
        tracing::info!("using database storage");
        let db = Arc::new(
            DatabaseStorage::connect(&config.database_dsn)
                .await
                .context("failed to connect to database")?,
        );
        db.run_migrations()
            .await
            .context("failed to run migrations")?;
        database = Some(db.clone());
        db
    } else {
        tracing::info!("using in-memory storage");
        let memory = Arc::new(MemoryStorage::new());
        MemoryStorage::configure_persistence(
            &memory,
            &config.file_storage_path,
            config.restore,
            config.store_interval,
        )
        .context("failed to configure file persistence")?;
        memory
    };

    let trusted_subnet = if config.trusted_subnet.is_empty() {
        None
    } else {
        Some(
            config
                .trusted_subnet
                .parse::<IpNet>()
                .context("failed to parse trusted subnet")?,
        )
    };
    let private_key = if config.crypto_key.is_empty() {
        None
    } else {
        Some(crypto::load_private_key(&config.crypto_key)?)
    };
    let hash_key = if config.key.is_empty() {
        None
    } else {
        Some(config.key.clone())
    };

    let state = AppState {
        storage,
        security: Arc::new(Security {
            hash_key,
            private_key,
            trusted_subnet,
        }),
    };

    if config.grpc_enabled && config.grpc_port >= 1024 {
        serve_grpc(config.grpc_port, state).await?;
    } else {
        if config.grpc_enabled {
            tracing::info!(
                grpc_port = config.grpc_port,
                "gRPC port outside the usable range, falling back to HTTP"
            );
        }
        serve_http(&config.server_address, state).await?;
    }

    if let Some(db) = database {
        db.close().await;
    }
    tracing::info!("server stopped");
    Ok(())
}

async fn serve_http(address: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    tracing::info!(address, "starting HTTP server");

    let router = app::build_router(state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
    });

    shutdown_signal().await;
    tracing::info!("shutting down HTTP server");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(joined) => joined?.context("HTTP server error")?,
        Err(_) => tracing::warn!("shutdown deadline exceeded, aborting in-flight requests"),
    }
    Ok(())
}

async fn serve_grpc(port: u16, state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    tracing::info!(port, "starting gRPC server");

    let service = MetricsServiceServer::new(grpc::MetricsServiceImpl::new(state));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        TonicServer::builder()
            .add_service(service)
            .serve_with_shutdown(addr, async {
                shutdown_rx.await.ok();
            })
            .await
    });

    shutdown_signal().await;
    tracing::info!("shutting down gRPC server");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(joined) => joined?.context("gRPC server error")?,
        Err(_) => tracing::warn!("shutdown deadline exceeded, aborting in-flight requests"),
    }
    Ok(())
}

/// Resolves when SIGTERM, SIGINT, or SIGQUIT arrives.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut quit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
            _ = quit.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
