// ABOUTME: Server binary: wires configuration, resources, the worker, and the HTTP listener
// ABOUTME: Graceful shutdown drains the revocation worker before exit

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use trellis_auth::keystore::{EnvSecretStore, Keystore};
use trellis_auth::revocation::{self, DeliveryResolver, RevocationQueue};
use trellis_auth::routes;
use trellis_auth::{ServerConfig, ServerResources};

#[derive(Parser)]
#[command(
    name = "trellis-authd",
    about = "Certificate-bound OAuth2 authorization server for the Trellis trust framework"
)]
struct Cli {
    /// Override the configured HTTP listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::from_env().context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.http_port = port;
    }
    trellis_auth::logging::init_logging(&config.log_level, &config.environment);
    info!(
        port = config.http_port,
        environment = ?config.environment,
        "starting trellis-authd"
    );

    let keystore = Keystore::new(Box::new(EnvSecretStore));
    let resources = Arc::new(
        ServerResources::build(config.clone(), &keystore)
            .await
            .map_err(|e| anyhow::anyhow!("failed to build server resources: {e}"))?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = spawn_worker(&config, &keystore, shutdown_rx).await?;

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, routes::router(resources))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("HTTP server stopped, draining worker");
    let _ = shutdown_tx.send(true);
    if let Err(e) = worker.await {
        warn!(error = %e, "worker did not stop cleanly");
    }
    Ok(())
}

/// Start the revocation worker on its own redis connection
///
/// Blocking stream reads must not share the multiplexed connection the
/// request handlers enqueue on.
async fn spawn_worker(
    config: &ServerConfig,
    keystore: &Keystore,
    shutdown: watch::Receiver<bool>,
) -> Result<tokio::task::JoinHandle<()>> {
    let queue = RevocationQueue::connect(&config.redis_url, "worker")
        .await
        .map_err(|e| anyhow::anyhow!("failed to connect worker queue: {e}"))?;
    queue
        .ensure_group()
        .await
        .map_err(|e| anyhow::anyhow!("failed to create consumer group: {e}"))?;

    let identity = load_mtls_identity(config, keystore).await?;
    let resolver = DeliveryResolver::new(identity.as_deref())
        .map_err(|e| anyhow::anyhow!("failed to build delivery resolver: {e}"))?;

    Ok(tokio::spawn(revocation::worker::run(
        queue, resolver, shutdown,
    )))
}

/// Resolve the server's own mTLS client identity as one PEM blob
/// (certificate bundle followed by the private key)
async fn load_mtls_identity(config: &ServerConfig, keystore: &Keystore) -> Result<Option<Vec<u8>>> {
    let Some((bundle_path, key_path)) = keystore
        .resolve_certificate_paths(config.mtls_bundle.as_deref(), config.mtls_key.as_deref())
        .await
    else {
        if config.mtls_bundle.is_some() || config.mtls_key.is_some() {
            warn!("mTLS client identity configured but could not be resolved");
        }
        return Ok(None);
    };
    let mut pem = tokio::fs::read(&bundle_path)
        .await
        .with_context(|| format!("failed to read {}", bundle_path.display()))?;
    let key = tokio::fs::read(&key_path)
        .await
        .with_context(|| format!("failed to read {}", key_path.display()))?;
    pem.extend_from_slice(&key);
    Ok(Some(pem))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut signal) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            signal.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}
