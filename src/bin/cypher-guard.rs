// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cypher Guard Gateway
//!
//! Serves the query admission API in front of a Neo4j database. Users,
//! permissions and the audit log live in Postgres.
//!
//! Run with: cargo run --bin cypher-guard
//!
//! Prerequisites:
//! 1. Postgres reachable via POSTGRES_* environment variables
//! 2. Neo4j reachable via NEO4J_* environment variables

use anyhow::{Context, Result};
use cypher_guard::{
    http::{self, AppState},
    AdmissionEngine, AuditQueue, GatewayConfig, Neo4jBackend, PgStore,
};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("🚀 Starting Cypher Guard");

    let config = GatewayConfig::from_env().context("Failed to load configuration")?;
    info!("📋 Configuration loaded:");
    info!("  - Listen address: {}", config.bind);
    info!("  - Scanner: {}", config.scanner);
    info!("  - Neo4j URI: {}", config.neo4j.uri);
    info!(
        "  - Postgres: {}:{}/{}",
        config.postgres.host, config.postgres.port, config.postgres.database
    );
    if let Some(timeout) = config.query_timeout {
        info!("  - Query timeout: {:?}", timeout);
    }

    let store = Arc::new(
        PgStore::connect(&config.postgres)
            .await
            .context("Failed to connect to Postgres")?,
    );
    store
        .migrate()
        .await
        .context("Failed to apply database migrations")?;
    info!("✅ Permission store ready");

    let backend = Arc::new(
        Neo4jBackend::connect(&config.neo4j)
            .await
            .context("Failed to connect to Neo4j")?,
    );
    info!("✅ Graph backend ready");

    let audit = AuditQueue::spawn(store.clone(), config.audit);
    let engine = AdmissionEngine::new(config.scanner.build(), backend, audit.handle())
        .with_timeout(config.query_timeout);
    let app = http::router(AppState::new(engine, store));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("🎧 Listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("🛑 Server stopped, draining audit queue");
    if let Err(e) = audit.shutdown(config.audit_drain_timeout).await {
        error!("❌ Audit queue did not drain cleanly: {}", e);
    }

    info!("👋 Cypher Guard stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
