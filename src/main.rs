//! License Key Service - Main Application Entry Point
//!
//! This is a REST API server for license key activation and entitlement
//! queries. Admin endpoints generate, revoke, and delete keys; public
//! endpoints let desktop clients activate keys, rebind them to new
//! hardware, and poll entitlement status.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Storage**: JSON-backed record store with atomic writes + snapshots
//! - **Authentication**: admin API key with SHA-256 hashing
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Open the record store (canonical tables or newest local snapshot)
//! 3. Restore from the external backup channel, if one is configured
//! 4. Build HTTP router with routes and middleware
//! 5. Spawn the periodic backup task
//! 6. Start server on configured port; ctrl-c stops timer and server

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use license_key_service::{AppState, config, handlers, middleware, services, store};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    config.validate()?;
    tracing::info!("Configuration loaded");

    // Open the record store
    let key_store = store::KeyStore::open(config.data_dir.clone()).await?;
    tracing::info!("Record store opened at {}", config.data_dir);

    let state = AppState::new(key_store, config);

    // Restore from the external backup channel, if configured
    services::backup_service::restore_on_startup(&state).await?;

    // Create admin routes (key management, audit, backup)
    let admin_routes = Router::new()
        // Key lifecycle routes
        .route("/api/v1/keys", post(handlers::keys::generate_key))
        .route("/api/v1/keys", get(handlers::keys::list_keys))
        .route("/api/v1/keys/{id}", get(handlers::keys::get_key))
        .route("/api/v1/keys/{id}/revoke", post(handlers::keys::revoke_key))
        .route("/api/v1/keys/{id}", delete(handlers::keys::delete_key))
        // Observability routes
        .route("/api/v1/audit", get(handlers::audit::recent))
        .route("/api/v1/stats", get(handlers::entitlements::stats))
        // Backup routes
        .route("/api/v1/backup", post(handlers::backup::backup))
        .route("/api/v1/restore", post(handlers::backup::restore))
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Combine admin routes with public client routes
    let app = Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/activate", post(handlers::activation::activate))
        .route("/api/v1/rebind", post(handlers::activation::rebind))
        .route("/api/v1/key-info/{id}", get(handlers::activation::key_info))
        .route(
            "/api/v1/entitlements/{user_id}",
            get(handlers::entitlements::status),
        )
        // Merge admin routes
        .merge(admin_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Share state with all handlers via State extraction
        .with_state(state.clone());

    // Periodic backup task, stopped via the watch channel at shutdown
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let backup_task = tokio::spawn(services::backup_service::run_periodic_backup(
        state.clone(),
        shutdown_rx,
    ));

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", state.config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Serve HTTP requests until ctrl-c
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    // Stop the backup timer and wait for it to exit
    let _ = shutdown_tx.send(true);
    let _ = backup_task.await;

    Ok(())
}
