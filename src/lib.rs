//! License key activation and entitlement service library.
//!
//! The binary in `main.rs` wires these modules into an Axum server; the
//! library split exists so integration tests can drive the lifecycle and
//! backup services against a temporary store directly.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

use std::sync::Arc;

pub use config::Config;
pub use error::AppError;
pub use store::KeyStore;

/// Shared application state injected into every handler via Axum's `State`.
#[derive(Clone)]
pub struct AppState {
    /// The JSON-backed record store (keys, usage, tombstones, audit log).
    pub store: Arc<KeyStore>,

    /// Loaded configuration (admin key hash, webhook/backup endpoints).
    pub config: Arc<Config>,

    /// Shared HTTP client for webhook notifications and backup upload.
    ///
    /// reqwest clients hold a connection pool internally, so one clone-able
    /// client is reused for all outbound calls.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(store: KeyStore, config: Config) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
            http: reqwest::Client::new(),
        }
    }
}
