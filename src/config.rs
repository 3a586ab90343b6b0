//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

use crate::error::AppError;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `ADMIN_KEY_HASH` (required): SHA-256 hex digest of the admin API key
/// - `DATA_DIR` (optional): record store directory, defaults to `data`
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `WEBHOOK_URL` (optional): endpoint notified after generate/activate
/// - `WEBHOOK_SECRET` (optional): HMAC secret for signing notifications
/// - `BACKUP_URL` (optional): external channel for backup upload/fetch
/// - `BACKUP_INTERVAL_SECS` (optional): periodic backup timer, default 3600
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// SHA-256 hex digest of the admin API key. The plaintext key is never
    /// stored server-side.
    pub admin_key_hash: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default)]
    pub webhook_secret: Option<String>,

    #[serde(default)]
    pub backup_url: Option<String>,

    #[serde(default = "default_backup_interval")]
    pub backup_interval_secs: u64,
}

/// Default record store directory if DATA_DIR is not set.
fn default_data_dir() -> String {
    "data".to_string()
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

/// Default periodic backup interval (one hour).
fn default_backup_interval() -> u64 {
    3600
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., ADMIN_KEY_HASH)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Parse environment variables into Config struct
        // Field names are automatically converted: admin_key_hash -> ADMIN_KEY_HASH
        envy::from_env::<Config>()
    }

    /// Validate cross-field constraints that envy cannot express.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the admin key hash is not a SHA-256 hex
    /// digest or a configured webhook URL fails validation.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.admin_key_hash.len() != 64
            || !self.admin_key_hash.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(AppError::InvalidRequest(
                "ADMIN_KEY_HASH must be a 64-character SHA-256 hex digest".to_string(),
            ));
        }

        if let Some(ref url) = self.webhook_url {
            crate::services::notify_service::validate_webhook_url(url)?;
        }

        Ok(())
    }
}
