//! Webhook notifier for key lifecycle events.
//!
//! Sends signed JSON notifications to the configured endpoint after
//! high-value mutations (generate, activate). Delivery is best-effort and
//! fully decoupled from the lifecycle critical section: the mutation has
//! already committed by the time anything here runs, and every failure is
//! logged and swallowed.

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::AppState;
use crate::error::AppError;
use crate::models::notification::{KeyEventData, NotificationPayload};

type HmacSha256 = Hmac<Sha256>;

/// Timeout per notification delivery (prevents hanging on slow endpoints).
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Dispatch a notification as a detached task, if a webhook is configured.
pub fn spawn_notification(state: &AppState, event_type: &'static str, data: KeyEventData) {
    let Some(url) = state.config.webhook_url.clone() else {
        return;
    };
    let secret = state.config.webhook_secret.clone();
    let client = state.http.clone();

    tokio::spawn(async move {
        let payload = NotificationPayload::new(event_type, data);
        send_notification(&client, &url, secret.as_deref(), &payload).await;
    });
}

/// Send a single notification with an optional HMAC signature.
///
/// # Headers Sent
///
/// - `Content-Type: application/json`
/// - `X-Webhook-Signature: sha256=<hex>` (when a secret is configured)
/// - `X-Webhook-Event-Id: <uuid>`
async fn send_notification(
    client: &reqwest::Client,
    url: &str,
    secret: Option<&str>,
    payload: &NotificationPayload,
) {
    let body = match serde_json::to_string(payload) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!("Notification serialization failed: {e}");
            return;
        }
    };

    let mut request = client
        .post(url)
        .header("Content-Type", "application/json")
        .header("X-Webhook-Event-Id", payload.event_id.to_string())
        .timeout(NOTIFY_TIMEOUT);

    if let Some(secret) = secret {
        request = request.header("X-Webhook-Signature", generate_signature(secret, &body));
    }

    match request.body(body).send().await {
        Ok(resp) if resp.status().is_success() => {
            tracing::debug!("Notified {} for {}", url, payload.event_type);
        }
        Ok(resp) => {
            tracing::warn!(
                "Webhook {} rejected {}: HTTP {}",
                url,
                payload.event_type,
                resp.status()
            );
        }
        Err(e) => {
            tracing::warn!("Webhook delivery to {} failed: {e}", url);
        }
    }
}

/// Generate HMAC-SHA256 signature for a notification body.
///
/// # Format
///
/// `sha256=<hex_encoded_hmac>`
///
/// Receivers verify by computing HMAC-SHA256(secret, request_body) and
/// comparing in constant time.
fn generate_signature(secret: &str, payload: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(payload.as_bytes());
    let result = mac.finalize();
    format!("sha256={}", hex::encode(result.into_bytes()))
}

/// Validate webhook URL format.
///
/// # Rules
///
/// - Must be a valid URL of at most 2048 characters
/// - Must be HTTPS (HTTP localhost allowed for development)
pub fn validate_webhook_url(url: &str) -> Result<(), AppError> {
    if url.len() > 2048 {
        return Err(AppError::InvalidRequest(
            "Webhook URL exceeds 2048 characters".to_string(),
        ));
    }

    let parsed = url::Url::parse(url)
        .map_err(|_| AppError::InvalidRequest("Invalid webhook URL format".to_string()))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            // Allow HTTP only toward loopback (testing)
            if matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1")) {
                Ok(())
            } else {
                Err(AppError::InvalidRequest(
                    "HTTP is only allowed for localhost. Use HTTPS for production.".to_string(),
                ))
            }
        }
        _ => Err(AppError::InvalidRequest(
            "Webhook URL must use HTTP or HTTPS".to_string(),
        )),
    }
}
