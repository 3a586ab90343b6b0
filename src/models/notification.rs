//! Outbound webhook notification envelope.
//!
//! Sent to the configured `WEBHOOK_URL` after high-value mutations
//! (generate, activate). When a secret is configured the JSON body is
//! signed with HMAC-SHA256 and the signature travels in the
//! `X-Webhook-Signature` header as `sha256=<hex>`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::key::KeyType;

/// Notification payload envelope.
#[derive(Debug, Serialize)]
pub struct NotificationPayload {
    /// `"key.generated"` or `"key.activated"`.
    pub event_type: String,

    /// Unique identifier for this notification.
    pub event_id: Uuid,

    pub created_at: DateTime<Utc>,

    pub data: KeyEventData,
}

/// Key details included in a notification.
#[derive(Debug, Serialize)]
pub struct KeyEventData {
    pub key_id: String,
    pub key_type: KeyType,
    pub user_id: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NotificationPayload {
    /// Build a notification for a key lifecycle event.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: KeyEventData) -> Self {
        Self {
            event_type: event_type.into(),
            event_id: Uuid::new_v4(),
            created_at: Utc::now(),
            data,
        }
    }
}
