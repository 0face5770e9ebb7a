//! Per-(user,product,shop) notification state and the emitted `Notification`
//! record (spec.md §3 "NotificationState", "Notification").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State tracked per (user, product, shop). Absence means "not yet
/// notified" (spec.md §3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationState {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub shop_id: Uuid,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub last_price: Option<f64>,
    pub was_available: bool,
}

impl NotificationState {
    pub fn key(&self) -> (Uuid, Uuid, Uuid) {
        (self.user_id, self.product_id, self.shop_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
}

/// Channel-agnostic notification payload (spec.md §3 "Notification").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub product_name: String,
    pub shop_name: String,
    pub shop_id: Uuid,
    pub product_id: Uuid,
    pub price: f64,
    pub max_price: f64,
    pub product_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: Uuid,
    pub status: NotificationStatus,
    pub payload: NotificationPayload,
    /// Filled in by the external delivery service; always empty when the
    /// core creates the record (spec.md §3).
    pub deliveries: Vec<String>,
}

impl Notification {
    pub fn pending(user_id: Uuid, payload: NotificationPayload) -> Self {
        Self {
            user_id,
            status: NotificationStatus::Pending,
            payload,
            deliveries: Vec::new(),
        }
    }
}
