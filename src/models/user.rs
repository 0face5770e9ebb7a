//! Per-user watch and notification-target entries (spec.md §3 "WatchEntry",
//! "NotificationTarget"). Both are preloaded once at cycle start
//! (spec.md §4.12 `preloadForCycle`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEntry {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub max_price: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTarget {
    pub user_id: Uuid,
    /// Opaque channel identifier (e.g. a chat id); transport-agnostic.
    pub channel_id: Option<String>,
    pub display_name: String,
}

impl NotificationTarget {
    pub fn has_any_channel(&self) -> bool {
        self.channel_id.as_deref().is_some_and(|c| !c.is_empty())
    }
}
