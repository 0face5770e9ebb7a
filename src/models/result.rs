//! Extraction output (spec.md §3 "ExtractionResult").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One (product, shop) scan outcome. `product_url` empty means "not found"
/// (spec.md §4.5 step 1) — such results are never stored or dispatched
/// (spec.md §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub product_id: Uuid,
    pub shop_id: Uuid,
    pub product_url: String,
    pub price: Option<f64>,
    pub is_available: bool,
    pub timestamp: DateTime<Utc>,
}

impl ExtractionResult {
    pub fn not_found(product_id: Uuid, shop_id: Uuid, timestamp: DateTime<Utc>) -> Self {
        Self {
            product_id,
            shop_id,
            product_url: String::new(),
            price: None,
            is_available: false,
            timestamp,
        }
    }

    pub fn is_found(&self) -> bool {
        !self.product_url.is_empty()
    }

    /// ISO-8601 `YYYY-MM-DDTHH` hour bucket: the unique key for the hourly
    /// upsert (spec.md §3, §4.10, §6).
    pub fn hour_bucket(&self) -> String {
        self.timestamp.format("%Y-%m-%dT%H").to_string()
    }
}
