//! External storage traits and an in-memory implementation (spec.md §6).
//!
//! Mirrors the repository-trait-plus-multiple-backends shape this crate
//! already uses for persistence, narrowed to exactly the seven reads and
//! three write batches spec.md §6 and §8 ("Cycle-local DB budget") allow.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::errors::ScanResult;
use crate::models::notification::{Notification, NotificationState};
use crate::models::product::{Product, ProductSet, ProductType};
use crate::models::result::ExtractionResult;
use crate::models::shop::ShopConfig;
use crate::models::user::{NotificationTarget, WatchEntry};

/// Read 1 of 7: enabled shop configurations.
#[async_trait]
pub trait ShopStore: Send + Sync {
    async fn list_enabled_shops(&self) -> ScanResult<Vec<ShopConfig>>;
}

/// Reads 2-4 of 7: the catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_active_products(&self) -> ScanResult<Vec<Product>>;
    async fn list_product_sets(&self) -> ScanResult<Vec<ProductSet>>;
    async fn list_product_types(&self) -> ScanResult<Vec<ProductType>>;
}

/// Reads 5-7 of 7, plus the batched writes for notification state and
/// dispatch (spec.md §4.11, §4.12).
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn list_active_watchers_for_products(
        &self,
        product_ids: &[Uuid],
    ) -> ScanResult<HashMap<Uuid, Vec<WatchEntry>>>;

    async fn list_notification_targets(&self, user_ids: &[Uuid]) -> ScanResult<HashMap<Uuid, NotificationTarget>>;

    async fn load_notification_states(&self, product_ids: &[Uuid]) -> ScanResult<Vec<NotificationState>>;

    async fn upsert_states(&self, states: &[NotificationState]) -> ScanResult<()>;
    async fn delete_states(&self, keys: &[(Uuid, Uuid, Uuid)]) -> ScanResult<()>;

    async fn insert_notifications(&self, notifications: &[Notification]) -> ScanResult<()>;
}

/// Write batch for hourly-aggregated results (spec.md §4.10, §6).
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn upsert_hourly(&self, results: &[ExtractionResult]) -> ScanResult<()>;
}

/// Every external read/write the cycle driver needs, combined so the
/// runner can be handed one trait object (spec.md §4.13, §6).
pub trait Store: ShopStore + CatalogStore + NotificationStore + ResultStore {}
impl<T: ShopStore + CatalogStore + NotificationStore + ResultStore + ?Sized> Store for T {}

struct HourlyRecord {
    result: ExtractionResult,
    scan_count: u32,
}

/// In-memory backing for all stores, for tests and the demo CLI. Uses
/// `Arc<RwLock<HashMap>>` per-table storage, matching the teacher's
/// in-memory repository factory.
#[derive(Default)]
pub struct InMemoryStore {
    pub shops: RwLock<HashMap<Uuid, ShopConfig>>,
    pub products: RwLock<HashMap<Uuid, Product>>,
    pub sets: RwLock<HashMap<Uuid, ProductSet>>,
    pub types: RwLock<HashMap<Uuid, ProductType>>,
    pub watchers: RwLock<Vec<WatchEntry>>,
    pub targets: RwLock<HashMap<Uuid, NotificationTarget>>,
    pub states: RwLock<HashMap<(Uuid, Uuid, Uuid), NotificationState>>,
    results: RwLock<HashMap<(Uuid, Uuid, String), HourlyRecord>>,
    pub notifications: RwLock<Vec<Notification>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of stored hourly results, for assertions in tests.
    pub fn stored_results(&self) -> Vec<ExtractionResult> {
        self.results.read().values().map(|r| r.result.clone()).collect()
    }
}

#[async_trait]
impl ShopStore for InMemoryStore {
    async fn list_enabled_shops(&self) -> ScanResult<Vec<ShopConfig>> {
        Ok(self.shops.read().values().filter(|s| !s.disabled).cloned().collect())
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn list_active_products(&self) -> ScanResult<Vec<Product>> {
        Ok(self.products.read().values().filter(|p| !p.disabled).cloned().collect())
    }

    async fn list_product_sets(&self) -> ScanResult<Vec<ProductSet>> {
        Ok(self.sets.read().values().cloned().collect())
    }

    async fn list_product_types(&self) -> ScanResult<Vec<ProductType>> {
        Ok(self.types.read().values().cloned().collect())
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn list_active_watchers_for_products(
        &self,
        product_ids: &[Uuid],
    ) -> ScanResult<HashMap<Uuid, Vec<WatchEntry>>> {
        let wanted: std::collections::HashSet<_> = product_ids.iter().collect();
        let mut grouped: HashMap<Uuid, Vec<WatchEntry>> = HashMap::new();
        for watcher in self.watchers.read().iter() {
            if watcher.is_active && wanted.contains(&watcher.product_id) {
                grouped.entry(watcher.product_id).or_default().push(watcher.clone());
            }
        }
        Ok(grouped)
    }

    async fn list_notification_targets(&self, user_ids: &[Uuid]) -> ScanResult<HashMap<Uuid, NotificationTarget>> {
        let wanted: std::collections::HashSet<_> = user_ids.iter().collect();
        Ok(self
            .targets
            .read()
            .iter()
            .filter(|(id, target)| wanted.contains(id) && target.has_any_channel())
            .map(|(id, target)| (*id, target.clone()))
            .collect())
    }

    async fn load_notification_states(&self, product_ids: &[Uuid]) -> ScanResult<Vec<NotificationState>> {
        let wanted: std::collections::HashSet<_> = product_ids.iter().collect();
        Ok(self
            .states
            .read()
            .values()
            .filter(|s| wanted.contains(&s.product_id))
            .cloned()
            .collect())
    }

    async fn upsert_states(&self, states: &[NotificationState]) -> ScanResult<()> {
        let mut table = self.states.write();
        for state in states {
            table.insert(state.key(), state.clone());
        }
        Ok(())
    }

    async fn delete_states(&self, keys: &[(Uuid, Uuid, Uuid)]) -> ScanResult<()> {
        let mut table = self.states.write();
        for key in keys {
            table.remove(key);
        }
        Ok(())
    }

    async fn insert_notifications(&self, notifications: &[Notification]) -> ScanResult<()> {
        self.notifications.write().extend(notifications.iter().cloned());
        Ok(())
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    /// Overwrite on duplicate `(product_id, shop_id, hour_bucket)`,
    /// incrementing `scan_count`; otherwise insert fresh (spec.md §4.10,
    /// §6).
    async fn upsert_hourly(&self, results: &[ExtractionResult]) -> ScanResult<()> {
        let mut table = self.results.write();
        for result in results {
            let key = (result.product_id, result.shop_id, result.hour_bucket());
            table
                .entry(key)
                .and_modify(|record| {
                    record.result = result.clone();
                    record.scan_count += 1;
                })
                .or_insert_with(|| HourlyRecord { result: result.clone(), scan_count: 1 });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn result(product_id: Uuid, shop_id: Uuid) -> ExtractionResult {
        ExtractionResult {
            product_id,
            shop_id,
            product_url: "https://shop.test/p".into(),
            price: Some(9.99),
            is_available: true,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_hourly_overwrites_same_bucket_and_counts_scans() {
        let store = InMemoryStore::new();
        let product_id = Uuid::new_v4();
        let shop_id = Uuid::new_v4();

        store.upsert_hourly(&[result(product_id, shop_id)]).await.unwrap();
        store.upsert_hourly(&[result(product_id, shop_id)]).await.unwrap();

        let results = store.stored_results();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn watchers_filtered_to_requested_products_and_active_only() {
        let store = InMemoryStore::new();
        let wanted_product = Uuid::new_v4();
        let other_product = Uuid::new_v4();
        let user = Uuid::new_v4();

        store.watchers.write().extend([
            WatchEntry { user_id: user, product_id: wanted_product, max_price: 100.0, is_active: true },
            WatchEntry { user_id: user, product_id: wanted_product, max_price: 100.0, is_active: false },
            WatchEntry { user_id: user, product_id: other_product, max_price: 100.0, is_active: true },
        ]);

        let grouped = store.list_active_watchers_for_products(&[wanted_product]).await.unwrap();
        assert_eq!(grouped.get(&wanted_product).map(Vec::len), Some(1));
        assert!(!grouped.contains_key(&other_product));
    }

    #[tokio::test]
    async fn targets_without_a_channel_are_excluded() {
        let store = InMemoryStore::new();
        let with_channel = Uuid::new_v4();
        let without_channel = Uuid::new_v4();

        store.targets.write().insert(
            with_channel,
            NotificationTarget { user_id: with_channel, channel_id: Some("chat-1".into()), display_name: "A".into() },
        );
        store.targets.write().insert(
            without_channel,
            NotificationTarget { user_id: without_channel, channel_id: None, display_name: "B".into() },
        );

        let targets = store
            .list_notification_targets(&[with_channel, without_channel])
            .await
            .unwrap();
        assert_eq!(targets.len(), 1);
        assert!(targets.contains_key(&with_channel));
    }
}
