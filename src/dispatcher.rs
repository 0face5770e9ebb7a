//! Multi-user dispatcher (spec.md §4.12, Component L): cycle-preloaded
//! watcher/target maps, per-result fan-out with no I/O, and batched
//! notification insertion.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::errors::ScanResult;
use crate::models::notification::{Notification, NotificationPayload};
use crate::models::product::Product;
use crate::models::result::ExtractionResult;
use crate::models::shop::ShopConfig;
use crate::models::user::{NotificationTarget, WatchEntry};
use crate::state::NotificationStateService;
use crate::store::NotificationStore;

struct QueuedNotification {
    user_id: Uuid,
    product_id: Uuid,
    shop_id: Uuid,
    result: ExtractionResult,
    payload: NotificationPayload,
}

pub struct Dispatcher {
    watchers_by_product: HashMap<Uuid, Vec<WatchEntry>>,
    targets_by_user: HashMap<Uuid, NotificationTarget>,
    queue: Mutex<Vec<QueuedNotification>>,
}

impl Dispatcher {
    /// Exactly two external reads (spec.md §4.12, counted toward the
    /// cycle-wide budget of 7 in spec.md §8): active watchers for
    /// `product_ids`, then notification targets for the union of watcher
    /// user ids. Returns the subset of `product_ids` with at least one
    /// active subscriber.
    pub async fn preload_for_cycle(
        store: &dyn NotificationStore,
        product_ids: &[Uuid],
    ) -> ScanResult<(Self, HashSet<Uuid>)> {
        let watchers_by_product = store.list_active_watchers_for_products(product_ids).await?;

        let user_ids: Vec<Uuid> = watchers_by_product
            .values()
            .flatten()
            .map(|w| w.user_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let targets_by_user = store.list_notification_targets(&user_ids).await?;

        let subscribed_products = watchers_by_product.keys().copied().collect();

        Ok((
            Self { watchers_by_product, targets_by_user, queue: Mutex::new(Vec::new()) },
            subscribed_products,
        ))
    }

    /// Fan out one result to every watcher of `product`. No I/O
    /// (spec.md §4.12).
    pub fn process_result(
        &self,
        product: &Product,
        shop: &ShopConfig,
        result: &ExtractionResult,
        state: &NotificationStateService,
    ) {
        let Some(watchers) = self.watchers_by_product.get(&product.id) else { return };

        for watcher in watchers {
            state.update_tracked_state(watcher.user_id, product.id, shop.id, result);

            if !result.is_available {
                continue;
            }
            let Some(price) = result.price else { continue };
            if price > watcher.max_price {
                continue;
            }
            let Some(target) = self.targets_by_user.get(&watcher.user_id) else { continue };
            if !target.has_any_channel() {
                continue;
            }
            if !state.should_notify(watcher.user_id, product.id, shop.id) {
                continue;
            }

            let payload = NotificationPayload {
                product_name: product.name.clone(),
                shop_name: shop.name.clone(),
                shop_id: shop.id,
                product_id: product.id,
                price,
                max_price: watcher.max_price,
                product_url: result.product_url.clone(),
            };

            self.queue.lock().push(QueuedNotification {
                user_id: watcher.user_id,
                product_id: product.id,
                shop_id: shop.id,
                result: result.clone(),
                payload,
            });
        }
    }

    /// Batch-insert queued notifications, then mark each as notified. If
    /// the insert fails, state is left unmarked so the next cycle retries
    /// (spec.md §4.12).
    pub async fn flush_notifications(
        &self,
        store: &dyn NotificationStore,
        state: &NotificationStateService,
    ) -> ScanResult<()> {
        let queued: Vec<QueuedNotification> = self.queue.lock().drain(..).collect();
        if queued.is_empty() {
            return Ok(());
        }

        let notifications: Vec<Notification> =
            queued.iter().map(|q| Notification::pending(q.user_id, q.payload.clone())).collect();

        store.insert_notifications(&notifications).await?;

        for queued in &queued {
            state.mark_notified(queued.user_id, queued.product_id, queued.shop_id, &queued.result);
        }

        Ok(())
    }
}
