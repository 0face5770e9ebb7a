//! Notification state service (spec.md §4.11, Component K): per-
//! (user,product,shop) state with reset rules, buffered upserts/deletes.
//!
//! Backed by `dashmap` for the live state table — concurrent access from
//! Phase-2 product tasks without holding a lock across an `.await`
//! (spec.md §5), matching this crate's existing use of `dashmap` for
//! concurrent maps.

use std::collections::HashSet;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::errors::ScanResult;
use crate::models::notification::NotificationState;
use crate::models::result::ExtractionResult;
use crate::store::NotificationStore;

type StateKey = (Uuid, Uuid, Uuid);

pub struct NotificationStateService {
    states: DashMap<StateKey, NotificationState>,
    pending_upserts: Mutex<std::collections::HashMap<StateKey, NotificationState>>,
    pending_deletes: Mutex<HashSet<StateKey>>,
}

impl NotificationStateService {
    /// Load-at-cycle-start, restricted to the subscribed product ids
    /// (spec.md §4.11).
    pub fn from_loaded(loaded: Vec<NotificationState>) -> Self {
        let states = DashMap::new();
        for state in loaded {
            states.insert(state.key(), state);
        }
        Self {
            states,
            pending_upserts: Mutex::new(std::collections::HashMap::new()),
            pending_deletes: Mutex::new(HashSet::new()),
        }
    }

    pub fn should_notify(&self, user_id: Uuid, product_id: Uuid, shop_id: Uuid) -> bool {
        match self.states.get(&(user_id, product_id, shop_id)) {
            None => true,
            Some(state) => state.last_notified_at.is_none(),
        }
    }

    /// Record that a notification was just sent for this key.
    pub fn mark_notified(&self, user_id: Uuid, product_id: Uuid, shop_id: Uuid, result: &ExtractionResult) {
        let key = (user_id, product_id, shop_id);
        let state = NotificationState {
            user_id,
            product_id,
            shop_id,
            last_notified_at: Some(Utc::now()),
            last_price: result.price,
            was_available: result.is_available,
        };
        self.states.insert(key, state.clone());
        self.pending_deletes.lock().remove(&key);
        self.pending_upserts.lock().insert(key, state);
    }

    /// Called for every fan-out, regardless of whether a notification was
    /// sent. Resets prior notified state on stockout or price increase
    /// since the last alert (spec.md §4.11).
    pub fn update_tracked_state(&self, user_id: Uuid, product_id: Uuid, shop_id: Uuid, result: &ExtractionResult) {
        let key = (user_id, product_id, shop_id);
        let should_reset = match self.states.get(&key) {
            Some(state) if state.last_notified_at.is_some() => {
                let stockout = state.was_available && !result.is_available;
                let price_increase = state.last_price.is_some_and(|last| result.price.is_some_and(|p| p > last));
                stockout || price_increase
            }
            _ => false,
        };

        if should_reset {
            self.states.remove(&key);
            self.pending_upserts.lock().remove(&key);
            self.pending_deletes.lock().insert(key);
        }
    }

    /// Batched upserts then batched deletes, clearing both buffers even on
    /// failure (spec.md §4.11 `flushChanges`).
    pub async fn flush_changes(&self, store: &dyn NotificationStore) -> ScanResult<()> {
        let upserts: Vec<NotificationState> = self.pending_upserts.lock().drain().map(|(_, v)| v).collect();
        let deletes: Vec<StateKey> = self.pending_deletes.lock().drain().collect();

        let upsert_result = if upserts.is_empty() { Ok(()) } else { store.upsert_states(&upserts).await };
        let delete_result = if deletes.is_empty() { Ok(()) } else { store.delete_states(&deletes).await };

        upsert_result.and(delete_result)
    }
}
