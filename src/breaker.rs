//! Per-shop circuit breaker, cycle-scoped (spec.md §4.8, Component H).
//!
//! Consulted and mutated by concurrent product tasks of the same shop
//! (spec.md §5), so state lives behind a `parking_lot::Mutex` rather than an
//! async lock — no `.await` is ever held while holding it.

use std::collections::HashMap;

use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default)]
struct ShopBreakerState {
    consecutive_failures: u32,
    tripped: bool,
}

/// Tracks consecutive failures per shop for one scan cycle.
pub struct CircuitBreaker {
    threshold: u32,
    state: Mutex<HashMap<Uuid, ShopBreakerState>>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        Self { threshold, state: Mutex::new(HashMap::new()) }
    }

    /// Increment `shop_id`'s consecutive-failure count; trips the shop the
    /// first time it reaches `threshold`. Returns `true` iff this call is
    /// the one that trips it.
    pub fn record_failure(&self, shop_id: Uuid) -> bool {
        let mut state = self.state.lock();
        let entry = state.entry(shop_id).or_default();
        entry.consecutive_failures += 1;
        if entry.consecutive_failures >= self.threshold && !entry.tripped {
            entry.tripped = true;
            return true;
        }
        false
    }

    /// Clear `shop_id`'s consecutive-failure count. Does not un-trip a
    /// shop that already tripped this cycle (spec.md §4.8).
    pub fn record_success(&self, shop_id: Uuid) {
        let mut state = self.state.lock();
        if let Some(entry) = state.get_mut(&shop_id) {
            entry.consecutive_failures = 0;
        }
    }

    pub fn is_tripped(&self, shop_id: Uuid) -> bool {
        self.state.lock().get(&shop_id).is_some_and(|s| s.tripped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_at_threshold_and_stays_tripped() {
        let breaker = CircuitBreaker::new(3);
        let shop = Uuid::new_v4();

        assert!(!breaker.record_failure(shop));
        assert!(!breaker.record_failure(shop));
        assert!(breaker.record_failure(shop));
        assert!(breaker.is_tripped(shop));

        // A later success doesn't un-trip it.
        breaker.record_success(shop);
        assert!(breaker.is_tripped(shop));
    }

    #[test]
    fn success_resets_consecutive_count_before_trip() {
        let breaker = CircuitBreaker::new(3);
        let shop = Uuid::new_v4();

        breaker.record_failure(shop);
        breaker.record_failure(shop);
        breaker.record_success(shop);
        assert!(!breaker.record_failure(shop));
        assert!(!breaker.is_tripped(shop));
    }

    #[test]
    fn trip_reported_only_once() {
        let breaker = CircuitBreaker::new(1);
        let shop = Uuid::new_v4();
        assert!(breaker.record_failure(shop));
        assert!(!breaker.record_failure(shop));
    }

    #[test]
    fn shops_are_independent() {
        let breaker = CircuitBreaker::new(1);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        breaker.record_failure(a);
        assert!(breaker.is_tripped(a));
        assert!(!breaker.is_tripped(b));
    }
}
