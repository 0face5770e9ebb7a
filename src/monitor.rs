//! Cycle driver (spec.md §4.13, Component M): the fixed sequence of reads,
//! resolution, the two scan cycles, and the three final flushes.

use tracing::{info, warn};

use crate::breaker::CircuitBreaker;
use crate::buffer::ResultBuffer;
use crate::config::CycleConfig;
use crate::dispatcher::Dispatcher;
use crate::errors::{ScanError, ScanResult};
use crate::grouper;
use crate::models::product::ResolvedProduct;
use crate::models::shop::{EngineKind, ShopConfig};
use crate::resolver::{self, CatalogContext};
use crate::runner::run_static_cycle;
use crate::state::NotificationStateService;
use crate::store::Store;

/// Run exactly one scan cycle end to end (spec.md §4.13). Fatal only on a
/// preload failure or an empty catalog/shop list (spec.md §6, §7); all
/// per-shop and per-product failures are absorbed inside the cycles.
pub async fn run_cycle<S: Store + ?Sized>(store: &S, config: &CycleConfig) -> ScanResult<()> {
    let shops = store.list_enabled_shops().await?;
    if shops.is_empty() {
        return Err(ScanError::fatal("no enabled shops"));
    }

    let products = store.list_active_products().await?;
    if products.is_empty() {
        return Err(ScanError::fatal("empty product catalog"));
    }

    let product_ids: Vec<_> = products.iter().map(|p| p.id).collect();
    let (dispatcher, subscribed) = Dispatcher::preload_for_cycle(store, &product_ids).await?;

    let subscribed_ids: Vec<_> = subscribed.into_iter().collect();
    let loaded_states = store.load_notification_states(&subscribed_ids).await?;
    let state = NotificationStateService::from_loaded(loaded_states);

    let sets = index_by_id(store.list_product_sets().await?, |s| s.id);
    let types = index_by_id(store.list_product_types().await?, |t| t.id);
    let ctx = CatalogContext { product_types: &types, sets: &sets };

    let mut resolved = Vec::with_capacity(products.len());
    let mut skipped = 0u32;
    for product in &products {
        match resolver::resolve(product, &ctx) {
            Ok(r) => resolved.push(r),
            Err(e) => {
                warn!(product_id = %product.id, error = %e, "product unresolvable, skipping");
                skipped += 1;
            }
        }
    }
    info!(resolved = resolved.len(), skipped, "resolver pass complete");

    let (groups, ungrouped) = grouper::group_products(&resolved, &sets);

    let breaker = CircuitBreaker::new(config.breaker_threshold);
    let buffer = ResultBuffer::new();

    let static_shops: Vec<ShopConfig> = shops.iter().filter(|s| s.engine == EngineKind::Static).cloned().collect();
    let rendered_shops: Vec<ShopConfig> = shops.iter().filter(|s| s.engine == EngineKind::Rendered).cloned().collect();

    run_static_cycle(&static_shops, &groups, &ungrouped, config, &breaker, &buffer, &dispatcher, &state).await;

    // Reclaim memory before launching a browser (spec.md §4.9).
    drop(static_shops);

    run_rendered(&rendered_shops, &groups, &ungrouped, &breaker, &buffer, &dispatcher, &state).await;

    buffer.flush(store).await?;
    dispatcher.flush_notifications(store, &state).await?;
    state.flush_changes(store).await?;

    Ok(())
}

#[cfg(feature = "rendered")]
async fn run_rendered(
    shops: &[ShopConfig],
    groups: &[crate::models::candidate::SetGroup],
    ungrouped: &[ResolvedProduct],
    breaker: &CircuitBreaker,
    buffer: &ResultBuffer,
    dispatcher: &Dispatcher,
    state: &NotificationStateService,
) {
    if shops.is_empty() {
        return;
    }

    let browser = match headless_chrome::Browser::new(headless_chrome::LaunchOptions::default()) {
        Ok(browser) => std::sync::Arc::new(browser),
        Err(e) => {
            warn!(error = %e, "failed to launch headless browser, skipping rendered cycle");
            return;
        }
    };

    crate::runner::run_rendered_cycle(shops, groups, ungrouped, &browser, breaker, buffer, dispatcher, state).await;
}

#[cfg(not(feature = "rendered"))]
async fn run_rendered(
    shops: &[ShopConfig],
    _groups: &[crate::models::candidate::SetGroup],
    _ungrouped: &[ResolvedProduct],
    _breaker: &CircuitBreaker,
    _buffer: &ResultBuffer,
    _dispatcher: &Dispatcher,
    _state: &NotificationStateService,
) {
    if !shops.is_empty() {
        warn!(count = shops.len(), "rendered shops configured but built without the `rendered` feature");
    }
}

fn index_by_id<T, F: Fn(&T) -> uuid::Uuid>(items: Vec<T>, key: F) -> std::collections::HashMap<uuid::Uuid, T> {
    items.into_iter().map(|item| (key(&item), item)).collect()
}
