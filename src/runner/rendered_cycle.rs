//! Rendered (headless-browser) scan cycle (spec.md §4.9 "Rendered cycle"):
//! sequential across shops since they share one browser; within a shop, one
//! extractor is reused across every set group and every product.

#![cfg(feature = "rendered")]

use std::sync::Arc;

use chrono::Utc;
use headless_chrome::Browser;

use crate::breaker::CircuitBreaker;
use crate::buffer::ResultBuffer;
use crate::dispatcher::Dispatcher;
use crate::extractor::rendered::RenderedExtractorFactory;
use crate::extractor::{Extractor, ExtractorFactory};
use crate::models::candidate::SetGroup;
use crate::models::product::ResolvedProduct;
use crate::models::result::ExtractionResult;
use crate::models::shop::ShopConfig;
use crate::scraper_template;
use crate::state::NotificationStateService;

use super::{index_products, log_shop_summary, run_phase_one, ProductWork, ShopStats};

/// Run every rendered-engine shop in sequence against one shared browser
/// (spec.md §4.9, §5 "single-threaded across shops").
pub async fn run_rendered_cycle(
    shops: &[ShopConfig],
    groups: &[SetGroup],
    ungrouped: &[ResolvedProduct],
    browser: &Arc<Browser>,
    breaker: &CircuitBreaker,
    buffer: &ResultBuffer,
    dispatcher: &Dispatcher,
    state: &NotificationStateService,
) {
    for shop in shops {
        run_one_shop(shop, groups, ungrouped, browser, breaker, buffer, dispatcher, state).await;
    }
}

async fn run_one_shop(
    shop: &ShopConfig,
    groups: &[SetGroup],
    ungrouped: &[ResolvedProduct],
    browser: &Arc<Browser>,
    breaker: &CircuitBreaker,
    buffer: &ResultBuffer,
    dispatcher: &Dispatcher,
    state: &NotificationStateService,
) {
    let factory = RenderedExtractorFactory::new(browser.clone());
    let Ok(mut extractor) = factory.create().await else { return };

    let work = run_phase_one(extractor.as_mut(), shop.id, shop, groups, ungrouped, breaker).await;
    let index = index_products(groups, ungrouped);
    let mut stats = ShopStats::default();

    for item in work {
        let result = match item {
            ProductWork::NotFound(product_id) => ExtractionResult::not_found(product_id, shop.id, Utc::now()),
            ProductWork::Navigated(product, navigation) => {
                scraper_template::scrape_with_navigation(extractor.as_mut(), shop, &product, navigation).await
            }
            ProductWork::NeedsSearch(product) => {
                scraper_template::scrape_product(extractor.as_mut(), shop, &product).await
            }
        };

        stats.record(&result);
        if result.is_found() {
            if let Some(product) = index.get(&result.product_id) {
                dispatcher.process_result(&product.product, shop, &result, state);
            }
            buffer.add(result);
        }
    }

    let _ = extractor.close().await;
    log_shop_summary(shop.id, &shop.name, stats);
}
