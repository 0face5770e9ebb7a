//! Static scan cycle (spec.md §4.9 "Static cycle"): up to `SHOP_CONC` shops
//! run concurrently; within a shop, Phase 1 is sequential on one extractor
//! and Phase 2 fans out per-product tasks, each with its own extractor.
//!
//! Both fan-outs use `futures::stream::for_each_concurrent` rather than
//! `tokio::spawn` — the extractor traits are deliberately `?Send`
//! (`scraper::Html` holds non-atomic tendrils), so concurrency here means
//! driving multiple futures on one task, not scheduling onto other threads.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

use crate::breaker::CircuitBreaker;
use crate::buffer::ResultBuffer;
use crate::config::CycleConfig;
use crate::dispatcher::Dispatcher;
use crate::extractor::static_ext::StaticExtractorFactory;
use crate::extractor::{Extractor, ExtractorFactory};
use crate::models::candidate::SetGroup;
use crate::models::product::ResolvedProduct;
use crate::models::result::ExtractionResult;
use crate::models::shop::ShopConfig;
use crate::scraper_template;
use crate::state::NotificationStateService;

use super::{index_products, log_shop_summary, run_phase_one, ProductWork, ShopStats};

/// Run every static-engine shop's full two-phase cycle, bounded to
/// `config.shop_conc` shops in flight at once (spec.md §4.9, §5).
pub async fn run_static_cycle(
    shops: &[ShopConfig],
    groups: &[SetGroup],
    ungrouped: &[ResolvedProduct],
    config: &CycleConfig,
    breaker: &CircuitBreaker,
    buffer: &ResultBuffer,
    dispatcher: &Dispatcher,
    state: &NotificationStateService,
) {
    stream::iter(shops)
        .for_each_concurrent(config.shop_conc, |shop| {
            run_one_shop(shop, groups, ungrouped, config, breaker, buffer, dispatcher, state)
        })
        .await;
}

async fn run_one_shop(
    shop: &ShopConfig,
    groups: &[SetGroup],
    ungrouped: &[ResolvedProduct],
    config: &CycleConfig,
    breaker: &CircuitBreaker,
    buffer: &ResultBuffer,
    dispatcher: &Dispatcher,
    state: &NotificationStateService,
) {
    let factory = StaticExtractorFactory::new(shop.anti_bot.clone(), config.max_retry_attempts);

    let work = {
        let Ok(mut phase_one_extractor) = factory.create().await else {
            // Can't even open an HTTP client: treat every member as not
            // found without charging the breaker (no request was made).
            return;
        };
        let work = run_phase_one(phase_one_extractor.as_mut(), shop.id, shop, groups, ungrouped, breaker).await;
        let _ = phase_one_extractor.close().await;
        work
    };

    let stats = Mutex::new(ShopStats::default());
    let prod_conc = shop.max_concurrency(config.prod_conc);
    let index = index_products(groups, ungrouped);

    stream::iter(work)
        .for_each_concurrent(prod_conc, |item| {
            let stats = &stats;
            let index = &index;
            async move {
                let result = run_one_product(shop, item, &factory).await;
                stats.lock().record(&result);
                if result.is_found() {
                    if let Some(product) = index.get(&result.product_id) {
                        dispatcher.process_result(&product.product, shop, &result, state);
                    }
                    buffer.add(result);
                }
            }
        })
        .await;

    log_shop_summary(shop.id, &shop.name, *stats.lock());
}

async fn run_one_product(
    shop: &ShopConfig,
    item: ProductWork,
    factory: &StaticExtractorFactory,
) -> ExtractionResult {
    match item {
        ProductWork::NotFound(product_id) => ExtractionResult::not_found(product_id, shop.id, Utc::now()),
        ProductWork::Navigated(product, navigation) => {
            let Ok(mut extractor) = factory.create().await else {
                return ExtractionResult::not_found(product.id(), shop.id, Utc::now());
            };
            let result = scraper_template::scrape_with_navigation(extractor.as_mut(), shop, &product, navigation).await;
            let _ = extractor.close().await;
            result
        }
        ProductWork::NeedsSearch(product) => {
            let Ok(mut extractor) = factory.create().await else {
                return ExtractionResult::not_found(product.id(), shop.id, Utc::now());
            };
            let result = scraper_template::scrape_product(extractor.as_mut(), shop, &product).await;
            let _ = extractor.close().await;
            result
        }
    }
}
