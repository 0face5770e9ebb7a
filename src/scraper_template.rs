//! Scraper template (spec.md §4.5, Component E): the canonical per-product
//! scrape flow, plus the "known URL" and "synthesize from search data"
//! shortcuts the runner uses once the navigator has already resolved a URL.

use chrono::Utc;
use tracing::warn;

use crate::errors::ScanResult;
use crate::extractor::Extractor;
use crate::models::candidate::SearchPageData;
use crate::models::product::ResolvedProduct;
use crate::models::result::ExtractionResult;
use crate::models::shop::ShopConfig;
use crate::navigator::{self, NavigationResult};

/// Full flow: search, then extract (spec.md §4.5 steps 1-5). Any unhandled
/// extractor error is swallowed into a "not found" result and logged
/// (spec.md §4.5 "Any unhandled extractor error...").
pub async fn scrape_product(
    extractor: &mut dyn Extractor,
    shop: &ShopConfig,
    product: &ResolvedProduct,
) -> ExtractionResult {
    match navigator::navigate_for_product(extractor, shop, product).await {
        Ok(Some(navigation)) => scrape_with_navigation(extractor, shop, product, navigation).await,
        Ok(None) => ExtractionResult::not_found(product.id(), shop.id, Utc::now()),
        Err(e) => {
            warn!(product_id = %product.id(), shop_id = %shop.id, error = %e, "navigator failed");
            ExtractionResult::not_found(product.id(), shop.id, Utc::now())
        }
    }
}

/// Continue the flow once a URL (and optionally search-page data) is
/// already known, e.g. carried forward from a Phase 1 set search.
pub async fn scrape_with_navigation(
    extractor: &mut dyn Extractor,
    shop: &ShopConfig,
    product: &ResolvedProduct,
    navigation: NavigationResult,
) -> ExtractionResult {
    if let Some(search_page_data) = navigation.search_page_data {
        return synthesize_result(product.id(), shop.id, &navigation.url, search_page_data);
    }

    scrape_known_url(extractor, shop, product.id(), &navigation.url, navigation.is_direct_hit).await
}

/// Visit a known product URL (skipping navigation if we already landed on
/// it via a direct hit) and extract price/availability.
pub async fn scrape_known_url(
    extractor: &mut dyn Extractor,
    shop: &ShopConfig,
    product_id: uuid::Uuid,
    url: &str,
    already_landed: bool,
) -> ExtractionResult {
    let goto_result = if already_landed { Ok(()) } else { extractor.goto(url).await };

    if let Err(e) = goto_result {
        warn!(product_id = %product_id, shop_id = %shop.id, error = %e, "product page load failed");
        return ExtractionResult::not_found(product_id, shop.id, Utc::now());
    }

    match extract_price_and_availability(extractor, shop).await {
        Ok((price, is_available)) => ExtractionResult {
            product_id,
            shop_id: shop.id,
            product_url: url.to_string(),
            price,
            is_available,
            timestamp: Utc::now(),
        },
        Err(e) => {
            warn!(product_id = %product_id, shop_id = %shop.id, error = %e, "extraction failed");
            ExtractionResult::not_found(product_id, shop.id, Utc::now())
        }
    }
}

/// Build a result straight from search-page data with no product-page
/// visit (spec.md §4.5 step 2).
fn synthesize_result(
    product_id: uuid::Uuid,
    shop_id: uuid::Uuid,
    url: &str,
    data: SearchPageData,
) -> ExtractionResult {
    ExtractionResult {
        product_id,
        shop_id,
        product_url: url.to_string(),
        price: data.price,
        is_available: data.is_available,
        timestamp: Utc::now(),
    }
}

async fn extract_price_and_availability(
    extractor: &mut dyn Extractor,
    shop: &ShopConfig,
) -> ScanResult<(Option<f64>, bool)> {
    let raw_price = extractor.extract_one(&shop.selectors.product_price).await?;
    let price = raw_price.as_deref().and_then(|raw| shop.price_locale.parse(raw));

    let mut is_available = false;
    for selector in &shop.selectors.product_availability {
        if extractor.exists(selector).await? {
            is_available = true;
            break;
        }
    }

    Ok((price, is_available))
}
