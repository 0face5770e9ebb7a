//! Scan cycle runner (spec.md §4.9, Component I): the static and rendered
//! cycles share the Phase 1 set-group matching logic and the per-product
//! outcome bookkeeping defined here; each cycle module only supplies its
//! own concurrency and extractor-lifecycle discipline.

pub mod rendered_cycle;
pub mod static_cycle;

use tracing::info;
use uuid::Uuid;

use crate::breaker::CircuitBreaker;
use crate::matcher::select_best_candidate;
use crate::models::candidate::{Candidate, SetGroup};
use crate::models::product::ResolvedProduct;
use crate::models::result::ExtractionResult;
use crate::navigator::{self, score_candidate, NavigationResult};
use crate::extractor::Extractor;

pub use static_cycle::run_static_cycle;
pub use rendered_cycle::run_rendered_cycle;

/// What Phase 2 (or the rendered cycle's per-product step) still needs to
/// do for one product, decided once by Phase 1 (spec.md §4.9).
pub enum ProductWork {
    /// Phase 1 already resolved a URL (and maybe search-page data); no
    /// further search is needed.
    Navigated(ResolvedProduct, NavigationResult),
    /// Never part of a set group: needs its own full search (spec.md §4.7
    /// Open Question, resolved as `UngroupedPolicy::SearchIndividually`).
    NeedsSearch(ResolvedProduct),
    /// Phase 1 ran for this product's group but found no qualifying match,
    /// or the group search itself failed (spec.md §4.9 "Unmatched products
    /// are not found").
    NotFound(Uuid),
}

/// Per-shop found/not-found tallies for the end-of-cycle summary log
/// (spec.md §4.9 "record per-shop found/notFound statistics").
#[derive(Debug, Default, Clone, Copy)]
pub struct ShopStats {
    pub found: u32,
    pub not_found: u32,
}

impl ShopStats {
    pub fn record(&mut self, result: &ExtractionResult) {
        if result.is_found() {
            self.found += 1;
        } else {
            self.not_found += 1;
        }
    }
}

pub fn log_shop_summary(shop_id: Uuid, shop_name: &str, stats: ShopStats) {
    info!(shop_id = %shop_id, shop = shop_name, found = stats.found, not_found = stats.not_found, "shop scan complete");
}

/// Run one set group's Phase 1 step: one search request, then pure (no-I/O)
/// matching of every member against the shared candidate list (spec.md
/// §4.7, §4.9). On a group-search failure, every member is `NotFound` and
/// the circuit breaker is charged one failure.
pub async fn resolve_group(
    extractor: &mut dyn Extractor,
    shop_id: Uuid,
    shop: &crate::models::shop::ShopConfig,
    group: &SetGroup,
    breaker: &CircuitBreaker,
) -> Vec<ProductWork> {
    let candidates = match navigator::navigate_for_set(extractor, shop, &group.search_phrase).await {
        Ok(candidates) => {
            breaker.record_success(shop_id);
            candidates
        }
        Err(_) => {
            breaker.record_failure(shop_id);
            return group.products.iter().map(|m| ProductWork::NotFound(m.product.id())).collect();
        }
    };

    group
        .products
        .iter()
        .map(|member| match match_member(member, &candidates, shop) {
            Some(navigation) => ProductWork::Navigated(member.product.clone(), navigation),
            None => ProductWork::NotFound(member.product.id()),
        })
        .collect()
}

fn match_member(
    member: &crate::models::candidate::GroupedProduct,
    candidates: &[Candidate],
    shop: &crate::models::shop::ShopConfig,
) -> Option<NavigationResult> {
    let exclude = member.effective_exclude();

    for phrase in &member.product.phrases {
        let scored: Vec<Candidate> = candidates
            .iter()
            .cloned()
            .filter_map(|c| score_candidate(c, phrase, &exclude))
            .collect();

        if let Some(best) = select_best_candidate(scored) {
            return Some(NavigationResult {
                url: navigator::normalize_url(&shop.base_url, &best.url),
                is_direct_hit: false,
                search_page_data: best.search_page_data,
            });
        }
    }
    None
}

/// Run Phase 1 for every set group of one shop, stopping early (and
/// marking everything left as not found) the moment the breaker trips
/// mid-group (spec.md §4.9 "If the breaker tripped mid-group... stop
/// Phase 1 for this shop").
pub async fn run_phase_one(
    extractor: &mut dyn Extractor,
    shop_id: Uuid,
    shop: &crate::models::shop::ShopConfig,
    groups: &[SetGroup],
    ungrouped: &[ResolvedProduct],
    breaker: &CircuitBreaker,
) -> Vec<ProductWork> {
    let mut work = Vec::new();

    for group in groups {
        if breaker.is_tripped(shop_id) {
            work.extend(group.products.iter().map(|m| ProductWork::NotFound(m.product.id())));
            continue;
        }
        work.extend(resolve_group(extractor, shop_id, shop, group, breaker).await);
    }

    if breaker.is_tripped(shop_id) {
        work.extend(ungrouped.iter().map(|p| ProductWork::NotFound(p.id())));
    } else {
        work.extend(ungrouped.iter().cloned().map(ProductWork::NeedsSearch));
    }

    work
}

/// Index every product once per shop, so the dispatcher fan-out can look up
/// the catalog product a result belongs to without a linear scan per result
/// (spec.md §4.12 needs the `Product`, not just its id).
pub fn index_products<'a>(
    groups: &'a [SetGroup],
    ungrouped: &'a [ResolvedProduct],
) -> std::collections::HashMap<Uuid, &'a ResolvedProduct> {
    groups
        .iter()
        .flat_map(|g| g.products.iter().map(|m| &m.product))
        .chain(ungrouped.iter())
        .map(|p| (p.id(), p))
        .collect()
}
