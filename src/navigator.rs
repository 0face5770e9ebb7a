//! Search navigator (spec.md §4.3, Component C).
//!
//! Per-product navigation (search → validate → select) and the set-level
//! variant that collects a larger, unfiltered candidate list reused across
//! every product in a `SetGroup`.

use regex::Regex;

use crate::errors::ScanResult;
use crate::extractor::Extractor;
use crate::matcher::{select_best_candidate, validate_title, DIRECT_HIT_SCORE};
use crate::models::candidate::{Candidate, SearchPageData};
use crate::models::product::ResolvedProduct;
use crate::models::shop::ShopConfig;

/// Article nodes considered per search page (spec.md §4.3).
const MAX_ARTICLES_PER_PRODUCT_SEARCH: usize = 5;
/// Candidates collected by the unfiltered set-level search (spec.md §4.3).
const MAX_SET_SEARCH_CANDIDATES: usize = 20;

/// Outcome of a successful per-product navigation.
#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub is_direct_hit: bool,
    pub search_page_data: Option<SearchPageData>,
}

/// Run the product-level navigator: try each phrase in order, returning the
/// first validated hit. `None` once all phrases are exhausted.
pub async fn navigate_for_product(
    extractor: &mut dyn Extractor,
    shop: &ShopConfig,
    product: &ResolvedProduct,
) -> ScanResult<Option<NavigationResult>> {
    for phrase in &product.phrases {
        let search_url = shop.search_url(phrase);
        extractor.goto(&search_url).await?;

        if let Some(pattern) = &shop.direct_hit_pattern {
            if direct_hit_matches(pattern, extractor.current_url()) {
                if let Some(result) = try_direct_hit(extractor, shop, phrase).await? {
                    return Ok(Some(result));
                }
            }
        }

        let candidates = collect_article_candidates(extractor, shop, MAX_ARTICLES_PER_PRODUCT_SEARCH).await?;
        let scored: Vec<Candidate> = candidates
            .into_iter()
            .filter_map(|c| score_candidate(c, phrase, &product.exclude))
            .collect();

        if let Some(best) = select_best_candidate(scored) {
            return Ok(Some(NavigationResult {
                url: normalize_url(&shop.base_url, &best.url),
                is_direct_hit: false,
                search_page_data: best.search_page_data,
            }));
        }
    }

    Ok(None)
}

/// Set-level search: one search request per phrase, returning up to
/// `MAX_SET_SEARCH_CANDIDATES` unfiltered candidates for later pure (no-I/O)
/// per-product scoring (spec.md §4.3).
pub async fn navigate_for_set(
    extractor: &mut dyn Extractor,
    shop: &ShopConfig,
    phrase: &str,
) -> ScanResult<Vec<Candidate>> {
    let search_url = shop.search_url(phrase);
    extractor.goto(&search_url).await?;
    collect_article_candidates(extractor, shop, MAX_SET_SEARCH_CANDIDATES).await
}

/// Score a raw, unfiltered candidate against a specific product's phrase and
/// excludes — the "pure (no-I/O) matching step" reused across every product
/// sharing a set (spec.md §4.3).
pub fn score_candidate(mut candidate: Candidate, phrase: &str, exclude: &[String]) -> Option<Candidate> {
    let score = validate_title(&candidate.title, phrase, exclude, uuid::Uuid::nil())?;
    candidate.score = score;
    Some(candidate)
}

async fn try_direct_hit(
    extractor: &mut dyn Extractor,
    shop: &ShopConfig,
    phrase: &str,
) -> ScanResult<Option<NavigationResult>> {
    let title = extractor.extract_one(&shop.selectors.product_title).await?;
    let Some(title) = title else { return Ok(None) };

    let score = validate_title(&title, phrase, &[], shop.id);
    match score {
        Some(score) if score >= DIRECT_HIT_SCORE => Ok(Some(NavigationResult {
            url: extractor.current_url().to_string(),
            is_direct_hit: true,
            search_page_data: None,
        })),
        _ => Ok(None),
    }
}

async fn collect_article_candidates(
    extractor: &mut dyn Extractor,
    shop: &ShopConfig,
    limit: usize,
) -> ScanResult<Vec<Candidate>> {
    let articles = extractor.extract_many(&shop.selectors.search_article).await?;
    let mut candidates = Vec::new();

    for article in articles.into_iter().take(limit) {
        let Some(title_elem) = article.find(&shop.selectors.search_title) else { continue };
        let title = title_elem.text();
        if title.is_empty() {
            continue;
        }

        let Some(url_elem) = article.find(&shop.selectors.search_product_url) else { continue };
        let Some(url) = url_elem.attribute("href") else { continue };

        let mut candidate = Candidate::new(title, url, 0.0);

        if let (Some(price_selector), Some(avail_selector)) =
            (&shop.selectors.search_price, &shop.selectors.search_availability)
        {
            let price = article.find(price_selector).and_then(|e| shop.price_locale.parse(&e.text()));
            let is_available = article.matches(avail_selector);
            candidate = candidate.with_search_page_data(SearchPageData { price, is_available });
        }

        candidates.push(candidate);
    }

    Ok(candidates)
}

fn direct_hit_matches(pattern: &str, url: &str) -> bool {
    Regex::new(pattern).map(|re| re.is_match(url)).unwrap_or(false)
}

/// Absolute stays; `//host/path` gets `https:` prepended; `/path` is
/// resolved against `base_url`; otherwise treated as base-relative
/// (spec.md §4.3).
pub fn normalize_url(base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else if let Some(path) = url.strip_prefix('/') {
        format!("{}/{}", base_url.trim_end_matches('/'), path)
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_url_keeps_absolute() {
        assert_eq!(normalize_url("https://shop.test", "https://other.test/p"), "https://other.test/p");
    }

    #[test]
    fn normalize_url_adds_scheme_to_protocol_relative() {
        assert_eq!(normalize_url("https://shop.test", "//cdn.shop.test/p"), "https://cdn.shop.test/p");
    }

    #[test]
    fn normalize_url_resolves_absolute_path_against_base() {
        assert_eq!(normalize_url("https://shop.test", "/products/1"), "https://shop.test/products/1");
    }

    #[test]
    fn normalize_url_resolves_relative_path_against_base() {
        assert_eq!(normalize_url("https://shop.test", "products/1"), "https://shop.test/products/1");
    }

    #[test]
    fn score_candidate_returns_none_when_excluded() {
        let candidate = Candidate::new("Promos SWSH Booster", "/p", 0.0);
        let exclude = vec!["promos swsh".to_string()];
        assert!(score_candidate(candidate, "promos", &exclude).is_none());
    }

    #[test]
    fn score_candidate_sets_score_on_match() {
        let candidate = Candidate::new("Surging Sparks Booster Box", "/p", 0.0);
        let scored = score_candidate(candidate, "surging sparks booster box", &[]).unwrap();
        assert!(scored.score > 90.0);
    }
}
