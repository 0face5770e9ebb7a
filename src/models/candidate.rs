//! Search-results intermediates (spec.md §3 "Candidate", "SetGroup").

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::product::ResolvedProduct;

/// Price/availability as reported directly on a search-results page, letting
/// the scraper template synthesize a result without a product-page visit
/// (spec.md §4.5 step 2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchPageData {
    pub price: Option<f64>,
    pub is_available: bool,
}

/// One search-results entry (spec.md §3 "Candidate").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub url: String,
    pub score: f64,
    pub search_page_data: Option<SearchPageData>,
}

impl Candidate {
    pub fn new(title: impl Into<String>, url: impl Into<String>, score: f64) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            score,
            search_page_data: None,
        }
    }

    pub fn with_search_page_data(mut self, data: SearchPageData) -> Self {
        self.search_page_data = Some(data);
        self
    }

    /// Availability tier used by `selectBestCandidate` ranking (spec.md
    /// §4.2): 0 = explicitly in stock, 1 = unknown, 2 = explicitly out.
    pub fn availability_tier(&self) -> u8 {
        match self.search_page_data {
            Some(SearchPageData { is_available: true, .. }) => 0,
            Some(SearchPageData { is_available: false, .. }) => 2,
            None => 1,
        }
    }

    /// `None` price sorts as +infinity per spec.md §4.2.
    pub fn price_sort_key(&self) -> f64 {
        self.search_page_data
            .and_then(|d| d.price)
            .unwrap_or(f64::INFINITY)
    }
}

/// Products grouped by their set, with the set's name as the shared search
/// phrase and sibling-set-name excludes merged in for generic sets
/// (spec.md §3 "SetGroup", §4.7).
#[derive(Debug, Clone)]
pub struct SetGroup {
    pub set_id: Uuid,
    pub search_phrase: String,
    pub products: Vec<GroupedProduct>,
}

/// A resolved product as it appears inside a `SetGroup`: its resolved
/// phrases/excludes plus the group-level excludes effective for this group
/// (sibling set names folded in when the set is generic).
#[derive(Debug, Clone)]
pub struct GroupedProduct {
    pub product: ResolvedProduct,
    pub group_exclude: Vec<String>,
}

impl GroupedProduct {
    /// The resolved product's own excludes plus this group's excludes
    /// (spec.md §4.7).
    pub fn effective_exclude(&self) -> Vec<String> {
        self.product
            .exclude
            .iter()
            .chain(self.group_exclude.iter())
            .cloned()
            .collect()
    }
}
