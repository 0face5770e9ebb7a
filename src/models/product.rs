//! Catalog domain types: products, product types, and product sets.
//!
//! These are the "owned by external CRUD" entities the core reads once per
//! cycle (spec.md §3). The core never mutates them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product-level search override: when `override_default` is set, the
/// resolver uses only these phrases/excludes and ignores the product type
/// and set entirely (spec.md §4.6 rule 3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOverride {
    pub phrases: Vec<String>,
    pub exclude: Vec<String>,
    pub override_default: bool,
}

/// A catalog entry being watched across shops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub set_id: Option<Uuid>,
    pub product_type_id: Option<Uuid>,
    pub search: Option<SearchOverride>,
    pub disabled: bool,
}

impl Product {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            set_id: None,
            product_type_id: None,
            search: None,
            disabled: false,
        }
    }

    pub fn with_set(mut self, set_id: Uuid) -> Self {
        self.set_id = Some(set_id);
        self
    }

    pub fn with_type(mut self, product_type_id: Uuid) -> Self {
        self.product_type_id = Some(product_type_id);
        self
    }

    pub fn with_search_override(mut self, phrases: Vec<String>, exclude: Vec<String>) -> Self {
        self.search = Some(SearchOverride {
            phrases,
            exclude,
            override_default: true,
        });
        self
    }

    pub fn with_search_phrases(mut self, phrases: Vec<String>, exclude: Vec<String>) -> Self {
        self.search = Some(SearchOverride {
            phrases,
            exclude,
            override_default: false,
        });
        self
    }
}

/// Shared search defaults for a family of products (spec.md §3 "ProductType").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductType {
    pub id: Uuid,
    pub default_phrases: Vec<String>,
    pub default_exclude: Vec<String>,
}

/// A release/series grouping (spec.md §3 "ProductSet").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSet {
    pub id: Uuid,
    pub name: String,
    pub series: String,
    pub release_date: Option<chrono::NaiveDate>,
}

impl ProductSet {
    /// A set whose name equals its series is "generic" (spec.md §3, §4.7).
    pub fn is_generic(&self) -> bool {
        self.name == self.series
    }
}

/// A product with its search phrases/excludes fully resolved (spec.md §3
/// "ResolvedProduct"). Always has at least one phrase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedProduct {
    pub product: Product,
    pub phrases: Vec<String>,
    pub exclude: Vec<String>,
}

impl ResolvedProduct {
    /// Construct a resolved product, enforcing the "at least one phrase"
    /// invariant at the boundary rather than trusting callers.
    pub fn new(product: Product, phrases: Vec<String>, exclude: Vec<String>) -> Option<Self> {
        if phrases.is_empty() {
            return None;
        }
        Some(Self {
            product,
            phrases,
            exclude,
        })
    }

    pub fn id(&self) -> Uuid {
        self.product.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_set_detection() {
        let set = ProductSet {
            id: Uuid::new_v4(),
            name: "Promos".into(),
            series: "Promos".into(),
            release_date: None,
        };
        assert!(set.is_generic());

        let set = ProductSet {
            id: Uuid::new_v4(),
            name: "Promos SWSH".into(),
            series: "Promos".into(),
            release_date: None,
        };
        assert!(!set.is_generic());
    }

    #[test]
    fn resolved_product_requires_a_phrase() {
        let p = Product::new("Widget");
        assert!(ResolvedProduct::new(p.clone(), vec![], vec![]).is_none());
        assert!(ResolvedProduct::new(p, vec!["widget".into()], vec![]).is_some());
    }
}
