//! Search-config resolver: merges product, product-type, and set-name
//! search phrases/excludes into a single `ResolvedProduct` (spec.md §4.6,
//! Component F).

use std::collections::HashMap;

use uuid::Uuid;

use crate::errors::{ScanError, ScanResult};
use crate::models::product::{Product, ProductSet, ProductType, ResolvedProduct};
use crate::text::normalize::normalize_for_matching;

/// The catalog context a resolver needs, keyed by id for O(1) lookup.
pub struct CatalogContext<'a> {
    pub product_types: &'a HashMap<Uuid, ProductType>,
    pub sets: &'a HashMap<Uuid, ProductSet>,
}

fn own_phrases(product: &Product) -> &[String] {
    product.search.as_ref().map(|s| s.phrases.as_slice()).unwrap_or(&[])
}

fn own_exclude(product: &Product) -> &[String] {
    product.search.as_ref().map(|s| s.exclude.as_slice()).unwrap_or(&[])
}

/// Resolve one product's effective search phrases and excludes, in the
/// priority order of spec.md §4.6:
///
/// 1. No `product_type_id`: keep the product's own phrases if any, else
///    unresolvable.
/// 2. `product_type_id` references an unknown type: same fallback as (1).
/// 3. `search.override_default` set: use only the product's own
///    phrases/excludes.
/// 4. Otherwise merge: each type default phrase becomes
///    `"{set name} {type phrase}"` (lower-cased); if the product has no
///    set, type phrases are dropped entirely (too generic) but type
///    excludes still merge. Final phrases = dedupe(product phrases ++
///    type-derived), product phrases first; final excludes =
///    dedupe(type excludes ++ product excludes).
///
/// A product resolving to zero phrases is a resolver error.
pub fn resolve(product: &Product, ctx: &CatalogContext<'_>) -> ScanResult<ResolvedProduct> {
    let Some(type_id) = product.product_type_id else {
        return finish(product, own_phrases(product).to_vec(), own_exclude(product).to_vec());
    };

    let Some(product_type) = ctx.product_types.get(&type_id) else {
        return finish(product, own_phrases(product).to_vec(), own_exclude(product).to_vec());
    };

    if let Some(search) = &product.search {
        if search.override_default {
            return finish(product, search.phrases.clone(), search.exclude.clone());
        }
    }

    let set_name = product.set_id.and_then(|id| ctx.sets.get(&id)).map(|s| s.name.as_str());

    let type_derived: Vec<String> = match set_name {
        Some(set_name) => product_type
            .default_phrases
            .iter()
            .map(|phrase| format!("{set_name} {phrase}").to_lowercase())
            .collect(),
        None => Vec::new(),
    };

    let mut phrases = own_phrases(product).to_vec();
    phrases.extend(type_derived);

    let mut exclude = product_type.default_exclude.clone();
    exclude.extend(own_exclude(product).iter().cloned());

    finish(product, phrases, exclude)
}

fn finish(product: &Product, phrases: Vec<String>, exclude: Vec<String>) -> ScanResult<ResolvedProduct> {
    let phrases = dedupe_case_insensitive(phrases);
    let exclude = dedupe_case_insensitive(exclude);
    ResolvedProduct::new(product.clone(), phrases, exclude).ok_or_else(|| no_phrases_error(product))
}

fn no_phrases_error(product: &Product) -> ScanError {
    ScanError::resolver(format!(
        "product {} ({}) resolved to zero search phrases",
        product.id, product.name
    ))
}

/// Case-insensitive, first-occurrence-wins dedupe. Idempotent: applying it
/// to its own output is a no-op (spec.md §8 "Dedupe idempotence").
fn dedupe_case_insensitive(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let key = normalize_for_matching(&item);
        if seen.insert(key) {
            out.push(item);
        }
    }
    out
}
