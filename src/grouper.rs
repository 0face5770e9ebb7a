//! Set grouper: partitions resolved products into `SetGroup`s for Phase 1
//! set-level search, enriching generic sets with sibling-set-name excludes
//! (spec.md §4.7, Component G).

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::candidate::{GroupedProduct, SetGroup};
use crate::models::product::{ProductSet, ResolvedProduct};

/// Policy for products that have no `set_id` (spec.md §4.7 Open Question,
/// resolved in SPEC_FULL.md): they never form a `SetGroup` and are always
/// searched individually in Phase 2, bounded by per-product concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UngroupedPolicy {
    SearchIndividually,
}

/// Group resolved products by `set_id`, attach each group's shared search
/// phrase (its set's name), and return the leftover ungrouped products
/// separately. Resolution happens before grouping (spec.md §4.13), so
/// members already carry their own phrases/excludes.
///
/// For a generic set (`ProductSet::is_generic`), every member has its
/// sibling set names folded into its effective exclude list, so a search
/// for the series name doesn't cross-match into a differently-named
/// release of the same series (spec.md §4.7).
pub fn group_products(
    products: &[ResolvedProduct],
    sets: &HashMap<Uuid, ProductSet>,
) -> (Vec<SetGroup>, Vec<ResolvedProduct>) {
    let mut by_set: HashMap<Uuid, Vec<ResolvedProduct>> = HashMap::new();
    let mut ungrouped = Vec::new();

    for product in products {
        match product.product.set_id {
            Some(set_id) if sets.contains_key(&set_id) => {
                by_set.entry(set_id).or_default().push(product.clone());
            }
            _ => ungrouped.push(product.clone()),
        }
    }

    let mut groups = Vec::with_capacity(by_set.len());
    for (set_id, members) in by_set {
        let set = &sets[&set_id];
        let sibling_excludes = if set.is_generic() {
            sibling_set_names(set_id, set.series.as_str(), sets)
        } else {
            Vec::new()
        };

        let grouped_products = members
            .into_iter()
            .map(|product| GroupedProduct { product, group_exclude: sibling_excludes.clone() })
            .collect();

        groups.push(SetGroup { set_id, search_phrase: set.name.clone(), products: grouped_products });
    }

    (groups, ungrouped)
}

/// Other sets in the same series, excluding `set_id` itself — these names
/// become excludes so a generic-set search for e.g. "Promos" doesn't match
/// titles belonging to "Promos SWSH" (spec.md §4.7).
fn sibling_set_names(set_id: Uuid, series: &str, sets: &HashMap<Uuid, ProductSet>) -> Vec<String> {
    sets.values()
        .filter(|s| s.id != set_id && s.series == series)
        .map(|s| s.name.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::Product;

    fn set(id: Uuid, name: &str, series: &str) -> ProductSet {
        ProductSet { id, name: name.into(), series: series.into(), release_date: None }
    }

    fn resolved(name: &str, set_id: Option<Uuid>) -> ResolvedProduct {
        let mut product = Product::new(name);
        product.set_id = set_id;
        ResolvedProduct::new(product, vec![name.to_lowercase()], vec![]).unwrap()
    }

    #[test]
    fn groups_products_sharing_a_set() {
        let set_id = Uuid::new_v4();
        let sets = HashMap::from([(set_id, set(set_id, "Surging Sparks", "Scarlet & Violet"))]);
        let products = vec![
            resolved("Booster Box", Some(set_id)),
            resolved("Elite Trainer Box", Some(set_id)),
        ];

        let (groups, ungrouped) = group_products(&products, &sets);
        assert!(ungrouped.is_empty());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].search_phrase, "Surging Sparks");
        assert_eq!(groups[0].products.len(), 2);
    }

    #[test]
    fn ungrouped_products_pass_through() {
        let sets = HashMap::new();
        let products = vec![resolved("Loose Single", None)];
        let (groups, ungrouped) = group_products(&products, &sets);
        assert!(groups.is_empty());
        assert_eq!(ungrouped.len(), 1);
    }

    #[test]
    fn generic_set_gets_sibling_excludes() {
        let promos = Uuid::new_v4();
        let promos_swsh = Uuid::new_v4();
        let sets = HashMap::from([
            (promos, set(promos, "Promos", "Promos")),
            (promos_swsh, set(promos_swsh, "Promos SWSH", "Promos")),
        ]);
        let products = vec![resolved("Promo Card", Some(promos))];

        let (groups, _) = group_products(&products, &sets);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].products[0].group_exclude, vec!["promos swsh".to_string()]);
        assert_eq!(groups[0].products[0].effective_exclude(), vec!["promos swsh".to_string()]);
    }

    #[test]
    fn non_generic_set_has_no_sibling_excludes() {
        let set_id = Uuid::new_v4();
        let sets = HashMap::from([(set_id, set(set_id, "Surging Sparks", "Scarlet & Violet"))]);
        let products = vec![resolved("Booster Box", Some(set_id))];

        let (groups, _) = group_products(&products, &sets);
        assert!(groups[0].products[0].group_exclude.is_empty());
    }
}
