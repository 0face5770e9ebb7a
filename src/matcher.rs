//! Candidate matcher: title validation, fuzzy scoring, and best-candidate
//! selection (spec.md §4.2, Component B).

use std::collections::BTreeSet;

use crate::models::candidate::Candidate;
use crate::models::product::Product;
use crate::text::normalize::normalize_for_matching;

/// Minimum score for selecting among multiple ranked candidates.
pub const MIN_SCORE: f64 = 95.0;
/// Minimum score for accepting a search→product-page direct-hit redirect.
pub const DIRECT_HIT_SCORE: f64 = 90.0;

/// Validate a candidate title against a phrase and the product's excludes
/// (spec.md §4.2). Returns `None` if any exclude substring matches;
/// otherwise returns a fuzzy score in `[0, 100]`.
pub fn validate_title(title: &str, phrase: &str, exclude: &[String], _shop_id: uuid::Uuid) -> Option<f64> {
    let normalized_title = normalize_for_matching(title);

    if !exclude.is_empty() {
        for term in exclude {
            let term = normalize_for_matching(term);
            if !term.is_empty() && normalized_title.contains(&term) {
                return None;
            }
        }
    }

    Some(token_set_ratio(&normalized_title, &normalize_for_matching(phrase)))
}

/// Convenience overload taking a `Product`'s resolved exclude list.
pub fn validate_title_for_product(
    title: &str,
    phrase: &str,
    product: &Product,
    resolved_exclude: &[String],
    shop_id: uuid::Uuid,
) -> Option<f64> {
    let _ = product;
    validate_title(title, phrase, resolved_exclude, shop_id)
}

/// Order-insensitive, extra-token-tolerant fuzzy score in `[0, 100]`
/// ("token-set-ratio", spec.md §4.2, GLOSSARY).
///
/// Tokenizes both strings, partitions into the sorted-unique intersection
/// and each side's sorted-unique remainder, then scores the best of three
/// normalized-edit-distance comparisons — the standard token-set-ratio
/// construction, built on `strsim` (already idiomatic in this corpus via
/// `estuary-flow`) rather than a hand-rolled string metric.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let only_a: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let only_b: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    let sorted_intersection = intersection.join(" ");
    let combined_a = join_sorted(&sorted_intersection, &only_a);
    let combined_b = join_sorted(&sorted_intersection, &only_b);

    let ratio = |x: &str, y: &str| strsim::normalized_levenshtein(x, y) * 100.0;

    let scores = [
        ratio(&sorted_intersection, &combined_a),
        ratio(&sorted_intersection, &combined_b),
        ratio(&combined_a, &combined_b),
    ];

    scores.into_iter().fold(0.0_f64, f64::max)
}

fn join_sorted(intersection: &str, rest: &[&str]) -> String {
    if intersection.is_empty() {
        rest.join(" ")
    } else if rest.is_empty() {
        intersection.to_string()
    } else {
        format!("{intersection} {}", rest.join(" "))
    }
}

/// Rank candidates by (availability-tier asc, price asc, score desc) and
/// return the top one iff its score meets `MIN_SCORE` (spec.md §4.2).
pub fn select_best_candidate(mut candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates.sort_by(|a, b| {
        a.availability_tier()
            .cmp(&b.availability_tier())
            .then(a.price_sort_key().total_cmp(&b.price_sort_key()))
            .then(b.score.total_cmp(&a.score))
    });

    let best = candidates.into_iter().next()?;
    if best.score >= MIN_SCORE {
        Some(best)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candidate::SearchPageData;

    #[test]
    fn identical_titles_score_100() {
        let score = token_set_ratio("surging sparks booster box", "surging sparks booster box");
        assert!((score - 100.0).abs() < 0.001);
    }

    #[test]
    fn extra_tokens_still_score_highly() {
        let score = token_set_ratio(
            "surging sparks booster box 36 packs",
            "surging sparks booster box",
        );
        assert!(score >= 95.0, "score was {score}");
    }

    #[test]
    fn order_insensitive() {
        let a = token_set_ratio("booster box surging sparks", "surging sparks booster box");
        assert!((a - 100.0).abs() < 0.001);
    }

    #[test]
    fn exclude_rejects_regardless_of_score() {
        let exclude = vec!["promos swsh".to_string()];
        let result = validate_title(
            "Promos SWSH Booster Pack",
            "promos",
            &exclude,
            uuid::Uuid::new_v4(),
        );
        assert!(result.is_none());
    }

    #[test]
    fn select_best_prefers_in_stock_then_price_then_score() {
        let candidates = vec![
            Candidate::new("A", "/a", 96.0)
                .with_search_page_data(SearchPageData { price: Some(50.0), is_available: false }),
            Candidate::new("B", "/b", 96.0)
                .with_search_page_data(SearchPageData { price: Some(40.0), is_available: true }),
            Candidate::new("C", "/c", 99.0)
                .with_search_page_data(SearchPageData { price: Some(60.0), is_available: true }),
        ];
        let best = select_best_candidate(candidates).unwrap();
        assert_eq!(best.url, "/b");
    }

    #[test]
    fn select_best_rejects_below_min_score() {
        let candidates = vec![Candidate::new("A", "/a", 80.0)];
        assert!(select_best_candidate(candidates).is_none());
    }

    #[test]
    fn unknown_availability_sorts_between_in_stock_and_out() {
        let candidates = vec![
            Candidate::new("A", "/a", 99.0), // unknown, tier 1
            Candidate::new("B", "/b", 99.0)
                .with_search_page_data(SearchPageData { price: Some(10.0), is_available: false }), // tier 2
        ];
        let best = select_best_candidate(candidates).unwrap();
        assert_eq!(best.url, "/a");
    }
}
