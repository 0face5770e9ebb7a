//! Title normalization for matching (spec.md §4.1).

/// Lower-case, trim, collapse whitespace, fold dash/minus variants to ASCII
/// hyphen, then fold hyphens and colons to spaces and collapse whitespace
/// again. Idempotent: normalizing twice equals normalizing once
/// (spec.md §8 "Round-trip and idempotence").
pub fn normalize_for_matching(input: &str) -> String {
    let lower = input.trim().to_lowercase();

    // Fold em-dash, en-dash, and minus-sign variants to ASCII hyphen.
    let folded: String = lower
        .chars()
        .map(|c| match c {
            '\u{2014}' | '\u{2013}' | '\u{2212}' => '-',
            other => other,
        })
        .collect();

    // Hyphens and colons are word separators for matching purposes.
    let separated: String = folded
        .chars()
        .map(|c| if c == '-' || c == ':' { ' ' } else { c })
        .collect();

    collapse_whitespace(&separated)
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_trims() {
        assert_eq!(normalize_for_matching("  Surging SPARKS  "), "surging sparks");
    }

    #[test]
    fn collapses_internal_whitespace() {
        assert_eq!(normalize_for_matching("Surging   Sparks"), "surging sparks");
    }

    #[test]
    fn folds_dash_variants_to_space() {
        assert_eq!(normalize_for_matching("Paldea\u{2014}Evolved"), "paldea evolved");
        assert_eq!(normalize_for_matching("Paldea\u{2013}Evolved"), "paldea evolved");
        assert_eq!(normalize_for_matching("Paldea-Evolved"), "paldea evolved");
    }

    #[test]
    fn folds_colon_to_space() {
        assert_eq!(normalize_for_matching("Sword: Shield"), "sword shield");
    }

    #[test]
    fn is_idempotent() {
        let once = normalize_for_matching("  Surging--SPARKS: Booster  ");
        let twice = normalize_for_matching(&once);
        assert_eq!(once, twice);
    }
}
