//! Locale-aware price parsing (spec.md §4.1, Component A).
//!
//! Failure never panics or propagates: an unparsable string yields `None`
//! and the caller treats that as "price unknown" (spec.md §4.1).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    European,
    Us,
}

impl Locale {
    /// Parse the first price-shaped numeric run out of `raw`. Returns
    /// `None` on no match rather than erroring (spec.md §4.1).
    pub fn parse(&self, raw: &str) -> Option<f64> {
        match self {
            Locale::European => parse_european(raw),
            Locale::Us => parse_us(raw),
        }
    }

    /// Render `value` back into this locale's textual form, for round-trip
    /// tests (spec.md §8).
    pub fn format(&self, value: f64) -> String {
        let cents = (value * 100.0).round() as i64;
        let whole = cents / 100;
        let frac = (cents % 100).abs();
        let grouped = group_thousands(whole.unsigned_abs(), self.thousands_sep());
        let sign = if whole < 0 { "-" } else { "" };
        format!("{sign}{grouped}{}{frac:02}", self.decimal_sep())
    }

    fn thousands_sep(&self) -> char {
        match self {
            Locale::European => '.',
            Locale::Us => ',',
        }
    }

    fn decimal_sep(&self) -> char {
        match self {
            Locale::European => ',',
            Locale::Us => '.',
        }
    }
}

fn group_thousands(mut n: u64, sep: char) -> String {
    let digits = n.to_string();
    if digits.len() <= 3 {
        return digits;
    }
    let mut groups = Vec::new();
    loop {
        let rem = n % 1000;
        n /= 1000;
        if n == 0 {
            groups.push(rem.to_string());
            break;
        } else {
            groups.push(format!("{rem:03}"));
        }
    }
    groups.reverse();
    groups.join(&sep.to_string())
}

/// Digits, dots, spaces (incl. NBSP) as thousands separators, optional
/// comma + 1-2 decimal digits.
fn parse_european(raw: &str) -> Option<f64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(\d{1,3}(?:[.\s\u{00A0}]\d{3})*(?:,\d{1,2})?)").unwrap()
    });
    let caps = re.captures(raw)?;
    let matched = caps.get(1)?.as_str();

    let (integer_part, frac_part) = match matched.rsplit_once(',') {
        Some((int, frac)) => (int, Some(frac)),
        None => (matched, None),
    };

    let cleaned_int: String = integer_part
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    if cleaned_int.is_empty() {
        return None;
    }

    let normalized = match frac_part {
        Some(frac) => format!("{cleaned_int}.{frac}"),
        None => cleaned_int,
    };

    normalized.parse::<f64>().ok()
}

/// `\d{1,3}(,\d{3})*(\.\d{1,2})?`
fn parse_us(raw: &str) -> Option<f64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(\d{1,3}(?:,\d{3})*(?:\.\d{1,2})?)").unwrap());
    let caps = re.captures(raw)?;
    let matched = caps.get(1)?.as_str();
    let cleaned: String = matched.chars().filter(|&c| c != ',').collect();
    cleaned.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn european_basic() {
        assert_eq!(Locale::European.parse("29,99 €"), Some(29.99));
    }

    #[test]
    fn european_thousands_dot() {
        assert_eq!(Locale::European.parse("1.234,56 €"), Some(1234.56));
    }

    #[test]
    fn european_thousands_nbsp() {
        assert_eq!(Locale::European.parse("1\u{00A0}234,56"), Some(1234.56));
    }

    #[test]
    fn european_no_decimal() {
        assert_eq!(Locale::European.parse("399 €"), Some(399.0));
    }

    #[test]
    fn us_basic() {
        assert_eq!(Locale::Us.parse("$29.99"), Some(29.99));
    }

    #[test]
    fn us_thousands_comma() {
        assert_eq!(Locale::Us.parse("$1,234.56"), Some(1234.56));
    }

    #[test]
    fn returns_none_on_no_match() {
        assert_eq!(Locale::Us.parse("Out of stock"), None);
        assert_eq!(Locale::European.parse("Rupture de stock"), None);
    }

    #[test]
    fn format_then_reparse_round_trips() {
        for &(locale, value) in &[
            (Locale::Us, 1234.56),
            (Locale::Us, 9.99),
            (Locale::European, 1234.56),
            (Locale::European, 399.0),
        ] {
            let formatted = locale.format(value);
            let reparsed = locale.parse(&formatted).expect("should reparse");
            assert!((reparsed - value).abs() < 0.01, "{formatted} -> {reparsed} != {value}");
        }
    }
}
