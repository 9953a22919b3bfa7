//! Filter name normalization.
//!
//! Capture software, filter wheels and users label filters inconsistently
//! ("Hα", "H-alpha", "Ha 7nm", "O-III", "Red", "Lum"). Everything is mapped onto
//! the canonical vocabulary of [`CanonicalFilter`], or returned trimmed when no
//! rule applies.

use std::collections::BTreeMap;

use crate::models::CanonicalFilter;

/// Label returned for empty input.
pub const UNKNOWN_FILTER: &str = "Unknown";

struct Rule {
    filter: CanonicalFilter,
    exact: &'static [&'static str],
    /// Prefix that may be followed by a bandwidth (`ha7nm`, `o36`).
    bandwidth_prefix: Option<&'static str>,
    /// Token that identifies the filter anywhere inside the label.
    substring: Option<&'static str>,
}

// Evaluated in order, narrowband first. The first matching rule wins.
const RULES: &[Rule] = &[
    Rule {
        filter: CanonicalFilter::Ha,
        exact: &["ha", "halpha", "hydrogenalpha"],
        bandwidth_prefix: Some("ha"),
        substring: Some("halpha"),
    },
    Rule {
        filter: CanonicalFilter::Oiii,
        exact: &["oiii", "o3"],
        bandwidth_prefix: Some("o3"),
        substring: Some("oiii"),
    },
    Rule {
        filter: CanonicalFilter::Sii,
        exact: &["sii", "s2"],
        bandwidth_prefix: Some("s2"),
        substring: Some("sii"),
    },
    Rule {
        filter: CanonicalFilter::L,
        exact: &["l", "lum", "luminance", "lumen"],
        bandwidth_prefix: None,
        substring: Some("luminance"),
    },
    Rule {
        filter: CanonicalFilter::R,
        exact: &["r", "red"],
        bandwidth_prefix: None,
        substring: None,
    },
    Rule {
        filter: CanonicalFilter::G,
        exact: &["g", "green"],
        bandwidth_prefix: None,
        substring: None,
    },
    Rule {
        filter: CanonicalFilter::B,
        exact: &["b", "blue"],
        bandwidth_prefix: None,
        substring: None,
    },
];

/// Lower-case, fold `α` and drop everything that is not an ASCII letter or digit.
fn compact(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        if c == 'α' {
            out.push_str("alpha");
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
        }
    }
    out
}

/// `7`, `7nm`, `65nm`: digits with an optional `nm` unit.
fn is_bandwidth(rest: &str) -> bool {
    let digits = rest.strip_suffix("nm").unwrap_or(rest);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

impl Rule {
    fn matches(&self, token: &str) -> bool {
        if self.exact.contains(&token) {
            return true;
        }
        if let Some(prefix) = self.bandwidth_prefix {
            if token.strip_prefix(prefix).is_some_and(is_bandwidth) {
                return true;
            }
        }
        self.substring.is_some_and(|s| token.contains(s))
    }
}

/// Map a raw filter label to its canonical filter, if any rule matches.
pub fn canonical_filter(raw: &str) -> Option<CanonicalFilter> {
    let token = compact(raw.trim());
    if token.is_empty() {
        return None;
    }
    RULES.iter().find(|r| r.matches(&token)).map(|r| r.filter)
}

/// Normalize a raw filter label.
///
/// Returns the canonical token when a rule matches, `"Unknown"` for empty
/// input, and the trimmed input otherwise. Idempotent.
pub fn normalize_filter(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UNKNOWN_FILTER.to_string();
    }
    match canonical_filter(trimmed) {
        Some(filter) => filter.as_str().to_string(),
        None => trimmed.to_string(),
    }
}

/// Re-key a filter map through [`normalize_filter`], summing values whose keys
/// collapse onto the same label.
pub fn normalize_keys(values: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let mut out: BTreeMap<String, f64> = BTreeMap::new();
    for (raw, value) in values {
        *out.entry(normalize_filter(raw)).or_insert(0.0) += *value;
    }
    out
}
