//! Display name → ledger key canonicalization.

use serde::Serialize;
use std::fmt;

/// Normalized, case-folded name. Two spellings of the same identity map to
/// the same key; the raw display name is stored separately.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Non-breaking spaces, underscores and hyphens are display variants of a
/// plain space. Anything outside ASCII is dropped.
pub fn normalize(raw: &str) -> IdentityKey {
    let unified: String = raw
        .chars()
        .map(|c| match c {
            '\u{a0}' | '_' | '-' => ' ',
            other => other,
        })
        .filter(char::is_ascii)
        .collect();
    IdentityKey(unified.trim().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spelling_variants_collapse() {
        let expected = normalize("some name");
        for raw in ["Some Name", "SOME_NAME", "some-name", "Some\u{a0}Name", "  Some Name "] {
            assert_eq!(normalize(raw), expected, "variant {:?}", raw);
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["Zezima", "Iron_Man-99", "\u{a0}Lynx Titan\u{a0}", "B0aty"] {
            let once = normalize(raw);
            assert_eq!(normalize(once.as_str()), once);
        }
    }

    #[test]
    fn drops_non_ascii() {
        assert_eq!(normalize("Zéz").as_str(), "zz");
    }

    #[test]
    fn keys_order_lexicographically() {
        let mut keys = vec![normalize("charlie"), normalize("Alice"), normalize("bob")];
        keys.sort();
        let ordered: Vec<&str> = keys.iter().map(IdentityKey::as_str).collect();
        assert_eq!(ordered, vec!["alice", "bob", "charlie"]);
    }
}
