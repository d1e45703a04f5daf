//! Case-insensitive package-id comparison and the lowercasing convention
//! used for on-disk cache paths (spec §3: "storage paths lowercase the id
//! to match cross-tool layout").

use unicase::UniCase;

/// Lowercases an id the way the on-disk cache layout expects. ASCII-only
/// lowering would be wrong for ids with non-ASCII characters, so this uses
/// full Unicode case folding via `to_lowercase`.
pub fn lower_id(id: &str) -> String {
    id.to_lowercase()
}

/// Case-insensitive equality for package ids.
pub fn ids_eq(a: &str, b: &str) -> bool {
    UniCase::new(a) == UniCase::new(b)
}

/// A package id wrapper usable as a case-insensitive map key while
/// preserving the originally-supplied casing for display and manifest
/// output.
#[derive(Debug, Clone)]
pub struct CaseInsensitiveId {
    original: String,
    key: String,
}

impl CaseInsensitiveId {
    pub fn new(original: impl Into<String>) -> Self {
        let original = original.into();
        let key = original.to_lowercase();
        CaseInsensitiveId { original, key }
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for CaseInsensitiveId {
    fn eq(&self, other: &Self) -> bool {
        UniCase::new(self.original.as_str()) == UniCase::new(other.original.as_str())
    }
}
impl Eq for CaseInsensitiveId {}

impl std::hash::Hash for CaseInsensitiveId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        UniCase::new(self.original.as_str()).hash(state)
    }
}

impl PartialOrd for CaseInsensitiveId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for CaseInsensitiveId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        UniCase::new(self.original.as_str()).cmp(&UniCase::new(other.original.as_str()))
    }
}

impl std::fmt::Display for CaseInsensitiveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_variant_ids_are_equal_keys() {
        let a = CaseInsensitiveId::new("Newtonsoft.Json");
        let b = CaseInsensitiveId::new("newtonsoft.json");
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn lower_id_matches_cross_tool_layout() {
        assert_eq!(lower_id("Newtonsoft.Json"), "newtonsoft.json");
    }
}
