//! `FrameworkOps`: the narrow interface consumed from the (out-of-scope)
//! framework module collaborator (spec §6). Ships one built-in
//! implementation sufficient for tests and documented as a stand-in for
//! the real `NuGetFramework` reducer (spec §4.14).

/// Framework compatibility and group-selection operations.
pub trait FrameworkOps: Send + Sync {
    /// Whether `a` can consume a dependency group targeting `b`.
    fn is_compatible(&self, a: &str, b: &str) -> bool;

    /// Picks the nearest-compatible candidate for `target` out of
    /// `candidates`, or `None` if nothing is compatible. Ties are broken by
    /// "first encountered wins" (spec §4.8).
    fn reduce<'a>(&self, candidates: &[&'a str], target: &str) -> Option<&'a str> {
        candidates
            .iter()
            .find(|c| self.is_compatible(target, c))
            .copied()
    }
}

/// Treats TFMs as opaque strings: exact match is compatible, and `any` is
/// always compatible with every target. This is a stand-in for the real
/// `NuGetFramework` reducer, which understands framework families,
/// portable profiles, and version fallback; callers that need that
/// fidelity supply their own `FrameworkOps`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleFrameworkOps;

impl FrameworkOps for SimpleFrameworkOps {
    fn is_compatible(&self, a: &str, b: &str) -> bool {
        b == "any" || a.eq_ignore_ascii_case(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_group_is_always_compatible() {
        let ops = SimpleFrameworkOps;
        assert!(ops.is_compatible("net8.0", "any"));
    }

    #[test]
    fn exact_match_wins_over_nothing() {
        let ops = SimpleFrameworkOps;
        assert!(ops.is_compatible("net8.0", "net8.0"));
        assert!(!ops.is_compatible("net8.0", "net6.0"));
    }

    #[test]
    fn reduce_picks_first_compatible_candidate() {
        let ops = SimpleFrameworkOps;
        let candidates = ["any", "net8.0"];
        let refs: Vec<&str> = candidates.to_vec();
        assert_eq!(ops.reduce(&refs, "net8.0"), Some("any"));
    }
}
