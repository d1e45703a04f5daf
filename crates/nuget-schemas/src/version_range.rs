//! `VersionRange`: a tagged variant rather than an inheritance hierarchy
//! (spec §9's design note). Parses the bracket syntax of spec §3 and
//! implements `contains`/`best_match` (lowest admissible candidate wins,
//! per the "lowest-floor selection rule").

use std::fmt;
use std::str::FromStr;

use crate::version::PackageVersion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRange {
    Exact(PackageVersion),
    MinInclusive(PackageVersion),
    MinExclusive(PackageVersion),
    MaxInclusive(PackageVersion),
    MaxExclusive(PackageVersion),
    Range {
        lo: Bound,
        hi: Bound,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    Inclusive(PackageVersion),
    Exclusive(PackageVersion),
    Unbounded,
}

impl VersionRange {
    pub fn contains(&self, version: &PackageVersion) -> bool {
        match self {
            VersionRange::Exact(v) => version == v,
            VersionRange::MinInclusive(v) => version >= v,
            VersionRange::MinExclusive(v) => version > v,
            VersionRange::MaxInclusive(v) => version <= v,
            VersionRange::MaxExclusive(v) => version < v,
            VersionRange::Range { lo, hi } => bound_ge_lo(lo, version) && bound_le_hi(hi, version),
        }
    }

    /// Smallest candidate `>=` the lower bound that satisfies the range.
    /// `candidates` need not be sorted.
    pub fn best_match<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a PackageVersion>,
    ) -> Option<&'a PackageVersion> {
        candidates
            .into_iter()
            .filter(|c| self.contains(c))
            .min()
    }

    /// The closest candidate to this range, used by the `package-version-
    /// not-found` / `only-prerelease-available` diagnostics (spec §7) even
    /// when nothing actually satisfies the range: if a candidate satisfies
    /// it, that's the (lowest admissible) answer; otherwise the candidate
    /// closest to the unmet bound.
    pub fn nearest<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a PackageVersion>,
    ) -> Option<&'a PackageVersion> {
        let candidates: Vec<&'a PackageVersion> = candidates.into_iter().collect();
        if let Some(hit) = self.best_match(candidates.iter().copied()) {
            return Some(hit);
        }
        let lo = self.lower_bound_version();
        let hi = self.upper_bound_version();
        if let Some(lo) = lo {
            if let Some(below) = candidates.iter().filter(|c| **c < lo).max().copied() {
                return Some(below);
            }
        }
        if let Some(hi) = hi {
            if let Some(above) = candidates.iter().filter(|c| **c > hi).min().copied() {
                return Some(above);
            }
        }
        candidates.into_iter().max()
    }

    fn lower_bound_version(&self) -> Option<&PackageVersion> {
        match self {
            VersionRange::Exact(v) | VersionRange::MinInclusive(v) | VersionRange::MinExclusive(v) => Some(v),
            VersionRange::MaxInclusive(_) | VersionRange::MaxExclusive(_) => None,
            VersionRange::Range { lo, .. } => match lo {
                Bound::Inclusive(v) | Bound::Exclusive(v) => Some(v),
                Bound::Unbounded => None,
            },
        }
    }

    fn upper_bound_version(&self) -> Option<&PackageVersion> {
        match self {
            VersionRange::Exact(v) | VersionRange::MaxInclusive(v) | VersionRange::MaxExclusive(v) => Some(v),
            VersionRange::MinInclusive(_) | VersionRange::MinExclusive(_) => None,
            VersionRange::Range { hi, .. } => match hi {
                Bound::Inclusive(v) | Bound::Exclusive(v) => Some(v),
                Bound::Unbounded => None,
            },
        }
    }

    /// Whether the range's own bound versions request a pre-release
    /// (distinguishes an intentional pre-release request from one that
    /// merely happens to be satisfiable only by pre-release candidates).
    pub fn requests_prerelease(&self) -> bool {
        self.lower_bound_version().map(|v| v.is_pre_release()).unwrap_or(false)
            || self.upper_bound_version().map(|v| v.is_pre_release()).unwrap_or(false)
    }

    /// Human-readable constraint rendering per spec §7's range -> display map.
    pub fn display_constraint(&self) -> String {
        match self {
            VersionRange::Exact(v) => format!("= {v}"),
            VersionRange::MinInclusive(v) => format!(">= {v}"),
            VersionRange::MinExclusive(v) => format!("> {v}"),
            VersionRange::MaxInclusive(v) => format!("<= {v}"),
            VersionRange::MaxExclusive(v) => format!("< {v}"),
            VersionRange::Range { lo, hi } => {
                let lo_s = match lo {
                    Bound::Inclusive(v) => Some(format!(">= {v}")),
                    Bound::Exclusive(v) => Some(format!("> {v}")),
                    Bound::Unbounded => None,
                };
                let hi_s = match hi {
                    Bound::Inclusive(v) => Some(format!("<= {v}")),
                    Bound::Exclusive(v) => Some(format!("< {v}")),
                    Bound::Unbounded => None,
                };
                match (lo_s, hi_s) {
                    (Some(a), Some(b)) => format!("{a} && {b}"),
                    (Some(a), None) => a,
                    (None, Some(b)) => b,
                    (None, None) => "(any version)".to_string(),
                }
            }
        }
    }

    fn as_bounds(&self) -> (Bound, Bound) {
        match self {
            VersionRange::Exact(v) => (Bound::Inclusive(v.clone()), Bound::Inclusive(v.clone())),
            VersionRange::MinInclusive(v) => (Bound::Inclusive(v.clone()), Bound::Unbounded),
            VersionRange::MinExclusive(v) => (Bound::Exclusive(v.clone()), Bound::Unbounded),
            VersionRange::MaxInclusive(v) => (Bound::Unbounded, Bound::Inclusive(v.clone())),
            VersionRange::MaxExclusive(v) => (Bound::Unbounded, Bound::Exclusive(v.clone())),
            VersionRange::Range { lo, hi } => (lo.clone(), hi.clone()),
        }
    }

    fn from_bounds(lo: Bound, hi: Bound) -> Self {
        match (&lo, &hi) {
            (Bound::Unbounded, Bound::Unbounded) => VersionRange::MinInclusive(PackageVersion::new(0, 0, 0)),
            (Bound::Inclusive(v), Bound::Unbounded) => VersionRange::MinInclusive(v.clone()),
            (Bound::Exclusive(v), Bound::Unbounded) => VersionRange::MinExclusive(v.clone()),
            (Bound::Unbounded, Bound::Inclusive(v)) => VersionRange::MaxInclusive(v.clone()),
            (Bound::Unbounded, Bound::Exclusive(v)) => VersionRange::MaxExclusive(v.clone()),
            (Bound::Inclusive(a), Bound::Inclusive(b)) if a == b => VersionRange::Exact(a.clone()),
            _ => VersionRange::Range { lo, hi },
        }
    }

    /// Narrows `self` by `other`'s bounds, used by the walker's conflict
    /// resolution (spec §4.8 step 3) to reconcile multiple constraints on
    /// the same id. `None` means the two ranges admit no common version.
    pub fn intersect(&self, other: &VersionRange) -> Option<VersionRange> {
        let (lo1, hi1) = self.as_bounds();
        let (lo2, hi2) = other.as_bounds();
        let lo = tighter_lower(lo1, lo2);
        let hi = tighter_upper(hi1, hi2);
        if !bounds_admit_a_version(&lo, &hi) {
            return None;
        }
        Some(Self::from_bounds(lo, hi))
    }

    /// Normalized form used by the dg-spec serializer (spec §4.2): a bare
    /// `v` becomes `"[v, )"`.
    pub fn normalized_for_dgspec(&self) -> String {
        match self {
            VersionRange::MinInclusive(v) => format!("[{v}, )"),
            other => other.to_range_string(),
        }
    }

    fn to_range_string(&self) -> String {
        match self {
            VersionRange::Exact(v) => format!("[{v}]"),
            VersionRange::MinInclusive(v) => format!("[{v}, )"),
            VersionRange::MinExclusive(v) => format!("({v}, )"),
            VersionRange::MaxInclusive(v) => format!("(, {v}]"),
            VersionRange::MaxExclusive(v) => format!("(, {v})"),
            VersionRange::Range { lo, hi } => {
                let (lo_br, lo_v) = match lo {
                    Bound::Inclusive(v) => ('[', v.to_string()),
                    Bound::Exclusive(v) => ('(', v.to_string()),
                    Bound::Unbounded => ('(', String::new()),
                };
                let (hi_br, hi_v) = match hi {
                    Bound::Inclusive(v) => (']', v.to_string()),
                    Bound::Exclusive(v) => (')', v.to_string()),
                    Bound::Unbounded => (')', String::new()),
                };
                format!("{lo_br}{lo_v}, {hi_v}{hi_br}")
            }
        }
    }
}

fn tighter_lower(a: Bound, b: Bound) -> Bound {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other,
        (a, b) => {
            let (va, vb) = (bound_version(&a), bound_version(&b));
            match va.cmp(vb) {
                std::cmp::Ordering::Greater => a,
                std::cmp::Ordering::Less => b,
                // Equal version: exclusive is the stricter lower bound.
                std::cmp::Ordering::Equal => {
                    if matches!(a, Bound::Exclusive(_)) {
                        a
                    } else {
                        b
                    }
                }
            }
        }
    }
}

fn tighter_upper(a: Bound, b: Bound) -> Bound {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other,
        (a, b) => {
            let (va, vb) = (bound_version(&a), bound_version(&b));
            match va.cmp(vb) {
                std::cmp::Ordering::Less => a,
                std::cmp::Ordering::Greater => b,
                std::cmp::Ordering::Equal => {
                    if matches!(a, Bound::Exclusive(_)) {
                        a
                    } else {
                        b
                    }
                }
            }
        }
    }
}

fn bound_version(b: &Bound) -> &PackageVersion {
    match b {
        Bound::Inclusive(v) | Bound::Exclusive(v) => v,
        Bound::Unbounded => unreachable!("tighter_lower/tighter_upper only compare two bound versions"),
    }
}

fn bounds_admit_a_version(lo: &Bound, hi: &Bound) -> bool {
    let (lo_v, hi_v) = match (lo, hi) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => return true,
        (Bound::Inclusive(a) | Bound::Exclusive(a), Bound::Inclusive(b) | Bound::Exclusive(b)) => (a, b),
    };
    match lo_v.cmp(hi_v) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => matches!(lo, Bound::Inclusive(_)) && matches!(hi, Bound::Inclusive(_)),
    }
}

fn bound_ge_lo(lo: &Bound, version: &PackageVersion) -> bool {
    match lo {
        Bound::Inclusive(v) => version >= v,
        Bound::Exclusive(v) => version > v,
        Bound::Unbounded => true,
    }
}

fn bound_le_hi(hi: &Bound, version: &PackageVersion) -> bool {
    match hi {
        Bound::Inclusive(v) => version <= v,
        Bound::Exclusive(v) => version < v,
        Bound::Unbounded => true,
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_range_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRangeError(pub String);

impl fmt::Display for ParseRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid version range: {}", self.0)
    }
}
impl std::error::Error for ParseRangeError {}

impl FromStr for VersionRange {
    type Err = ParseRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseRangeError("empty range".to_string()));
        }
        let err = |msg: &str| ParseRangeError(format!("{msg} in '{s}'"));

        let first = s.as_bytes()[0];
        let last = s.as_bytes()[s.len() - 1];
        if first != b'[' && first != b'(' {
            // Bare version: equivalent to [v, )
            let v = s.parse::<PackageVersion>().map_err(|e| err(&e.to_string()))?;
            return Ok(VersionRange::MinInclusive(v));
        }
        if !(last == b']' || last == b')') {
            return Err(err("missing closing bracket"));
        }
        let lo_inclusive = first == b'[';
        let hi_inclusive = last == b']';
        let inner = &s[1..s.len() - 1];

        if !inner.contains(',') {
            // Exact version: [v]
            let v = inner
                .trim()
                .parse::<PackageVersion>()
                .map_err(|e| err(&e.to_string()))?;
            return Ok(VersionRange::Exact(v));
        }

        let (lo_s, hi_s) = inner
            .split_once(',')
            .ok_or_else(|| err("expected a single comma"))?;
        let lo_s = lo_s.trim();
        let hi_s = hi_s.trim();

        let lo = if lo_s.is_empty() {
            Bound::Unbounded
        } else {
            let v = lo_s.parse::<PackageVersion>().map_err(|e| err(&e.to_string()))?;
            if lo_inclusive {
                Bound::Inclusive(v)
            } else {
                Bound::Exclusive(v)
            }
        };
        let hi = if hi_s.is_empty() {
            Bound::Unbounded
        } else {
            let v = hi_s.parse::<PackageVersion>().map_err(|e| err(&e.to_string()))?;
            if hi_inclusive {
                Bound::Inclusive(v)
            } else {
                Bound::Exclusive(v)
            }
        };

        match (&lo, &hi) {
            (Bound::Unbounded, Bound::Unbounded) => Ok(VersionRange::MinInclusive(
                PackageVersion::new(0, 0, 0),
            )),
            (Bound::Inclusive(v), Bound::Unbounded) => Ok(VersionRange::MinInclusive(v.clone())),
            (Bound::Exclusive(v), Bound::Unbounded) => Ok(VersionRange::MinExclusive(v.clone())),
            (Bound::Unbounded, Bound::Inclusive(v)) => Ok(VersionRange::MaxInclusive(v.clone())),
            (Bound::Unbounded, Bound::Exclusive(v)) => Ok(VersionRange::MaxExclusive(v.clone())),
            _ => Ok(VersionRange::Range { lo, hi }),
        }
    }
}
