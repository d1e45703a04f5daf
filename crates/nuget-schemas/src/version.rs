//! `PackageVersion`: SemVer 2 plus the optional fourth-segment revision
//! NuGet-style tooling carries (spec §3). Deliberately not the `semver`
//! crate's `Version` type — that type has no fourth segment and its
//! pre-release ordering does not match NuGet's "pre-release sorts below a
//! release with the same core" rule applied across four numeric segments.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Eq)]
pub struct PackageVersion {
    major: u64,
    minor: u64,
    patch: u64,
    revision: u64,
    pre_release: Option<String>,
}

impl PackageVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        PackageVersion {
            major,
            minor,
            patch,
            revision: 0,
            pre_release: None,
        }
    }

    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    pub fn with_pre_release(mut self, label: impl Into<String>) -> Self {
        self.pre_release = Some(label.into());
        self
    }

    pub fn is_pre_release(&self) -> bool {
        self.pre_release.is_some()
    }

    pub fn core(&self) -> (u64, u64, u64, u64) {
        (self.major, self.minor, self.patch, self.revision)
    }

    /// Normalized NuGet-style string: trailing zero revision is dropped,
    /// pre-release label is appended with `-`.
    pub fn normalized(&self) -> String {
        let mut s = if self.revision == 0 {
            format!("{}.{}.{}", self.major, self.minor, self.patch)
        } else {
            format!(
                "{}.{}.{}.{}",
                self.major, self.minor, self.patch, self.revision
            )
        };
        if let Some(label) = &self.pre_release {
            s.push('-');
            s.push_str(label);
        }
        s
    }
}

impl FromStr for PackageVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseVersionError("empty version string".to_string()));
        }
        let (core_part, pre_release) = match s.split_once('-') {
            Some((core, label)) => (core, Some(label.to_string())),
            None => (s, None),
        };
        let segments: Vec<&str> = core_part.split('.').collect();
        if segments.len() < 2 || segments.len() > 4 {
            return Err(ParseVersionError(format!(
                "expected 2-4 dot-separated segments, got '{s}'"
            )));
        }
        let mut nums = [0u64; 4];
        for (i, seg) in segments.iter().enumerate() {
            nums[i] = seg
                .parse()
                .map_err(|_| ParseVersionError(format!("non-numeric segment '{seg}' in '{s}'")))?;
        }
        Ok(PackageVersion {
            major: nums[0],
            minor: nums[1],
            patch: nums[2],
            revision: nums[3],
            pre_release,
        })
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseVersionError(pub String);

impl fmt::Display for ParseVersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid package version: {}", self.0)
    }
}
impl std::error::Error for ParseVersionError {}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.core()
            .cmp(&other.core())
            .then_with(|| match (&self.pre_release, &other.pre_release) {
                (None, None) => Ordering::Equal,
                // a pre-release sorts below a release with the same core.
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => compare_pre_release(a, b),
            })
    }
}

impl std::hash::Hash for PackageVersion {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.core().hash(state);
        self.pre_release.hash(state);
    }
}

/// Pre-release labels compare dot-segment by dot-segment, numeric segments
/// compared numerically, following SemVer 2 precedence rules.
fn compare_pre_release(a: &str, b: &str) -> Ordering {
    let mut a_parts = a.split('.');
    let mut b_parts = b.split('.');
    loop {
        match (a_parts.next(), b_parts.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(xn), Ok(yn)) => xn.cmp(&yn),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

impl Serialize for PackageVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.normalized())
    }
}

impl<'de> Deserialize<'de> for PackageVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PackageVersion::from_str(&s).map_err(DeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_and_four_segment_versions() {
        assert_eq!(
            "13.0.3".parse::<PackageVersion>().unwrap(),
            PackageVersion::new(13, 0, 3)
        );
        assert_eq!(
            "1.2.3.4".parse::<PackageVersion>().unwrap(),
            PackageVersion::new(1, 2, 3).with_revision(4)
        );
    }

    #[test]
    fn normalizes_by_dropping_zero_revision() {
        let v = PackageVersion::new(1, 0, 0).with_revision(0);
        assert_eq!(v.normalized(), "1.0.0");
        let v2 = PackageVersion::new(1, 0, 0).with_revision(5);
        assert_eq!(v2.normalized(), "1.0.0.5");
    }

    #[test]
    fn pre_release_sorts_below_release_with_same_core() {
        let stable = PackageVersion::new(1, 0, 0);
        let pre = PackageVersion::new(1, 0, 0).with_pre_release("beta");
        assert!(pre < stable);
    }

    #[test]
    fn pre_release_labels_compare_numerically_per_segment() {
        let beta1 = PackageVersion::new(1, 0, 0).with_pre_release("beta.1");
        let beta2 = PackageVersion::new(1, 0, 0).with_pre_release("beta.2");
        let beta10 = PackageVersion::new(1, 0, 0).with_pre_release("beta.10");
        assert!(beta1 < beta2);
        assert!(beta2 < beta10);
    }

    #[test]
    fn ordering_respects_revision_segment() {
        let a = "1.0.0.1".parse::<PackageVersion>().unwrap();
        let b = "1.0.0.2".parse::<PackageVersion>().unwrap();
        assert!(a < b);
    }

    #[test]
    fn serde_round_trips_through_normalized_string() {
        let v = PackageVersion::new(13, 0, 3);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"13.0.3\"");
        let back: PackageVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
