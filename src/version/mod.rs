// src/version/mod.rs

//! Version handling and dependency range matching
//!
//! This module provides RPM epoch:version-release parsing with the same
//! ordering rules rpm uses (`rpmvercmp`), relational dependencies
//! (`Reldep`) such as `foo >= 1.2`, and NEVRA parsing in [`nevra`].

pub mod nevra;

pub use nevra::{Nevra, NevraForm};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A parsed RPM version with epoch, version, and release components
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Evr {
    pub epoch: u64,
    pub version: String,
    pub release: Option<String>,
}

impl Evr {
    /// Parse an RPM version string
    ///
    /// Format: [epoch:]version[-release]
    /// Examples:
    /// - "1.2.3" → epoch=0, version="1.2.3", release=None
    /// - "2:1.2.3" → epoch=2, version="1.2.3", release=None
    /// - "1.2.3-4.el8" → epoch=0, version="1.2.3", release=Some("4.el8")
    pub fn parse(s: &str) -> Result<Self> {
        let (epoch_str, rest) = match s.split_once(':') {
            Some((e, r)) => (e, r),
            None => ("0", s),
        };

        let epoch = if epoch_str.is_empty() {
            0
        } else {
            epoch_str.parse::<u64>().map_err(|e| {
                Error::ParseError(format!("Invalid epoch in version '{}': {}", s, e))
            })?
        };

        // The release is everything after the last dash
        let (version, release) = match rest.rsplit_once('-') {
            Some((v, r)) => (v.to_string(), Some(r.to_string())),
            None => (rest.to_string(), None),
        };

        if version.is_empty() || release.as_deref() == Some("") {
            return Err(Error::ParseError(format!(
                "Empty version component in '{}'",
                s
            )));
        }

        Ok(Self {
            epoch,
            version,
            release,
        })
    }

    /// Compare for dependency matching: a missing release on either side
    /// matches any release
    pub fn compare_for_dep(&self, other: &Evr) -> Ordering {
        match self.epoch.cmp(&other.epoch) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match rpmvercmp(&self.version, &other.version) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match (&self.release, &other.release) {
            (Some(a), Some(b)) => rpmvercmp(a, b),
            _ => Ordering::Equal,
        }
    }
}

impl fmt::Display for Evr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

impl Ord for Evr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| rpmvercmp(&self.version, &other.version))
            .then_with(|| {
                rpmvercmp(
                    self.release.as_deref().unwrap_or(""),
                    other.release.as_deref().unwrap_or(""),
                )
            })
    }
}

impl PartialOrd for Evr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two version (or release) strings segment by segment
///
/// Numeric segments compare numerically, alphabetic segments lexically, a
/// numeric segment is newer than an alphabetic one. `~` sorts before
/// anything (pre-releases), `^` sorts after the base version but before
/// any further segment (snapshots).
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let one = a.as_bytes();
    let two = b.as_bytes();
    let at = |s: &[u8], i: usize| -> u8 { s.get(i).copied().unwrap_or(0) };
    let (mut i, mut j) = (0usize, 0usize);

    while i < one.len() || j < two.len() {
        while i < one.len() && !one[i].is_ascii_alphanumeric() && one[i] != b'~' && one[i] != b'^'
        {
            i += 1;
        }
        while j < two.len() && !two[j].is_ascii_alphanumeric() && two[j] != b'~' && two[j] != b'^'
        {
            j += 1;
        }

        if at(one, i) == b'~' || at(two, j) == b'~' {
            if at(one, i) != b'~' {
                return Ordering::Greater;
            }
            if at(two, j) != b'~' {
                return Ordering::Less;
            }
            i += 1;
            j += 1;
            continue;
        }

        if at(one, i) == b'^' || at(two, j) == b'^' {
            if i >= one.len() {
                return Ordering::Less;
            }
            if j >= two.len() {
                return Ordering::Greater;
            }
            if one[i] != b'^' {
                return Ordering::Greater;
            }
            if two[j] != b'^' {
                return Ordering::Less;
            }
            i += 1;
            j += 1;
            continue;
        }

        if i >= one.len() || j >= two.len() {
            break;
        }

        let (start1, start2) = (i, j);
        let is_num = one[i].is_ascii_digit();
        if is_num {
            while i < one.len() && one[i].is_ascii_digit() {
                i += 1;
            }
            while j < two.len() && two[j].is_ascii_digit() {
                j += 1;
            }
        } else {
            while i < one.len() && one[i].is_ascii_alphabetic() {
                i += 1;
            }
            while j < two.len() && two[j].is_ascii_alphabetic() {
                j += 1;
            }
        }

        if start2 == j {
            // Segment types differ: numeric beats alphabetic
            return if is_num {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let mut seg1 = &one[start1..i];
        let mut seg2 = &two[start2..j];
        if is_num {
            while seg1.len() > 1 && seg1[0] == b'0' {
                seg1 = &seg1[1..];
            }
            while seg2.len() > 1 && seg2[0] == b'0' {
                seg2 = &seg2[1..];
            }
            match seg1.len().cmp(&seg2.len()) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        match seg1.cmp(seg2) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }

    match (i >= one.len(), j >= two.len()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        _ => Ordering::Greater,
    }
}

/// Comparison operator of a relational dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl CmpOp {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "<" => Some(CmpOp::Lt),
            "<=" | "=<" => Some(CmpOp::Le),
            "=" | "==" => Some(CmpOp::Eq),
            ">=" | "=>" => Some(CmpOp::Ge),
            ">" => Some(CmpOp::Gt),
            _ => None,
        }
    }

    fn has_lt(self) -> bool {
        matches!(self, CmpOp::Lt | CmpOp::Le)
    }

    fn has_eq(self) -> bool {
        matches!(self, CmpOp::Le | CmpOp::Eq | CmpOp::Ge)
    }

    fn has_gt(self) -> bool {
        matches!(self, CmpOp::Gt | CmpOp::Ge)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Eq => "=",
            CmpOp::Ge => ">=",
            CmpOp::Gt => ">",
        }
    }
}

/// A relational dependency: a capability name with an optional version range
///
/// Used for provides, requires, recommends, conflicts and obsoletes alike.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reldep {
    pub name: String,
    pub constraint: Option<(CmpOp, Evr)>,
}

impl Reldep {
    /// Capability without a version range
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: None,
        }
    }

    /// Capability pinned to one EVR (the implicit self-provide of a package)
    pub fn exact(name: impl Into<String>, evr: Evr) -> Self {
        Self {
            name: name.into(),
            constraint: Some((CmpOp::Eq, evr)),
        }
    }

    /// Parse a dependency string
    ///
    /// Examples:
    /// - "libfoo" → any version
    /// - "libfoo >= 1.2" → GreaterOrEqual(1.2)
    /// - "libfoo=1.2-3" → Eq(1.2-3)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::ParseError("empty dependency".to_string()));
        }

        let op_start = s.find(['<', '>', '=']);
        let Some(op_start) = op_start else {
            if s.contains(char::is_whitespace) {
                return Err(Error::ParseError(format!("invalid dependency '{}'", s)));
            }
            return Ok(Self::unversioned(s));
        };

        let name = s[..op_start].trim();
        let rest = &s[op_start..];
        let op_len = rest
            .find(|c: char| !matches!(c, '<' | '>' | '='))
            .unwrap_or(rest.len());
        let op = CmpOp::parse(&rest[..op_len])
            .ok_or_else(|| Error::ParseError(format!("invalid operator in '{}'", s)))?;
        let evr = rest[op_len..].trim();

        if name.is_empty() || evr.is_empty() {
            return Err(Error::ParseError(format!("invalid dependency '{}'", s)));
        }

        Ok(Self {
            name: name.to_string(),
            constraint: Some((op, Evr::parse(evr)?)),
        })
    }

    /// Whether `provide` satisfies this dependency
    ///
    /// Names must be equal; unversioned sides match everything, versioned
    /// sides must have overlapping ranges.
    pub fn matches(&self, provide: &Reldep) -> bool {
        if self.name != provide.name {
            return false;
        }
        let (Some((req_op, req_evr)), Some((prov_op, prov_evr))) =
            (&self.constraint, &provide.constraint)
        else {
            return true;
        };

        match prov_evr.compare_for_dep(req_evr) {
            Ordering::Less => prov_op.has_gt() || req_op.has_lt(),
            Ordering::Greater => prov_op.has_lt() || req_op.has_gt(),
            Ordering::Equal => {
                (prov_op.has_eq() && req_op.has_eq())
                    || (prov_op.has_lt() && req_op.has_lt())
                    || (prov_op.has_gt() && req_op.has_gt())
            }
        }
    }
}

impl fmt::Display for Reldep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some((op, evr)) => write!(f, "{} {} {}", self.name, op.as_str(), evr),
            None => write!(f, "{}", self.name),
        }
    }
}

impl Serialize for Reldep {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Reldep {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Reldep::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evr_parse_simple() {
        let v = Evr::parse("1.2.3").unwrap();
        assert_eq!(v.epoch, 0);
        assert_eq!(v.version, "1.2.3");
        assert_eq!(v.release, None);
    }

    #[test]
    fn test_evr_parse_full() {
        let v = Evr::parse("1:2.3.4-5.el8").unwrap();
        assert_eq!(v.epoch, 1);
        assert_eq!(v.version, "2.3.4");
        assert_eq!(v.release, Some("5.el8".to_string()));
    }

    #[test]
    fn test_evr_parse_rejects_garbage() {
        assert!(Evr::parse("x:1.0").is_err());
        assert!(Evr::parse("").is_err());
        assert!(Evr::parse("1.0-").is_err());
    }

    #[test]
    fn test_evr_display_roundtrip() {
        assert_eq!(Evr::parse("1.2.3").unwrap().to_string(), "1.2.3");
        assert_eq!(Evr::parse("2:1.2.3-4.el8").unwrap().to_string(), "2:1.2.3-4.el8");
        assert_eq!(Evr::parse("0:1.0-1").unwrap().to_string(), "1.0-1");
    }

    #[test]
    fn test_rpmvercmp_numeric_segments() {
        assert_eq!(rpmvercmp("1.10", "1.9"), Ordering::Greater);
        assert_eq!(rpmvercmp("1.010", "1.10"), Ordering::Equal);
        assert_eq!(rpmvercmp("2.0", "2.0.1"), Ordering::Less);
    }

    #[test]
    fn test_rpmvercmp_alpha_vs_numeric() {
        assert_eq!(rpmvercmp("1.0a", "1.0"), Ordering::Greater);
        assert_eq!(rpmvercmp("1.a", "1.1"), Ordering::Less);
        assert_eq!(rpmvercmp("abc", "abd"), Ordering::Less);
    }

    #[test]
    fn test_rpmvercmp_tilde_and_caret() {
        assert_eq!(rpmvercmp("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(rpmvercmp("1.0~rc1", "1.0~rc2"), Ordering::Less);
        assert_eq!(rpmvercmp("1.0^git1", "1.0"), Ordering::Greater);
        assert_eq!(rpmvercmp("1.0^git1", "1.0.1"), Ordering::Less);
    }

    #[test]
    fn test_evr_ordering_epoch_wins() {
        let v1 = Evr::parse("1:1.0.0").unwrap();
        let v2 = Evr::parse("0:2.0.0").unwrap();
        assert!(v1 > v2);
    }

    #[test]
    fn test_evr_ordering_release() {
        let v1 = Evr::parse("1.2.3-1").unwrap();
        let v2 = Evr::parse("1.2.3-2").unwrap();
        assert!(v1 < v2);
    }

    #[test]
    fn test_reldep_parse() {
        let dep = Reldep::parse("libfoo >= 1.2").unwrap();
        assert_eq!(dep.name, "libfoo");
        assert_eq!(dep.constraint.as_ref().unwrap().0, CmpOp::Ge);

        let compact = Reldep::parse("libfoo>=1.2").unwrap();
        assert_eq!(dep, compact);

        let bare = Reldep::parse("libfoo").unwrap();
        assert!(bare.constraint.is_none());

        assert!(Reldep::parse("libfoo >=").is_err());
        assert!(Reldep::parse("lib foo").is_err());
    }

    #[test]
    fn test_reldep_matches_ranges() {
        let provide = Reldep::exact("libfoo", Evr::parse("1.5-1").unwrap());

        assert!(Reldep::parse("libfoo").unwrap().matches(&provide));
        assert!(Reldep::parse("libfoo >= 1.2").unwrap().matches(&provide));
        assert!(Reldep::parse("libfoo = 1.5").unwrap().matches(&provide));
        assert!(!Reldep::parse("libfoo > 1.5").unwrap().matches(&provide));
        assert!(!Reldep::parse("libfoo < 1.5").unwrap().matches(&provide));
        assert!(!Reldep::parse("libbar").unwrap().matches(&provide));
    }

    #[test]
    fn test_reldep_unversioned_provide_matches_everything() {
        let provide = Reldep::unversioned("webserver");
        assert!(Reldep::parse("webserver >= 2").unwrap().matches(&provide));
    }

    #[test]
    fn test_reldep_display() {
        assert_eq!(Reldep::parse("a>=1.0").unwrap().to_string(), "a >= 1.0");
        assert_eq!(Reldep::parse("a").unwrap().to_string(), "a");
    }
}
