// src/sack/package.rs

//! Package metadata as seen by the resolver

use crate::version::{Evr, Reldep};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::SYSTEM_REPO_ID;

/// Index of a package inside its `PackageSack`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId(pub usize);

/// One package build, installed or available
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub id: PackageId,
    pub name: String,
    pub evr: Evr,
    pub arch: String,
    pub repo_id: String,
    pub provides: Vec<Reldep>,
    pub requires: Vec<Reldep>,
    pub recommends: Vec<Reldep>,
    pub conflicts: Vec<Reldep>,
    pub obsoletes: Vec<Reldep>,
}

impl Package {
    /// `name-[epoch:]version-release.arch`
    pub fn nevra(&self) -> String {
        format!("{}-{}.{}", self.name, self.evr, self.arch)
    }

    /// Full NEVRA with an explicit epoch, as stored in replay files
    pub fn full_nevra(&self) -> String {
        format!(
            "{}-{}:{}-{}.{}",
            self.name,
            self.evr.epoch,
            self.evr.version,
            self.evr.release.as_deref().unwrap_or(""),
            self.arch
        )
    }

    /// `name.arch`, the key of the reason store
    pub fn na(&self) -> String {
        format!("{}.{}", self.name, self.arch)
    }

    pub fn is_installed(&self) -> bool {
        self.repo_id == SYSTEM_REPO_ID
    }

    pub fn is_source(&self) -> bool {
        self.arch == "src" || self.arch == "nosrc"
    }

    /// The implicit `name = evr` capability every package provides
    pub fn self_provide(&self) -> Reldep {
        Reldep::exact(self.name.clone(), self.evr.clone())
    }

    /// Whether this package satisfies `dep`
    pub fn provides_dep(&self, dep: &Reldep) -> bool {
        dep.matches(&self.self_provide()) || self.provides.iter().any(|p| dep.matches(p))
    }

    /// Whether the name or one of the provides is listed in `installonly`
    pub fn is_installonly(&self, installonly: &[String]) -> bool {
        installonly
            .iter()
            .any(|entry| *entry == self.name || self.provides.iter().any(|p| p.name == *entry))
    }

    /// Whether this package's name and version match the obsoletes `dep`
    pub fn matched_by_obsolete(&self, dep: &Reldep) -> bool {
        dep.matches(&self.self_provide())
    }

    /// Deterministic ordering key: name, arch, then newest version first
    pub fn sort_key(&self) -> (&str, &str, std::cmp::Reverse<&Evr>, &str) {
        (
            &self.name,
            &self.arch,
            std::cmp::Reverse(&self.evr),
            &self.repo_id,
        )
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nevra())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(name: &str, evr: &str) -> Package {
        Package {
            id: PackageId(0),
            name: name.to_string(),
            evr: Evr::parse(evr).unwrap(),
            arch: "x86_64".to_string(),
            repo_id: "fedora".to_string(),
            provides: vec![Reldep::parse("libfoo.so.1").unwrap()],
            requires: Vec::new(),
            recommends: Vec::new(),
            conflicts: Vec::new(),
            obsoletes: Vec::new(),
        }
    }

    #[test]
    fn test_nevra_strings() {
        let p = pkg("foo", "2:1.0-1");
        assert_eq!(p.nevra(), "foo-2:1.0-1.x86_64");
        assert_eq!(p.full_nevra(), "foo-2:1.0-1.x86_64");
        assert_eq!(pkg("foo", "1.0-1").full_nevra(), "foo-0:1.0-1.x86_64");
        assert_eq!(p.na(), "foo.x86_64");
        assert!(!p.is_installed());
    }

    #[test]
    fn test_provides_dep_includes_self_provide() {
        let p = pkg("foo", "1.0-1");
        assert!(p.provides_dep(&Reldep::parse("foo >= 1.0").unwrap()));
        assert!(!p.provides_dep(&Reldep::parse("foo > 1.0-1").unwrap()));
        assert!(p.provides_dep(&Reldep::parse("libfoo.so.1").unwrap()));
        assert!(!p.provides_dep(&Reldep::parse("bar").unwrap()));
    }

    #[test]
    fn test_installonly_by_name_or_provide() {
        let p = pkg("kernel-core", "6.1-1");
        assert!(p.is_installonly(&["kernel-core".to_string()]));
        assert!(p.is_installonly(&["libfoo.so.1".to_string()]));
        assert!(!p.is_installonly(&["kernel".to_string()]));
    }
}
