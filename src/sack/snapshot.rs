// src/sack/snapshot.rs

//! Metadata snapshot files
//!
//! Repository metadata download and parsing happen elsewhere; resolution
//! consumes a frozen snapshot of the installed set and the enabled
//! repositories, written as TOML:
//!
//! ```toml
//! [[installed]]
//! name = "glibc"
//! evr = "2.39-5"
//! arch = "x86_64"
//! provides = ["libc.so.6"]
//!
//! [[repo]]
//! id = "fedora"
//!
//! [[repo.packages]]
//! name = "nginx"
//! evr = "1:1.26.1-1"
//! arch = "x86_64"
//! requires = ["libc.so.6", "nginx-filesystem = 1:1.26.1-1"]
//! recommends = ["logrotate"]
//!
//! [[group]]
//! id = "web-server"
//! packages = [{ name = "nginx", type = "mandatory" }]
//!
//! [[module]]
//! name = "nodejs"
//! stream = "20"
//! packages = ["nodejs-20.1-1.x86_64"]
//! ```

use super::{Package, PackageId, PackageSack, SYSTEM_REPO_ID};
use crate::comps::{CompsSack, Environment, Group};
use crate::error::{Error, Result};
use crate::module::{ModuleSack, ModuleStream};
use crate::version::{Evr, Reldep};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// One package entry of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDef {
    pub name: String,
    pub evr: String,
    #[serde(default = "default_arch")]
    pub arch: String,
    #[serde(default)]
    pub provides: Vec<Reldep>,
    #[serde(default)]
    pub requires: Vec<Reldep>,
    #[serde(default)]
    pub recommends: Vec<Reldep>,
    #[serde(default)]
    pub conflicts: Vec<Reldep>,
    #[serde(default)]
    pub obsoletes: Vec<Reldep>,
}

fn default_arch() -> String {
    "noarch".to_string()
}

impl PackageDef {
    fn into_package(self, repo_id: &str) -> Result<Package> {
        if self.name.is_empty() || self.name.contains(char::is_whitespace) {
            return Err(Error::ParseError(format!("invalid package name '{}'", self.name)));
        }
        let evr = Evr::parse(&self.evr)?;
        Ok(Package {
            id: PackageId(0),
            name: self.name,
            evr,
            arch: self.arch,
            repo_id: repo_id.to_string(),
            provides: self.provides,
            requires: self.requires,
            recommends: self.recommends,
            conflicts: self.conflicts,
            obsoletes: self.obsoletes,
        })
    }
}

/// One enabled repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoDef {
    pub id: String,
    #[serde(default)]
    pub packages: Vec<PackageDef>,
}

/// Frozen view of the installed system and the enabled repositories
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub installed: Vec<PackageDef>,
    #[serde(default)]
    pub repo: Vec<RepoDef>,
    #[serde(default)]
    pub group: Vec<Group>,
    #[serde(default)]
    pub environment: Vec<Environment>,
    #[serde(default)]
    pub module: Vec<ModuleStream>,
}

impl Snapshot {
    /// Load a snapshot file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("Failed to read metadata snapshot {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse snapshot TOML
    pub fn parse(content: &str) -> Result<Self> {
        let snapshot: Snapshot = toml::from_str(content)?;
        for repo in &snapshot.repo {
            if repo.id.is_empty() || repo.id == SYSTEM_REPO_ID {
                return Err(Error::ParseError(format!("invalid repository id '{}'", repo.id)));
            }
        }
        Ok(snapshot)
    }

    /// Build the package, comps and module sacks
    ///
    /// Package ids follow file order: installed packages first, then each
    /// repository in turn.
    pub fn into_sacks(self) -> Result<(PackageSack, CompsSack, ModuleSack)> {
        let mut sack = PackageSack::new();
        for def in self.installed {
            sack.add_package(def.into_package(SYSTEM_REPO_ID)?);
        }
        for repo in self.repo {
            for def in repo.packages {
                sack.add_package(def.into_package(&repo.id)?);
            }
        }
        debug!("Loaded {} packages into the sack", sack.len());
        Ok((
            sack,
            CompsSack::new(self.group, self.environment),
            ModuleSack::new(self.module),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snapshot() {
        let snapshot = Snapshot::parse(
            r#"
            [[installed]]
            name = "glibc"
            evr = "2.39-5"
            arch = "x86_64"

            [[repo]]
            id = "fedora"

            [[repo.packages]]
            name = "nginx"
            evr = "1:1.26.1-1"
            arch = "x86_64"
            requires = ["glibc >= 2.38"]

            [[group]]
            id = "web-server"
            packages = [{ name = "nginx", type = "mandatory" }]
            "#,
        )
        .unwrap();
        let (sack, comps, modules) = snapshot.into_sacks().unwrap();
        assert_eq!(sack.len(), 2);
        assert!(sack.package(PackageId(0)).is_installed());
        assert_eq!(sack.package(PackageId(1)).evr.epoch, 1);
        assert!(comps.group("web-server").is_some());
        assert!(modules.is_empty());
        assert_eq!(sack.repo_ids(), vec!["fedora"]);
    }

    #[test]
    fn test_reject_system_repo_id() {
        let err = Snapshot::parse("[[repo]]\nid = \"@System\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn test_reject_bad_dependency() {
        let err = Snapshot::parse(
            "[[installed]]\nname = \"a\"\nevr = \"1-1\"\nrequires = [\"b >=\"]\n",
        );
        assert!(err.is_err());
    }
}
