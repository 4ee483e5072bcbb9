// src/sack/mod.rs

//! Package universe: installed packages plus enabled repositories
//!
//! The sack is the metadata provider the goal resolves specs against. It
//! is frozen before resolution starts; excludes and modular filtering are
//! applied once at base setup and only hide packages, they never delete
//! them (queries can opt back in with `query_ignore_excludes`).

mod package;
mod query;
pub mod snapshot;

pub use package::{Package, PackageId};
pub use query::{PackageQuery, ResolveSpecSettings};
pub use snapshot::{PackageDef, RepoDef, Snapshot};

use crate::error::Result;
use std::collections::BTreeSet;
use tracing::debug;

/// Repository id of the installed-package pseudo repository
pub const SYSTEM_REPO_ID: &str = "@System";

/// All known packages
#[derive(Debug, Clone, Default)]
pub struct PackageSack {
    packages: Vec<Package>,
    /// Hidden by excludepkgs/includepkgs
    excluded: BTreeSet<PackageId>,
    /// Hidden by modular filtering
    modular_excluded: BTreeSet<PackageId>,
}

impl PackageSack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package; its id is assigned here
    pub fn add_package(&mut self, mut package: Package) -> PackageId {
        let id = PackageId(self.packages.len());
        package.id = id;
        self.packages.push(package);
        id
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.0]
    }

    pub fn get(&self, id: PackageId) -> Option<&Package> {
        self.packages.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }

    /// Ids of all installed packages
    pub fn installed_ids(&self) -> BTreeSet<PackageId> {
        self.packages
            .iter()
            .filter(|p| p.is_installed())
            .map(|p| p.id)
            .collect()
    }

    /// Ids of the repositories providing available packages, sorted
    pub fn repo_ids(&self) -> Vec<String> {
        let ids: BTreeSet<&str> = self
            .packages
            .iter()
            .filter(|p| !p.is_installed())
            .map(|p| p.repo_id.as_str())
            .collect();
        ids.into_iter().map(str::to_string).collect()
    }

    /// Hide available packages matching `excludepkgs`, or not matching a
    /// non-empty `includepkgs`
    pub fn apply_excludes(&mut self, excludepkgs: &[String], includepkgs: &[String]) -> Result<()> {
        let excludes = compile_patterns(excludepkgs)?;
        let includes = compile_patterns(includepkgs)?;

        self.excluded.clear();
        for pkg in self.packages.iter().filter(|p| !p.is_installed()) {
            let hit = |patterns: &[glob::Pattern]| {
                patterns
                    .iter()
                    .any(|pat| pat.matches(&pkg.name) || pat.matches(&pkg.nevra()))
            };
            if hit(&excludes) || (!includes.is_empty() && !hit(&includes)) {
                self.excluded.insert(pkg.id);
            }
        }
        debug!("{} packages excluded by configuration", self.excluded.len());
        Ok(())
    }

    /// Hide available packages whose NEVRA is in `hidden_nevras`
    pub fn apply_modular_filter(&mut self, hidden_nevras: &BTreeSet<String>) {
        self.modular_excluded = self
            .packages
            .iter()
            .filter(|p| !p.is_installed() && hidden_nevras.contains(&p.nevra()))
            .map(|p| p.id)
            .collect();
        debug!(
            "{} packages hidden by modular filtering",
            self.modular_excluded.len()
        );
    }

    pub fn is_excluded(&self, id: PackageId) -> bool {
        self.excluded.contains(&id)
    }

    pub fn is_modular_excluded(&self, id: PackageId) -> bool {
        self.modular_excluded.contains(&id)
    }

    /// Whether the package takes part in resolution
    pub fn is_visible(&self, id: PackageId) -> bool {
        !self.is_excluded(id) && !self.is_modular_excluded(id)
    }

    /// Query over visible packages
    pub fn query(&self) -> PackageQuery<'_> {
        PackageQuery::new(self, self.packages.iter().filter(|p| self.is_visible(p.id)).map(|p| p.id))
    }

    /// Query over every package, hidden ones included
    pub fn query_ignore_excludes(&self) -> PackageQuery<'_> {
        PackageQuery::new(self, self.packages.iter().map(|p| p.id))
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| glob::Pattern::new(p).map_err(Into::into))
        .collect()
}
