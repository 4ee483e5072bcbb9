// src/solver/pool.rs

//! Frozen package universe handed to the oracle

use crate::problems::{ProblemRule, ProblemRules};
use crate::sack::{Package, PackageId, PackageSack};
use crate::version::Reldep;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

/// Packages taking part in one solve
///
/// Installed packages are always considered; available ones only when
/// visible (not excluded, not modular-filtered), not source packages,
/// and of a compatible architecture.
///
/// Installonly packages occupy one slot per version, so several versions
/// of the same name.arch can be installed together.
#[derive(Debug)]
pub struct Pool<'a> {
    sack: &'a PackageSack,
    considered: BTreeSet<PackageId>,
    installed: BTreeSet<PackageId>,
    installonly: BTreeSet<PackageId>,
    /// Capability name -> considered packages providing something of that name
    provides: BTreeMap<&'a str, Vec<PackageId>>,
    arches: Vec<String>,
}

impl<'a> Pool<'a> {
    /// Build the pool; `arches` is ordered best first
    pub fn new(sack: &'a PackageSack, arches: &[&str]) -> Self {
        let mut considered = BTreeSet::new();
        let mut installed = BTreeSet::new();
        for pkg in sack.iter() {
            if pkg.is_installed() {
                installed.insert(pkg.id);
                considered.insert(pkg.id);
            } else if sack.is_visible(pkg.id)
                && !pkg.is_source()
                && arches.contains(&pkg.arch.as_str())
            {
                considered.insert(pkg.id);
            }
        }

        let mut provides: BTreeMap<&'a str, Vec<PackageId>> = BTreeMap::new();
        for id in &considered {
            let pkg = sack.package(*id);
            provides.entry(pkg.name.as_str()).or_default().push(*id);
            for prov in &pkg.provides {
                let ids = provides.entry(prov.name.as_str()).or_default();
                if ids.last() != Some(id) {
                    ids.push(*id);
                }
            }
        }

        Self {
            sack,
            considered,
            installed,
            installonly: BTreeSet::new(),
            provides,
            arches: arches.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Mark considered packages whose name or provides appear in `names`
    /// as installonly
    pub fn with_installonly(mut self, names: &[String]) -> Self {
        if !names.is_empty() {
            self.installonly = self
                .considered
                .iter()
                .copied()
                .filter(|id| self.sack.package(*id).is_installonly(names))
                .collect();
        }
        self
    }

    pub fn is_installonly(&self, id: PackageId) -> bool {
        self.installonly.contains(&id)
    }

    /// Whether `a` and `b` compete for one installed slot
    pub fn same_slot(&self, a: PackageId, b: PackageId) -> bool {
        let (pa, pb) = (self.package(a), self.package(b));
        if pa.name != pb.name || !same_slot(&pa.arch, &pb.arch) {
            return false;
        }
        !(self.is_installonly(a) || self.is_installonly(b)) || pa.evr == pb.evr
    }

    /// The installed package with the same NEVRA as `id`, if any
    pub fn installed_twin(&self, id: PackageId) -> Option<PackageId> {
        if self.installed.contains(&id) {
            return Some(id);
        }
        let pkg = self.package(id);
        self.installed.iter().copied().find(|other| {
            let o = self.package(*other);
            o.name == pkg.name && o.arch == pkg.arch && o.evr == pkg.evr
        })
    }

    pub fn sack(&self) -> &'a PackageSack {
        self.sack
    }

    pub fn package(&self, id: PackageId) -> &'a Package {
        self.sack.package(id)
    }

    /// Packages installed before the solve
    pub fn installed(&self) -> &BTreeSet<PackageId> {
        &self.installed
    }

    pub fn is_considered(&self, id: PackageId) -> bool {
        self.considered.contains(&id)
    }

    pub fn considered(&self) -> impl Iterator<Item = PackageId> + '_ {
        self.considered.iter().copied()
    }

    /// Considered packages providing `dep`, in id order
    pub fn whatprovides(&self, dep: &Reldep) -> Vec<PackageId> {
        self.provides
            .get(dep.name.as_str())
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|id| self.package(*id).provides_dep(dep))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Considered packages whose own name and version match the obsoletes `dep`
    pub fn obsoleted_by_dep(&self, dep: &Reldep) -> Vec<PackageId> {
        self.provides
            .get(dep.name.as_str())
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|id| self.package(*id).matched_by_obsolete(dep))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Available packages of another name that obsolete `id`
    pub fn obsoleters(&self, id: PackageId) -> Vec<PackageId> {
        let target = self.package(id);
        self.considered
            .iter()
            .copied()
            .filter(|other| !self.installed.contains(other))
            .filter(|other| {
                let pkg = self.package(*other);
                pkg.name != target.name && pkg.obsoletes.iter().any(|dep| target.matched_by_obsolete(dep))
            })
            .collect()
    }

    /// Available packages that can take the slot of `id`: same name,
    /// compatible architecture. Newest first.
    pub fn slot_candidates(&self, id: PackageId) -> Vec<PackageId> {
        let target = self.package(id);
        let mut out: Vec<PackageId> = self
            .provides
            .get(target.name.as_str())
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|other| *other != id && !self.installed.contains(other))
                    .filter(|other| {
                        let pkg = self.package(*other);
                        pkg.name == target.name && same_slot(&pkg.arch, &target.arch)
                    })
                    .collect()
            })
            .unwrap_or_default();
        self.sort_candidates(&mut out);
        out
    }

    /// Rank of an architecture, lower is better
    pub fn arch_rank(&self, arch: &str) -> usize {
        self.arches
            .iter()
            .position(|a| a == arch)
            .unwrap_or(self.arches.len())
    }

    /// Order packages by name, newest first, then best architecture
    pub fn sort_candidates(&self, ids: &mut [PackageId]) {
        ids.sort_by_key(|id| {
            let pkg = self.package(*id);
            (
                pkg.name.as_str(),
                Reverse(&pkg.evr),
                self.arch_rank(&pkg.arch),
                pkg.repo_id.as_str(),
                *id,
            )
        });
    }

    /// Why packages that would provide `dep` are not in the pool
    pub fn not_installable_rules(&self, dep: &Reldep) -> Vec<ProblemRule> {
        self.sack
            .iter()
            .filter(|pkg| !self.considered.contains(&pkg.id) && !pkg.is_source())
            .filter(|pkg| pkg.provides_dep(dep))
            .map(|pkg| {
                let kind = if self.sack.is_modular_excluded(pkg.id) {
                    ProblemRules::RulePkgNotInstallable2
                } else if self.sack.is_excluded(pkg.id) {
                    ProblemRules::RulePkgNotInstallable4
                } else {
                    ProblemRules::RulePkgNotInstallable3
                };
                (kind, vec![pkg.nevra()])
            })
            .collect()
    }
}

/// Whether packages of these architectures compete for one slot
pub(crate) fn same_slot(a: &str, b: &str) -> bool {
    a == b || a == "noarch" || b == "noarch"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sack::Snapshot;

    fn sack() -> PackageSack {
        Snapshot::parse(
            r#"
            [[installed]]
            name = "lib"
            evr = "1.0-1"
            arch = "x86_64"
            provides = ["libfoo.so.1"]

            [[repo]]
            id = "fedora"

            [[repo.packages]]
            name = "lib"
            evr = "2.0-1"
            arch = "x86_64"
            provides = ["libfoo.so.2"]

            [[repo.packages]]
            name = "lib"
            evr = "2.0-1"
            arch = "aarch64"

            [[repo.packages]]
            name = "lib-ng"
            evr = "1.0-1"
            arch = "x86_64"
            obsoletes = ["lib < 3"]
            "#,
        )
        .unwrap()
        .into_sacks()
        .unwrap()
        .0
    }

    #[test]
    fn test_pool_filters_incompatible_arch() {
        let sack = sack();
        let pool = Pool::new(&sack, &["x86_64", "noarch"]);
        assert!(pool.is_considered(PackageId(0)));
        assert!(pool.is_considered(PackageId(1)));
        assert!(!pool.is_considered(PackageId(2)));
        assert_eq!(pool.installed().len(), 1);
    }

    #[test]
    fn test_whatprovides_and_hidden_rules() {
        let sack = sack();
        let pool = Pool::new(&sack, &["x86_64", "noarch"]);
        let dep = Reldep::parse("lib >= 2").unwrap();
        assert_eq!(pool.whatprovides(&dep), vec![PackageId(1)]);
        let rules = pool.not_installable_rules(&dep);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].0, ProblemRules::RulePkgNotInstallable3);
    }

    #[test]
    fn test_installonly_versions_share_no_slot() {
        let sack = sack();
        let pool = Pool::new(&sack, &["x86_64", "noarch"]);
        assert!(pool.same_slot(PackageId(0), PackageId(1)));
        assert_eq!(pool.installed_twin(PackageId(1)), None);

        let pool = Pool::new(&sack, &["x86_64", "noarch"]).with_installonly(&["lib".to_string()]);
        assert!(pool.is_installonly(PackageId(0)));
        assert!(!pool.is_installonly(PackageId(3)));
        assert!(!pool.same_slot(PackageId(0), PackageId(1)));
        assert!(pool.same_slot(PackageId(0), PackageId(0)));
    }

    #[test]
    fn test_slot_candidates_and_obsoleters() {
        let sack = sack();
        let pool = Pool::new(&sack, &["x86_64", "noarch"]);
        assert_eq!(pool.slot_candidates(PackageId(0)), vec![PackageId(1)]);
        assert_eq!(pool.obsoleters(PackageId(0)), vec![PackageId(3)]);
        assert!(same_slot("noarch", "x86_64"));
        assert!(!same_slot("i686", "x86_64"));
    }
}
