// src/sack/query.rs

//! Filterable package sets and spec resolution

use super::{Package, PackageId, PackageSack};
use crate::version::{Evr, Nevra, Reldep};
use glob::{MatchOptions, Pattern};
use std::collections::{BTreeMap, BTreeSet};

/// How a user spec is matched against packages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveSpecSettings {
    /// Try the NEVRA forms (name, name.arch, full NEVRA, ...)
    pub with_nevra: bool,
    /// Fall back to matching provided capabilities
    pub with_provides: bool,
    /// Case-insensitive name matching
    pub ignore_case: bool,
}

impl Default for ResolveSpecSettings {
    fn default() -> Self {
        Self {
            with_nevra: true,
            with_provides: true,
            ignore_case: false,
        }
    }
}

/// Exact or glob matcher for one NEVRA field
enum FieldMatcher {
    Any,
    Exact(String),
    Glob(Pattern),
}

impl FieldMatcher {
    fn new(field: &str, ignore_case: bool) -> Self {
        if field.is_empty() {
            return FieldMatcher::Any;
        }
        if field.contains(['*', '?', '[']) || ignore_case {
            if let Ok(pattern) = Pattern::new(field) {
                return FieldMatcher::Glob(pattern);
            }
        }
        FieldMatcher::Exact(field.to_string())
    }

    fn matches(&self, value: &str, ignore_case: bool) -> bool {
        match self {
            FieldMatcher::Any => true,
            FieldMatcher::Exact(s) => s == value,
            FieldMatcher::Glob(p) => p.matches_with(
                value,
                MatchOptions {
                    case_sensitive: !ignore_case,
                    require_literal_separator: false,
                    require_literal_leading_dot: false,
                },
            ),
        }
    }
}

/// A set of packages of one sack
#[derive(Debug, Clone)]
pub struct PackageQuery<'a> {
    sack: &'a PackageSack,
    ids: BTreeSet<PackageId>,
}

impl<'a> PackageQuery<'a> {
    pub(super) fn new(sack: &'a PackageSack, ids: impl Iterator<Item = PackageId>) -> Self {
        Self {
            sack,
            ids: ids.collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &BTreeSet<PackageId> {
        &self.ids
    }

    pub fn contains(&self, id: PackageId) -> bool {
        self.ids.contains(&id)
    }

    /// Packages in id order
    pub fn iter(&self) -> impl Iterator<Item = &'a Package> + '_ {
        let sack = self.sack;
        self.ids.iter().map(move |id| sack.package(*id))
    }

    /// Packages ordered by name, arch, newest first
    pub fn sorted(&self) -> Vec<&'a Package> {
        let mut pkgs: Vec<&'a Package> = self.iter().collect();
        pkgs.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        pkgs
    }

    /// Keep packages for which `f` holds
    pub fn retain(mut self, f: impl Fn(&Package) -> bool) -> Self {
        let sack = self.sack;
        self.ids.retain(|id| f(sack.package(*id)));
        self
    }

    pub fn filter_installed(self) -> Self {
        self.retain(|p| p.is_installed())
    }

    pub fn filter_available(self) -> Self {
        self.retain(|p| !p.is_installed())
    }

    pub fn filter_name(self, name: &str) -> Self {
        self.retain(|p| p.name == name)
    }

    pub fn filter_na(self, name: &str, arch: &str) -> Self {
        self.retain(|p| p.name == name && p.arch == arch)
    }

    pub fn filter_arch(self, arches: &[&str]) -> Self {
        self.retain(|p| arches.contains(&p.arch.as_str()))
    }

    pub fn filter_not_source(self) -> Self {
        self.retain(|p| !p.is_source())
    }

    pub fn filter_repo_ids(self, repo_ids: &[String]) -> Self {
        self.retain(|p| repo_ids.iter().any(|r| *r == p.repo_id))
    }

    /// Keep packages whose NEVRA equals one of `nevras` (with or without
    /// an explicit zero epoch)
    pub fn filter_nevra(self, nevras: &BTreeSet<String>) -> Self {
        self.retain(|p| nevras.contains(&p.nevra()) || nevras.contains(&p.full_nevra()))
    }

    pub fn filter_evr(self, evr: &Evr) -> Self {
        self.retain(|p| p.evr == *evr)
    }

    pub fn filter_provides(self, dep: &Reldep) -> Self {
        self.retain(|p| p.provides_dep(dep))
    }

    /// Keep only the newest version of each name.arch
    pub fn filter_latest(self) -> Self {
        let mut best: BTreeMap<(&str, &str), &Evr> = BTreeMap::new();
        for pkg in self.iter() {
            let entry = best
                .entry((pkg.name.as_str(), pkg.arch.as_str()))
                .or_insert(&pkg.evr);
            if pkg.evr > **entry {
                *entry = &pkg.evr;
            }
        }
        let keep: BTreeSet<PackageId> = self
            .iter()
            .filter(|p| best.get(&(p.name.as_str(), p.arch.as_str())) == Some(&&p.evr))
            .map(|p| p.id)
            .collect();
        Self {
            sack: self.sack,
            ids: keep,
        }
    }

    /// Add the packages of `other`
    pub fn union(mut self, other: &PackageQuery<'a>) -> Self {
        self.ids.extend(other.ids.iter().copied());
        self
    }

    /// Match a user spec
    ///
    /// NEVRA forms are tried first in `Nevra::PKG_SPEC_FORMS` order, the
    /// first form that matches anything wins; then provides. Returns the
    /// matched subset and whether it came from provides.
    pub fn resolve_pkg_spec(&self, spec: &str, settings: &ResolveSpecSettings) -> (Self, bool) {
        if settings.with_nevra {
            for form in Nevra::PKG_SPEC_FORMS {
                let Some(nevra) = Nevra::parse(spec, form) else {
                    continue;
                };
                let matched = self.clone().filter_nevra_pattern(&nevra, settings.ignore_case);
                if !matched.is_empty() {
                    return (matched, false);
                }
            }
        }

        if settings.with_provides {
            let matched = if spec.contains(['*', '?', '[']) {
                match Pattern::new(spec) {
                    Ok(pattern) => self
                        .clone()
                        .retain(|p| p.provides.iter().any(|prov| pattern.matches(&prov.name))),
                    Err(_) => self.clone().retain(|_| false),
                }
            } else {
                match Reldep::parse(spec) {
                    Ok(dep) => self.clone().filter_provides(&dep),
                    Err(_) => self.clone().retain(|_| false),
                }
            };
            if !matched.is_empty() {
                return (matched, true);
            }
        }

        (self.clone().retain(|_| false), false)
    }

    fn filter_nevra_pattern(self, nevra: &Nevra, ignore_case: bool) -> Self {
        let name = FieldMatcher::new(&nevra.name, ignore_case);
        let epoch = FieldMatcher::new(&nevra.epoch, false);
        let version = FieldMatcher::new(&nevra.version, false);
        let release = FieldMatcher::new(&nevra.release, false);
        let arch = FieldMatcher::new(&nevra.arch, false);
        self.retain(|p| {
            name.matches(&p.name, ignore_case)
                && epoch.matches(&p.evr.epoch.to_string(), false)
                && version.matches(&p.evr.version, false)
                && release.matches(p.evr.release.as_deref().unwrap_or(""), false)
                && arch.matches(&p.arch, false)
        })
    }
}
