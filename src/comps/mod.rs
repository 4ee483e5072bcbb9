// src/comps/mod.rs

//! Comps groups and environments
//!
//! A group is a curated list of package names, each tagged with a
//! [`PackageType`]; an environment is a list of groups. Group operations
//! pull in the member packages whose type is selected by the job settings.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Set of comps package types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PackageType(u8);

impl PackageType {
    pub const MANDATORY: PackageType = PackageType(1 << 0);
    pub const DEFAULT: PackageType = PackageType(1 << 1);
    pub const CONDITIONAL: PackageType = PackageType(1 << 2);
    pub const OPTIONAL: PackageType = PackageType(1 << 3);

    const NAMES: [(PackageType, &'static str); 4] = [
        (PackageType::MANDATORY, "mandatory"),
        (PackageType::DEFAULT, "default"),
        (PackageType::CONDITIONAL, "conditional"),
        (PackageType::OPTIONAL, "optional"),
    ];

    pub const fn empty() -> Self {
        PackageType(0)
    }

    pub fn union(self, other: PackageType) -> Self {
        PackageType(self.0 | other.0)
    }

    pub fn intersection(self, other: PackageType) -> Self {
        PackageType(self.0 & other.0)
    }

    pub fn contains(self, other: PackageType) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn any(self) -> bool {
        self.0 != 0
    }

    /// Parse one type name
    pub fn from_name(name: &str) -> Result<Self> {
        Self::NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(t, _)| *t)
            .ok_or_else(|| Error::ConfigError(format!("Invalid package type: {}", name)))
    }

    /// Parse a list of type names into one set
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        names.iter().try_fold(PackageType::empty(), |acc, name| {
            Ok(acc | PackageType::from_name(name.as_ref())?)
        })
    }

    /// Names of the contained types, in canonical order
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(t, _)| self.contains(*t))
            .map(|(_, n)| *n)
            .collect()
    }
}

impl BitOr for PackageType {
    type Output = PackageType;
    fn bitor(self, rhs: PackageType) -> PackageType {
        self.union(rhs)
    }
}

impl BitOrAssign for PackageType {
    fn bitor_assign(&mut self, rhs: PackageType) {
        *self = self.union(rhs);
    }
}

impl BitAnd for PackageType {
    type Output = PackageType;
    fn bitand(self, rhs: PackageType) -> PackageType {
        self.intersection(rhs)
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(", "))
    }
}

impl Serialize for PackageType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.names().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PackageType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        PackageType::from_names(&names).map_err(serde::de::Error::custom)
    }
}

/// Type of a single group member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupPackageType {
    Mandatory,
    Default,
    Conditional,
    Optional,
}

impl GroupPackageType {
    pub fn as_package_type(self) -> PackageType {
        match self {
            GroupPackageType::Mandatory => PackageType::MANDATORY,
            GroupPackageType::Default => PackageType::DEFAULT,
            GroupPackageType::Conditional => PackageType::CONDITIONAL,
            GroupPackageType::Optional => PackageType::OPTIONAL,
        }
    }
}

/// A group member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPackage {
    pub name: String,
    #[serde(rename = "type", default = "default_member_type")]
    pub package_type: GroupPackageType,
    /// For conditional members: the package whose presence triggers this one
    #[serde(default)]
    pub requires: Option<String>,
}

fn default_member_type() -> GroupPackageType {
    GroupPackageType::Default
}

/// A comps group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub packages: Vec<GroupPackage>,
}

impl Group {
    /// Members whose type is in `types`
    pub fn packages_of_type(&self, types: PackageType) -> impl Iterator<Item = &GroupPackage> {
        self.packages
            .iter()
            .filter(move |p| types.contains(p.package_type.as_package_type()))
    }
}

/// A comps environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub optional_groups: Vec<String>,
}

/// All groups and environments of the enabled repositories
#[derive(Debug, Clone, Default)]
pub struct CompsSack {
    groups: Vec<Group>,
    environments: Vec<Environment>,
}

impl CompsSack {
    pub fn new(mut groups: Vec<Group>, mut environments: Vec<Environment>) -> Self {
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        groups.dedup_by(|a, b| a.id == b.id);
        environments.sort_by(|a, b| a.id.cmp(&b.id));
        environments.dedup_by(|a, b| a.id == b.id);
        Self {
            groups,
            environments,
        }
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn environment(&self, id: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.id == id)
    }

    /// Groups whose id or name matches the glob `spec`
    pub fn query_groups(&self, spec: &str) -> Result<Vec<&Group>> {
        let pattern = glob::Pattern::new(spec)?;
        Ok(self
            .groups
            .iter()
            .filter(|g| pattern.matches(&g.id) || (!g.name.is_empty() && pattern.matches(&g.name)))
            .collect())
    }

    /// Environments whose id or name matches the glob `spec`
    pub fn query_environments(&self, spec: &str) -> Result<Vec<&Environment>> {
        let pattern = glob::Pattern::new(spec)?;
        Ok(self
            .environments
            .iter()
            .filter(|e| pattern.matches(&e.id) || (!e.name.is_empty() && pattern.matches(&e.name)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_type_set_operations() {
        let types = PackageType::MANDATORY | PackageType::DEFAULT;
        assert!(types.contains(PackageType::MANDATORY));
        assert!(!types.contains(PackageType::OPTIONAL));
        assert!(!(types & PackageType::OPTIONAL).any());
        assert_eq!(types.names(), vec!["mandatory", "default"]);
    }

    #[test]
    fn test_package_type_from_names() {
        let types = PackageType::from_names(&["optional", "mandatory"]).unwrap();
        assert_eq!(types, PackageType::MANDATORY | PackageType::OPTIONAL);
        assert!(PackageType::from_names(&["bogus"]).is_err());
        assert!(!PackageType::from_names::<&str>(&[]).unwrap().any());
    }

    #[test]
    fn test_group_members_by_type() {
        let group = Group {
            id: "core".to_string(),
            name: "Core".to_string(),
            packages: vec![
                GroupPackage {
                    name: "bash".to_string(),
                    package_type: GroupPackageType::Mandatory,
                    requires: None,
                },
                GroupPackage {
                    name: "vim".to_string(),
                    package_type: GroupPackageType::Optional,
                    requires: None,
                },
            ],
        };
        let names: Vec<_> = group
            .packages_of_type(PackageType::MANDATORY | PackageType::DEFAULT)
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["bash"]);
    }

    #[test]
    fn test_query_groups_by_name_glob() {
        let sack = CompsSack::new(
            vec![Group {
                id: "development-tools".to_string(),
                name: "Development Tools".to_string(),
                packages: Vec::new(),
            }],
            Vec::new(),
        );
        assert_eq!(sack.query_groups("development-*").unwrap().len(), 1);
        assert_eq!(sack.query_groups("Development Tools").unwrap().len(), 1);
        assert!(sack.query_groups("nope").unwrap().is_empty());
    }
}
