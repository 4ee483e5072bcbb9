// src/state/mod.rs

//! Persistent system state (the reason store)
//!
//! Records why installed items are on the system. Packages are keyed by
//! `name.arch`; a package present on the system without a record was
//! pulled in as a dependency.
//!
//! # On-disk layout
//!
//! One TOML file per kind of record, each starting with a `version` header:
//!
//! ```text
//! <state_dir>/packages.toml       [packages."name.arch"] reason = "User"
//! <state_dir>/nevras.toml         [nevras."nevra"] from_repo = "fedora"
//! <state_dir>/groups.toml         [groups.<id>] userinstalled, packages, package_types
//! <state_dir>/environments.toml   [environments.<id>] groups
//! <state_dir>/modules.toml        [modules.<name>] enabled_stream, state
//! ```
//!
//! A missing, unreadable or corrupt file is treated as empty (first run,
//! interrupted writes). A file written by an incompatible version is an
//! error: silently discarding it would lose reasons.

pub mod lock;

use crate::comps::PackageType;
use crate::error::{Error, Result};
use crate::module::{ModuleState, ModuleStatus};
use crate::transaction::{
    Transaction, TransactionItemAction, TransactionItemReason, TransactionItemState,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub const STATE_VERSION_MAJOR: u32 = 1;
pub const STATE_VERSION_MINOR: u32 = 0;

const PACKAGES_FILE: &str = "packages.toml";
const NEVRAS_FILE: &str = "nevras.toml";
const GROUPS_FILE: &str = "groups.toml";
const ENVIRONMENTS_FILE: &str = "environments.toml";
const MODULES_FILE: &str = "modules.toml";

/// Record of one installed package name.arch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageState {
    pub reason: TransactionItemReason,
}

/// Record of one installed NEVRA
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NevraState {
    pub from_repo: String,
}

/// Record of one installed group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    /// Installed on explicit request rather than through an environment
    #[serde(default)]
    pub userinstalled: bool,
    /// Member package names installed with the group
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub package_types: PackageType,
}

/// Record of one installed environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentState {
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PackagesFile {
    #[serde(default)]
    packages: BTreeMap<String, PackageState>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NevrasFile {
    #[serde(default)]
    nevras: BTreeMap<String, NevraState>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GroupsFile {
    #[serde(default)]
    groups: BTreeMap<String, GroupState>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EnvironmentsFile {
    #[serde(default)]
    environments: BTreeMap<String, EnvironmentState>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ModulesFile {
    #[serde(default)]
    modules: BTreeMap<String, ModuleStatus>,
}

/// In-memory system state bound to a state directory
///
/// Nothing is written until [`SystemState::save`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemState {
    path: PathBuf,
    packages: BTreeMap<String, PackageState>,
    nevras: BTreeMap<String, NevraState>,
    groups: BTreeMap<String, GroupState>,
    environments: BTreeMap<String, EnvironmentState>,
    modules: BTreeMap<String, ModuleStatus>,
}

impl SystemState {
    /// Empty state bound to `path`; nothing is read
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Load the state stored under `path`
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let packages: PackagesFile = load_file(&path.join(PACKAGES_FILE))?;
        let nevras: NevrasFile = load_file(&path.join(NEVRAS_FILE))?;
        let groups: GroupsFile = load_file(&path.join(GROUPS_FILE))?;
        let environments: EnvironmentsFile = load_file(&path.join(ENVIRONMENTS_FILE))?;
        let modules: ModulesFile = load_file(&path.join(MODULES_FILE))?;
        debug!(
            "Loaded system state from {}: {} package reasons, {} groups, {} modules",
            path.display(),
            packages.packages.len(),
            groups.groups.len(),
            modules.modules.len()
        );
        Ok(Self {
            path,
            packages: packages.packages,
            nevras: nevras.nevras,
            groups: groups.groups,
            environments: environments.environments,
            modules: modules.modules,
        })
    }

    /// Write every file atomically (temporary file, then rename)
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.path).map_err(|e| {
            Error::IoError(format!(
                "Failed to create state directory {}: {}",
                self.path.display(),
                e
            ))
        })?;
        save_file(&self.path, PACKAGES_FILE, &PackagesFile {
            packages: self.packages.clone(),
        })?;
        save_file(&self.path, NEVRAS_FILE, &NevrasFile {
            nevras: self.nevras.clone(),
        })?;
        save_file(&self.path, GROUPS_FILE, &GroupsFile {
            groups: self.groups.clone(),
        })?;
        save_file(&self.path, ENVIRONMENTS_FILE, &EnvironmentsFile {
            environments: self.environments.clone(),
        })?;
        save_file(&self.path, MODULES_FILE, &ModulesFile {
            modules: self.modules.clone(),
        })?;
        info!("Saved system state to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored reason, `Unknown` when there is no record
    pub fn get_package_reason(&self, na: &str) -> TransactionItemReason {
        self.packages
            .get(na)
            .map(|p| p.reason)
            .unwrap_or_default()
    }

    /// Reason of an installed package; installed packages without a
    /// record were pulled in as dependencies
    pub fn get_installed_reason(&self, na: &str) -> TransactionItemReason {
        match self.get_package_reason(na) {
            TransactionItemReason::Unknown => TransactionItemReason::Dependency,
            reason => reason,
        }
    }

    /// Overwrite the reason of `na`
    pub fn set_package_reason(&mut self, na: impl Into<String>, reason: TransactionItemReason) {
        self.packages.insert(na.into(), PackageState { reason });
    }

    pub fn remove_package_reason(&mut self, na: &str) {
        self.packages.remove(na);
    }

    /// All package records, keyed by `name.arch`
    pub fn package_states(&self) -> &BTreeMap<String, PackageState> {
        &self.packages
    }

    /// Repository an installed NEVRA came from
    pub fn get_package_from_repo(&self, nevra: &str) -> Option<&str> {
        self.nevras.get(nevra).map(|n| n.from_repo.as_str())
    }

    pub fn set_package_from_repo(&mut self, nevra: impl Into<String>, repo_id: impl Into<String>) {
        self.nevras.insert(
            nevra.into(),
            NevraState {
                from_repo: repo_id.into(),
            },
        );
    }

    pub fn get_group_state(&self, group_id: &str) -> Option<&GroupState> {
        self.groups.get(group_id)
    }

    pub fn set_group_state(&mut self, group_id: impl Into<String>, state: GroupState) {
        self.groups.insert(group_id.into(), state);
    }

    pub fn remove_group_state(&mut self, group_id: &str) {
        self.groups.remove(group_id);
    }

    pub fn group_states(&self) -> &BTreeMap<String, GroupState> {
        &self.groups
    }

    pub fn get_environment_state(&self, environment_id: &str) -> Option<&EnvironmentState> {
        self.environments.get(environment_id)
    }

    pub fn set_environment_state(&mut self, environment_id: impl Into<String>, state: EnvironmentState) {
        self.environments.insert(environment_id.into(), state);
    }

    pub fn remove_environment_state(&mut self, environment_id: &str) {
        self.environments.remove(environment_id);
    }

    pub fn environment_states(&self) -> &BTreeMap<String, EnvironmentState> {
        &self.environments
    }

    pub fn get_module_state(&self, name: &str) -> Option<&ModuleStatus> {
        self.modules.get(name)
    }

    pub fn set_module_state(&mut self, name: impl Into<String>, status: ModuleStatus) {
        self.modules.insert(name.into(), status);
    }

    pub fn module_states(&self) -> &BTreeMap<String, ModuleStatus> {
        &self.modules
    }

    /// Record the executed entries of `transaction`
    ///
    /// Only entries in state `Ok` are applied. `Clean` and `Unknown`
    /// reasons are never stored.
    pub fn apply_transaction(&mut self, transaction: &Transaction) {
        let executed: Vec<_> = transaction
            .get_transaction_packages()
            .iter()
            .filter(|p| p.state() == TransactionItemState::Ok)
            .collect();
        let inbound: BTreeSet<String> = executed
            .iter()
            .filter(|p| p.action().is_inbound())
            .map(|p| p.na())
            .collect();

        for pkg in executed.iter().filter(|p| p.action().is_outbound()) {
            self.nevras.remove(&pkg.nevra());
            if !inbound.contains(&pkg.na()) {
                self.packages.remove(&pkg.na());
            }
        }
        for pkg in &executed {
            let action = pkg.action();
            if action.is_inbound() {
                self.set_package_from_repo(pkg.nevra(), pkg.repo_id());
            }
            if action.is_inbound() || action == TransactionItemAction::ReasonChange {
                if is_stored(pkg.reason()) {
                    self.set_package_reason(pkg.na(), pkg.reason());
                } else {
                    self.packages.remove(&pkg.na());
                }
            }
            if action == TransactionItemAction::ReasonChange
                && let Some(group_id) = pkg.reason_change_group_id()
                && let Some(group) = self.groups.get_mut(group_id)
                && !group.packages.iter().any(|n| n == pkg.name())
            {
                group.packages.push(pkg.name().to_string());
            }
        }

        for group in transaction.get_transaction_groups() {
            if group.state() != TransactionItemState::Ok {
                continue;
            }
            match group.action() {
                TransactionItemAction::Install | TransactionItemAction::Upgrade => {
                    self.set_group_state(
                        group.group_id(),
                        GroupState {
                            userinstalled: group.reason() == TransactionItemReason::User,
                            packages: group.packages().to_vec(),
                            package_types: group.package_types(),
                        },
                    );
                }
                TransactionItemAction::Remove => self.remove_group_state(group.group_id()),
                _ => {}
            }
        }

        for env in transaction.get_transaction_environments() {
            if env.state() != TransactionItemState::Ok {
                continue;
            }
            match env.action() {
                TransactionItemAction::Install | TransactionItemAction::Upgrade => {
                    self.set_environment_state(
                        env.environment_id(),
                        EnvironmentState {
                            groups: env.groups().to_vec(),
                        },
                    );
                }
                TransactionItemAction::Remove => self.remove_environment_state(env.environment_id()),
                _ => {}
            }
        }

        for module in transaction.get_transaction_modules() {
            if module.state() != TransactionItemState::Ok {
                continue;
            }
            match module.action() {
                TransactionItemAction::Enable => self.set_module_state(
                    module.name(),
                    ModuleStatus {
                        enabled_stream: module.stream().to_string(),
                        state: ModuleState::Enabled,
                    },
                ),
                TransactionItemAction::Disable => {
                    let stream = self
                        .get_module_state(module.name())
                        .map(|s| s.enabled_stream.clone())
                        .unwrap_or_default();
                    self.set_module_state(
                        module.name(),
                        ModuleStatus {
                            enabled_stream: stream,
                            state: ModuleState::Disabled,
                        },
                    );
                }
                TransactionItemAction::Reset => {
                    self.modules.remove(module.name());
                }
                _ => {}
            }
        }
    }
}

fn is_stored(reason: TransactionItemReason) -> bool {
    !matches!(
        reason,
        TransactionItemReason::Clean | TransactionItemReason::Unknown
    )
}

/// Parse a `MAJOR.MINOR` version string
fn parse_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

fn load_file<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        debug!("No state file at {}, starting empty", path.display());
        return Ok(T::default());
    }
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Cannot read state file {}: {}; starting empty", path.display(), e);
            return Ok(T::default());
        }
    };
    let table: toml::Table = match toml::from_str(&content) {
        Ok(table) => table,
        Err(e) => {
            warn!("Corrupt state file {}: {}; starting empty", path.display(), e);
            return Ok(T::default());
        }
    };

    let Some((major, minor)) = table
        .get("version")
        .and_then(toml::Value::as_str)
        .and_then(parse_version)
    else {
        warn!("State file {} has no valid version; starting empty", path.display());
        return Ok(T::default());
    };
    if major != STATE_VERSION_MAJOR || minor > STATE_VERSION_MINOR {
        return Err(Error::StateError(format!(
            "{}: unsupported state version {}.{}, supported is {}.{}",
            path.display(),
            major,
            minor,
            STATE_VERSION_MAJOR,
            STATE_VERSION_MINOR
        )));
    }

    match toml::Value::Table(table).try_into() {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!("Malformed state file {}: {}; starting empty", path.display(), e);
            Ok(T::default())
        }
    }
}

fn save_file<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    let body = toml::to_string(value)?;
    let content = format!(
        "version = \"{}.{}\"\n\n{}",
        STATE_VERSION_MAJOR, STATE_VERSION_MINOR, body
    );
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(name))
        .map_err(|e| Error::IoError(format!("Failed to write {}: {}", name, e.error)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_absent_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let state = SystemState::load(dir.path().join("missing")).unwrap();
        assert!(state.package_states().is_empty());
        assert_eq!(state.get_package_reason("foo.x86_64"), TransactionItemReason::Unknown);
        assert_eq!(
            state.get_installed_reason("foo.x86_64"),
            TransactionItemReason::Dependency
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut state = SystemState::new(dir.path());
        state.set_package_reason("foo.x86_64", TransactionItemReason::User);
        state.set_package_reason("libfoo.x86_64", TransactionItemReason::WeakDependency);
        state.set_package_from_repo("foo-1.0-1.x86_64", "fedora");
        state.set_group_state(
            "core",
            GroupState {
                userinstalled: true,
                packages: vec!["bash".to_string()],
                package_types: PackageType::MANDATORY | PackageType::DEFAULT,
            },
        );
        state.set_environment_state(
            "server",
            EnvironmentState {
                groups: vec!["core".to_string()],
            },
        );
        state.set_module_state(
            "nodejs",
            ModuleStatus {
                enabled_stream: "20".to_string(),
                state: ModuleState::Enabled,
            },
        );
        state.save().unwrap();

        let content = fs::read_to_string(dir.path().join(PACKAGES_FILE)).unwrap();
        assert!(content.starts_with("version = \"1.0\""));
        assert!(content.contains("Weak Dependency"));

        let loaded = SystemState::load(dir.path()).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(PACKAGES_FILE), "this is = = not toml").unwrap();
        let state = SystemState::load(dir.path()).unwrap();
        assert!(state.package_states().is_empty());
    }

    #[test]
    fn test_unsupported_version_is_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MODULES_FILE), "version = \"2.0\"\n").unwrap();
        assert!(matches!(
            SystemState::load(dir.path()),
            Err(Error::StateError(_))
        ));
        fs::write(dir.path().join(MODULES_FILE), "version = \"1.1\"\n").unwrap();
        assert!(matches!(
            SystemState::load(dir.path()),
            Err(Error::StateError(_))
        ));
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("1.0"), Some((1, 0)));
        assert_eq!(parse_version("1"), None);
        assert_eq!(parse_version("a.b"), None);
    }
}
