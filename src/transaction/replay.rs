// src/transaction/replay.rs

//! Serialized transactions
//!
//! A resolved transaction can be stored as a JSON replay document and fed
//! back into a later goal, which reproduces the same entries (same NEVRAs,
//! actions and reasons) against the metadata available then.
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "rpms": [
//!     {"nevra": "foo-0:1.0-1.x86_64", "action": "Install", "reason": "User", "repo_id": "fedora"}
//!   ],
//!   "groups": [],
//!   "environments": [],
//!   "modules": []
//! }
//! ```

use super::{Transaction, TransactionItemAction, TransactionItemReason};
use crate::comps::PackageType;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const REPLAY_VERSION_MAJOR: u32 = 1;
pub const REPLAY_VERSION_MINOR: u32 = 0;

/// One package entry of a replay document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageReplay {
    /// NEVRA with explicit epoch
    pub nevra: String,
    pub action: TransactionItemAction,
    pub reason: TransactionItemReason,
    #[serde(default)]
    pub repo_id: String,
    /// Group a `Reason Change` to `Group` is attributed to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupReplay {
    pub id: String,
    pub action: TransactionItemAction,
    pub reason: TransactionItemReason,
    #[serde(default)]
    pub package_types: PackageType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentReplay {
    pub id: String,
    pub action: TransactionItemAction,
    #[serde(default)]
    pub reason: TransactionItemReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleReplay {
    pub name: String,
    pub stream: String,
    pub action: TransactionItemAction,
    #[serde(default)]
    pub reason: TransactionItemReason,
}

/// A stored transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDocument {
    pub version: String,
    #[serde(default)]
    pub rpms: Vec<PackageReplay>,
    #[serde(default)]
    pub groups: Vec<GroupReplay>,
    #[serde(default)]
    pub environments: Vec<EnvironmentReplay>,
    #[serde(default)]
    pub modules: Vec<ModuleReplay>,
}

impl Default for ReplayDocument {
    fn default() -> Self {
        Self {
            version: format!("{}.{}", REPLAY_VERSION_MAJOR, REPLAY_VERSION_MINOR),
            rpms: Vec::new(),
            groups: Vec::new(),
            environments: Vec::new(),
            modules: Vec::new(),
        }
    }
}

impl ReplayDocument {
    /// Read and validate a document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("Failed to read replay file {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse and validate a document
    ///
    /// The version is checked before the body so an incompatible document
    /// reports its version rather than whatever field changed.
    pub fn parse(content: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content).map_err(|e| {
            Error::TransactionError(format!("Invalid transaction replay JSON: {}", e))
        })?;

        let version = value
            .get("version")
            .ok_or_else(|| Error::TransactionError("Missing key \"version\"".to_string()))?;
        let version = version
            .as_str()
            .ok_or_else(|| Error::TransactionError("Unexpected version format".to_string()))?;
        check_version(version)?;

        serde_json::from_value(value).map_err(|e| {
            Error::TransactionError(format!("Invalid transaction replay document: {}", e))
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn is_empty(&self) -> bool {
        self.rpms.is_empty()
            && self.groups.is_empty()
            && self.environments.is_empty()
            && self.modules.is_empty()
    }
}

fn check_version(version: &str) -> Result<()> {
    let (major, minor) = version
        .split_once('.')
        .and_then(|(major, minor)| Some((major.parse::<u32>().ok()?, minor.parse::<u32>().ok()?)))
        .ok_or_else(|| {
            Error::TransactionError(format!("Unexpected version format: \"{}\"", version))
        })?;

    if major != REPLAY_VERSION_MAJOR {
        return Err(Error::TransactionError(format!(
            "Incompatible major version: \"{}\", supported major version is \"{}\"",
            major, REPLAY_VERSION_MAJOR
        )));
    }
    if minor > REPLAY_VERSION_MINOR {
        return Err(Error::TransactionError(format!(
            "Incompatible minor version: \"{}\", supported up to \"{}\"",
            minor, REPLAY_VERSION_MINOR
        )));
    }
    Ok(())
}

impl Transaction {
    /// Convert the entries to a replay document
    ///
    /// `Replaced` entries are left out: replaying the entry that replaces
    /// them reproduces them.
    pub fn to_replay(&self) -> ReplayDocument {
        let rpms = self
            .packages
            .iter()
            .filter(|pkg| pkg.action() != TransactionItemAction::Replaced)
            .map(|pkg| PackageReplay {
                nevra: pkg.full_nevra(),
                action: pkg.action(),
                reason: pkg.reason(),
                repo_id: pkg.repo_id().to_string(),
                group_id: pkg.reason_change_group_id().map(str::to_string),
            })
            .collect();
        let groups = self
            .groups
            .iter()
            .map(|group| GroupReplay {
                id: group.group_id().to_string(),
                action: group.action(),
                reason: group.reason(),
                package_types: group.package_types(),
            })
            .collect();
        let environments = self
            .environments
            .iter()
            .map(|env| EnvironmentReplay {
                id: env.environment_id().to_string(),
                action: env.action(),
                reason: env.reason(),
            })
            .collect();
        let modules = self
            .modules
            .iter()
            .map(|module| ModuleReplay {
                name: module.name().to_string(),
                stream: module.stream().to_string(),
                action: module.action(),
                reason: module.reason(),
            })
            .collect();

        ReplayDocument {
            rpms,
            groups,
            environments,
            modules,
            ..Default::default()
        }
    }

    /// Replay document as JSON
    pub fn serialize(&self) -> Result<String> {
        self.to_replay().to_json()
    }

    /// Write the replay document to `path`
    pub fn store(&self, path: &Path) -> Result<()> {
        fs::write(path, self.serialize()?).map_err(|e| {
            Error::IoError(format!("Failed to write replay file {}: {}", path.display(), e))
        })
    }
}
