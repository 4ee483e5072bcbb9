// src/goal/settings.rs

//! Per-job settings
//!
//! Every job carries a `GoalJobSettings`. Each overridable flag is a
//! three-way [`GoalSetting`]: `Auto` defers to `ConfigMain`, the other two
//! force a value. The first `resolve_*` call locks the effective value in a
//! [`GoalUsedSetting`]; a later call that would produce a different value
//! is an API-misuse error, so a job's behavior cannot drift between the
//! spec-resolution and solving phases of one resolve.

use crate::comps::PackageType;
use crate::config::ConfigMain;
use crate::error::{Error, Result};
use crate::sack::ResolveSpecSettings;
use serde::{Deserialize, Serialize};

/// Caller's choice for one flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GoalSetting {
    #[default]
    Auto,
    SetTrue,
    SetFalse,
}

impl GoalSetting {
    fn or_default(self, default: bool) -> bool {
        match self {
            GoalSetting::Auto => default,
            GoalSetting::SetTrue => true,
            GoalSetting::SetFalse => false,
        }
    }
}

impl From<bool> for GoalSetting {
    fn from(value: bool) -> Self {
        if value {
            GoalSetting::SetTrue
        } else {
            GoalSetting::SetFalse
        }
    }
}

/// Effective value of one flag once resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GoalUsedSetting {
    #[default]
    Unused,
    UsedTrue,
    UsedFalse,
}

impl GoalUsedSetting {
    /// Record `value` as the effective value of the flag `name`
    ///
    /// `Unused` moves to `UsedTrue`/`UsedFalse`; re-locking the same value
    /// is a no-op; locking the opposite value fails.
    pub fn lock(&mut self, name: &str, value: bool) -> Result<bool> {
        let wanted = if value {
            GoalUsedSetting::UsedTrue
        } else {
            GoalUsedSetting::UsedFalse
        };
        match *self {
            GoalUsedSetting::Unused => {
                *self = wanted;
                Ok(value)
            }
            current if current == wanted => Ok(value),
            _ => Err(Error::AssertionError(format!(
                "'{}' is already set to a different value",
                name
            ))),
        }
    }

    pub fn value(self) -> Option<bool> {
        match self {
            GoalUsedSetting::Unused => None,
            GoalUsedSetting::UsedTrue => Some(true),
            GoalUsedSetting::UsedFalse => Some(false),
        }
    }
}

/// Settings of one goal job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalJobSettings {
    /// Fail the job when part of it cannot be satisfied
    pub strict: GoalSetting,
    /// Only accept the best candidate
    pub best: GoalSetting,
    /// Remove dependencies that become unneeded
    pub clean_requirements_on_remove: GoalSetting,
    /// Report missing packages as warnings instead of errors
    pub skip_unavailable: GoalSetting,
    /// Comps package types for group jobs; `None` uses the configuration
    pub group_package_types: Option<PackageType>,

    /// Match specs against NEVRA forms
    pub with_nevra: bool,
    /// Match specs against provides
    pub with_provides: bool,
    /// Case-insensitive spec matching
    pub ignore_case: bool,
    /// Restrict matches to these repositories (empty: all)
    pub to_repo_ids: Vec<String>,

    /// Replay: tolerate packages that are already in the wanted state
    pub ignore_installed: bool,
    /// Replay: tolerate packages the stored transaction does not mention
    pub ignore_extras: bool,

    #[serde(skip)]
    used_strict: GoalUsedSetting,
    #[serde(skip)]
    used_best: GoalUsedSetting,
    #[serde(skip)]
    used_clean_requirements_on_remove: GoalUsedSetting,
    #[serde(skip)]
    used_skip_unavailable: GoalUsedSetting,
    #[serde(skip)]
    used_group_package_types: Option<PackageType>,
}

impl Default for GoalJobSettings {
    fn default() -> Self {
        Self {
            strict: GoalSetting::Auto,
            best: GoalSetting::Auto,
            clean_requirements_on_remove: GoalSetting::Auto,
            skip_unavailable: GoalSetting::Auto,
            group_package_types: None,
            with_nevra: true,
            with_provides: true,
            ignore_case: false,
            to_repo_ids: Vec::new(),
            ignore_installed: false,
            ignore_extras: false,
            used_strict: GoalUsedSetting::Unused,
            used_best: GoalUsedSetting::Unused,
            used_clean_requirements_on_remove: GoalUsedSetting::Unused,
            used_skip_unavailable: GoalUsedSetting::Unused,
            used_group_package_types: None,
        }
    }
}

impl GoalJobSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict(mut self, value: bool) -> Self {
        self.strict = value.into();
        self
    }

    pub fn with_best(mut self, value: bool) -> Self {
        self.best = value.into();
        self
    }

    pub fn with_clean_requirements_on_remove(mut self, value: bool) -> Self {
        self.clean_requirements_on_remove = value.into();
        self
    }

    pub fn with_skip_unavailable(mut self, value: bool) -> Self {
        self.skip_unavailable = value.into();
        self
    }

    pub fn with_group_package_types(mut self, types: PackageType) -> Self {
        self.group_package_types = Some(types);
        self
    }

    pub fn resolve_strict(&mut self, cfg: &ConfigMain) -> Result<bool> {
        let value = self.strict.or_default(cfg.strict);
        self.used_strict.lock("strict", value)
    }

    pub fn resolve_best(&mut self, cfg: &ConfigMain) -> Result<bool> {
        let value = self.best.or_default(cfg.best);
        self.used_best.lock("best", value)
    }

    pub fn resolve_clean_requirements_on_remove(&mut self, cfg: &ConfigMain) -> Result<bool> {
        let value = self
            .clean_requirements_on_remove
            .or_default(cfg.clean_requirements_on_remove);
        self.used_clean_requirements_on_remove
            .lock("clean_requirements_on_remove", value)
    }

    pub fn resolve_skip_unavailable(&mut self, cfg: &ConfigMain) -> Result<bool> {
        let value = self.skip_unavailable.or_default(cfg.skip_unavailable);
        self.used_skip_unavailable.lock("skip_unavailable", value)
    }

    /// Package types for group jobs, falling back to the configured list
    pub fn resolve_group_package_types(&mut self, cfg: &ConfigMain) -> Result<PackageType> {
        let value = match self.group_package_types {
            Some(types) => types,
            None => PackageType::from_names(&cfg.group_package_types)?,
        };
        match self.used_group_package_types {
            None => {
                self.used_group_package_types = Some(value);
                Ok(value)
            }
            Some(used) if used == value => Ok(value),
            Some(_) => Err(Error::AssertionError(
                "'group_package_types' is already set to a different value".to_string(),
            )),
        }
    }

    pub fn used_strict(&self) -> GoalUsedSetting {
        self.used_strict
    }

    pub fn used_best(&self) -> GoalUsedSetting {
        self.used_best
    }

    pub fn used_clean_requirements_on_remove(&self) -> GoalUsedSetting {
        self.used_clean_requirements_on_remove
    }

    pub fn used_skip_unavailable(&self) -> GoalUsedSetting {
        self.used_skip_unavailable
    }

    /// Spec matching options derived from these settings
    pub fn resolve_spec_settings(&self) -> ResolveSpecSettings {
        ResolveSpecSettings {
            with_nevra: self.with_nevra,
            with_provides: self.with_provides,
            ignore_case: self.ignore_case,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_follows_config() {
        let mut cfg = ConfigMain::default();
        cfg.best = true;
        let mut settings = GoalJobSettings::new();
        assert!(settings.resolve_best(&cfg).unwrap());
        assert_eq!(settings.used_best(), GoalUsedSetting::UsedTrue);
    }

    #[test]
    fn test_explicit_setting_overrides_config() {
        let cfg = ConfigMain::default();
        let mut settings = GoalJobSettings::new().with_strict(false);
        assert!(!settings.resolve_strict(&cfg).unwrap());
    }

    #[test]
    fn test_resolve_twice_same_value() {
        let cfg = ConfigMain::default();
        let mut settings = GoalJobSettings::new();
        let first = settings.resolve_strict(&cfg).unwrap();
        let second = settings.resolve_strict(&cfg).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_with_flipped_config_fails() {
        let cfg_a = ConfigMain::default();
        let mut cfg_b = ConfigMain::default();
        cfg_b.strict = !cfg_a.strict;

        let mut settings = GoalJobSettings::new();
        settings.resolve_strict(&cfg_a).unwrap();
        let err = settings.resolve_strict(&cfg_b).unwrap_err();
        assert!(matches!(err, Error::AssertionError(msg) if msg.contains("strict")));
    }

    #[test]
    fn test_flipped_config_irrelevant_when_explicit() {
        let cfg_a = ConfigMain::default();
        let mut cfg_b = ConfigMain::default();
        cfg_b.best = true;
        let mut settings = GoalJobSettings::new().with_best(false);
        settings.resolve_best(&cfg_a).unwrap();
        assert!(!settings.resolve_best(&cfg_b).unwrap());
    }

    #[test]
    fn test_group_package_types_from_config() {
        let mut cfg = ConfigMain::default();
        let mut settings = GoalJobSettings::new();
        let types = settings.resolve_group_package_types(&cfg).unwrap();
        assert!(types.contains(PackageType::MANDATORY));
        assert!(!types.contains(PackageType::OPTIONAL));

        cfg.group_package_types = vec!["optional".to_string()];
        assert!(settings.resolve_group_package_types(&cfg).is_err());
    }

    #[test]
    fn test_group_package_types_invalid_config() {
        let mut cfg = ConfigMain::default();
        cfg.group_package_types = vec!["sometimes".to_string()];
        let mut settings = GoalJobSettings::new();
        assert!(matches!(
            settings.resolve_group_package_types(&cfg),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_used_lock_transitions() {
        let mut used = GoalUsedSetting::Unused;
        assert_eq!(used.value(), None);
        used.lock("x", false).unwrap();
        assert_eq!(used.value(), Some(false));
        assert!(used.lock("x", false).is_ok());
        assert!(used.lock("x", true).is_err());
    }
}
