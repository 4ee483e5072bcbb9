// src/goal/mod.rs

//! Goal: the job queue and its resolution
//!
//! Callers queue jobs (`add_install`, `add_remove`, group and module jobs,
//! a stored transaction to replay) and then call [`Goal::resolve`], which
//! turns every job into solver jobs, runs the solver once for all of them
//! and assembles the resulting [`Transaction`].
//!
//! Jobs stay queued after `resolve()`; a caller can preview a resolve, add
//! more jobs and resolve again. [`Goal::reset`] empties the queue.
//!
//! # Resolution order
//!
//! 1. stored transaction (replay)
//! 2. module jobs (they change which packages are visible)
//! 3. package jobs
//! 4. group and environment jobs
//! 5. reason changes
//! 6. one solver call for everything queued

mod action;
mod resolve;
mod settings;

pub use action::GoalAction;
pub use settings::{GoalJobSettings, GoalSetting, GoalUsedSetting};

use crate::base::Base;
use crate::error::{Error, Result};
use crate::transaction::{ReplayDocument, Transaction, TransactionItemReason, TransactionItemType};
use std::path::Path;
use tracing::debug;

/// A queued package job
#[derive(Debug, Clone)]
pub(crate) struct PackageJob {
    pub action: GoalAction,
    pub spec: String,
    pub settings: GoalJobSettings,
}

/// A queued group or environment job
#[derive(Debug, Clone)]
pub(crate) struct CompsJob {
    pub action: GoalAction,
    pub spec_type: TransactionItemType,
    pub spec: String,
    pub settings: GoalJobSettings,
}

/// A queued module job
#[derive(Debug, Clone)]
pub(crate) struct ModuleJob {
    pub action: GoalAction,
    pub spec: String,
    pub settings: GoalJobSettings,
}

/// A queued reason change
#[derive(Debug, Clone)]
pub(crate) struct ReasonChangeJob {
    pub spec: String,
    pub reason: TransactionItemReason,
    pub group_id: Option<String>,
    pub settings: GoalJobSettings,
}

/// Queue of jobs against one [`Base`]
pub struct Goal<'a> {
    base: &'a Base,
    rpm_jobs: Vec<PackageJob>,
    comps_jobs: Vec<CompsJob>,
    module_jobs: Vec<ModuleJob>,
    reason_change_jobs: Vec<ReasonChangeJob>,
    serialized: Option<(ReplayDocument, GoalJobSettings)>,
    allow_erasing: bool,
}

impl<'a> Goal<'a> {
    pub fn new(base: &'a Base) -> Self {
        Self {
            base,
            rpm_jobs: Vec::new(),
            comps_jobs: Vec::new(),
            module_jobs: Vec::new(),
            reason_change_jobs: Vec::new(),
            serialized: None,
            allow_erasing: false,
        }
    }

    pub fn base(&self) -> &'a Base {
        self.base
    }

    fn add_rpm_job(&mut self, action: GoalAction, spec: &str, settings: GoalJobSettings) {
        self.rpm_jobs.push(PackageJob {
            action,
            spec: spec.to_string(),
            settings,
        });
    }

    /// Install packages matching `spec`
    pub fn add_install(&mut self, spec: &str, settings: GoalJobSettings) {
        self.add_rpm_job(GoalAction::Install, spec, settings);
    }

    /// Remove installed packages matching `spec`
    pub fn add_remove(&mut self, spec: &str, settings: GoalJobSettings) {
        self.add_rpm_job(GoalAction::Remove, spec, settings);
    }

    /// Upgrade installed packages matching `spec`
    pub fn add_upgrade(&mut self, spec: &str, settings: GoalJobSettings) {
        self.add_rpm_job(GoalAction::Upgrade, spec, settings);
    }

    /// Upgrade every installed package
    pub fn add_upgrade_all(&mut self, settings: GoalJobSettings) {
        self.add_rpm_job(GoalAction::UpgradeAll, "*", settings);
    }

    /// Downgrade installed packages matching `spec`
    pub fn add_downgrade(&mut self, spec: &str, settings: GoalJobSettings) {
        self.add_rpm_job(GoalAction::Downgrade, spec, settings);
    }

    /// Reinstall installed packages matching `spec`
    pub fn add_reinstall(&mut self, spec: &str, settings: GoalJobSettings) {
        self.add_rpm_job(GoalAction::Reinstall, spec, settings);
    }

    /// Move installed packages matching `spec` to the newest available version
    pub fn add_distro_sync(&mut self, spec: &str, settings: GoalJobSettings) {
        self.add_rpm_job(GoalAction::DistroSync, spec, settings);
    }

    /// Move every installed package to the newest available version
    pub fn add_distro_sync_all(&mut self, settings: GoalJobSettings) {
        self.add_rpm_job(GoalAction::DistroSyncAll, "*", settings);
    }

    fn add_comps_job(
        &mut self,
        action: GoalAction,
        spec_type: TransactionItemType,
        spec: &str,
        settings: GoalJobSettings,
    ) {
        self.comps_jobs.push(CompsJob {
            action,
            spec_type,
            spec: spec.to_string(),
            settings,
        });
    }

    /// Install the groups matching `spec` (id or name glob)
    pub fn add_group_install(&mut self, spec: &str, settings: GoalJobSettings) {
        self.add_comps_job(GoalAction::Install, TransactionItemType::Group, spec, settings);
    }

    /// Remove installed groups matching `spec`
    pub fn add_group_remove(&mut self, spec: &str, settings: GoalJobSettings) {
        self.add_comps_job(GoalAction::Remove, TransactionItemType::Group, spec, settings);
    }

    /// Install the environments matching `spec`
    pub fn add_environment_install(&mut self, spec: &str, settings: GoalJobSettings) {
        self.add_comps_job(
            GoalAction::Install,
            TransactionItemType::Environment,
            spec,
            settings,
        );
    }

    /// Remove installed environments matching `spec`
    pub fn add_environment_remove(&mut self, spec: &str, settings: GoalJobSettings) {
        self.add_comps_job(
            GoalAction::Remove,
            TransactionItemType::Environment,
            spec,
            settings,
        );
    }

    fn add_module_job(&mut self, action: GoalAction, spec: &str, settings: GoalJobSettings) {
        self.module_jobs.push(ModuleJob {
            action,
            spec: spec.to_string(),
            settings,
        });
    }

    /// Enable a module stream (`name` or `name:stream`)
    pub fn add_module_enable(&mut self, spec: &str, settings: GoalJobSettings) {
        self.add_module_job(GoalAction::Enable, spec, settings);
    }

    /// Disable a module
    pub fn add_module_disable(&mut self, spec: &str, settings: GoalJobSettings) {
        self.add_module_job(GoalAction::Disable, spec, settings);
    }

    /// Forget the state of a module
    pub fn add_module_reset(&mut self, spec: &str, settings: GoalJobSettings) {
        self.add_module_job(GoalAction::Reset, spec, settings);
    }

    /// Change the recorded reason of installed packages matching `spec`
    ///
    /// `group_id` attributes a change to `Group` to that group.
    pub fn add_reason_change(
        &mut self,
        spec: &str,
        reason: TransactionItemReason,
        group_id: Option<String>,
        settings: GoalJobSettings,
    ) {
        self.reason_change_jobs.push(ReasonChangeJob {
            spec: spec.to_string(),
            reason,
            group_id,
            settings,
        });
    }

    /// Queue a stored transaction for replay
    ///
    /// The file is read and validated now: an incompatible version fails
    /// here and nothing is queued. At most one stored transaction per goal.
    pub fn add_serialized_transaction(&mut self, path: &Path, settings: GoalJobSettings) -> Result<()> {
        if self.serialized.is_some() {
            return Err(Error::AssertionError(
                "Serialized transaction already added to the goal".to_string(),
            ));
        }
        let document = ReplayDocument::load(path)?;
        debug!(
            "Queued stored transaction {} with {} packages",
            path.display(),
            document.rpms.len()
        );
        self.serialized = Some((document, settings));
        Ok(())
    }

    /// Let the solver remove installed packages to satisfy the jobs
    pub fn set_allow_erasing(&mut self, value: bool) {
        self.allow_erasing = value;
    }

    pub fn get_allow_erasing(&self) -> bool {
        self.allow_erasing
    }

    /// Whether no job is queued
    pub fn is_empty(&self) -> bool {
        self.rpm_jobs.is_empty()
            && self.comps_jobs.is_empty()
            && self.module_jobs.is_empty()
            && self.reason_change_jobs.is_empty()
            && self.serialized.is_none()
    }

    /// Drop every queued job and the allow-erasing flag
    pub fn reset(&mut self) {
        self.rpm_jobs.clear();
        self.comps_jobs.clear();
        self.module_jobs.clear();
        self.reason_change_jobs.clear();
        self.serialized = None;
        self.allow_erasing = false;
    }

    /// Resolve every queued job into one transaction
    ///
    /// Expected failures (missing packages, dependency problems, protected
    /// removals) do not make this fail: they are reported on the returned
    /// transaction, whose entries are then empty. `Err` means the goal
    /// could not be resolved at all: the base was not set up, a job
    /// setting was re-resolved to a different value, or the solver gave up.
    pub fn resolve(&mut self) -> Result<Transaction> {
        if !self.base.is_initialized() {
            return Err(Error::AssertionError(
                "Goal resolved before the base was set up".to_string(),
            ));
        }
        resolve::run(self)
    }
}
