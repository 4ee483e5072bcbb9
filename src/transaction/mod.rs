// src/transaction/mod.rs

//! Resolved transactions
//!
//! A [`Transaction`] is the outcome of one `Goal::resolve()` call: an
//! ordered list of package, group, environment and module entries, each
//! with an action, a reason and an execution state, together with the
//! problems found while resolving.
//!
//! # Entry lifecycle
//!
//! ```text
//! STARTED -> OK
//!         \-> ERROR
//! ```
//!
//! Every entry is created `Started`; the executor moves it to `Ok` or
//! `Error` exactly once. Only entries in state `Ok` are persisted by
//! `SystemState::apply_transaction`.

mod assembler;
mod replay;

pub use assembler::TransactionAssembler;
pub use replay::{
    EnvironmentReplay, GroupReplay, ModuleReplay, PackageReplay, ReplayDocument,
    REPLAY_VERSION_MAJOR, REPLAY_VERSION_MINOR,
};

use crate::comps::PackageType;
use crate::error::{Error, Result};
use crate::problems::{GoalProblem, LogEvent, SolverProblems};
use crate::sack::{Package, PackageId};
use crate::version::Evr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Why an item is (or will be) on the system
///
/// Variants are declared in ascending strength: when several reasons
/// apply to one item, the greatest wins.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum TransactionItemReason {
    #[default]
    Unknown,
    Clean,
    #[serde(rename = "Weak Dependency")]
    #[strum(serialize = "Weak Dependency")]
    WeakDependency,
    Dependency,
    Group,
    User,
}

/// What happens to an item
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum TransactionItemAction {
    Install,
    Upgrade,
    Downgrade,
    Reinstall,
    Remove,
    Replaced,
    #[serde(rename = "Reason Change")]
    #[strum(serialize = "Reason Change")]
    ReasonChange,
    Enable,
    Disable,
    Reset,
}

impl TransactionItemAction {
    /// The item ends up on the system
    pub fn is_inbound(self) -> bool {
        matches!(
            self,
            Self::Install | Self::Upgrade | Self::Downgrade | Self::Reinstall
        )
    }

    /// The item leaves the system
    pub fn is_outbound(self) -> bool {
        matches!(self, Self::Remove | Self::Replaced)
    }
}

/// Execution state of one entry
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum TransactionItemState {
    #[default]
    Started,
    Ok,
    Error,
}

/// Kind of item a job or entry refers to
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum TransactionItemType {
    Package,
    Group,
    Environment,
    Module,
}

fn transition(current: TransactionItemState, next: TransactionItemState) -> Result<TransactionItemState> {
    match (current, next) {
        (TransactionItemState::Started, TransactionItemState::Ok)
        | (TransactionItemState::Started, TransactionItemState::Error) => Ok(next),
        _ => Err(Error::AssertionError(format!(
            "Invalid transaction item state transition: {} -> {}",
            current, next
        ))),
    }
}

/// One package entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPackage {
    package_id: PackageId,
    name: String,
    evr: Evr,
    arch: String,
    repo_id: String,
    action: TransactionItemAction,
    reason: TransactionItemReason,
    state: TransactionItemState,
    replaces: Vec<PackageId>,
    replaced_by: Vec<PackageId>,
    reason_change_group_id: Option<String>,
}

impl TransactionPackage {
    pub fn new(package: &Package, action: TransactionItemAction, reason: TransactionItemReason) -> Self {
        Self {
            package_id: package.id,
            name: package.name.clone(),
            evr: package.evr.clone(),
            arch: package.arch.clone(),
            repo_id: package.repo_id.clone(),
            action,
            reason,
            state: TransactionItemState::Started,
            replaces: Vec::new(),
            replaced_by: Vec::new(),
            reason_change_group_id: None,
        }
    }

    pub fn package_id(&self) -> PackageId {
        self.package_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evr(&self) -> &Evr {
        &self.evr
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn nevra(&self) -> String {
        format!("{}-{}.{}", self.name, self.evr, self.arch)
    }

    /// NEVRA with an explicit epoch
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

    pub fn na(&self) -> String {
        format!("{}.{}", self.name, self.arch)
    }

    pub fn action(&self) -> TransactionItemAction {
        self.action
    }

    pub fn reason(&self) -> TransactionItemReason {
        self.reason
    }

    pub fn state(&self) -> TransactionItemState {
        self.state
    }

    /// Installed packages this entry replaces
    pub fn replaces(&self) -> &[PackageId] {
        &self.replaces
    }

    /// For `Replaced` entries, the packages replacing this one
    pub fn replaced_by(&self) -> &[PackageId] {
        &self.replaced_by
    }

    /// Group a `ReasonChange` to `Group` is attributed to
    pub fn reason_change_group_id(&self) -> Option<&str> {
        self.reason_change_group_id.as_deref()
    }

    pub fn set_state(&mut self, state: TransactionItemState) -> Result<()> {
        self.state = transition(self.state, state)?;
        Ok(())
    }

    pub(crate) fn set_reason(&mut self, reason: TransactionItemReason) {
        self.reason = reason;
    }

    pub(crate) fn set_reason_change_group_id(&mut self, group_id: Option<String>) {
        self.reason_change_group_id = group_id;
    }

    pub(crate) fn add_replaces(&mut self, id: PackageId) {
        if !self.replaces.contains(&id) {
            self.replaces.push(id);
        }
    }

    pub(crate) fn add_replaced_by(&mut self, id: PackageId) {
        if !self.replaced_by.contains(&id) {
            self.replaced_by.push(id);
        }
    }
}

/// One comps group entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionGroup {
    group_id: String,
    name: String,
    action: TransactionItemAction,
    reason: TransactionItemReason,
    state: TransactionItemState,
    package_types: PackageType,
    /// Member package names installed or removed with the group
    packages: Vec<String>,
}

impl TransactionGroup {
    pub fn new(
        group_id: impl Into<String>,
        name: impl Into<String>,
        action: TransactionItemAction,
        reason: TransactionItemReason,
        package_types: PackageType,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            name: name.into(),
            action,
            reason,
            state: TransactionItemState::Started,
            package_types,
            packages: Vec::new(),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> TransactionItemAction {
        self.action
    }

    pub fn reason(&self) -> TransactionItemReason {
        self.reason
    }

    pub fn state(&self) -> TransactionItemState {
        self.state
    }

    pub fn package_types(&self) -> PackageType {
        self.package_types
    }

    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    pub(crate) fn set_packages(&mut self, packages: Vec<String>) {
        self.packages = packages;
    }

    pub fn set_state(&mut self, state: TransactionItemState) -> Result<()> {
        self.state = transition(self.state, state)?;
        Ok(())
    }
}

/// One comps environment entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvironment {
    environment_id: String,
    name: String,
    action: TransactionItemAction,
    reason: TransactionItemReason,
    state: TransactionItemState,
    with_optional: bool,
    groups: Vec<String>,
}

impl TransactionEnvironment {
    pub fn new(
        environment_id: impl Into<String>,
        name: impl Into<String>,
        action: TransactionItemAction,
        reason: TransactionItemReason,
        with_optional: bool,
    ) -> Self {
        Self {
            environment_id: environment_id.into(),
            name: name.into(),
            action,
            reason,
            state: TransactionItemState::Started,
            with_optional,
            groups: Vec::new(),
        }
    }

    pub fn environment_id(&self) -> &str {
        &self.environment_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> TransactionItemAction {
        self.action
    }

    pub fn reason(&self) -> TransactionItemReason {
        self.reason
    }

    pub fn state(&self) -> TransactionItemState {
        self.state
    }

    pub fn with_optional(&self) -> bool {
        self.with_optional
    }

    /// Group ids installed or removed with the environment
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub(crate) fn set_groups(&mut self, groups: Vec<String>) {
        self.groups = groups;
    }

    pub fn set_state(&mut self, state: TransactionItemState) -> Result<()> {
        self.state = transition(self.state, state)?;
        Ok(())
    }
}

/// One module stream entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionModule {
    name: String,
    stream: String,
    action: TransactionItemAction,
    reason: TransactionItemReason,
    state: TransactionItemState,
}

impl TransactionModule {
    pub fn new(
        name: impl Into<String>,
        stream: impl Into<String>,
        action: TransactionItemAction,
        reason: TransactionItemReason,
    ) -> Self {
        Self {
            name: name.into(),
            stream: stream.into(),
            action,
            reason,
            state: TransactionItemState::Started,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn action(&self) -> TransactionItemAction {
        self.action
    }

    pub fn reason(&self) -> TransactionItemReason {
        self.reason
    }

    pub fn state(&self) -> TransactionItemState {
        self.state
    }

    pub fn set_state(&mut self, state: TransactionItemState) -> Result<()> {
        self.state = transition(self.state, state)?;
        Ok(())
    }
}

/// Result of one resolve
///
/// When [`Transaction::get_problems`] is `NO_PROBLEM` the entry lists are
/// the complete plan; otherwise they are empty and the resolve logs
/// explain why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: Uuid,
    created_at: DateTime<Utc>,
    packages: Vec<TransactionPackage>,
    groups: Vec<TransactionGroup>,
    environments: Vec<TransactionEnvironment>,
    modules: Vec<TransactionModule>,
    problems: GoalProblem,
    resolve_logs: Vec<LogEvent>,
}

impl Transaction {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            packages: Vec::new(),
            groups: Vec::new(),
            environments: Vec::new(),
            modules: Vec::new(),
            problems: GoalProblem::NO_PROBLEM,
            resolve_logs: Vec::new(),
        }
    }

    /// Unique id of this resolve
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// OR of the problems of every error-severity resolve log
    pub fn get_problems(&self) -> GoalProblem {
        self.problems
    }

    /// All diagnostics in the order they were produced
    pub fn get_resolve_logs(&self) -> &[LogEvent] {
        &self.resolve_logs
    }

    /// Rendered diagnostics
    pub fn get_resolve_logs_as_strings(&self) -> Vec<String> {
        self.resolve_logs.iter().map(ToString::to_string).collect()
    }

    pub fn get_transaction_packages(&self) -> &[TransactionPackage] {
        &self.packages
    }

    pub fn get_transaction_packages_mut(&mut self) -> &mut [TransactionPackage] {
        &mut self.packages
    }

    pub fn get_transaction_groups(&self) -> &[TransactionGroup] {
        &self.groups
    }

    pub fn get_transaction_groups_mut(&mut self) -> &mut [TransactionGroup] {
        &mut self.groups
    }

    pub fn get_transaction_environments(&self) -> &[TransactionEnvironment] {
        &self.environments
    }

    pub fn get_transaction_environments_mut(&mut self) -> &mut [TransactionEnvironment] {
        &mut self.environments
    }

    pub fn get_transaction_modules(&self) -> &[TransactionModule] {
        &self.modules
    }

    pub fn get_transaction_modules_mut(&mut self) -> &mut [TransactionModule] {
        &mut self.modules
    }

    /// Number of package entries
    pub fn get_transaction_packages_count(&self) -> usize {
        self.packages.len()
    }

    /// Whether the transaction changes nothing
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
            && self.groups.is_empty()
            && self.environments.is_empty()
            && self.modules.is_empty()
    }

    /// Solver problems of every `SOLVER_ERROR` event, merged
    pub fn get_package_solver_problems(&self) -> SolverProblems {
        let mut merged = SolverProblems::default();
        for event in &self.resolve_logs {
            if event.problem() != GoalProblem::SOLVER_ERROR {
                continue;
            }
            if let Some(problems) = event.solver_problems() {
                for problem in problems.get_problems() {
                    merged.push(problem.clone());
                }
            }
        }
        merged
    }

    /// Render every solver problem, grouping alternatives
    pub fn all_package_solver_problems_to_string(&self) -> String {
        let problems = self.get_package_solver_problems();
        if problems.is_empty() {
            String::new()
        } else {
            problems.to_string()
        }
    }

    /// Mark every entry as executed
    pub fn set_all_states(&mut self, state: TransactionItemState) -> Result<()> {
        for pkg in &mut self.packages {
            pkg.set_state(state)?;
        }
        for group in &mut self.groups {
            group.set_state(state)?;
        }
        for env in &mut self.environments {
            env.set_state(state)?;
        }
        for module in &mut self.modules {
            module.set_state(state)?;
        }
        Ok(())
    }

    pub(crate) fn add_resolve_log(&mut self, event: LogEvent) {
        if event.is_error() {
            self.problems |= event.problem();
        }
        self.resolve_logs.push(event);
    }

    pub(crate) fn set_packages(&mut self, packages: Vec<TransactionPackage>) {
        self.packages = packages;
    }

    pub(crate) fn set_groups(&mut self, groups: Vec<TransactionGroup>) {
        self.groups = groups;
    }

    pub(crate) fn set_environments(&mut self, environments: Vec<TransactionEnvironment>) {
        self.environments = environments;
    }

    pub(crate) fn set_modules(&mut self, modules: Vec<TransactionModule>) {
        self.modules = modules;
    }

    /// Drop every entry, keeping the logs
    pub(crate) fn clear_entries(&mut self) {
        self.packages.clear();
        self.groups.clear();
        self.environments.clear();
        self.modules.clear();
    }
}
