// src/solver/mod.rs

//! Dependency solving boundary
//!
//! The goal talks to dependency solving only through [`SolverOracle`]: it
//! hands over a [`Pool`] (the frozen package universe) and a [`Request`]
//! (jobs plus global flags) and gets back either a [`Solution`] or the
//! unsatisfiable problems, one per failing job. [`BacktrackSolver`] is the
//! bundled oracle; another implementation can be dropped in without
//! touching the goal.

mod backtrack;
mod pool;

pub use backtrack::BacktrackSolver;
pub use pool::Pool;

pub(crate) use pool::same_slot;

use crate::error::Result;
use crate::problems::ProblemRule;
use crate::sack::PackageId;
use crate::transaction::TransactionItemReason;
use std::collections::{BTreeMap, BTreeSet};

/// Operation of one solver job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Make one of the packages installed
    Install,
    /// Remove the installed packages, optionally with their unneeded
    /// dependencies
    Erase { clean_deps: bool },
    /// Move each installed package to a newer version
    Update,
    /// Move each installed package to the newest available version, up or down
    DistroSync,
    /// Move each installed package to the closest older version
    Downgrade,
    /// Replace each installed package with an available copy of the same NEVRA
    Reinstall,
}

/// One job for the oracle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverJob {
    pub kind: JobKind,
    /// Install: the candidates. Erase: the installed packages to remove.
    /// Update-like jobs: the installed packages to act on together with the
    /// available packages allowed to replace them.
    pub packages: Vec<PackageId>,
    /// A failing strict job makes the request unsolvable; a failing
    /// non-strict job is skipped
    pub strict: bool,
    /// Only accept the newest candidates
    pub best: bool,
    /// Reason recorded for packages an install job selects
    pub reason: TransactionItemReason,
}

impl SolverJob {
    pub fn new(kind: JobKind, packages: Vec<PackageId>) -> Self {
        Self {
            kind,
            packages,
            strict: true,
            best: false,
            reason: TransactionItemReason::User,
        }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_best(mut self, best: bool) -> Self {
        self.best = best;
        self
    }

    pub fn with_reason(mut self, reason: TransactionItemReason) -> Self {
        self.reason = reason;
        self
    }
}

/// Everything the oracle is asked to do in one call
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub jobs: Vec<SolverJob>,
    /// Installed packages may be removed to satisfy dependencies
    pub allow_erasing: bool,
    /// Dependency repair may replace installed packages with older ones
    pub allow_downgrade: bool,
    /// Pull in recommended packages of newly installed ones
    pub install_weak_deps: bool,
    /// New packages replace the installed packages they obsolete
    pub obsoletes: bool,
    /// Installed packages that clean-deps removal never touches
    pub user_installed: BTreeSet<PackageId>,
    /// Versions of each installonly name kept installed; 0 keeps all
    pub installonly_limit: u32,
}

/// Rules explaining why one job cannot be satisfied
pub type RawProblem = Vec<ProblemRule>;

/// A non-strict job the oracle dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedJob {
    /// Index into `Request::jobs`
    pub job: usize,
    pub problem: RawProblem,
}

/// Transitions from the installed set to the solved set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Solution {
    /// Every package installed after the transaction
    pub installed: BTreeSet<PackageId>,
    pub installs: Vec<PackageId>,
    pub upgrades: Vec<PackageId>,
    pub downgrades: Vec<PackageId>,
    pub reinstalls: Vec<PackageId>,
    pub removes: Vec<PackageId>,
    /// Installed package -> the new packages replacing it (upgrades,
    /// downgrades, reinstalls and obsoletes)
    pub replaced: BTreeMap<PackageId, Vec<PackageId>>,
    /// Reasons assigned by the solve: job reasons for selected packages,
    /// dependency reasons for pulled-in ones, removal reasons for removed ones
    pub reasons: BTreeMap<PackageId, TransactionItemReason>,
    pub skipped: Vec<SkippedJob>,
}

impl Solution {
    /// Reason the solve assigned, `Unknown` when it assigned none
    pub fn reason(&self, id: PackageId) -> TransactionItemReason {
        self.reasons.get(&id).copied().unwrap_or_default()
    }

    /// Installed packages replaced by `id`
    pub fn replaces(&self, id: PackageId) -> Vec<PackageId> {
        self.replaced
            .iter()
            .filter(|(_, by)| by.contains(&id))
            .map(|(old, _)| *old)
            .collect()
    }

    /// Whether nothing changes
    pub fn is_empty(&self) -> bool {
        self.installs.is_empty()
            && self.upgrades.is_empty()
            && self.downgrades.is_empty()
            && self.reinstalls.is_empty()
            && self.removes.is_empty()
            && self.replaced.is_empty()
    }
}

/// Outcome of one oracle call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverOutcome {
    Solved(Solution),
    /// One problem per failing strict job, in job order
    Unsolvable(Vec<RawProblem>),
}

/// A dependency solver
///
/// Implementations must be deterministic: the same pool and request give
/// the same outcome.
pub trait SolverOracle {
    fn solve(&self, pool: &Pool<'_>, request: &Request) -> Result<SolverOutcome>;
}
