// src/lib.rs

//! rpmgoal: transaction goal resolution for RPM-based systems
//!
//! Callers queue install/remove/upgrade/group/module jobs on a [`Goal`],
//! resolve them against the package universe held by a [`Base`], and get
//! back an ordered [`Transaction`] or the problems that prevent one.
//!
//! # Architecture
//!
//! - `sack`, `comps`, `module`: frozen metadata (packages, groups, module streams)
//! - `state`: per-package install reasons and group/module state on disk
//! - `goal`: job queue, per-job settings, spec diagnostics
//! - `solver`: the `SolverOracle` boundary and the bundled backtracking oracle
//! - `transaction`: resolved entries, ordering, replay files
//! - `problems`: problem codes, solver rule rendering, log events

pub mod base;
pub mod comps;
pub mod config;
mod error;
pub mod goal;
pub mod module;
pub mod problems;
pub mod sack;
pub mod solver;
pub mod state;
pub mod transaction;
pub mod version;

pub use base::Base;
pub use comps::{CompsSack, Environment, Group, GroupPackage, GroupPackageType, PackageType};
pub use config::ConfigMain;
pub use error::{Error, Result};
pub use goal::{Goal, GoalAction, GoalJobSettings, GoalSetting, GoalUsedSetting};
pub use module::{ModuleSack, ModuleState, ModuleStatus, ModuleStream};
pub use problems::{GoalProblem, LogEvent, ProblemRules, Severity, SolverProblems};
pub use sack::{Package, PackageId, PackageQuery, PackageSack, Snapshot};
pub use solver::{BacktrackSolver, SolverOracle};
pub use state::SystemState;
pub use transaction::{
    ReplayDocument, Transaction, TransactionEnvironment, TransactionGroup, TransactionItemAction,
    TransactionItemReason, TransactionItemState, TransactionItemType, TransactionModule,
    TransactionPackage,
};
pub use version::{Evr, Nevra, Reldep};
