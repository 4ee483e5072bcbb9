// src/cli/mod.rs
//! CLI definitions for rpmgoal
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! Package commands:
//! - `install`, `remove`, `upgrade`, `distro-sync`, `downgrade`, `reinstall`
//! - `mark` - Change the recorded install reason of packages
//!
//! Comps and modules:
//! - `group` / `environment` - Install or remove comps groups and environments
//! - `module` - Enable, disable or reset module streams
//!
//! Transactions and state:
//! - `replay` - Resolve a stored transaction file again
//! - `show-state` - Print the recorded reasons, groups and modules

use clap::{Args, Parser, Subcommand, ValueEnum};
use rpmgoal::config::DEFAULT_CONFIG_PATH;
use rpmgoal::{GoalJobSettings, TransactionItemReason};
use std::path::PathBuf;

mod comps;
mod module;

pub use comps::{EnvironmentCommands, GroupCommands};
pub use module::ModuleCommands;

#[derive(Parser)]
#[command(name = "rpmgoal")]
#[command(author = "rpmgoal Contributors")]
#[command(version)]
#[command(about = "Resolve package transactions for RPM-based systems", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Metadata snapshot with installed packages, repositories, comps and modules
    #[arg(long, global = true)]
    pub metadata: Option<PathBuf>,

    /// Override the state directory from the configuration
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Options controlling how a goal is resolved and what happens to the result
#[derive(Args, Debug, Clone, Default)]
pub struct ResolveArgs {
    /// Allow removing installed packages to resolve dependency problems
    #[arg(long = "allowerasing")]
    pub allow_erasing: bool,

    /// Only accept the best available candidates
    #[arg(long, conflicts_with = "nobest")]
    pub best: bool,

    /// Accept candidates other than the best one
    #[arg(long)]
    pub nobest: bool,

    /// Skip jobs with broken dependencies instead of failing
    #[arg(long)]
    pub skip_broken: bool,

    /// Report missing packages as warnings
    #[arg(long)]
    pub skip_unavailable: bool,

    /// Keep dependencies that a removal leaves unneeded
    #[arg(long)]
    pub noautoremove: bool,

    /// Write the resolved transaction to this replay file
    #[arg(long, value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Record the transaction as executed in the state directory
    #[arg(long)]
    pub apply: bool,

    /// Answer no: show the transaction and stop
    #[arg(long)]
    pub assumeno: bool,
}

impl ResolveArgs {
    /// Job settings carrying the flags given on the command line
    pub fn job_settings(&self) -> GoalJobSettings {
        let mut settings = GoalJobSettings::new();
        if self.best {
            settings = settings.with_best(true);
        } else if self.nobest {
            settings = settings.with_best(false);
        }
        if self.skip_broken {
            settings = settings.with_strict(false);
        }
        if self.skip_unavailable {
            settings = settings.with_skip_unavailable(true);
        }
        if self.noautoremove {
            settings = settings.with_clean_requirements_on_remove(false);
        }
        settings
    }
}

/// Reason names accepted by `mark`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkReason {
    User,
    Dependency,
    Weak,
    Group,
}

impl From<MarkReason> for TransactionItemReason {
    fn from(reason: MarkReason) -> Self {
        match reason {
            MarkReason::User => TransactionItemReason::User,
            MarkReason::Dependency => TransactionItemReason::Dependency,
            MarkReason::Weak => TransactionItemReason::WeakDependency,
            MarkReason::Group => TransactionItemReason::Group,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install packages
    Install {
        /// Package specs (name, name.arch, NEVRA, glob or provide)
        #[arg(required = true)]
        packages: Vec<String>,

        /// Only consider packages from these repositories
        #[arg(long = "repo", value_name = "ID")]
        repos: Vec<String>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Remove installed packages
    Remove {
        /// Package specs
        #[arg(required = true)]
        packages: Vec<String>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Upgrade packages (all installed packages when none is given)
    Upgrade {
        /// Package specs
        packages: Vec<String>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Synchronize packages to the newest available versions
    DistroSync {
        /// Package specs (all installed packages when none is given)
        packages: Vec<String>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Downgrade packages to the closest older version
    Downgrade {
        /// Package specs
        #[arg(required = true)]
        packages: Vec<String>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Reinstall packages from a repository
    Reinstall {
        /// Package specs
        #[arg(required = true)]
        packages: Vec<String>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Change the recorded install reason of installed packages
    Mark {
        /// New reason
        #[arg(value_enum)]
        reason: MarkReason,

        /// Package specs
        #[arg(required = true)]
        packages: Vec<String>,

        /// Group the packages belong to (with reason `group`)
        #[arg(long, value_name = "ID")]
        group: Option<String>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Comps group operations
    #[command(subcommand)]
    Group(GroupCommands),

    /// Comps environment operations
    #[command(subcommand)]
    Environment(EnvironmentCommands),

    /// Module stream operations
    #[command(subcommand)]
    Module(ModuleCommands),

    /// Resolve a stored transaction again
    Replay {
        /// Replay file written by `--store`
        file: PathBuf,

        /// Do not fail on packages already in the wanted state
        #[arg(long)]
        ignore_installed: bool,

        /// Do not fail on packages the file does not mention
        #[arg(long)]
        ignore_extras: bool,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Show recorded reasons, groups, environments and modules
    ShowState,
}
