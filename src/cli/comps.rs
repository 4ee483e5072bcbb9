// src/cli/comps.rs
//! Comps group and environment commands

use super::ResolveArgs;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum GroupCommands {
    /// Install groups and their member packages
    Install {
        /// Group ids or names (globs allowed)
        #[arg(required = true)]
        groups: Vec<String>,

        /// Also install optional member packages
        #[arg(long)]
        with_optional: bool,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Remove installed groups and the members nothing else needs
    Remove {
        /// Group ids or names (globs allowed)
        #[arg(required = true)]
        groups: Vec<String>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },
}

#[derive(Subcommand)]
pub enum EnvironmentCommands {
    /// Install environments and their groups
    Install {
        /// Environment ids or names (globs allowed)
        #[arg(required = true)]
        environments: Vec<String>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Remove installed environments
    Remove {
        /// Environment ids or names (globs allowed)
        #[arg(required = true)]
        environments: Vec<String>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },
}
