// src/cli/module.rs
//! Module stream commands

use super::ResolveArgs;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum ModuleCommands {
    /// Enable module streams (`name` or `name:stream`)
    Enable {
        #[arg(required = true)]
        specs: Vec<String>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Disable modules
    Disable {
        #[arg(required = true)]
        specs: Vec<String>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Forget the enabled or disabled state of modules
    Reset {
        #[arg(required = true)]
        specs: Vec<String>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },
}
