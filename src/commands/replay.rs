// src/commands/replay.rs
//! Replaying a stored transaction

use super::session::{open_base, run_goal, Outcome};
use crate::cli::{GlobalArgs, ResolveArgs};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Resolve the transaction stored in `file` against the current system
pub fn cmd_replay(
    global: &GlobalArgs,
    file: &Path,
    ignore_installed: bool,
    ignore_extras: bool,
    args: &ResolveArgs,
) -> Result<Outcome> {
    info!("Replaying transaction from {}", file.display());
    let base = open_base(global)?;
    run_goal(base, args, |goal| {
        let mut settings = args.job_settings();
        settings.ignore_installed = ignore_installed;
        settings.ignore_extras = ignore_extras;
        goal.add_serialized_transaction(file, settings)
            .with_context(|| format!("Cannot replay {}", file.display()))
    })
}
