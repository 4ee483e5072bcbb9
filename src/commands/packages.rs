// src/commands/packages.rs
//! Package install, remove, upgrade and reason commands

use super::session::{open_base, run_goal, Outcome};
use crate::cli::{GlobalArgs, MarkReason, ResolveArgs};
use anyhow::Result;
use rpmgoal::TransactionItemReason;
use tracing::info;

/// Install packages
pub fn cmd_install(
    global: &GlobalArgs,
    packages: &[String],
    repos: &[String],
    args: &ResolveArgs,
) -> Result<Outcome> {
    info!("Installing: {}", packages.join(" "));
    let base = open_base(global)?;
    run_goal(base, args, |goal| {
        for spec in packages {
            let mut settings = args.job_settings();
            settings.to_repo_ids = repos.to_vec();
            goal.add_install(spec, settings);
        }
        Ok(())
    })
}

/// Remove installed packages
pub fn cmd_remove(global: &GlobalArgs, packages: &[String], args: &ResolveArgs) -> Result<Outcome> {
    info!("Removing: {}", packages.join(" "));
    let base = open_base(global)?;
    run_goal(base, args, |goal| {
        for spec in packages {
            goal.add_remove(spec, args.job_settings());
        }
        Ok(())
    })
}

/// Upgrade packages, or everything when no spec is given
pub fn cmd_upgrade(global: &GlobalArgs, packages: &[String], args: &ResolveArgs) -> Result<Outcome> {
    let base = open_base(global)?;
    run_goal(base, args, |goal| {
        if packages.is_empty() {
            info!("Upgrading all installed packages");
            goal.add_upgrade_all(args.job_settings());
        }
        for spec in packages {
            goal.add_upgrade(spec, args.job_settings());
        }
        Ok(())
    })
}

/// Distro-sync packages, or everything when no spec is given
pub fn cmd_distro_sync(
    global: &GlobalArgs,
    packages: &[String],
    args: &ResolveArgs,
) -> Result<Outcome> {
    let base = open_base(global)?;
    run_goal(base, args, |goal| {
        if packages.is_empty() {
            info!("Synchronizing all installed packages");
            goal.add_distro_sync_all(args.job_settings());
        }
        for spec in packages {
            goal.add_distro_sync(spec, args.job_settings());
        }
        Ok(())
    })
}

/// Downgrade packages
pub fn cmd_downgrade(global: &GlobalArgs, packages: &[String], args: &ResolveArgs) -> Result<Outcome> {
    let base = open_base(global)?;
    run_goal(base, args, |goal| {
        for spec in packages {
            goal.add_downgrade(spec, args.job_settings());
        }
        Ok(())
    })
}

/// Reinstall packages
pub fn cmd_reinstall(global: &GlobalArgs, packages: &[String], args: &ResolveArgs) -> Result<Outcome> {
    let base = open_base(global)?;
    run_goal(base, args, |goal| {
        for spec in packages {
            goal.add_reinstall(spec, args.job_settings());
        }
        Ok(())
    })
}

/// Change the recorded reason of installed packages
pub fn cmd_mark(
    global: &GlobalArgs,
    reason: MarkReason,
    packages: &[String],
    group: Option<&str>,
    args: &ResolveArgs,
) -> Result<Outcome> {
    let reason = TransactionItemReason::from(reason);
    info!("Marking {} as {}", packages.join(" "), reason);
    let group_id = match reason {
        TransactionItemReason::Group => group.map(str::to_string),
        _ => None,
    };
    let base = open_base(global)?;
    run_goal(base, args, |goal| {
        for spec in packages {
            goal.add_reason_change(spec, reason, group_id.clone(), args.job_settings());
        }
        Ok(())
    })
}
