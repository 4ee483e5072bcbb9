// src/commands/comps.rs
//! Group, environment and module commands

use super::session::{open_base, run_goal, Outcome};
use crate::cli::{GlobalArgs, ResolveArgs};
use anyhow::Result;
use rpmgoal::PackageType;
use tracing::info;

/// Install comps groups
pub fn cmd_group_install(
    global: &GlobalArgs,
    groups: &[String],
    with_optional: bool,
    args: &ResolveArgs,
) -> Result<Outcome> {
    info!("Installing groups: {}", groups.join(" "));
    let base = open_base(global)?;
    let types = if with_optional {
        Some(PackageType::from_names(&base.config().group_package_types)? | PackageType::OPTIONAL)
    } else {
        None
    };
    run_goal(base, args, |goal| {
        for spec in groups {
            let mut settings = args.job_settings();
            if let Some(types) = types {
                settings = settings.with_group_package_types(types);
            }
            goal.add_group_install(spec, settings);
        }
        Ok(())
    })
}

/// Remove installed comps groups
pub fn cmd_group_remove(global: &GlobalArgs, groups: &[String], args: &ResolveArgs) -> Result<Outcome> {
    info!("Removing groups: {}", groups.join(" "));
    let base = open_base(global)?;
    run_goal(base, args, |goal| {
        for spec in groups {
            goal.add_group_remove(spec, args.job_settings());
        }
        Ok(())
    })
}

/// Install comps environments
pub fn cmd_environment_install(
    global: &GlobalArgs,
    environments: &[String],
    args: &ResolveArgs,
) -> Result<Outcome> {
    let base = open_base(global)?;
    run_goal(base, args, |goal| {
        for spec in environments {
            goal.add_environment_install(spec, args.job_settings());
        }
        Ok(())
    })
}

/// Remove installed comps environments
pub fn cmd_environment_remove(
    global: &GlobalArgs,
    environments: &[String],
    args: &ResolveArgs,
) -> Result<Outcome> {
    let base = open_base(global)?;
    run_goal(base, args, |goal| {
        for spec in environments {
            goal.add_environment_remove(spec, args.job_settings());
        }
        Ok(())
    })
}

/// Enable module streams
pub fn cmd_module_enable(global: &GlobalArgs, specs: &[String], args: &ResolveArgs) -> Result<Outcome> {
    info!("Enabling modules: {}", specs.join(" "));
    let base = open_base(global)?;
    run_goal(base, args, |goal| {
        for spec in specs {
            goal.add_module_enable(spec, args.job_settings());
        }
        Ok(())
    })
}

/// Disable modules
pub fn cmd_module_disable(global: &GlobalArgs, specs: &[String], args: &ResolveArgs) -> Result<Outcome> {
    let base = open_base(global)?;
    run_goal(base, args, |goal| {
        for spec in specs {
            goal.add_module_disable(spec, args.job_settings());
        }
        Ok(())
    })
}

/// Reset module state
pub fn cmd_module_reset(global: &GlobalArgs, specs: &[String], args: &ResolveArgs) -> Result<Outcome> {
    let base = open_base(global)?;
    run_goal(base, args, |goal| {
        for spec in specs {
            goal.add_module_reset(spec, args.job_settings());
        }
        Ok(())
    })
}
