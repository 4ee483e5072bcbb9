// src/commands/state.rs
//! Showing the recorded system state

use super::session::Outcome;
use crate::cli::GlobalArgs;
use anyhow::{Context, Result};
use rpmgoal::{ConfigMain, SystemState};

/// Print recorded package reasons, groups, environments and modules
pub fn cmd_show_state(global: &GlobalArgs) -> Result<Outcome> {
    let config = ConfigMain::load(&global.config)?;
    let dir = global.state_dir.clone().unwrap_or(config.state_dir);
    let state = SystemState::load(dir.clone())
        .with_context(|| format!("Failed to load system state from {}", dir.display()))?;

    println!("State directory: {}", dir.display());
    println!();

    let packages = state.package_states();
    if packages.is_empty() {
        println!("No package reasons recorded.");
    } else {
        println!("{:40} REASON", "PACKAGE");
        println!("{}", "-".repeat(60));
        for (na, pkg) in packages {
            println!("{:40} {}", na, pkg.reason);
        }
    }

    let groups = state.group_states();
    if !groups.is_empty() {
        println!("\nGroups ({}):", groups.len());
        for (id, group) in groups {
            let marker = if group.userinstalled { "*" } else { " " };
            println!(
                "  {}{} [{}] {}",
                marker,
                id,
                group.package_types,
                group.packages.join(", ")
            );
        }
        println!("  * = installed by the user");
    }

    let environments = state.environment_states();
    if !environments.is_empty() {
        println!("\nEnvironments ({}):", environments.len());
        for (id, env) in environments {
            println!("  {} {}", id, env.groups.join(", "));
        }
    }

    let modules = state.module_states();
    if !modules.is_empty() {
        println!("\nModules ({}):", modules.len());
        for (name, status) in modules {
            println!("  {}:{} {}", name, status.enabled_stream, status.state);
        }
    }

    Ok(Outcome::Success)
}
