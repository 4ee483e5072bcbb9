// src/main.rs

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, EnvironmentCommands, GroupCommands, ModuleCommands};
use commands::Outcome;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.global.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<Outcome> {
    let global = &cli.global;
    match &cli.command {
        Commands::Install {
            packages,
            repos,
            resolve,
        } => commands::cmd_install(global, packages, repos, resolve),
        Commands::Remove { packages, resolve } => commands::cmd_remove(global, packages, resolve),
        Commands::Upgrade { packages, resolve } => commands::cmd_upgrade(global, packages, resolve),
        Commands::DistroSync { packages, resolve } => {
            commands::cmd_distro_sync(global, packages, resolve)
        }
        Commands::Downgrade { packages, resolve } => {
            commands::cmd_downgrade(global, packages, resolve)
        }
        Commands::Reinstall { packages, resolve } => {
            commands::cmd_reinstall(global, packages, resolve)
        }
        Commands::Mark {
            reason,
            packages,
            group,
            resolve,
        } => commands::cmd_mark(global, *reason, packages, group.as_deref(), resolve),
        Commands::Group(GroupCommands::Install {
            groups,
            with_optional,
            resolve,
        }) => commands::cmd_group_install(global, groups, *with_optional, resolve),
        Commands::Group(GroupCommands::Remove { groups, resolve }) => {
            commands::cmd_group_remove(global, groups, resolve)
        }
        Commands::Environment(EnvironmentCommands::Install {
            environments,
            resolve,
        }) => commands::cmd_environment_install(global, environments, resolve),
        Commands::Environment(EnvironmentCommands::Remove {
            environments,
            resolve,
        }) => commands::cmd_environment_remove(global, environments, resolve),
        Commands::Module(ModuleCommands::Enable { specs, resolve }) => {
            commands::cmd_module_enable(global, specs, resolve)
        }
        Commands::Module(ModuleCommands::Disable { specs, resolve }) => {
            commands::cmd_module_disable(global, specs, resolve)
        }
        Commands::Module(ModuleCommands::Reset { specs, resolve }) => {
            commands::cmd_module_reset(global, specs, resolve)
        }
        Commands::Replay {
            file,
            ignore_installed,
            ignore_extras,
            resolve,
        } => commands::cmd_replay(global, file, *ignore_installed, *ignore_extras, resolve),
        Commands::ShowState => commands::cmd_show_state(global),
    }
}
