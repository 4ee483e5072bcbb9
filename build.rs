// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Arguments taking one or more specs
fn specs_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).required(true).num_args(1..).help(help)
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).action(ArgAction::SetTrue).help(help)
}

/// Resolution flags shared by every goal command
fn resolve_args() -> Vec<Arg> {
    vec![
        flag("allowerasing", "Allow removing installed packages to resolve dependency problems"),
        flag("best", "Only accept the best available candidates"),
        flag("nobest", "Accept candidates other than the best one"),
        flag("skip-broken", "Skip jobs with broken dependencies instead of failing"),
        flag("skip-unavailable", "Report missing packages as warnings"),
        flag("noautoremove", "Keep dependencies that a removal leaves unneeded"),
        Arg::new("store")
            .long("store")
            .value_name("FILE")
            .help("Write the resolved transaction to this replay file"),
        flag("apply", "Record the transaction as executed in the state directory"),
        flag("assumeno", "Answer no: show the transaction and stop"),
    ]
}

fn goal_command(name: &'static str, about: &'static str, specs: Arg) -> Command {
    Command::new(name).about(about).arg(specs).args(resolve_args())
}

fn build_cli() -> Command {
    Command::new("rpmgoal")
        .version(env!("CARGO_PKG_VERSION"))
        .author("rpmgoal Contributors")
        .about("Resolve package transactions for RPM-based systems")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .default_value("/etc/rpmgoal/rpmgoal.toml")
                .help("Path to the configuration file"),
        )
        .arg(
            Arg::new("metadata")
                .long("metadata")
                .value_name("PATH")
                .help("Metadata snapshot with installed packages, repositories, comps and modules"),
        )
        .arg(
            Arg::new("state-dir")
                .long("state-dir")
                .value_name("PATH")
                .help("Override the state directory from the configuration"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(
            goal_command("install", "Install packages", specs_arg("packages", "Package specs"))
                .arg(Arg::new("repo").long("repo").value_name("ID").help("Only consider packages from this repository")),
        )
        .subcommand(goal_command("remove", "Remove installed packages", specs_arg("packages", "Package specs")))
        .subcommand(goal_command(
            "upgrade",
            "Upgrade packages (all installed packages when none is given)",
            Arg::new("packages").num_args(0..).help("Package specs"),
        ))
        .subcommand(goal_command(
            "distro-sync",
            "Synchronize packages to the newest available versions",
            Arg::new("packages").num_args(0..).help("Package specs"),
        ))
        .subcommand(goal_command("downgrade", "Downgrade packages", specs_arg("packages", "Package specs")))
        .subcommand(goal_command("reinstall", "Reinstall packages", specs_arg("packages", "Package specs")))
        .subcommand(
            goal_command(
                "mark",
                "Change the recorded install reason of installed packages",
                Arg::new("reason")
                    .required(true)
                    .value_parser(["user", "dependency", "weak", "group"])
                    .help("New reason"),
            )
            .arg(Arg::new("packages").required(true).num_args(1..).help("Package specs"))
            .arg(Arg::new("group").long("group").value_name("ID").help("Group the packages belong to")),
        )
        .subcommand(
            Command::new("group")
                .about("Comps group operations")
                .subcommand(
                    goal_command("install", "Install groups", specs_arg("groups", "Group ids or names"))
                        .arg(flag("with-optional", "Also install optional member packages")),
                )
                .subcommand(goal_command("remove", "Remove installed groups", specs_arg("groups", "Group ids or names"))),
        )
        .subcommand(
            Command::new("environment")
                .about("Comps environment operations")
                .subcommand(goal_command("install", "Install environments", specs_arg("environments", "Environment ids or names")))
                .subcommand(goal_command("remove", "Remove installed environments", specs_arg("environments", "Environment ids or names"))),
        )
        .subcommand(
            Command::new("module")
                .about("Module stream operations")
                .subcommand(goal_command("enable", "Enable module streams", specs_arg("specs", "name or name:stream")))
                .subcommand(goal_command("disable", "Disable modules", specs_arg("specs", "Module names")))
                .subcommand(goal_command("reset", "Forget module state", specs_arg("specs", "Module names"))),
        )
        .subcommand(
            goal_command(
                "replay",
                "Resolve a stored transaction again",
                Arg::new("file").required(true).help("Replay file written by --store"),
            )
            .arg(flag("ignore-installed", "Do not fail on packages already in the wanted state"))
            .arg(flag("ignore-extras", "Do not fail on packages the file does not mention")),
        )
        .subcommand(Command::new("show-state").about("Show recorded reasons, groups, environments and modules"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("rpmgoal.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
