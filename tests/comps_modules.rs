// tests/comps_modules.rs

//! Group, environment and module stream jobs

mod common;

use common::{entries, logs_with, setup_base, setup_base_with};
use rpmgoal::module::{ModuleState, ModuleStatus};
use rpmgoal::state::{EnvironmentState, GroupState};
use rpmgoal::{
    Goal, GoalJobSettings, GoalProblem, PackageType, TransactionItemAction, TransactionItemReason,
};

const COMPS: &str = r#"
    [[installed]]
    name = "nginx"
    evr = "1.26.1-1"
    arch = "x86_64"

    [[repo]]
    id = "fedora"

    [[repo.packages]]
    name = "nginx"
    evr = "1.26.1-1"
    arch = "x86_64"

    [[repo.packages]]
    name = "httpd"
    evr = "2.4.62-1"
    arch = "x86_64"

    [[repo.packages]]
    name = "mod_php"
    evr = "8.3.0-1"
    arch = "x86_64"

    [[repo.packages]]
    name = "mod_ssl"
    evr = "2.4.62-1"
    arch = "x86_64"

    [[repo.packages]]
    name = "htop"
    evr = "3.3.0-1"
    arch = "x86_64"

    [[group]]
    id = "web-server"
    name = "Web Server"
    packages = [
        { name = "httpd", type = "mandatory" },
        { name = "mod_ssl", type = "default" },
        { name = "mod_php", type = "conditional", requires = "php" },
        { name = "htop", type = "optional" },
        { name = "webalizer", type = "default" },
    ]

    [[group]]
    id = "nginx-server"
    name = "Nginx"
    packages = [{ name = "nginx", type = "mandatory" }]

    [[group]]
    id = "admin-tools"
    name = "Administration Tools"
    packages = [{ name = "htop", type = "mandatory" }]

    [[environment]]
    id = "server"
    name = "Server"
    groups = ["admin-tools", "missing-group"]
"#;

const MODULES: &str = r#"
    [[repo]]
    id = "fedora"

    [[repo.packages]]
    name = "nodejs"
    evr = "18.0-1"
    arch = "x86_64"

    [[repo.packages]]
    name = "nodejs"
    evr = "20.1-1"
    arch = "x86_64"

    [[repo.packages]]
    name = "perl"
    evr = "5.32.1-1"
    arch = "x86_64"

    [[repo.packages]]
    name = "perl"
    evr = "5.36.0-1"
    arch = "x86_64"

    [[module]]
    name = "nodejs"
    stream = "18"
    is_default = true
    packages = ["nodejs-18.0-1.x86_64"]

    [[module]]
    name = "nodejs"
    stream = "20"
    packages = ["nodejs-20.1-1.x86_64"]

    [[module]]
    name = "perl"
    stream = "5.32"
    packages = ["perl-5.32.1-1.x86_64"]

    [[module]]
    name = "perl"
    stream = "5.36"
    packages = ["perl-5.36.0-1.x86_64"]
"#;

fn enabled(stream: &str) -> ModuleStatus {
    ModuleStatus {
        enabled_stream: stream.to_string(),
        state: ModuleState::Enabled,
    }
}

#[test]
fn test_group_install_pulls_default_members() {
    let (_tmp, base) = setup_base(COMPS);
    let mut goal = Goal::new(&base);
    goal.add_group_install("web-server", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().is_empty());
    assert_eq!(
        entries(&transaction),
        vec![
            "Install httpd-2.4.62-1.x86_64 Group",
            "Install mod_ssl-2.4.62-1.x86_64 Group",
        ]
    );
    // Missing non-mandatory members only warn
    assert_eq!(
        logs_with(&transaction, GoalProblem::NOT_FOUND),
        vec!["No match for group package: webalizer"]
    );

    let groups = transaction.get_transaction_groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].group_id(), "web-server");
    assert_eq!(groups[0].action(), TransactionItemAction::Install);
    assert_eq!(groups[0].reason(), TransactionItemReason::User);
    assert_eq!(groups[0].packages(), ["httpd", "mod_ssl"]);
}

#[test]
fn test_group_install_with_optional_members() {
    let (_tmp, base) = setup_base(COMPS);
    let mut goal = Goal::new(&base);
    let types = PackageType::MANDATORY | PackageType::OPTIONAL;
    goal.add_group_install(
        "web-server",
        GoalJobSettings::default().with_group_package_types(types),
    );

    let transaction = goal.resolve().unwrap();
    assert_eq!(
        entries(&transaction),
        vec![
            "Install htop-3.3.0-1.x86_64 Group",
            "Install httpd-2.4.62-1.x86_64 Group",
        ]
    );
}

#[test]
fn test_group_install_by_name_glob() {
    let (_tmp, base) = setup_base(COMPS);
    let mut goal = Goal::new(&base);
    goal.add_group_install("Administration*", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert_eq!(entries(&transaction), vec!["Install htop-3.3.0-1.x86_64 Group"]);
    assert_eq!(transaction.get_transaction_groups()[0].group_id(), "admin-tools");
}

#[test]
fn test_group_install_marks_installed_member() {
    let (_tmp, base) = setup_base(COMPS);
    let mut goal = Goal::new(&base);
    goal.add_group_install("nginx-server", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    let packages = transaction.get_transaction_packages();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].action(), TransactionItemAction::ReasonChange);
    assert_eq!(packages[0].reason(), TransactionItemReason::Group);
    assert_eq!(packages[0].reason_change_group_id(), Some("nginx-server"));
    assert_eq!(transaction.get_transaction_groups()[0].packages(), ["nginx"]);
}

#[test]
fn test_group_install_unknown_group() {
    let (_tmp, base) = setup_base(COMPS);
    let mut goal = Goal::new(&base);
    goal.add_group_install("no-such-group", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().contains(GoalProblem::NOT_FOUND));
    assert!(transaction.is_empty());
}

#[test]
fn test_group_install_already_installed() {
    let (_tmp, base) = setup_base_with(
        COMPS,
        |_| {},
        |state| {
            state.set_group_state(
                "nginx-server",
                GroupState {
                    userinstalled: true,
                    packages: vec!["nginx".to_string()],
                    package_types: PackageType::MANDATORY,
                },
            )
        },
    );
    let mut goal = Goal::new(&base);
    goal.add_group_install("nginx-server", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.is_empty());
    assert_eq!(
        logs_with(&transaction, GoalProblem::ALREADY_INSTALLED),
        vec!["Group \"nginx-server\" is already installed."]
    );
}

#[test]
fn test_group_remove_removes_group_members() {
    let (_tmp, base) = setup_base_with(
        COMPS,
        |_| {},
        |state| {
            state.set_package_reason("nginx.x86_64", TransactionItemReason::Group);
            state.set_group_state(
                "nginx-server",
                GroupState {
                    userinstalled: true,
                    packages: vec!["nginx".to_string()],
                    package_types: PackageType::MANDATORY,
                },
            );
        },
    );
    let mut goal = Goal::new(&base);
    goal.add_group_remove("nginx-server", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().is_empty());
    assert_eq!(entries(&transaction), vec!["Remove nginx-1.26.1-1.x86_64 Group"]);
    let groups = transaction.get_transaction_groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].action(), TransactionItemAction::Remove);
}

#[test]
fn test_group_remove_keeps_user_installed_member() {
    let (_tmp, base) = setup_base_with(
        COMPS,
        |_| {},
        |state| {
            state.set_package_reason("nginx.x86_64", TransactionItemReason::User);
            state.set_group_state(
                "nginx-server",
                GroupState {
                    userinstalled: true,
                    packages: vec!["nginx".to_string()],
                    package_types: PackageType::MANDATORY,
                },
            );
        },
    );
    let mut goal = Goal::new(&base);
    goal.add_group_remove("nginx-server", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_transaction_packages().is_empty());
    assert_eq!(transaction.get_transaction_groups().len(), 1);
}

#[test]
fn test_group_remove_not_installed() {
    let (_tmp, base) = setup_base(COMPS);
    let mut goal = Goal::new(&base);
    goal.add_group_remove("web-server", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert_eq!(
        logs_with(&transaction, GoalProblem::NOT_FOUND),
        vec!["No groups to remove for argument: web-server"]
    );
}

#[test]
fn test_environment_install_uses_existing_groups() {
    let (_tmp, base) = setup_base(COMPS);
    let mut goal = Goal::new(&base);
    goal.add_environment_install(
        "server",
        GoalJobSettings::default().with_skip_unavailable(true),
    );

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().is_empty());
    assert_eq!(entries(&transaction), vec!["Install htop-3.3.0-1.x86_64 Group"]);
    assert_eq!(
        logs_with(&transaction, GoalProblem::NOT_FOUND),
        vec!["No match for group from environment: missing-group"]
    );

    let environments = transaction.get_transaction_environments();
    assert_eq!(environments.len(), 1);
    assert_eq!(environments[0].groups(), ["admin-tools"]);
    let groups = transaction.get_transaction_groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].reason(), TransactionItemReason::Group);
}

#[test]
fn test_environment_remove_drops_pulled_in_groups() {
    let (_tmp, base) = setup_base_with(
        COMPS,
        |_| {},
        |state| {
            state.set_group_state(
                "nginx-server",
                GroupState {
                    userinstalled: false,
                    packages: vec!["nginx".to_string()],
                    package_types: PackageType::MANDATORY,
                },
            );
            state.set_environment_state(
                "server",
                EnvironmentState {
                    groups: vec!["nginx-server".to_string()],
                },
            );
            state.set_package_reason("nginx.x86_64", TransactionItemReason::Group);
        },
    );
    let mut goal = Goal::new(&base);
    goal.add_environment_remove("server", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert_eq!(entries(&transaction), vec!["Remove nginx-1.26.1-1.x86_64 Group"]);
    assert_eq!(transaction.get_transaction_environments().len(), 1);
    assert_eq!(transaction.get_transaction_groups()[0].group_id(), "nginx-server");
}

#[test]
fn test_default_stream_is_used_without_module_state() {
    let (_tmp, base) = setup_base(MODULES);
    let mut goal = Goal::new(&base);
    goal.add_install("nodejs", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert_eq!(entries(&transaction), vec!["Install nodejs-18.0-1.x86_64 User"]);
}

#[test]
fn test_enable_stream_then_install() {
    let (_tmp, base) = setup_base(MODULES);
    let mut goal = Goal::new(&base);
    goal.add_module_enable("nodejs:20", GoalJobSettings::default());
    goal.add_install("nodejs", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().is_empty());
    assert_eq!(entries(&transaction), vec!["Install nodejs-20.1-1.x86_64 User"]);

    let modules = transaction.get_transaction_modules();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].name(), "nodejs");
    assert_eq!(modules[0].stream(), "20");
    assert_eq!(modules[0].action(), TransactionItemAction::Enable);
}

#[test]
fn test_enabled_stream_cannot_switch() {
    let (_tmp, base) = setup_base_with(
        MODULES,
        |_| {},
        |state| state.set_module_state("nodejs", enabled("18")),
    );
    let mut goal = Goal::new(&base);
    goal.add_module_enable("nodejs:20", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(
        transaction
            .get_problems()
            .contains(GoalProblem::MODULE_CANNOT_SWITCH_STREAMS)
    );
    assert!(transaction.is_empty());
    let logs = logs_with(&transaction, GoalProblem::MODULE_CANNOT_SWITCH_STREAMS);
    assert_eq!(logs.len(), 1);
    assert!(logs[0].starts_with(
        "The operation would result in switching of module 'nodejs' stream '18' to stream '20'"
    ));
}

#[test]
fn test_enable_already_enabled_stream() {
    let (_tmp, base) = setup_base_with(
        MODULES,
        |_| {},
        |state| state.set_module_state("nodejs", enabled("18")),
    );
    let mut goal = Goal::new(&base);
    goal.add_module_enable("nodejs", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().is_empty());
    assert!(transaction.get_transaction_modules().is_empty());
    assert_eq!(
        logs_with(&transaction, GoalProblem::ALREADY_INSTALLED),
        vec!["Module stream \"nodejs:18\" is already enabled."]
    );
}

#[test]
fn test_enable_without_default_stream_is_ambiguous() {
    let (_tmp, base) = setup_base(MODULES);
    let mut goal = Goal::new(&base);
    goal.add_module_enable("perl", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().contains(GoalProblem::MULTIPLE_STREAMS));
}

#[test]
fn test_enable_malformed_spec() {
    let (_tmp, base) = setup_base(MODULES);
    let mut goal = Goal::new(&base);
    goal.add_module_enable("perl:", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().contains(GoalProblem::MALFORMED));
}

#[test]
fn test_non_default_module_packages_are_hidden() {
    let (_tmp, base) = setup_base(MODULES);
    let mut goal = Goal::new(&base);
    goal.add_install("perl", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().contains(GoalProblem::EXCLUDED));
}

#[test]
fn test_disable_and_reset_module() {
    let (_tmp, base) = setup_base_with(
        MODULES,
        |_| {},
        |state| state.set_module_state("nodejs", enabled("20")),
    );

    let mut goal = Goal::new(&base);
    goal.add_module_disable("nodejs", GoalJobSettings::default());
    let transaction = goal.resolve().unwrap();
    let modules = transaction.get_transaction_modules();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].action(), TransactionItemAction::Disable);
    assert_eq!(modules[0].stream(), "20");

    let mut goal = Goal::new(&base);
    goal.add_module_reset("nodejs", GoalJobSettings::default());
    let transaction = goal.resolve().unwrap();
    assert_eq!(
        transaction.get_transaction_modules()[0].action(),
        TransactionItemAction::Reset
    );
}

#[test]
fn test_module_unknown_name() {
    let (_tmp, base) = setup_base(MODULES);
    let mut goal = Goal::new(&base);
    goal.add_module_disable("ruby", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert_eq!(
        logs_with(&transaction, GoalProblem::NOT_FOUND),
        vec!["No match for argument: ruby"]
    );
}
