// tests/goal_scenarios.rs

//! End-to-end resolution of package jobs against a snapshot

mod common;

use common::{DISTRO, entries, logs_with, setup_base, setup_base_with};
use rpmgoal::{Goal, GoalJobSettings, GoalProblem, TransactionItemAction, TransactionItemReason};

const FOO_UPDATES: &str = r#"
    [[installed]]
    name = "foo"
    evr = "1.0-1"
    arch = "x86_64"

    [[repo]]
    id = "fedora"

    [[repo.packages]]
    name = "foo"
    evr = "1.0-1"
    arch = "x86_64"

    [[repo]]
    id = "updates"

    [[repo.packages]]
    name = "foo"
    evr = "2.0-1"
    arch = "x86_64"
"#;

const FOO_INSTALLED: &str = r#"
    [[installed]]
    name = "foo"
    evr = "1.0-1"
    arch = "x86_64"

    [[repo]]
    id = "fedora"

    [[repo.packages]]
    name = "foo"
    evr = "1.0-1"
    arch = "x86_64"
"#;

#[test]
fn test_install_on_empty_system() {
    let (_tmp, base) = setup_base(DISTRO);
    let mut goal = Goal::new(&base);
    goal.add_install("foo", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().is_empty());
    assert_eq!(entries(&transaction), vec!["Install foo-1.0-1.x86_64 User"]);
}

#[test]
fn test_install_pulls_dependencies_before_dependent() {
    let (_tmp, base) = setup_base(DISTRO);
    let mut goal = Goal::new(&base);
    goal.add_install("app", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    let lines = entries(&transaction);
    assert_eq!(lines.len(), 3, "{:?}", lines);
    assert!(lines.contains(&"Install app-docs-1.0-1.noarch Weak Dependency".to_string()));

    let libapp = lines
        .iter()
        .position(|l| l == "Install libapp-1.2-1.x86_64 Dependency")
        .unwrap();
    let app = lines
        .iter()
        .position(|l| l == "Install app-1.0-1.x86_64 User")
        .unwrap();
    assert!(libapp < app);
}

#[test]
fn test_install_without_weak_deps() {
    let (_tmp, base) = setup_base_with(DISTRO, |cfg| cfg.install_weak_deps = false, |_| {});
    let mut goal = Goal::new(&base);
    goal.add_install("app", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    let lines = entries(&transaction);
    assert_eq!(
        lines,
        vec![
            "Install libapp-1.2-1.x86_64 Dependency",
            "Install app-1.0-1.x86_64 User",
        ]
    );
}

#[test]
fn test_already_installed_dependency_becomes_user() {
    let (_tmp, base) = setup_base_with(
        FOO_INSTALLED,
        |_| {},
        |state| state.set_package_reason("foo.x86_64", TransactionItemReason::Dependency),
    );
    let mut goal = Goal::new(&base);
    goal.add_install("foo", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().is_empty());
    assert_eq!(
        logs_with(&transaction, GoalProblem::ALREADY_INSTALLED),
        vec!["Package \"foo-1.0-1.x86_64\" is already installed."]
    );
    assert_eq!(entries(&transaction), vec!["Reason Change foo-1.0-1.x86_64 User"]);
}

#[test]
fn test_already_installed_user_package_is_a_noop() {
    let (_tmp, base) = setup_base_with(
        FOO_INSTALLED,
        |_| {},
        |state| state.set_package_reason("foo.x86_64", TransactionItemReason::User),
    );
    let mut goal = Goal::new(&base);
    goal.add_install("foo", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.is_empty());
    assert!(transaction.get_problems().is_empty());
}

#[test]
fn test_install_missing_package() {
    let (_tmp, base) = setup_base(DISTRO);
    let mut goal = Goal::new(&base);
    goal.add_install("does-not-exist", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().contains(GoalProblem::NOT_FOUND));
    assert!(transaction.get_transaction_packages().is_empty());
    assert_eq!(
        logs_with(&transaction, GoalProblem::NOT_FOUND),
        vec!["No match for argument: does-not-exist"]
    );
}

#[test]
fn test_install_wrong_case_hints_real_name() {
    let (_tmp, base) = setup_base(DISTRO);
    let mut goal = Goal::new(&base);
    goal.add_install("FOO", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert_eq!(transaction.get_problems(), GoalProblem::NOT_FOUND);
    assert_eq!(
        logs_with(&transaction, GoalProblem::HINT_ICASE),
        vec!["  * Maybe you meant: foo"]
    );
}

#[test]
fn test_install_source_only_package() {
    let (_tmp, base) = setup_base(DISTRO);
    let mut goal = Goal::new(&base);
    goal.add_install("srconly", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().contains(GoalProblem::ONLY_SRC));
    assert!(transaction.is_empty());
}

#[test]
fn test_install_excluded_package() {
    let (_tmp, base) = setup_base_with(
        DISTRO,
        |cfg| cfg.excludepkgs = vec!["foo".to_string()],
        |_| {},
    );
    let mut goal = Goal::new(&base);
    goal.add_install("foo", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().contains(GoalProblem::EXCLUDED));
    assert_eq!(
        logs_with(&transaction, GoalProblem::EXCLUDED),
        vec!["Argument 'foo' matches only excluded packages."]
    );
}

#[test]
fn test_skip_unavailable_keeps_other_jobs() {
    let (_tmp, base) = setup_base(DISTRO);
    let mut goal = Goal::new(&base);
    goal.add_install(
        "does-not-exist",
        GoalJobSettings::default().with_skip_unavailable(true),
    );
    goal.add_install("foo", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().is_empty());
    assert_eq!(logs_with(&transaction, GoalProblem::NOT_FOUND).len(), 1);
    assert_eq!(entries(&transaction), vec!["Install foo-1.0-1.x86_64 User"]);
}

#[test]
fn test_duplicate_install_yields_one_entry() {
    let (_tmp, base) = setup_base(DISTRO);
    let mut goal = Goal::new(&base);
    goal.add_install("foo", GoalJobSettings::default());
    goal.add_install("foo", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert_eq!(entries(&transaction), vec!["Install foo-1.0-1.x86_64 User"]);
}

#[test]
fn test_resolution_is_deterministic() {
    let (_tmp, base) = setup_base(DISTRO);
    let resolve = || {
        let mut goal = Goal::new(&base);
        goal.add_install("app", GoalJobSettings::default());
        goal.add_install("foo", GoalJobSettings::default());
        entries(&goal.resolve().unwrap())
    };
    let first = resolve();
    assert_eq!(first.len(), 4);
    for _ in 0..3 {
        assert_eq!(resolve(), first);
    }
}

#[test]
fn test_broken_dependency_strict() {
    let (_tmp, base) = setup_base(DISTRO);
    let mut goal = Goal::new(&base);
    goal.add_install("broken", GoalJobSettings::default());
    goal.add_install("foo", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().contains(GoalProblem::SOLVER_ERROR));
    assert!(transaction.is_empty());
    assert!(
        transaction
            .all_package_solver_problems_to_string()
            .contains("nothing provides missing-lib")
    );
}

#[test]
fn test_broken_dependency_skipped_when_not_strict() {
    let (_tmp, base) = setup_base(DISTRO);
    let mut goal = Goal::new(&base);
    goal.add_install("broken", GoalJobSettings::default().with_strict(false));
    goal.add_install("foo", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().is_empty());
    let skipped = logs_with(&transaction, GoalProblem::SOLVER_PROBLEM_STRICT_RESOLVEMENT);
    assert_eq!(skipped.len(), 1);
    assert!(skipped[0].contains("nothing provides missing-lib"), "{}", skipped[0]);
    assert_eq!(entries(&transaction), vec!["Install foo-1.0-1.x86_64 User"]);
}

#[test]
fn test_remove_available_but_not_installed() {
    let (_tmp, base) = setup_base(DISTRO);
    let mut goal = Goal::new(&base);
    goal.add_remove("app", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().contains(GoalProblem::NOT_INSTALLED));
    assert_eq!(
        logs_with(&transaction, GoalProblem::NOT_INSTALLED),
        vec!["Packages for argument 'app' available, but not installed."]
    );
}

#[test]
fn test_remove_protected_package_is_refused() {
    let (_tmp, base) = setup_base_with(
        DISTRO,
        |cfg| cfg.protected_packages = vec!["glibc".to_string()],
        |_| {},
    );
    let mut goal = Goal::new(&base);
    goal.add_remove("glibc", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().contains(GoalProblem::REMOVAL_OF_PROTECTED));
    assert!(transaction.is_empty());
    let logs = logs_with(&transaction, GoalProblem::REMOVAL_OF_PROTECTED);
    assert_eq!(logs.len(), 1);
    assert!(logs[0].contains("glibc"));
}

#[test]
fn test_remove_protected_package_with_allow_erasing() {
    let (_tmp, base) = setup_base_with(
        DISTRO,
        |cfg| cfg.protected_packages = vec!["glibc".to_string()],
        |_| {},
    );
    let mut goal = Goal::new(&base);
    goal.set_allow_erasing(true);
    goal.add_remove("glibc", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().is_empty());
    let packages = transaction.get_transaction_packages();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].action(), TransactionItemAction::Remove);
    assert_eq!(packages[0].nevra(), "glibc-2.39-1.x86_64");
}

#[test]
fn test_upgrade_replaces_old_version() {
    let (_tmp, base) = setup_base(FOO_UPDATES);
    let mut goal = Goal::new(&base);
    goal.add_upgrade("foo", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert_eq!(
        entries(&transaction),
        vec![
            "Upgrade foo-2.0-1.x86_64 Dependency",
            "Replaced foo-1.0-1.x86_64 Dependency",
        ]
    );
    let upgrade = &transaction.get_transaction_packages()[0];
    assert_eq!(upgrade.repo_id(), "updates");
    assert_eq!(upgrade.replaces().len(), 1);
}

#[test]
fn test_upgrade_all_keeps_user_reason() {
    let (_tmp, base) = setup_base_with(
        FOO_UPDATES,
        |_| {},
        |state| state.set_package_reason("foo.x86_64", TransactionItemReason::User),
    );
    let mut goal = Goal::new(&base);
    goal.add_upgrade_all(GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert_eq!(
        entries(&transaction),
        vec![
            "Upgrade foo-2.0-1.x86_64 User",
            "Replaced foo-1.0-1.x86_64 User",
        ]
    );
}

#[test]
fn test_reinstall_same_version() {
    let (_tmp, base) = setup_base(FOO_INSTALLED);
    let mut goal = Goal::new(&base);
    goal.add_reinstall("foo", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    let actions: Vec<TransactionItemAction> = transaction
        .get_transaction_packages()
        .iter()
        .map(|p| p.action())
        .collect();
    assert_eq!(
        actions,
        vec![TransactionItemAction::Reinstall, TransactionItemAction::Replaced]
    );
}

#[test]
fn test_downgrade_lowest_version() {
    let (_tmp, base) = setup_base(FOO_INSTALLED);
    let mut goal = Goal::new(&base);
    goal.add_downgrade("foo", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(
        transaction
            .get_problems()
            .contains(GoalProblem::INSTALLED_LOWEST_VERSION)
    );
    assert_eq!(
        logs_with(&transaction, GoalProblem::INSTALLED_LOWEST_VERSION),
        vec!["The lowest available version of the \"foo\" package is already installed, cannot downgrade it."]
    );
}

#[test]
fn test_mark_changes_recorded_reason() {
    let (_tmp, base) = setup_base(FOO_INSTALLED);
    let mut goal = Goal::new(&base);
    goal.add_reason_change(
        "foo",
        TransactionItemReason::User,
        None,
        GoalJobSettings::default(),
    );

    let transaction = goal.resolve().unwrap();
    assert_eq!(entries(&transaction), vec!["Reason Change foo-1.0-1.x86_64 User"]);
}

#[test]
fn test_mark_with_same_reason_warns() {
    let (_tmp, base) = setup_base(FOO_INSTALLED);
    let mut goal = Goal::new(&base);
    goal.add_reason_change(
        "foo",
        TransactionItemReason::Dependency,
        None,
        GoalJobSettings::default(),
    );

    let transaction = goal.resolve().unwrap();
    assert!(transaction.is_empty());
    assert_eq!(
        logs_with(&transaction, GoalProblem::ALREADY_INSTALLED),
        vec!["Package \"foo-1.0-1.x86_64\" is already installed with reason \"Dependency\"."]
    );
}

#[test]
fn test_reset_clears_queued_jobs() {
    let (_tmp, base) = setup_base(DISTRO);
    let mut goal = Goal::new(&base);
    goal.add_install("foo", GoalJobSettings::default());
    assert!(goal.resolve().is_ok());
    goal.reset();
    assert!(goal.is_empty());
}

/// `top` requires d0..d17, each provided by two packages, and a
/// capability nothing provides
fn wide_unsatisfiable() -> String {
    let requires: Vec<String> = (0..18).map(|i| format!("\"d{}\"", i)).collect();
    let mut snapshot = format!(
        "[[repo]]\nid = \"fedora\"\n\n[[repo.packages]]\nname = \"top\"\nevr = \"1.0-1\"\narch = \"x86_64\"\nrequires = [{}, \"really-missing\"]\n",
        requires.join(", ")
    );
    for i in 0..18 {
        for side in ["a", "b"] {
            snapshot.push_str(&format!(
                "\n[[repo.packages]]\nname = \"d{}-{}\"\nevr = \"1.0-1\"\narch = \"x86_64\"\nprovides = [\"d{}\"]\n",
                i, side, i
            ));
        }
    }
    snapshot
}

#[test]
fn test_unsatisfiable_wide_request_is_a_solver_error() {
    let snapshot = wide_unsatisfiable();
    let (_tmp, base) = setup_base_with(&snapshot, |cfg| cfg.solver_step_limit = 1_000, |_| {});
    let mut goal = Goal::new(&base);
    goal.add_install("top", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().contains(GoalProblem::SOLVER_ERROR));
    assert!(transaction.is_empty());
    let text = transaction.all_package_solver_problems_to_string();
    assert!(text.contains("nothing provides really-missing needed by top-1.0-1.x86_64"), "{}", text);
    assert!(!text.contains("some dependency problem"), "{}", text);
}

const MTA: &str = r#"
    [[repo]]
    id = "fedora"

    [[repo.packages]]
    name = "app"
    evr = "1.0-1"
    arch = "x86_64"
    requires = ["mta"]

    [[repo.packages]]
    name = "exim"
    evr = "4.0-1"
    arch = "x86_64"
    provides = ["mta"]

    [[repo.packages]]
    name = "postfix"
    evr = "3.0-1"
    arch = "x86_64"
    provides = ["mta"]
"#;

#[test]
fn test_job_order_does_not_change_the_result() {
    let (_tmp, base) = setup_base(MTA);
    let resolve = |specs: [&str; 2]| {
        let mut goal = Goal::new(&base);
        for spec in specs {
            goal.add_install(spec, GoalJobSettings::default());
        }
        let mut lines = entries(&goal.resolve().unwrap());
        lines.sort();
        lines
    };

    let app_first = resolve(["app", "postfix"]);
    assert_eq!(
        app_first,
        vec!["Install app-1.0-1.x86_64 User", "Install postfix-3.0-1.x86_64 User"]
    );
    assert_eq!(resolve(["postfix", "app"]), app_first);
}

#[test]
fn test_jobs_persist_across_resolves() {
    let (_tmp, base) = setup_base(DISTRO);
    let mut goal = Goal::new(&base);
    goal.add_install("foo", GoalJobSettings::default());
    goal.add_install("ghost", GoalJobSettings::default().with_skip_unavailable(true));

    let first = goal.resolve().unwrap();
    let second = goal.resolve().unwrap();
    assert_eq!(entries(&first), vec!["Install foo-1.0-1.x86_64 User"]);
    assert_eq!(entries(&second), entries(&first));
    assert_eq!(logs_with(&second, GoalProblem::NOT_FOUND).len(), 1);

    goal.add_install("app", GoalJobSettings::default());
    let third = goal.resolve().unwrap();
    let lines = entries(&third);
    assert_eq!(lines.len(), 4, "{:?}", lines);
    assert!(lines.contains(&"Install foo-1.0-1.x86_64 User".to_string()));
    assert!(lines.contains(&"Install app-1.0-1.x86_64 User".to_string()));
    assert_eq!(logs_with(&third, GoalProblem::NOT_FOUND).len(), 1);
}

const KERNELS: &str = r#"
    [[installed]]
    name = "kernel"
    evr = "6.0-1"
    arch = "x86_64"

    [[installed]]
    name = "kernel"
    evr = "6.1-1"
    arch = "x86_64"

    [[repo]]
    id = "fedora"

    [[repo.packages]]
    name = "kernel"
    evr = "6.1-1"
    arch = "x86_64"

    [[repo.packages]]
    name = "kernel"
    evr = "6.2-1"
    arch = "x86_64"
"#;

#[test]
fn test_installonly_kernel_installs_beside_existing() {
    let (_tmp, base) = setup_base(KERNELS);
    let mut goal = Goal::new(&base);
    goal.add_install("kernel", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().is_empty());
    assert!(logs_with(&transaction, GoalProblem::ALREADY_INSTALLED).is_empty());
    assert_eq!(entries(&transaction), vec!["Install kernel-6.2-1.x86_64 User"]);
    assert!(transaction.get_transaction_packages()[0].replaces().is_empty());

    let mut goal = Goal::new(&base);
    goal.add_upgrade("kernel", GoalJobSettings::default());
    let transaction = goal.resolve().unwrap();
    let lines = entries(&transaction);
    assert_eq!(lines.len(), 1, "{:?}", lines);
    assert!(lines[0].starts_with("Install kernel-6.2-1.x86_64"), "{:?}", lines);
}

#[test]
fn test_installonly_limit_removes_oldest_kernel() {
    let (_tmp, base) = setup_base_with(KERNELS, |cfg| cfg.installonly_limit = 2, |_| {});
    let mut goal = Goal::new(&base);
    goal.add_install("kernel", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().is_empty());
    let lines = entries(&transaction);
    assert_eq!(lines.len(), 2, "{:?}", lines);
    assert!(lines.contains(&"Install kernel-6.2-1.x86_64 User".to_string()));
    assert!(lines.iter().any(|l| l.starts_with("Remove kernel-6.0-1.x86_64")), "{:?}", lines);
}

#[test]
fn test_kernel_outside_installonly_is_upgraded() {
    let (_tmp, base) = setup_base_with(
        r#"
        [[installed]]
        name = "kernel"
        evr = "6.1-1"
        arch = "x86_64"

        [[repo]]
        id = "fedora"

        [[repo.packages]]
        name = "kernel"
        evr = "6.2-1"
        arch = "x86_64"
        "#,
        |cfg| cfg.installonlypkgs.clear(),
        |_| {},
    );
    let mut goal = Goal::new(&base);
    goal.add_upgrade("kernel", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    let actions: Vec<TransactionItemAction> = transaction
        .get_transaction_packages()
        .iter()
        .map(|p| p.action())
        .collect();
    assert_eq!(
        actions,
        vec![TransactionItemAction::Upgrade, TransactionItemAction::Replaced]
    );
}

#[test]
fn test_not_found_hints_alternatives() {
    let (_tmp, base) = setup_base(
        r#"
        [[repo]]
        id = "fedora"

        [[repo.packages]]
        name = "neovim"
        evr = "0.10-1"
        arch = "x86_64"
        provides = ["alternative-for(vim)"]
        "#,
    );
    let mut goal = Goal::new(&base);
    goal.add_install("vim", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().contains(GoalProblem::NOT_FOUND));
    assert_eq!(
        logs_with(&transaction, GoalProblem::HINT_ALTERNATIVES),
        vec!["There are following alternatives for 'vim': neovim"]
    );
}

#[test]
fn test_reinstall_installed_in_different_version() {
    let (_tmp, base) = setup_base(
        r#"
        [[installed]]
        name = "foo"
        evr = "1.0-1"
        arch = "x86_64"

        [[repo]]
        id = "updates"

        [[repo.packages]]
        name = "foo"
        evr = "2.0-1"
        arch = "x86_64"
        "#,
    );
    let mut goal = Goal::new(&base);
    goal.add_reinstall("foo", GoalJobSettings::default());

    let transaction = goal.resolve().unwrap();
    assert!(transaction.is_empty());
    assert!(
        transaction
            .get_problems()
            .contains(GoalProblem::INSTALLED_IN_DIFFERENT_VERSION)
    );
    assert_eq!(
        logs_with(&transaction, GoalProblem::INSTALLED_IN_DIFFERENT_VERSION),
        vec!["Packages for argument 'foo' installed and available, but in a different version."]
    );
}
