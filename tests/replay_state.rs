// tests/replay_state.rs

//! Stored transactions and the persisted system state

mod common;

use common::{DISTRO, entries, logs_with, setup_base, setup_base_with};
use rpmgoal::state::GroupState;
use rpmgoal::{
    Error, Goal, GoalJobSettings, GoalProblem, PackageType, ReplayDocument, SystemState,
    TransactionItemReason, TransactionItemState,
};
use std::fs;

#[test]
fn test_stored_transaction_replays_identically() {
    let (tmp, base) = setup_base(DISTRO);
    let mut goal = Goal::new(&base);
    goal.add_install("app", GoalJobSettings::default());
    let original = goal.resolve().unwrap();
    let path = tmp.path().join("install-app.json");
    original.store(&path).unwrap();

    let (_tmp2, fresh) = setup_base(DISTRO);
    let mut goal = Goal::new(&fresh);
    goal.add_serialized_transaction(&path, GoalJobSettings::default())
        .unwrap();
    let replayed = goal.resolve().unwrap();

    assert!(replayed.get_problems().is_empty(), "{:?}", replayed.get_resolve_logs_as_strings());
    assert_eq!(entries(&replayed), entries(&original));
}

#[test]
fn test_replay_file_uses_full_nevra() {
    let (_tmp, base) = setup_base(DISTRO);
    let mut goal = Goal::new(&base);
    goal.add_install("foo", GoalJobSettings::default());
    let transaction = goal.resolve().unwrap();

    let document = ReplayDocument::parse(&transaction.serialize().unwrap()).unwrap();
    assert_eq!(document.version, "1.0");
    assert_eq!(document.rpms.len(), 1);
    assert_eq!(document.rpms[0].nevra, "foo-0:1.0-1.x86_64");
    assert_eq!(document.rpms[0].repo_id, "fedora");
    assert_eq!(document.rpms[0].reason, TransactionItemReason::User);
}

#[test]
fn test_incompatible_major_version_is_rejected() {
    let (tmp, base) = setup_base(DISTRO);
    let path = tmp.path().join("future.json");
    fs::write(&path, r#"{"version": "2.0", "rpms": []}"#).unwrap();

    let mut goal = Goal::new(&base);
    let err = goal
        .add_serialized_transaction(&path, GoalJobSettings::default())
        .unwrap_err();
    assert!(matches!(err, Error::TransactionError(_)));
    assert!(err.to_string().contains("Incompatible major version"));
    assert!(goal.is_empty());
}

#[test]
fn test_newer_minor_version_is_rejected() {
    let err = ReplayDocument::parse(r#"{"version": "1.7"}"#).unwrap_err();
    assert!(err.to_string().contains("Incompatible minor version"));
}

#[test]
fn test_replay_of_missing_package() {
    let (tmp, base) = setup_base(DISTRO);
    let path = tmp.path().join("missing.json");
    fs::write(
        &path,
        r#"{
            "version": "1.0",
            "rpms": [
                {"nevra": "ghost-0:1.0-1.x86_64", "action": "Install", "reason": "User", "repo_id": "fedora"}
            ]
        }"#,
    )
    .unwrap();

    let mut goal = Goal::new(&base);
    goal.add_serialized_transaction(&path, GoalJobSettings::default())
        .unwrap();
    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().contains(GoalProblem::NOT_FOUND));
    assert!(transaction.is_empty());
}

#[test]
fn test_replay_reports_extra_packages() {
    let (tmp, base) = setup_base(DISTRO);
    let path = tmp.path().join("app-only.json");
    fs::write(
        &path,
        r#"{
            "version": "1.0",
            "rpms": [
                {"nevra": "app-0:1.0-1.x86_64", "action": "Install", "reason": "User", "repo_id": "fedora"}
            ]
        }"#,
    )
    .unwrap();

    let mut goal = Goal::new(&base);
    goal.add_serialized_transaction(&path, GoalJobSettings::default())
        .unwrap();
    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().contains(GoalProblem::EXTRA));
    assert!(transaction.is_empty());

    let mut goal = Goal::new(&base);
    let mut settings = GoalJobSettings::default();
    settings.ignore_extras = true;
    goal.add_serialized_transaction(&path, settings).unwrap();
    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().is_empty());
    assert_eq!(logs_with(&transaction, GoalProblem::EXTRA).len(), 2);
    assert_eq!(transaction.get_transaction_packages().len(), 3);
}

#[test]
fn test_applied_transaction_persists_reasons() {
    let (tmp, base) = setup_base(DISTRO);
    let mut goal = Goal::new(&base);
    goal.add_install("app", GoalJobSettings::default());
    let mut transaction = goal.resolve().unwrap();
    transaction.set_all_states(TransactionItemState::Ok).unwrap();

    let mut state = base.state().clone();
    state.apply_transaction(&transaction);
    state.save().unwrap();

    let loaded = SystemState::load(tmp.path().join("state")).unwrap();
    assert_eq!(loaded.get_package_reason("app.x86_64"), TransactionItemReason::User);
    assert_eq!(
        loaded.get_package_reason("libapp.x86_64"),
        TransactionItemReason::Dependency
    );
    assert_eq!(
        loaded.get_package_reason("app-docs.noarch"),
        TransactionItemReason::WeakDependency
    );
    assert_eq!(loaded.get_package_from_repo("app-1.0-1.x86_64"), Some("fedora"));
}

#[test]
fn test_unexecuted_entries_are_not_recorded() {
    let (_tmp, base) = setup_base(DISTRO);
    let mut goal = Goal::new(&base);
    goal.add_install("foo", GoalJobSettings::default());
    let transaction = goal.resolve().unwrap();

    let mut state = base.state().clone();
    state.apply_transaction(&transaction);
    assert_eq!(state.get_package_reason("foo.x86_64"), TransactionItemReason::Unknown);
}

#[test]
fn test_applied_group_install_records_group() {
    const SNAPSHOT: &str = r#"
        [[repo]]
        id = "fedora"

        [[repo.packages]]
        name = "htop"
        evr = "3.3.0-1"
        arch = "x86_64"

        [[group]]
        id = "admin-tools"
        packages = [{ name = "htop", type = "mandatory" }]
    "#;
    let (tmp, base) = setup_base(SNAPSHOT);
    let mut goal = Goal::new(&base);
    goal.add_group_install("admin-tools", GoalJobSettings::default());
    let mut transaction = goal.resolve().unwrap();
    transaction.set_all_states(TransactionItemState::Ok).unwrap();

    let mut state = base.state().clone();
    state.apply_transaction(&transaction);
    state.save().unwrap();

    let loaded = SystemState::load(tmp.path().join("state")).unwrap();
    let group = loaded.get_group_state("admin-tools").unwrap();
    assert!(group.userinstalled);
    assert_eq!(group.packages, vec!["htop".to_string()]);
    assert_eq!(loaded.get_package_reason("htop.x86_64"), TransactionItemReason::Group);
}

#[test]
fn test_state_round_trip_on_disk() {
    let (tmp, _base) = setup_base_with(DISTRO, |_| {}, |_| {});
    let dir = tmp.path().join("saved");
    let mut state = SystemState::new(dir.clone());
    state.set_package_reason("bash.x86_64", TransactionItemReason::User);
    state.set_group_state(
        "core",
        GroupState {
            userinstalled: false,
            packages: vec!["bash".to_string()],
            package_types: PackageType::MANDATORY | PackageType::DEFAULT,
        },
    );
    state.save().unwrap();

    let loaded = SystemState::load(dir).unwrap();
    assert_eq!(loaded, state);
}

#[test]
fn test_missing_state_directory_loads_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let state = SystemState::load(tmp.path().join("nowhere")).unwrap();
    assert!(state.package_states().is_empty());
    assert!(state.group_states().is_empty());
}

#[test]
fn test_replay_remove_of_other_installed_version() {
    let (tmp, base) = setup_base(DISTRO);
    let path = tmp.path().join("remove-old-glibc.json");
    fs::write(
        &path,
        r#"{
            "version": "1.0",
            "rpms": [
                {"nevra": "glibc-0:2.38-1.x86_64", "action": "Remove", "reason": "User", "repo_id": "@System"}
            ]
        }"#,
    )
    .unwrap();

    let mut goal = Goal::new(&base);
    goal.add_serialized_transaction(&path, GoalJobSettings::default())
        .unwrap();
    let transaction = goal.resolve().unwrap();
    assert!(transaction.is_empty());
    assert!(
        transaction
            .get_problems()
            .contains(GoalProblem::INSTALLED_IN_DIFFERENT_VERSION)
    );
    assert_eq!(
        logs_with(&transaction, GoalProblem::INSTALLED_IN_DIFFERENT_VERSION),
        vec!["Packages for argument 'glibc-0:2.38-1.x86_64' installed and available, but in a different version."]
    );

    let mut goal = Goal::new(&base);
    let mut settings = GoalJobSettings::default();
    settings.ignore_installed = true;
    goal.add_serialized_transaction(&path, settings).unwrap();
    let transaction = goal.resolve().unwrap();
    assert!(transaction.get_problems().is_empty());
    assert_eq!(logs_with(&transaction, GoalProblem::INSTALLED_IN_DIFFERENT_VERSION).len(), 1);
}
