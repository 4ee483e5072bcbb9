// tests/common/mod.rs

//! Shared test utilities and fixtures for integration tests.

#![allow(dead_code)]

use rpmgoal::{
    Base, ConfigMain, GoalProblem, Snapshot, SystemState, Transaction,
};
use tempfile::TempDir;

/// A small distribution: glibc installed, an application with a library
/// and a weak dependency, and a package with a missing dependency.
pub const DISTRO: &str = r#"
    [[installed]]
    name = "glibc"
    evr = "2.39-1"
    arch = "x86_64"
    provides = ["libc.so.6"]

    [[repo]]
    id = "fedora"

    [[repo.packages]]
    name = "glibc"
    evr = "2.39-1"
    arch = "x86_64"
    provides = ["libc.so.6"]

    [[repo.packages]]
    name = "app"
    evr = "1.0-1"
    arch = "x86_64"
    requires = ["libapp >= 1", "libc.so.6"]
    recommends = ["app-docs"]

    [[repo.packages]]
    name = "app-docs"
    evr = "1.0-1"
    arch = "noarch"

    [[repo.packages]]
    name = "libapp"
    evr = "1.2-1"
    arch = "x86_64"
    requires = ["libc.so.6"]

    [[repo.packages]]
    name = "foo"
    evr = "1.0-1"
    arch = "x86_64"

    [[repo.packages]]
    name = "foo"
    evr = "1.0-1"
    arch = "src"

    [[repo.packages]]
    name = "srconly"
    evr = "1.0-1"
    arch = "src"

    [[repo.packages]]
    name = "broken"
    evr = "1.0-1"
    arch = "x86_64"
    requires = ["missing-lib"]
"#;

/// Base over `snapshot` with default configuration and an empty state
///
/// Returns (TempDir, Base) - keep the TempDir alive to prevent cleanup.
pub fn setup_base(snapshot: &str) -> (TempDir, Base) {
    setup_base_with(snapshot, |_| {}, |_| {})
}

/// Base over `snapshot`, after adjusting the configuration and seeding the
/// system state
pub fn setup_base_with(
    snapshot: &str,
    configure: impl FnOnce(&mut ConfigMain),
    seed: impl FnOnce(&mut SystemState),
) -> (TempDir, Base) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = ConfigMain::default();
    config.state_dir = temp_dir.path().join("state");
    configure(&mut config);

    let mut state = SystemState::new(config.state_dir.clone());
    seed(&mut state);

    let mut base = Base::new(config);
    base.load_snapshot(Snapshot::parse(snapshot).unwrap()).unwrap();
    base.set_state(state).unwrap();
    base.setup().unwrap();
    (temp_dir, base)
}

/// Transaction packages as "Action nevra Reason" lines, in order
pub fn entries(transaction: &Transaction) -> Vec<String> {
    transaction
        .get_transaction_packages()
        .iter()
        .map(|pkg| format!("{} {} {}", pkg.action(), pkg.nevra(), pkg.reason()))
        .collect()
}

/// Resolve logs that carry `problem`
pub fn logs_with(transaction: &Transaction, problem: GoalProblem) -> Vec<String> {
    transaction
        .get_resolve_logs()
        .iter()
        .filter(|event| event.problem() == problem)
        .map(|event| event.to_string())
        .collect()
}
