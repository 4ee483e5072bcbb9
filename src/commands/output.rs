// src/commands/output.rs
//! Printing transactions and resolve problems

use rpmgoal::{Severity, Transaction};

/// Print every resolve log, warnings to stdout and errors to stderr
pub fn print_problems(transaction: &Transaction) {
    for event in transaction.get_resolve_logs() {
        let message = event.to_string();
        let message = message.trim_end();
        if message.is_empty() {
            continue;
        }
        match event.severity() {
            Severity::Warning => println!("Warning: {}", message),
            Severity::Error => eprintln!("Error: {}", message),
        }
    }
}

/// Print the ordered transaction as a table
pub fn print_transaction(transaction: &Transaction) {
    let packages = transaction.get_transaction_packages();
    if !packages.is_empty() {
        println!(
            "{:30} {:8} {:24} {:12} {:14} REASON",
            "PACKAGE", "ARCH", "VERSION", "REPOSITORY", "ACTION"
        );
        println!("{}", "-".repeat(100));
        for pkg in packages {
            println!(
                "{:30} {:8} {:24} {:12} {:14} {}",
                pkg.name(),
                pkg.arch(),
                pkg.evr().to_string(),
                pkg.repo_id(),
                pkg.action().to_string(),
                pkg.reason()
            );
        }
    }

    for group in transaction.get_transaction_groups() {
        println!("Group {}: {} ({})", group.action(), group.group_id(), group.name());
        if !group.packages().is_empty() {
            println!("  packages: {}", group.packages().join(", "));
        }
    }
    for env in transaction.get_transaction_environments() {
        println!(
            "Environment {}: {} ({})",
            env.action(),
            env.environment_id(),
            env.name()
        );
        if !env.groups().is_empty() {
            println!("  groups: {}", env.groups().join(", "));
        }
    }
    for module in transaction.get_transaction_modules() {
        println!("Module {}: {}:{}", module.action(), module.name(), module.stream());
    }

    println!();
    println!("Transaction summary: {} package(s)", packages.len());
}
