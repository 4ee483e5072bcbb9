// src/commands/session.rs
//! Loading the base and running a goal to completion

use super::output::{print_problems, print_transaction};
use crate::cli::{GlobalArgs, ResolveArgs};
use anyhow::{anyhow, Context, Result};
use rpmgoal::state::lock::StateLock;
use rpmgoal::{Base, ConfigMain, Goal, Snapshot, TransactionItemState};
use tracing::{debug, info};

/// How a command ended; mapped to the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Resolution reported problems
    Problems,
    NothingToDo,
    /// Stopped by `--assumeno`
    Declined,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::Problems => 2,
            Outcome::NothingToDo => 3,
            Outcome::Declined => 4,
        }
    }
}

/// Build a set-up base from the global options
pub fn open_base(global: &GlobalArgs) -> Result<Base> {
    let mut config = ConfigMain::load(&global.config)
        .with_context(|| format!("Failed to load configuration {}", global.config.display()))?;
    if let Some(dir) = &global.state_dir {
        config.state_dir = dir.clone();
    }

    let mut base = Base::new(config);
    if let Some(path) = &global.metadata {
        let snapshot = Snapshot::load(path)
            .with_context(|| format!("Failed to load metadata {}", path.display()))?;
        base.load_snapshot(snapshot)?;
    } else {
        debug!("No metadata snapshot given, resolving against an empty universe");
    }
    base.load_state().context("Failed to load system state")?;
    base.setup()?;
    Ok(base)
}

/// Queue jobs with `queue`, resolve, print, and store or apply the result
pub fn run_goal<F>(mut base: Base, args: &ResolveArgs, queue: F) -> Result<Outcome>
where
    F: FnOnce(&mut Goal<'_>) -> Result<()>,
{
    let mut transaction = {
        let mut goal = Goal::new(&base);
        goal.set_allow_erasing(args.allow_erasing);
        queue(&mut goal)?;
        goal.resolve()?
    };

    print_problems(&transaction);
    if transaction.get_problems().any() {
        eprintln!("Failed to resolve the transaction.");
        return Ok(Outcome::Problems);
    }
    if transaction.is_empty() {
        println!("Nothing to do.");
        return Ok(Outcome::NothingToDo);
    }
    print_transaction(&transaction);

    if let Some(path) = &args.store {
        transaction
            .store(path)
            .with_context(|| format!("Failed to store transaction in {}", path.display()))?;
        println!("Transaction stored in {}", path.display());
    }
    if args.assumeno {
        println!("Operation aborted.");
        return Ok(Outcome::Declined);
    }
    if args.apply {
        let lock_path = StateLock::path_in(&base.config().state_dir);
        let _lock = StateLock::try_acquire(&lock_path)?.ok_or_else(|| {
            anyhow!("State directory is locked by another process: {}", lock_path.display())
        })?;
        transaction.set_all_states(TransactionItemState::Ok)?;
        base.state_mut().apply_transaction(&transaction);
        base.state_mut()
            .save()
            .context("Failed to save system state")?;
        info!("Recorded transaction {}", transaction.id());
        println!("Recorded transaction {}", transaction.id());
    }
    Ok(Outcome::Success)
}
