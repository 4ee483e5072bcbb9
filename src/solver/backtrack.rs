// src/solver/backtrack.rs

//! Bundled oracle: depth-first search with backtracking
//!
//! Every job becomes one or more choice points, each an ordered list of
//! alternatives (install this candidate, keep the installed version, ...).
//! The search applies one alternative per choice point and repairs
//! dependency violations (unsatisfied requires, conflicts, obsoletes) as
//! they appear, backtracking to the next alternative when a branch cannot
//! be repaired.
//!
//! Pruning keeps unsatisfiable input cheap:
//!
//! - packages whose requirements can never be met are found once, up
//!   front, together with the rules explaining why;
//! - the violation with the fewest remaining repairs is fixed first;
//! - a repair whose result holds a violation nothing can fix is dropped
//!   before descending into it.
//!
//! All jobs are first solved together. When that fails, jobs are admitted
//! one at a time (alone on top of the admitted ones, then jointly with them
//! from the initial state) so that every failing job is reported with the
//! rules collected while trying it.
//!
//! A package that leaves the installed set inside a branch is never
//! reinstalled in that branch, which bounds the search depth by the pool
//! size. Each search is bounded by the step limit; a job that runs out of
//! steps fails like any other.

use super::{
    same_slot, JobKind, Pool, RawProblem, Request, SkippedJob, Solution, SolverJob, SolverOracle,
    SolverOutcome,
};
use crate::error::Result;
use crate::problems::{ProblemRule, ProblemRules};
use crate::sack::PackageId;
use crate::transaction::TransactionItemReason;
use crate::version::Reldep;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Default bound on search steps
pub const DEFAULT_STEP_LIMIT: usize = 100_000;

/// Backtracking dependency solver
#[derive(Debug, Clone)]
pub struct BacktrackSolver {
    step_limit: usize,
}

impl BacktrackSolver {
    pub fn new(step_limit: usize) -> Self {
        Self {
            step_limit: step_limit.max(1),
        }
    }

    pub fn step_limit(&self) -> usize {
        self.step_limit
    }
}

impl Default for BacktrackSolver {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_LIMIT)
    }
}

impl SolverOracle for BacktrackSolver {
    fn solve(&self, pool: &Pool<'_>, request: &Request) -> Result<SolverOutcome> {
        let mut search = Search::new(pool, request, self.step_limit);
        Ok(search.run())
    }
}

/// Partial solution along one search branch
#[derive(Debug, Clone)]
struct Assignment {
    installed: BTreeSet<PackageId>,
    /// Chosen by a job; repairs may not move these
    pinned: BTreeSet<PackageId>,
    /// Left the installed set in this branch or erased by a job
    forbidden: BTreeSet<PackageId>,
    reasons: BTreeMap<PackageId, TransactionItemReason>,
    /// Initially installed package -> packages that took its place
    replaced: BTreeMap<PackageId, BTreeSet<PackageId>>,
    /// Removed initially installed packages and why
    erased: BTreeMap<PackageId, TransactionItemReason>,
    /// Erased by a job asking for clean-deps
    clean_roots: BTreeSet<PackageId>,
}

impl Assignment {
    fn new(installed: BTreeSet<PackageId>) -> Self {
        Self {
            installed,
            pinned: BTreeSet::new(),
            forbidden: BTreeSet::new(),
            reasons: BTreeMap::new(),
            replaced: BTreeMap::new(),
            erased: BTreeMap::new(),
            clean_roots: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone)]
enum Alternative {
    Install {
        id: PackageId,
        pin: bool,
        reason: Option<TransactionItemReason>,
    },
    Erase {
        ids: Vec<PackageId>,
        reason: TransactionItemReason,
        clean: bool,
    },
    Obsolete {
        old: PackageId,
        by: PackageId,
    },
    Keep,
}

#[derive(Debug, Clone)]
struct Choice {
    alternatives: Vec<Alternative>,
    /// Reported when every alternative fails
    failure: Option<ProblemRule>,
}

struct JobPlan {
    choices: Vec<Choice>,
    /// First rule of the problem reported when the job fails
    rule: Option<ProblemRule>,
}

/// A broken dependency; `dep` indexes the package's dependency list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Violation {
    Requires {
        pkg: PackageId,
        dep: usize,
    },
    Conflict {
        pkg: PackageId,
        dep: usize,
        other: PackageId,
    },
    Obsoletes {
        pkg: PackageId,
        dep: usize,
        other: PackageId,
    },
}

/// The repairs of one violation, already applied
struct Repair {
    branches: Vec<Assignment>,
    /// Rules of repairs dropped because they lead nowhere
    rejected: Vec<ProblemRule>,
    /// Reported when no branch works
    rules: Vec<ProblemRule>,
}

/// The current search ran out of steps
#[derive(Debug)]
struct StepLimit;

type Step<T> = std::result::Result<T, StepLimit>;

struct Search<'p, 'a> {
    pool: &'p Pool<'a>,
    request: &'p Request,
    step_limit: usize,
    steps: usize,
    budget_end: usize,
    allow_erasing: bool,
    /// Violations already present before the solve; not ours to fix
    baseline: BTreeSet<Violation>,
    /// Available packages whose requirements can never be met
    uninstallable: BTreeMap<PackageId, Vec<ProblemRule>>,
    /// Candidates of install jobs; preferred when several packages
    /// provide a dependency
    requested: BTreeSet<PackageId>,
    heads: Vec<ProblemRule>,
    notes: Vec<ProblemRule>,
}

impl<'p, 'a> Search<'p, 'a> {
    fn new(pool: &'p Pool<'a>, request: &'p Request, step_limit: usize) -> Self {
        let requested = request
            .jobs
            .iter()
            .filter(|job| matches!(job.kind, JobKind::Install))
            .flat_map(|job| job.packages.iter().copied())
            .collect();
        let mut search = Self {
            pool,
            request,
            step_limit,
            steps: 0,
            budget_end: step_limit,
            allow_erasing: request.allow_erasing,
            baseline: BTreeSet::new(),
            uninstallable: uninstallable(pool),
            requested,
            heads: Vec::new(),
            notes: Vec::new(),
        };
        let initial = Assignment::new(pool.installed().clone());
        let mut baseline = BTreeSet::new();
        search.scan(&initial, &mut |violation| {
            baseline.insert(violation);
            false
        });
        if !baseline.is_empty() {
            debug!("{} dependency problems already present on the system", baseline.len());
        }
        if !search.uninstallable.is_empty() {
            debug!("{} packages can never be installed", search.uninstallable.len());
        }
        search.baseline = baseline;
        search
    }

    fn run(&mut self) -> SolverOutcome {
        let request = self.request;
        let initial = Assignment::new(self.pool.installed().clone());
        let plans: Vec<JobPlan> = request.jobs.iter().map(|job| self.plan(job)).collect();

        let all: Vec<Choice> = plans
            .iter()
            .flat_map(|plan| plan.choices.iter().cloned())
            .collect();
        self.start_budget();
        let joint = self.search(initial.clone(), &all, 0).ok().flatten();

        let (mut current, skipped) = match joint {
            Some(solved) => (solved, Vec::new()),
            None => {
                debug!("Jobs cannot be solved together, admitting them one at a time");
                match self.admit(&initial, plans) {
                    Ok(admitted) => admitted,
                    Err(failed) => return SolverOutcome::Unsolvable(failed),
                }
            }
        };

        if request.install_weak_deps {
            current = self.add_weak_deps(current);
        }
        let current = self.limit_installonly(current);
        let current = self.clean_deps(current);
        debug!("Solved in {} steps", self.steps);
        SolverOutcome::Solved(self.solution(current, skipped))
    }

    /// Admit jobs one at a time; failing strict jobs are returned as
    /// problems, failing non-strict jobs are skipped
    fn admit(
        &mut self,
        initial: &Assignment,
        plans: Vec<JobPlan>,
    ) -> std::result::Result<(Assignment, Vec<SkippedJob>), Vec<RawProblem>> {
        let request = self.request;
        let mut current = initial.clone();
        let mut accepted: Vec<Choice> = Vec::new();
        let mut failed: Vec<RawProblem> = Vec::new();
        let mut skipped: Vec<SkippedJob> = Vec::new();

        for (index, (job, plan)) in request.jobs.iter().zip(plans).enumerate() {
            self.heads.clear();
            self.notes.clear();

            self.start_budget();
            let mut found = self.search(current.clone(), &plan.choices, 0);
            if matches!(found, Ok(None)) && !accepted.is_empty() {
                let mut joint = accepted.clone();
                joint.extend(plan.choices.iter().cloned());
                self.start_budget();
                found = self.search(initial.clone(), &joint, 0);
            }

            match found {
                Ok(Some(solved)) => {
                    current = solved;
                    accepted.extend(plan.choices);
                }
                found => {
                    let mut problem: RawProblem = plan
                        .rule
                        .into_iter()
                        .chain(self.heads.drain(..))
                        .chain(self.notes.drain(..))
                        .collect();
                    if found.is_err() {
                        debug!("Job {} exceeded the limit of {} search steps", index, self.step_limit);
                        problem.push((ProblemRules::RulePkg, Vec::new()));
                    }
                    if job.strict {
                        debug!("Job {} cannot be satisfied", index);
                        failed.push(problem);
                    } else {
                        debug!("Skipping job {} with broken dependencies", index);
                        skipped.push(SkippedJob {
                            job: index,
                            problem,
                        });
                    }
                }
            }
        }

        if failed.is_empty() {
            Ok((current, skipped))
        } else {
            Err(failed)
        }
    }

    fn start_budget(&mut self) {
        self.budget_end = self.steps + self.step_limit;
    }

    fn tick(&mut self) -> Step<()> {
        self.steps += 1;
        if self.steps > self.budget_end {
            return Err(StepLimit);
        }
        Ok(())
    }

    fn search(&mut self, a: Assignment, choices: &[Choice], next: usize) -> Step<Option<Assignment>> {
        self.tick()?;

        if let Some(repair) = self.next_repair(&a) {
            self.note(repair.rejected);
            for branch in repair.branches {
                if let Some(done) = self.search(branch, choices, next)? {
                    return Ok(Some(done));
                }
            }
            self.note(repair.rules);
            return Ok(None);
        }

        let Some(choice) = choices.get(next) else {
            return Ok(Some(a));
        };
        for alternative in &choice.alternatives {
            let mut branch = a.clone();
            if let Err(rules) = self.apply(&mut branch, alternative) {
                self.note(rules);
                continue;
            }
            if let Some(done) = self.search(branch, choices, next + 1)? {
                return Ok(Some(done));
            }
        }
        if let Some(rule) = &choice.failure
            && !self.heads.contains(rule)
        {
            self.heads.push(rule.clone());
        }
        Ok(None)
    }

    fn note(&mut self, rules: Vec<ProblemRule>) {
        for rule in rules {
            if !self.notes.contains(&rule) {
                self.notes.push(rule);
            }
        }
    }

    // Job planning

    fn plan(&self, job: &SolverJob) -> JobPlan {
        let pool = self.pool;
        let initial = pool.installed();
        let packages: Vec<PackageId> = job
            .packages
            .iter()
            .copied()
            .filter(|id| pool.is_considered(*id))
            .collect();

        match job.kind {
            JobKind::Install => {
                let mut candidates = packages;
                pool.sort_candidates(&mut candidates);
                // An available copy of an installed installonly version
                // stands for the installed one
                for candidate in candidates.iter_mut() {
                    if pool.is_installonly(*candidate)
                        && let Some(twin) = pool.installed_twin(*candidate)
                    {
                        *candidate = twin;
                    }
                }
                candidates.dedup();
                let all = candidates.len();
                if job.best {
                    candidates = self.newest_per_name(candidates);
                }
                let filtered = job.best && candidates.len() < all;
                // Already installed candidates satisfy the job as they are;
                // installonly candidates keep newest first
                candidates.sort_by_key(|id| !initial.contains(id) || pool.is_installonly(*id));
                let alternatives = candidates
                    .into_iter()
                    .map(|id| Alternative::Install {
                        id,
                        pin: true,
                        reason: Some(job.reason),
                    })
                    .collect();
                let rule = if filtered {
                    (ProblemRules::RuleBest2, Vec::new())
                } else {
                    (ProblemRules::RuleJob, Vec::new())
                };
                JobPlan {
                    choices: vec![Choice {
                        alternatives,
                        failure: None,
                    }],
                    rule: Some(rule),
                }
            }
            JobKind::Erase { clean_deps } => {
                let ids: Vec<PackageId> = packages
                    .into_iter()
                    .filter(|id| initial.contains(id))
                    .collect();
                JobPlan {
                    choices: vec![Choice {
                        alternatives: vec![Alternative::Erase {
                            ids,
                            reason: job.reason,
                            clean: clean_deps,
                        }],
                        failure: None,
                    }],
                    rule: Some((ProblemRules::RuleJob, Vec::new())),
                }
            }
            JobKind::Update | JobKind::DistroSync | JobKind::Downgrade | JobKind::Reinstall => {
                let selected: BTreeSet<PackageId> = packages.iter().copied().collect();
                let choices = packages
                    .iter()
                    .copied()
                    .filter(|id| initial.contains(id))
                    .filter_map(|target| self.target_choice(job, target, &selected))
                    .collect();
                let rule = match job.kind {
                    JobKind::Update | JobKind::DistroSync => None,
                    _ => Some((ProblemRules::RuleJob, Vec::new())),
                };
                JobPlan { choices, rule }
            }
        }
    }

    /// Choice point moving one installed package; `None` when there is
    /// nothing to move it to
    fn target_choice(
        &self,
        job: &SolverJob,
        target: PackageId,
        selected: &BTreeSet<PackageId>,
    ) -> Option<Choice> {
        let pool = self.pool;
        let current = pool.package(target);
        let installonly = pool.is_installonly(target);
        // Installonly versions sit side by side; only the newest one moves
        if installonly
            && pool.installed().iter().any(|other| {
                let pkg = pool.package(*other);
                pkg.name == current.name && same_slot(&pkg.arch, &current.arch) && pkg.evr > current.evr
            })
            && !matches!(job.kind, JobKind::Reinstall)
        {
            return None;
        }
        let same_name: Vec<PackageId> = pool
            .slot_candidates(target)
            .into_iter()
            .filter(|id| selected.contains(id))
            .collect();
        let evr_cmp = |id: &PackageId| pool.package(*id).evr.cmp(&current.evr);

        let mut candidates: Vec<PackageId> = match job.kind {
            JobKind::Update => {
                let newer: Vec<PackageId> = same_name
                    .into_iter()
                    .filter(|id| evr_cmp(id) == Ordering::Greater)
                    .collect();
                if !newer.is_empty() {
                    if job.best {
                        self.newest_per_name(newer)
                    } else {
                        newer
                    }
                } else if self.request.obsoletes {
                    pool.obsoleters(target)
                } else {
                    Vec::new()
                }
            }
            JobKind::DistroSync => {
                let top = *same_name.first()?;
                if evr_cmp(&top) == Ordering::Equal {
                    return None;
                }
                self.newest_per_name(same_name)
            }
            JobKind::Downgrade => {
                let older: Vec<PackageId> = same_name
                    .into_iter()
                    .filter(|id| evr_cmp(id) == Ordering::Less)
                    .filter(|id| !installonly || pool.installed_twin(*id).is_none())
                    .collect();
                if job.best {
                    self.newest_per_name(older)
                } else {
                    older
                }
            }
            JobKind::Reinstall => same_name
                .into_iter()
                .filter(|id| evr_cmp(id) == Ordering::Equal)
                .collect(),
            JobKind::Install | JobKind::Erase { .. } => Vec::new(),
        };
        candidates.dedup();
        if candidates.is_empty() {
            return None;
        }

        let mut alternatives: Vec<Alternative> = candidates
            .into_iter()
            .map(|id| Alternative::Install {
                id,
                pin: true,
                reason: None,
            })
            .collect();
        let updating = matches!(job.kind, JobKind::Update | JobKind::DistroSync);
        if updating && !job.best {
            alternatives.push(Alternative::Keep);
        }
        let failure = updating.then(|| (ProblemRules::RuleBest1, vec![current.nevra()]));
        Some(Choice {
            alternatives,
            failure,
        })
    }

    /// Keep only the highest version of each name, preserving order
    fn newest_per_name(&self, ids: Vec<PackageId>) -> Vec<PackageId> {
        let pool = self.pool;
        let mut newest: BTreeMap<&str, &crate::version::Evr> = BTreeMap::new();
        for id in &ids {
            let pkg = pool.package(*id);
            let entry = newest.entry(pkg.name.as_str()).or_insert(&pkg.evr);
            if pkg.evr > **entry {
                *entry = &pkg.evr;
            }
        }
        ids.into_iter()
            .filter(|id| {
                let pkg = pool.package(*id);
                newest
                    .get(pkg.name.as_str())
                    .is_some_and(|evr| pkg.evr.cmp(evr) == Ordering::Equal)
            })
            .collect()
    }

    // Applying decisions

    fn apply(&self, a: &mut Assignment, alternative: &Alternative) -> std::result::Result<(), Vec<ProblemRule>> {
        match alternative {
            Alternative::Keep => Ok(()),
            Alternative::Install { id, pin, reason } => self.install(a, *id, *pin, *reason),
            Alternative::Erase { ids, reason, clean } => {
                if ids.iter().any(|id| a.pinned.contains(id)) {
                    return Err(Vec::new());
                }
                for id in ids {
                    if a.installed.remove(id) {
                        a.erased.insert(*id, *reason);
                        if *clean {
                            a.clean_roots.insert(*id);
                        }
                    }
                    a.forbidden.insert(*id);
                    if !self.pool.is_installonly(*id) {
                        a.forbidden.extend(self.pool.slot_candidates(*id));
                    }
                }
                Ok(())
            }
            Alternative::Obsolete { old, by } => {
                if a.pinned.contains(old) {
                    return Err(Vec::new());
                }
                a.installed.remove(old);
                a.forbidden.insert(*old);
                a.replaced.entry(*old).or_default().insert(*by);
                Ok(())
            }
        }
    }

    /// Put `id` into the installed set, displacing whatever holds its slot
    fn install(
        &self,
        a: &mut Assignment,
        id: PackageId,
        pin: bool,
        reason: Option<TransactionItemReason>,
    ) -> std::result::Result<(), Vec<ProblemRule>> {
        if a.forbidden.contains(&id) {
            return Err(Vec::new());
        }
        let pool = self.pool;
        if !a.installed.contains(&id) {
            if let Some(rules) = self.uninstallable.get(&id) {
                return Err(rules.clone());
            }
            let occupants: Vec<PackageId> = a
                .installed
                .iter()
                .copied()
                .filter(|o| pool.same_slot(*o, id))
                .collect();
            if let Some(held) = occupants.iter().find(|o| a.pinned.contains(o)) {
                return Err(vec![(
                    ProblemRules::RulePkgSameName,
                    vec![pool.package(*held).nevra(), pool.package(id).nevra()],
                )]);
            }

            let mut inherited = None;
            for occupant in occupants {
                a.installed.remove(&occupant);
                a.forbidden.insert(occupant);
                if pool.installed().contains(&occupant) {
                    a.replaced.entry(occupant).or_default().insert(id);
                } else {
                    for by in a.replaced.values_mut() {
                        if by.remove(&occupant) {
                            by.insert(id);
                        }
                    }
                    inherited = inherited.max(a.reasons.remove(&occupant));
                }
            }
            a.installed.insert(id);
            if let Some(r) = inherited {
                a.reasons.insert(id, r);
            }
        }
        if pin {
            a.pinned.insert(id);
        }
        if let Some(r) = reason {
            let entry = a.reasons.entry(id).or_default();
            *entry = (*entry).max(r);
        }
        Ok(())
    }

    /// Whether `id` could be added without touching a pinned package or
    /// downgrading against the configuration
    fn installable(&self, a: &Assignment, id: PackageId) -> bool {
        if a.forbidden.contains(&id)
            || a.installed.contains(&id)
            || self.uninstallable.contains_key(&id)
        {
            return false;
        }
        let pool = self.pool;
        let pkg = pool.package(id);
        a.installed
            .iter()
            .filter(|o| pool.same_slot(**o, id))
            .all(|o| {
                !a.pinned.contains(o)
                    && (self.request.allow_downgrade || pkg.evr >= pool.package(*o).evr)
            })
    }

    // Dependency checking

    fn satisfied(&self, a: &Assignment, dep: &Reldep) -> bool {
        self.pool
            .whatprovides(dep)
            .iter()
            .any(|id| a.installed.contains(id))
    }

    /// Visit every violation of `a` until `visit` returns true
    fn scan(&self, a: &Assignment, visit: &mut dyn FnMut(Violation) -> bool) {
        let pool = self.pool;
        let initial = pool.installed();
        for &id in &a.installed {
            let pkg = pool.package(id);
            for (dep, req) in pkg.requires.iter().enumerate() {
                if !self.satisfied(a, req) && visit(Violation::Requires { pkg: id, dep }) {
                    return;
                }
            }
            for (dep, conflict) in pkg.conflicts.iter().enumerate() {
                for other in pool.whatprovides(conflict) {
                    if a.installed.contains(&other)
                        && visit(Violation::Conflict { pkg: id, dep, other })
                    {
                        return;
                    }
                }
            }
            if self.request.obsoletes && !initial.contains(&id) {
                for (dep, obsolete) in pkg.obsoletes.iter().enumerate() {
                    for other in pool.obsoleted_by_dep(obsolete) {
                        if other != id
                            && initial.contains(&other)
                            && a.installed.contains(&other)
                            && pool.package(other).name != pkg.name
                            && visit(Violation::Obsoletes { pkg: id, dep, other })
                        {
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Repairs of the violation with the fewest ways out; `None` when
    /// nothing new is broken
    fn next_repair(&self, a: &Assignment) -> Option<Repair> {
        let mut violations = Vec::new();
        self.scan(a, &mut |violation| {
            if !self.baseline.contains(&violation) {
                violations.push(violation);
            }
            false
        });

        for violation in &violations {
            let (alternatives, rules) = self.repairs(a, *violation);
            if alternatives.is_empty() {
                return Some(Repair {
                    branches: Vec::new(),
                    rejected: Vec::new(),
                    rules,
                });
            }
        }
        let mut best: Option<Repair> = None;
        for violation in violations {
            let repair = self.repair(a, violation);
            if repair.branches.is_empty() {
                return Some(repair);
            }
            if best
                .as_ref()
                .is_none_or(|b| repair.branches.len() < b.branches.len())
            {
                best = Some(repair);
            }
        }
        best
    }

    /// Apply every repair of `violation`, dropping those that leave a
    /// violation nothing can fix
    fn repair(&self, a: &Assignment, violation: Violation) -> Repair {
        let (alternatives, rules) = self.repairs(a, violation);
        let mut branches = Vec::new();
        let mut rejected: Vec<ProblemRule> = Vec::new();
        for alternative in &alternatives {
            let mut branch = a.clone();
            match self
                .apply(&mut branch, alternative)
                .and_then(|()| self.dead_end(&branch))
            {
                Ok(()) => branches.push(branch),
                Err(found) => {
                    for rule in found {
                        if !rejected.contains(&rule) {
                            rejected.push(rule);
                        }
                    }
                }
            }
        }
        Repair {
            branches,
            rejected,
            rules,
        }
    }

    /// Fails with the rules of the first violation of `a` that has no repair
    fn dead_end(&self, a: &Assignment) -> std::result::Result<(), Vec<ProblemRule>> {
        let mut stuck = None;
        self.scan(a, &mut |violation| {
            if self.baseline.contains(&violation) {
                return false;
            }
            let (alternatives, rules) = self.repairs(a, violation);
            if alternatives.is_empty() {
                stuck = Some(rules);
                return true;
            }
            false
        });
        match stuck {
            Some(rules) => Err(rules),
            None => Ok(()),
        }
    }

    /// Ways to fix a violation, best first, and the rules reported when
    /// none works
    fn repairs(&self, a: &Assignment, violation: Violation) -> (Vec<Alternative>, Vec<ProblemRule>) {
        let pool = self.pool;
        let initial = pool.installed();
        match violation {
            Violation::Requires { pkg, dep } => {
                let package = pool.package(pkg);
                let req = &package.requires[dep];
                let providers = pool.whatprovides(req);
                let mut candidates: Vec<PackageId> = providers
                    .iter()
                    .copied()
                    .filter(|id| self.installable(a, *id))
                    .collect();
                self.sort_providers(req, &mut candidates);

                let mut alternatives: Vec<Alternative> = candidates
                    .into_iter()
                    .map(|id| Alternative::Install {
                        id,
                        pin: false,
                        reason: Some(TransactionItemReason::Dependency),
                    })
                    .collect();
                alternatives.extend(self.evictions(a, pkg, |_| true));

                let mut rules = if providers.is_empty() {
                    let mut rules = vec![(
                        ProblemRules::RulePkgNothingProvidesDep,
                        vec![req.to_string(), package.nevra()],
                    )];
                    rules.extend(pool.not_installable_rules(req));
                    rules
                } else if initial.contains(&pkg) {
                    vec![(
                        ProblemRules::RulePkgInstalledRequires,
                        vec![req.to_string(), package.nevra()],
                    )]
                } else {
                    vec![(
                        ProblemRules::RulePkgRequires,
                        vec![req.to_string(), package.nevra()],
                    )]
                };
                for provider in &providers {
                    for rule in self.uninstallable.get(provider).into_iter().flatten() {
                        if !rules.contains(rule) {
                            rules.push(rule.clone());
                        }
                    }
                }
                (alternatives, rules)
            }
            Violation::Conflict { pkg, dep, other } => {
                let package = pool.package(pkg);
                let conflict = &package.conflicts[dep];
                if pkg == other {
                    return (
                        Vec::new(),
                        vec![(
                            ProblemRules::RulePkgSelfConflict,
                            vec![conflict.to_string(), package.nevra()],
                        )],
                    );
                }
                let other_pkg = pool.package(other);
                let mut alternatives =
                    self.evictions(a, other, |id| !pool.package(id).provides_dep(conflict));
                alternatives.extend(self.evictions(a, pkg, |id| {
                    !pool
                        .package(id)
                        .conflicts
                        .iter()
                        .any(|d| other_pkg.provides_dep(d))
                }));
                let kind = if initial.contains(&pkg) {
                    ProblemRules::RulePkgInstalledConflicts
                } else {
                    ProblemRules::RulePkgConflicts
                };
                (
                    alternatives,
                    vec![(
                        kind,
                        vec![package.nevra(), conflict.to_string(), other_pkg.nevra()],
                    )],
                )
            }
            Violation::Obsoletes { pkg, dep, other } => {
                let package = pool.package(pkg);
                let obsolete = &package.obsoletes[dep];
                let alternatives = if a.pinned.contains(&other) {
                    Vec::new()
                } else {
                    vec![Alternative::Obsolete { old: other, by: pkg }]
                };
                (
                    alternatives,
                    vec![(
                        ProblemRules::RulePkgObsoletes,
                        vec![
                            package.nevra(),
                            obsolete.to_string(),
                            pool.package(other).nevra(),
                        ],
                    )],
                )
            }
        }
    }

    /// Ways to move an unpinned, initially installed package out of the
    /// way: a newer version accepted by `accept`, or removal when erasing
    /// is allowed. Installonly packages can only be removed.
    fn evictions(&self, a: &Assignment, id: PackageId, accept: impl Fn(PackageId) -> bool) -> Vec<Alternative> {
        let pool = self.pool;
        if a.pinned.contains(&id) || !pool.installed().contains(&id) {
            return Vec::new();
        }
        let current = pool.package(id);
        let mut out: Vec<Alternative> = Vec::new();
        if !pool.is_installonly(id) {
            out.extend(
                pool.slot_candidates(id)
                    .into_iter()
                    .filter(|c| pool.package(*c).evr > current.evr)
                    .filter(|c| self.installable(a, *c) || a.installed.contains(c))
                    .filter(|c| accept(*c))
                    .map(|c| Alternative::Install {
                        id: c,
                        pin: false,
                        reason: None,
                    }),
            );
        }
        if self.allow_erasing {
            out.push(Alternative::Erase {
                ids: vec![id],
                reason: TransactionItemReason::Dependency,
                clean: false,
            });
        }
        out
    }

    /// Provider preference: packages some install job asks for, then
    /// providers named like the dependency, then by name, newest version,
    /// best architecture
    fn sort_providers(&self, dep: &Reldep, ids: &mut [PackageId]) {
        let pool = self.pool;
        ids.sort_by_key(|id| {
            let pkg = pool.package(*id);
            (
                !self.requested.contains(id),
                pkg.name != dep.name,
                pkg.name.as_str(),
                Reverse(&pkg.evr),
                pool.arch_rank(&pkg.arch),
                pkg.repo_id.as_str(),
                *id,
            )
        });
    }

    // Post passes

    /// Pull in recommended packages of newly installed ones where that
    /// breaks nothing
    fn add_weak_deps(&mut self, mut a: Assignment) -> Assignment {
        let pool = self.pool;
        let initial = pool.installed();
        let allow_erasing = self.allow_erasing;
        self.allow_erasing = false;
        let mut visited: BTreeSet<(PackageId, usize)> = BTreeSet::new();
        self.start_budget();

        'pass: loop {
            let pending: Vec<(PackageId, usize)> = a
                .installed
                .iter()
                .copied()
                .filter(|id| !initial.contains(id))
                .flat_map(|id| (0..pool.package(id).recommends.len()).map(move |i| (id, i)))
                .filter(|key| !visited.contains(key))
                .collect();
            if pending.is_empty() {
                break;
            }

            for (id, index) in pending {
                visited.insert((id, index));
                if !a.installed.contains(&id) {
                    continue;
                }
                let dep = &pool.package(id).recommends[index];
                if self.satisfied(&a, dep) {
                    continue;
                }
                let mut candidates: Vec<PackageId> = pool
                    .whatprovides(dep)
                    .into_iter()
                    .filter(|c| self.installable(&a, *c))
                    .collect();
                self.sort_providers(dep, &mut candidates);
                for candidate in candidates {
                    let mut branch = a.clone();
                    if self
                        .install(
                            &mut branch,
                            candidate,
                            false,
                            Some(TransactionItemReason::WeakDependency),
                        )
                        .is_err()
                    {
                        continue;
                    }
                    match self.search(branch, &[], 0) {
                        Ok(Some(solved)) => {
                            a = solved;
                            break;
                        }
                        Ok(None) => {}
                        Err(StepLimit) => {
                            debug!("Weak dependencies left out after {} search steps", self.step_limit);
                            break 'pass;
                        }
                    }
                }
            }
        }

        self.allow_erasing = allow_erasing;
        self.heads.clear();
        self.notes.clear();
        a
    }

    /// Remove the oldest installed versions of installonly packages above
    /// the configured limit; keeps everything when that breaks something
    fn limit_installonly(&mut self, a: Assignment) -> Assignment {
        let limit = self.request.installonly_limit as usize;
        if limit == 0 {
            return a;
        }
        let pool = self.pool;
        let initial = pool.installed();

        let mut by_name: BTreeMap<&str, Vec<PackageId>> = BTreeMap::new();
        for &id in &a.installed {
            if pool.is_installonly(id) {
                by_name.entry(pool.package(id).name.as_str()).or_default().push(id);
            }
        }
        let mut surplus: Vec<PackageId> = Vec::new();
        for ids in by_name.into_values() {
            if ids.len() <= limit {
                continue;
            }
            let mut ids = ids;
            // New versions first, then installed ones newest first
            ids.sort_by_key(|id| (initial.contains(id), Reverse(&pool.package(*id).evr), *id));
            surplus.extend(
                ids.into_iter()
                    .skip(limit)
                    .filter(|id| initial.contains(id) && !a.pinned.contains(id)),
            );
        }
        if surplus.is_empty() {
            return a;
        }

        let mut limited = a.clone();
        for id in &surplus {
            debug!("Removing {} above the installonly limit of {}", pool.package(*id), limit);
            limited.installed.remove(id);
            limited.forbidden.insert(*id);
            limited.erased.insert(*id, TransactionItemReason::Unknown);
        }
        let allow_erasing = self.allow_erasing;
        self.allow_erasing = false;
        self.start_budget();
        let found = self.search(limited, &[], 0);
        self.allow_erasing = allow_erasing;
        self.heads.clear();
        self.notes.clear();
        match found {
            Ok(Some(limited)) => limited,
            _ => {
                debug!("Keeping installonly packages above the limit, removing them breaks dependencies");
                a
            }
        }
    }

    /// Remove dependencies of clean-deps erasures nothing else needs
    fn clean_deps(&self, mut a: Assignment) -> Assignment {
        if a.clean_roots.is_empty() {
            return a;
        }
        let pool = self.pool;
        let initial = pool.installed();

        let mut candidates: BTreeSet<PackageId> = BTreeSet::new();
        let mut queue: Vec<PackageId> = a.clean_roots.iter().copied().collect();
        while let Some(id) = queue.pop() {
            let pkg = pool.package(id);
            for dep in pkg.requires.iter().chain(pkg.recommends.iter()) {
                for provider in pool.whatprovides(dep) {
                    if a.installed.contains(&provider)
                        && initial.contains(&provider)
                        && candidates.insert(provider)
                    {
                        queue.push(provider);
                    }
                }
            }
        }
        candidates.retain(|id| {
            !self.request.user_installed.contains(id)
                && !a.pinned.contains(id)
                && !a.reasons.contains_key(id)
        });

        loop {
            let mut keep: BTreeSet<PackageId> = BTreeSet::new();
            for id in a.installed.iter().filter(|id| !candidates.contains(id)) {
                let pkg = pool.package(*id);
                for dep in pkg.requires.iter().chain(pkg.recommends.iter()) {
                    let providers: Vec<PackageId> = pool
                        .whatprovides(dep)
                        .into_iter()
                        .filter(|p| a.installed.contains(p))
                        .collect();
                    if !providers.is_empty() && providers.iter().all(|p| candidates.contains(p)) {
                        keep.extend(providers);
                    }
                }
            }
            if keep.is_empty() {
                break;
            }
            candidates.retain(|id| !keep.contains(id));
        }

        for id in candidates {
            debug!("Removing unneeded dependency {}", pool.package(id));
            a.installed.remove(&id);
            a.forbidden.insert(id);
            a.erased.insert(id, TransactionItemReason::Clean);
        }
        a
    }

    fn solution(&self, a: Assignment, skipped: Vec<SkippedJob>) -> Solution {
        let pool = self.pool;
        let initial = pool.installed();
        let mut solution = Solution {
            skipped,
            ..Default::default()
        };

        for &id in a.installed.difference(initial) {
            let pkg = pool.package(id);
            let same_name = a
                .replaced
                .iter()
                .filter(|(_, by)| by.contains(&id))
                .map(|(old, _)| pool.package(*old))
                .find(|old| old.name == pkg.name);
            match same_name.map(|old| pkg.evr.cmp(&old.evr)) {
                Some(Ordering::Greater) => solution.upgrades.push(id),
                Some(Ordering::Less) => solution.downgrades.push(id),
                Some(Ordering::Equal) => solution.reinstalls.push(id),
                None => solution.installs.push(id),
            }
        }

        for &id in initial.difference(&a.installed) {
            let by: Vec<PackageId> = a
                .replaced
                .get(&id)
                .map(|by| by.iter().copied().filter(|b| a.installed.contains(b)).collect())
                .unwrap_or_default();
            if by.is_empty() {
                solution.removes.push(id);
                let reason = a
                    .erased
                    .get(&id)
                    .copied()
                    .unwrap_or(TransactionItemReason::Dependency);
                solution.reasons.insert(id, reason);
            } else {
                solution.replaced.insert(id, by);
            }
        }

        for (id, reason) in &a.reasons {
            if a.installed.contains(id) {
                solution.reasons.insert(*id, *reason);
            }
        }
        solution.installed = a.installed;
        solution
    }
}

/// Available packages with a requirement no installable package provides,
/// and the rules explaining it
///
/// Installed packages always count as installable, so a requirement they
/// provide is never reported here.
fn uninstallable(pool: &Pool<'_>) -> BTreeMap<PackageId, Vec<ProblemRule>> {
    let initial = pool.installed();
    let mut found: BTreeMap<PackageId, Vec<ProblemRule>> = BTreeMap::new();
    loop {
        let mut changed = false;
        for id in pool.considered() {
            if initial.contains(&id) || found.contains_key(&id) {
                continue;
            }
            let pkg = pool.package(id);
            for req in &pkg.requires {
                let providers = pool.whatprovides(req);
                if providers.iter().any(|p| !found.contains_key(p)) {
                    continue;
                }
                let rules = if providers.is_empty() {
                    let mut rules = vec![(
                        ProblemRules::RulePkgNothingProvidesDep,
                        vec![req.to_string(), pkg.nevra()],
                    )];
                    rules.extend(pool.not_installable_rules(req));
                    rules
                } else {
                    let mut rules = vec![(
                        ProblemRules::RulePkgRequires,
                        vec![req.to_string(), pkg.nevra()],
                    )];
                    for rule in providers.iter().filter_map(|p| found.get(p)).flatten() {
                        if !rules.contains(rule) {
                            rules.push(rule.clone());
                        }
                    }
                    rules
                };
                found.insert(id, rules);
                changed = true;
                break;
            }
        }
        if !changed {
            return found;
        }
    }
}
