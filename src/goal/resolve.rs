// src/goal/resolve.rs

//! Resolution of a goal's queued jobs
//!
//! Module jobs run first against a copy of the module states; if they
//! change anything the package universe is re-filtered. Every other job
//! is then turned into solver jobs (or diagnostics when its spec does not
//! resolve), the solver runs once, and the solution is assembled into the
//! transaction.

use super::{CompsJob, Goal, GoalAction, GoalJobSettings, PackageJob, ReasonChangeJob};
use crate::base::Base;
use crate::comps::{Group, GroupPackageType, PackageType};
use crate::config::ConfigMain;
use crate::error::Result;
use crate::module::{ModuleMatch, ModuleState, ModuleStatus};
use crate::problems::{GoalProblem, LogEvent, ProblemRules, Severity, SolverProblems};
use crate::sack::{Package, PackageId, PackageSack, ResolveSpecSettings};
use crate::solver::{
    same_slot, BacktrackSolver, JobKind, Pool, Request, Solution, SolverJob, SolverOracle,
    SolverOutcome,
};
use crate::transaction::{
    ReplayDocument, Transaction, TransactionAssembler, TransactionEnvironment, TransactionGroup,
    TransactionItemAction, TransactionItemReason, TransactionItemType, TransactionModule,
};
use crate::version::{Nevra, NevraForm, Reldep};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

pub(super) fn run(goal: &mut Goal<'_>) -> Result<Transaction> {
    let base = goal.base;
    let mut transaction = Transaction::new();

    let mut modules = ModuleChanges::new(base.state().module_states().clone());
    if let Some((document, _)) = &goal.serialized {
        modules.replay(document);
    }
    for job in &mut goal.module_jobs {
        modules.add_job(base, job.action, &job.spec, &mut job.settings, &mut transaction)?;
    }

    let filtered: PackageSack;
    let sack = if modules.changed {
        let mut sack = base.sack().clone();
        sack.apply_modular_filter(&base.modules().filtered_nevras(&modules.states));
        filtered = sack;
        &filtered
    } else {
        base.sack()
    };

    let mut resolver = Resolver::new(base, sack, transaction);
    if let Some((document, settings)) = &mut goal.serialized {
        resolver.add_replay(document, settings)?;
    }
    for job in &mut goal.rpm_jobs {
        resolver.add_package_job(job)?;
    }
    for job in &mut goal.comps_jobs {
        resolver.add_comps_job(job)?;
    }
    for job in &mut goal.reason_change_jobs {
        resolver.add_reason_change_job(job)?;
    }
    resolver.solve(goal.allow_erasing, modules.entries)
}

fn record(transaction: &mut Transaction, event: LogEvent) {
    debug!(
        "Recorded {} ({:?}) for '{}'",
        event.problem(),
        event.severity(),
        event.spec().unwrap_or("")
    );
    transaction.add_resolve_log(event);
}

fn unavailable_severity(skip_unavailable: bool) -> Severity {
    if skip_unavailable {
        Severity::Warning
    } else {
        Severity::Error
    }
}

fn module_event(
    action: GoalAction,
    problem: GoalProblem,
    data: BTreeSet<String>,
    settings: &GoalJobSettings,
    spec: &str,
    severity: Severity,
) -> LogEvent {
    LogEvent::new(
        action,
        problem,
        data,
        Some(settings.clone()),
        TransactionItemType::Module,
        spec,
        severity,
    )
}

/// Module state changes made by one resolve
struct ModuleChanges {
    states: BTreeMap<String, ModuleStatus>,
    entries: Vec<TransactionModule>,
    changed: bool,
}

impl ModuleChanges {
    fn new(states: BTreeMap<String, ModuleStatus>) -> Self {
        Self {
            states,
            entries: Vec::new(),
            changed: false,
        }
    }

    fn set(&mut self, name: &str, stream: &str, action: TransactionItemAction, reason: TransactionItemReason) {
        match action {
            TransactionItemAction::Enable => {
                self.states.insert(
                    name.to_string(),
                    ModuleStatus {
                        enabled_stream: stream.to_string(),
                        state: ModuleState::Enabled,
                    },
                );
            }
            TransactionItemAction::Disable => {
                self.states.insert(
                    name.to_string(),
                    ModuleStatus {
                        enabled_stream: stream.to_string(),
                        state: ModuleState::Disabled,
                    },
                );
            }
            TransactionItemAction::Reset => {
                self.states.remove(name);
            }
            _ => return,
        }
        self.entries
            .push(TransactionModule::new(name, stream, action, reason));
        self.changed = true;
    }

    fn replay(&mut self, document: &ReplayDocument) {
        for module in &document.modules {
            self.set(&module.name, &module.stream, module.action, module.reason);
        }
    }

    fn add_job(
        &mut self,
        base: &Base,
        action: GoalAction,
        spec: &str,
        settings: &mut GoalJobSettings,
        transaction: &mut Transaction,
    ) -> Result<()> {
        let severity = unavailable_severity(settings.resolve_skip_unavailable(base.config())?);
        let reason = TransactionItemReason::User;

        if action == GoalAction::Enable {
            match base.modules().resolve_spec(spec, &self.states) {
                Err(e) => record(
                    transaction,
                    module_event(
                        action,
                        GoalProblem::MALFORMED,
                        BTreeSet::from([e.to_string()]),
                        settings,
                        spec,
                        Severity::Error,
                    ),
                ),
                Ok(ModuleMatch::NotFound) => record(
                    transaction,
                    module_event(action, GoalProblem::NOT_FOUND, BTreeSet::new(), settings, spec, severity),
                ),
                Ok(ModuleMatch::MultipleStreams(streams)) => record(
                    transaction,
                    module_event(
                        action,
                        GoalProblem::MULTIPLE_STREAMS,
                        streams.iter().map(|s| s.full_identifier()).collect(),
                        settings,
                        spec,
                        Severity::Error,
                    ),
                ),
                Ok(ModuleMatch::Stream(stream)) => {
                    let current = self
                        .states
                        .get(&stream.name)
                        .filter(|st| st.state == ModuleState::Enabled)
                        .map(|st| st.enabled_stream.clone());
                    match current {
                        Some(enabled) if enabled == stream.stream => record(
                            transaction,
                            module_event(
                                action,
                                GoalProblem::ALREADY_INSTALLED,
                                BTreeSet::from([stream.full_identifier()]),
                                settings,
                                spec,
                                Severity::Warning,
                            ),
                        ),
                        Some(enabled) => record(
                            transaction,
                            module_event(
                                action,
                                GoalProblem::MODULE_CANNOT_SWITCH_STREAMS,
                                BTreeSet::from([format!("0:{}", enabled), format!("1:{}", stream.stream)]),
                                settings,
                                &stream.name,
                                Severity::Error,
                            ),
                        ),
                        None => self.set(&stream.name, &stream.stream, TransactionItemAction::Enable, reason),
                    }
                }
            }
            return Ok(());
        }

        let name = spec.split_once(':').map_or(spec, |(name, _)| name);
        if name.is_empty() {
            record(
                transaction,
                module_event(
                    action,
                    GoalProblem::MALFORMED,
                    BTreeSet::from([format!("invalid module spec '{}'", spec)]),
                    settings,
                    spec,
                    Severity::Error,
                ),
            );
            return Ok(());
        }
        let known = base.modules().streams_of(name).next().is_some() || self.states.contains_key(name);
        if !known {
            record(
                transaction,
                module_event(action, GoalProblem::NOT_FOUND, BTreeSet::new(), settings, spec, severity),
            );
            return Ok(());
        }

        let current = self.states.get(name).cloned();
        match action {
            GoalAction::Disable => {
                if current.as_ref().is_some_and(|st| st.state == ModuleState::Disabled) {
                    debug!("Module {} is already disabled", name);
                } else {
                    let stream = current.map(|st| st.enabled_stream).unwrap_or_default();
                    self.set(name, &stream, TransactionItemAction::Disable, reason);
                }
            }
            GoalAction::Reset => match current {
                Some(st) => self.set(name, &st.enabled_stream, TransactionItemAction::Reset, reason),
                None => debug!("Module {} has no state to reset", name),
            },
            _ => record(
                transaction,
                module_event(
                    action,
                    GoalProblem::UNSUPPORTED_ACTION,
                    BTreeSet::new(),
                    settings,
                    spec,
                    Severity::Error,
                ),
            ),
        }
        Ok(())
    }
}

/// Checks run on a replayed transaction after solving
struct ReplayCheck {
    /// NEVRAs the stored transaction mentions
    expected: BTreeSet<String>,
    ignore_extras: bool,
}

/// Accumulates solver jobs and diagnostics for one resolve
struct Resolver<'r> {
    base: &'r Base,
    cfg: &'r ConfigMain,
    sack: &'r PackageSack,
    arches: Vec<&'r str>,
    transaction: Transaction,
    solver_jobs: Vec<SolverJob>,
    /// Spec each solver job came from
    job_specs: Vec<String>,
    reason_changes: Vec<(PackageId, TransactionItemReason, Option<String>)>,
    overrides: BTreeMap<String, TransactionItemReason>,
    replay: Option<ReplayCheck>,
    groups: Vec<TransactionGroup>,
    environments: Vec<TransactionEnvironment>,
    /// Package names some job asks to install
    installing: BTreeSet<String>,
    /// Package name -> group whose install pulls it in
    group_members: BTreeMap<String, String>,
    removing_groups: BTreeSet<String>,
    removing_environments: BTreeSet<String>,
}

impl<'r> Resolver<'r> {
    fn new(base: &'r Base, sack: &'r PackageSack, transaction: Transaction) -> Self {
        let cfg = base.config();
        Self {
            base,
            cfg,
            sack,
            arches: cfg.compatible_arches(),
            transaction,
            solver_jobs: Vec::new(),
            job_specs: Vec::new(),
            reason_changes: Vec::new(),
            overrides: BTreeMap::new(),
            replay: None,
            groups: Vec::new(),
            environments: Vec::new(),
            installing: BTreeSet::new(),
            group_members: BTreeMap::new(),
            removing_groups: BTreeSet::new(),
            removing_environments: BTreeSet::new(),
        }
    }

    fn record(&mut self, event: LogEvent) {
        record(&mut self.transaction, event);
    }

    #[allow(clippy::too_many_arguments)]
    fn log(
        &mut self,
        action: GoalAction,
        problem: GoalProblem,
        data: BTreeSet<String>,
        settings: &GoalJobSettings,
        spec_type: TransactionItemType,
        spec: &str,
        severity: Severity,
    ) {
        self.record(LogEvent::new(
            action,
            problem,
            data,
            Some(settings.clone()),
            spec_type,
            spec,
            severity,
        ));
    }

    fn push_job(&mut self, job: SolverJob, spec: &str) {
        self.solver_jobs.push(job);
        self.job_specs.push(spec.to_string());
    }

    fn is_compatible(&self, pkg: &Package) -> bool {
        pkg.is_installed() || self.arches.contains(&pkg.arch.as_str())
    }

    // Package jobs

    fn add_package_job(&mut self, job: &mut PackageJob) -> Result<()> {
        let spec = job.spec.as_str();
        let settings = &mut job.settings;
        match job.action {
            GoalAction::Install => self.add_install(spec, settings),
            GoalAction::Remove => self.add_remove(spec, settings),
            GoalAction::Upgrade => self.add_update_like(GoalAction::Upgrade, JobKind::Update, spec, settings),
            GoalAction::DistroSync => {
                self.add_update_like(GoalAction::DistroSync, JobKind::DistroSync, spec, settings)
            }
            GoalAction::Downgrade => {
                self.add_update_like(GoalAction::Downgrade, JobKind::Downgrade, spec, settings)
            }
            GoalAction::Reinstall => {
                self.add_update_like(GoalAction::Reinstall, JobKind::Reinstall, spec, settings)
            }
            GoalAction::UpgradeAll => self.add_all(JobKind::Update, spec, settings),
            GoalAction::DistroSyncAll => self.add_all(JobKind::DistroSync, spec, settings),
            other => {
                self.log(
                    other,
                    GoalProblem::UNSUPPORTED_ACTION,
                    BTreeSet::new(),
                    settings,
                    TransactionItemType::Package,
                    spec,
                    Severity::Error,
                );
                Ok(())
            }
        }
    }

    /// Explain why `spec` matched nothing usable
    fn report_no_match(
        &mut self,
        action: GoalAction,
        spec: &str,
        settings: &GoalJobSettings,
        severity: Severity,
    ) {
        let sack = self.sack;
        let spec_settings = settings.resolve_spec_settings();
        let everything = sack.query_ignore_excludes();
        let (all, _) = everything.resolve_pkg_spec(spec, &spec_settings);
        let package = TransactionItemType::Package;

        if all.is_empty() {
            self.log(action, GoalProblem::NOT_FOUND, BTreeSet::new(), settings, package, spec, severity);
            if !spec_settings.ignore_case {
                let icase = ResolveSpecSettings {
                    ignore_case: true,
                    ..spec_settings
                };
                let (hits, _) = everything.resolve_pkg_spec(spec, &icase);
                if let Some(hint) = hits.sorted().first() {
                    self.log(
                        action,
                        GoalProblem::HINT_ICASE,
                        BTreeSet::from([hint.name.clone()]),
                        settings,
                        package,
                        spec,
                        Severity::Warning,
                    );
                }
            }
            let mut hints = sack.query();
            if action.is_removal() {
                hints = hints.filter_installed();
            }
            let alternatives: BTreeSet<String> = hints
                .filter_provides(&Reldep::unversioned(format!("alternative-for({})", spec)))
                .iter()
                .map(|p| p.name.clone())
                .collect();
            if !alternatives.is_empty() {
                self.log(
                    action,
                    GoalProblem::HINT_ALTERNATIVES,
                    alternatives,
                    settings,
                    package,
                    spec,
                    Severity::Warning,
                );
            }
            return;
        }

        let visible = all.retain(|p| sack.is_visible(p.id));
        let problem = if visible.is_empty() {
            GoalProblem::EXCLUDED
        } else if visible.clone().filter_not_source().is_empty() {
            GoalProblem::ONLY_SRC
        } else if !settings.to_repo_ids.is_empty() {
            GoalProblem::NOT_FOUND_IN_REPOSITORIES
        } else {
            GoalProblem::NOT_FOUND
        };
        self.log(action, problem, BTreeSet::new(), settings, package, spec, severity);
    }

    fn add_install(&mut self, spec: &str, settings: &mut GoalJobSettings) -> Result<()> {
        let cfg = self.cfg;
        let sack = self.sack;
        let strict = settings.resolve_strict(cfg)?;
        let best = settings.resolve_best(cfg)?;
        let severity = unavailable_severity(settings.resolve_skip_unavailable(cfg)?);

        let (matched, via_provides) = sack
            .query()
            .resolve_pkg_spec(spec, &settings.resolve_spec_settings());
        let mut candidates = matched
            .filter_not_source()
            .retain(|p| self.is_compatible(p));
        if candidates.is_empty() {
            self.report_no_match(GoalAction::Install, spec, settings, severity);
            return Ok(());
        }
        if !settings.to_repo_ids.is_empty() {
            let in_repos = candidates
                .clone()
                .filter_available()
                .filter_repo_ids(&settings.to_repo_ids);
            if in_repos.is_empty() {
                self.log(
                    GoalAction::Install,
                    GoalProblem::NOT_FOUND_IN_REPOSITORIES,
                    BTreeSet::new(),
                    settings,
                    TransactionItemType::Package,
                    spec,
                    severity,
                );
                return Ok(());
            }
            candidates = candidates.filter_installed().union(&in_repos);
        }

        let action = if via_provides {
            GoalAction::InstallViaProvide
        } else {
            GoalAction::Install
        };
        for installed in candidates.iter().filter(|p| p.is_installed()) {
            let newer = candidates.iter().any(|p| {
                !p.is_installed()
                    && p.name == installed.name
                    && same_slot(&p.arch, &installed.arch)
                    && p.evr > installed.evr
            });
            // A newer installonly version goes in beside the installed one
            let beside = newer && installed.is_installonly(&cfg.installonlypkgs);
            if (!best && !beside) || !newer {
                self.log(
                    action,
                    GoalProblem::ALREADY_INSTALLED,
                    BTreeSet::from([installed.nevra()]),
                    settings,
                    TransactionItemType::Package,
                    spec,
                    Severity::Warning,
                );
            }
        }

        let mut per_name: BTreeMap<&str, Vec<PackageId>> = BTreeMap::new();
        for pkg in candidates.iter() {
            let key = if via_provides { "" } else { pkg.name.as_str() };
            per_name.entry(key).or_default().push(pkg.id);
            self.installing.insert(pkg.name.clone());
        }
        for ids in per_name.into_values() {
            let job = SolverJob::new(JobKind::Install, ids)
                .with_strict(strict)
                .with_best(best)
                .with_reason(TransactionItemReason::User);
            self.push_job(job, spec);
        }
        Ok(())
    }

    /// Report a spec that matched no installed package
    fn report_not_installed(
        &mut self,
        action: GoalAction,
        spec: &str,
        settings: &GoalJobSettings,
        severity: Severity,
    ) {
        let sack = self.sack;
        let spec_settings = settings.resolve_spec_settings();
        let (matched, _) = sack.query_ignore_excludes().resolve_pkg_spec(spec, &spec_settings);
        if matched.is_empty() {
            self.log(
                action,
                GoalProblem::NOT_FOUND,
                BTreeSet::new(),
                settings,
                TransactionItemType::Package,
                spec,
                severity,
            );
            return;
        }
        let names: BTreeSet<&str> = matched.iter().map(|p| p.name.as_str()).collect();
        let other_arch = !sack
            .query()
            .filter_installed()
            .retain(|p| names.contains(p.name.as_str()))
            .is_empty();
        let problem = if other_arch {
            GoalProblem::NOT_INSTALLED_FOR_ARCHITECTURE
        } else {
            GoalProblem::NOT_INSTALLED
        };
        self.log(
            action,
            problem,
            BTreeSet::new(),
            settings,
            TransactionItemType::Package,
            spec,
            severity,
        );
    }

    fn add_remove(&mut self, spec: &str, settings: &mut GoalJobSettings) -> Result<()> {
        let cfg = self.cfg;
        let strict = settings.resolve_strict(cfg)?;
        let clean_deps = settings.resolve_clean_requirements_on_remove(cfg)?;
        let severity = unavailable_severity(settings.resolve_skip_unavailable(cfg)?);

        let (installed, _) = self
            .sack
            .query()
            .filter_installed()
            .resolve_pkg_spec(spec, &settings.resolve_spec_settings());
        if installed.is_empty() {
            self.report_not_installed(GoalAction::Remove, spec, settings, severity);
            return Ok(());
        }
        let ids: Vec<PackageId> = installed.ids().iter().copied().collect();
        let job = SolverJob::new(JobKind::Erase { clean_deps }, ids).with_strict(strict);
        self.push_job(job, spec);
        Ok(())
    }

    fn add_update_like(
        &mut self,
        action: GoalAction,
        kind: JobKind,
        spec: &str,
        settings: &mut GoalJobSettings,
    ) -> Result<()> {
        let cfg = self.cfg;
        let sack = self.sack;
        let strict = settings.resolve_strict(cfg)?;
        let best = settings.resolve_best(cfg)?;
        let severity = unavailable_severity(settings.resolve_skip_unavailable(cfg)?);

        let (matched, _) = sack
            .query()
            .resolve_pkg_spec(spec, &settings.resolve_spec_settings());
        let matched = matched.filter_not_source();
        if matched.is_empty() {
            self.report_no_match(action, spec, settings, severity);
            return Ok(());
        }

        let mut targets: Vec<&Package> = matched.iter().filter(|p| p.is_installed()).collect();
        if targets.is_empty() {
            // The spec named available versions: act on the installed
            // packages occupying their slots
            targets = sack
                .query()
                .filter_installed()
                .retain(|p| {
                    matched
                        .iter()
                        .any(|m| m.name == p.name && same_slot(&m.arch, &p.arch))
                })
                .sorted();
        }
        if targets.is_empty() {
            self.report_not_installed(action, spec, settings, severity);
            return Ok(());
        }

        let mut available = matched
            .clone()
            .filter_available()
            .retain(|p| self.is_compatible(p));
        if !settings.to_repo_ids.is_empty() {
            available = available.filter_repo_ids(&settings.to_repo_ids);
        }
        let counterparts = |target: &Package, wanted: Option<Ordering>| {
            available.iter().any(|p| {
                p.name == target.name
                    && same_slot(&p.arch, &target.arch)
                    && wanted.is_none_or(|ord| p.evr.cmp(&target.evr) == ord)
            })
        };

        let mut kept = Vec::new();
        let mut missing = Vec::new();
        for target in targets {
            let ok = match kind {
                JobKind::Downgrade => counterparts(target, Some(Ordering::Less)),
                JobKind::Reinstall => counterparts(target, Some(Ordering::Equal)),
                _ => true,
            };
            if ok {
                kept.push(target.id);
            } else {
                missing.push(target);
            }
        }
        for target in missing {
            let (problem, data) = match kind {
                JobKind::Downgrade => (
                    GoalProblem::INSTALLED_LOWEST_VERSION,
                    BTreeSet::from([target.name.clone()]),
                ),
                JobKind::Reinstall if counterparts(target, None) => (
                    GoalProblem::INSTALLED_IN_DIFFERENT_VERSION,
                    available
                        .clone()
                        .filter_na(&target.name, &target.arch)
                        .iter()
                        .map(|p| p.nevra())
                        .collect(),
                ),
                _ => (GoalProblem::NOT_AVAILABLE, BTreeSet::new()),
            };
            self.log(action, problem, data, settings, TransactionItemType::Package, spec, severity);
        }
        if kept.is_empty() {
            return Ok(());
        }

        kept.extend(available.ids().iter().copied());
        let job = SolverJob::new(kind, kept).with_strict(strict).with_best(best);
        self.push_job(job, spec);
        Ok(())
    }

    fn add_all(&mut self, kind: JobKind, spec: &str, settings: &mut GoalJobSettings) -> Result<()> {
        let cfg = self.cfg;
        let strict = settings.resolve_strict(cfg)?;
        let best = settings.resolve_best(cfg)?;
        let mut query = self.sack.query().filter_not_source();
        if !settings.to_repo_ids.is_empty() {
            let installed = query.clone().filter_installed();
            query = query.filter_repo_ids(&settings.to_repo_ids).union(&installed);
        }
        let ids: Vec<PackageId> = query.ids().iter().copied().collect();
        let job = SolverJob::new(kind, ids).with_strict(strict).with_best(best);
        self.push_job(job, spec);
        Ok(())
    }

    fn add_reason_change_job(&mut self, job: &mut ReasonChangeJob) -> Result<()> {
        let state = self.base.state();
        let settings = &mut job.settings;
        let severity = unavailable_severity(settings.resolve_skip_unavailable(self.cfg)?);

        let (installed, _) = self
            .sack
            .query()
            .filter_installed()
            .resolve_pkg_spec(&job.spec, &settings.resolve_spec_settings());
        if installed.is_empty() {
            self.report_not_installed(GoalAction::ReasonChange, &job.spec, settings, severity);
            return Ok(());
        }
        for pkg in installed.sorted() {
            if state.get_installed_reason(&pkg.na()) == job.reason {
                self.log(
                    GoalAction::ReasonChange,
                    GoalProblem::ALREADY_INSTALLED,
                    BTreeSet::from([job.reason.to_string()]),
                    settings,
                    TransactionItemType::Package,
                    &pkg.nevra(),
                    Severity::Warning,
                );
            } else {
                self.reason_changes
                    .push((pkg.id, job.reason, job.group_id.clone()));
            }
        }
        Ok(())
    }

    // Groups and environments

    fn add_comps_job(&mut self, job: &mut CompsJob) -> Result<()> {
        let cfg = self.cfg;
        let settings = &mut job.settings;
        let severity = unavailable_severity(settings.resolve_skip_unavailable(cfg)?);
        let spec = job.spec.as_str();

        match (job.spec_type, job.action) {
            (TransactionItemType::Group, GoalAction::Install) => {
                let strict = settings.resolve_strict(cfg)?;
                let best = settings.resolve_best(cfg)?;
                let types = settings.resolve_group_package_types(cfg)?;
                let groups = match self.base.comps().query_groups(spec) {
                    Ok(groups) => groups,
                    Err(e) => {
                        self.malformed(job.action, job.spec_type, spec, settings, &e.to_string());
                        return Ok(());
                    }
                };
                if groups.is_empty() {
                    self.log(
                        job.action,
                        GoalProblem::NOT_FOUND,
                        BTreeSet::new(),
                        settings,
                        job.spec_type,
                        spec,
                        severity,
                    );
                }
                for group in groups {
                    if self.group_installed(&group.id) {
                        self.log(
                            job.action,
                            GoalProblem::ALREADY_INSTALLED,
                            BTreeSet::from([group.id.clone()]),
                            settings,
                            job.spec_type,
                            spec,
                            Severity::Warning,
                        );
                        continue;
                    }
                    let install = GroupInstall {
                        reason: TransactionItemReason::User,
                        types,
                        strict,
                        best,
                        severity,
                    };
                    self.install_group(group, &install, settings);
                }
            }
            (TransactionItemType::Group, GoalAction::Remove) => {
                let strict = settings.resolve_strict(cfg)?;
                let clean_deps = settings.resolve_clean_requirements_on_remove(cfg)?;
                let Some(ids) = self.installed_comps_ids(job.spec_type, spec, settings) else {
                    return Ok(());
                };
                if ids.is_empty() {
                    self.log(
                        job.action,
                        GoalProblem::NOT_FOUND,
                        BTreeSet::new(),
                        settings,
                        job.spec_type,
                        spec,
                        severity,
                    );
                }
                for id in ids {
                    if self.removing_groups.insert(id.clone()) {
                        self.remove_group(&id, strict, clean_deps);
                    }
                }
            }
            (TransactionItemType::Environment, GoalAction::Install) => {
                let strict = settings.resolve_strict(cfg)?;
                let best = settings.resolve_best(cfg)?;
                let types = settings.resolve_group_package_types(cfg)?;
                let environments = match self.base.comps().query_environments(spec) {
                    Ok(environments) => environments,
                    Err(e) => {
                        self.malformed(job.action, job.spec_type, spec, settings, &e.to_string());
                        return Ok(());
                    }
                };
                if environments.is_empty() {
                    self.log(
                        job.action,
                        GoalProblem::NOT_FOUND,
                        BTreeSet::new(),
                        settings,
                        job.spec_type,
                        spec,
                        severity,
                    );
                }
                let install = GroupInstall {
                    reason: TransactionItemReason::Group,
                    types,
                    strict,
                    best,
                    severity,
                };
                for env in environments {
                    let installed = self.base.state().get_environment_state(&env.id).is_some()
                        || self.environments.iter().any(|e| e.environment_id() == env.id);
                    if installed {
                        self.log(
                            job.action,
                            GoalProblem::ALREADY_INSTALLED,
                            BTreeSet::from([env.id.clone()]),
                            settings,
                            job.spec_type,
                            spec,
                            Severity::Warning,
                        );
                        continue;
                    }
                    let mut groups = Vec::new();
                    for group_id in &env.groups {
                        let Some(group) = self.base.comps().group(group_id) else {
                            self.log(
                                GoalAction::InstallByComps,
                                GoalProblem::NOT_FOUND,
                                BTreeSet::new(),
                                settings,
                                TransactionItemType::Group,
                                group_id,
                                severity,
                            );
                            continue;
                        };
                        groups.push(group_id.clone());
                        if !self.group_installed(group_id) {
                            self.install_group(group, &install, settings);
                        }
                    }
                    let mut entry = TransactionEnvironment::new(
                        &env.id,
                        &env.name,
                        TransactionItemAction::Install,
                        TransactionItemReason::User,
                        false,
                    );
                    entry.set_groups(groups);
                    self.environments.push(entry);
                }
            }
            (TransactionItemType::Environment, GoalAction::Remove) => {
                let strict = settings.resolve_strict(cfg)?;
                let clean_deps = settings.resolve_clean_requirements_on_remove(cfg)?;
                let Some(ids) = self.installed_comps_ids(job.spec_type, spec, settings) else {
                    return Ok(());
                };
                if ids.is_empty() {
                    self.log(
                        job.action,
                        GoalProblem::NOT_FOUND,
                        BTreeSet::new(),
                        settings,
                        job.spec_type,
                        spec,
                        severity,
                    );
                }
                for id in ids {
                    if self.removing_environments.insert(id.clone()) {
                        self.remove_environment(&id, strict, clean_deps);
                    }
                }
            }
            (spec_type, action) => {
                self.log(
                    action,
                    GoalProblem::UNSUPPORTED_ACTION,
                    BTreeSet::new(),
                    settings,
                    spec_type,
                    spec,
                    Severity::Error,
                );
            }
        }
        Ok(())
    }

    fn malformed(
        &mut self,
        action: GoalAction,
        spec_type: TransactionItemType,
        spec: &str,
        settings: &GoalJobSettings,
        message: &str,
    ) {
        self.log(
            action,
            GoalProblem::MALFORMED,
            BTreeSet::from([message.to_string()]),
            settings,
            spec_type,
            spec,
            Severity::Error,
        );
    }

    fn group_installed(&self, group_id: &str) -> bool {
        self.base.state().get_group_state(group_id).is_some()
            || self
                .groups
                .iter()
                .any(|g| g.group_id() == group_id && g.action() == TransactionItemAction::Install)
    }

    /// Ids of installed groups or environments whose id or name matches
    /// `spec`; `None` when the spec is not a valid pattern
    fn installed_comps_ids(
        &mut self,
        spec_type: TransactionItemType,
        spec: &str,
        settings: &GoalJobSettings,
    ) -> Option<Vec<String>> {
        let pattern = match glob::Pattern::new(spec) {
            Ok(pattern) => pattern,
            Err(e) => {
                self.malformed(GoalAction::Remove, spec_type, spec, settings, &e.to_string());
                return None;
            }
        };
        let state = self.base.state();
        let comps = self.base.comps();
        let ids = if spec_type == TransactionItemType::Environment {
            state
                .environment_states()
                .keys()
                .filter(|id| {
                    pattern.matches(id)
                        || comps
                            .environment(id)
                            .is_some_and(|e| !e.name.is_empty() && pattern.matches(&e.name))
                })
                .cloned()
                .collect()
        } else {
            state
                .group_states()
                .keys()
                .filter(|id| {
                    pattern.matches(id)
                        || comps
                            .group(id)
                            .is_some_and(|g| !g.name.is_empty() && pattern.matches(&g.name))
                })
                .cloned()
                .collect()
        };
        Some(ids)
    }

    fn install_group(&mut self, group: &Group, install: &GroupInstall, settings: &GoalJobSettings) {
        let sack = self.sack;
        let mut members = Vec::new();

        for member in group.packages_of_type(install.types) {
            if member.package_type == GroupPackageType::Conditional {
                let Some(trigger) = member.requires.as_deref() else {
                    continue;
                };
                let present = self.installing.contains(trigger)
                    || !sack.query().filter_installed().filter_name(trigger).is_empty();
                if !present {
                    continue;
                }
            }

            let mandatory = member.package_type == GroupPackageType::Mandatory;
            let candidates = sack
                .query()
                .filter_name(&member.name)
                .filter_not_source()
                .retain(|p| self.is_compatible(p));
            if candidates.is_empty() {
                let severity = if mandatory {
                    install.severity
                } else {
                    Severity::Warning
                };
                self.log(
                    GoalAction::InstallByComps,
                    GoalProblem::NOT_FOUND,
                    BTreeSet::new(),
                    settings,
                    TransactionItemType::Package,
                    &member.name,
                    severity,
                );
                continue;
            }

            members.push(member.name.clone());
            self.installing.insert(member.name.clone());
            self.group_members
                .entry(member.name.clone())
                .or_insert_with(|| group.id.clone());
            let ids: Vec<PackageId> = candidates.ids().iter().copied().collect();
            let job = SolverJob::new(JobKind::Install, ids)
                .with_strict(mandatory && install.strict)
                .with_best(install.best)
                .with_reason(TransactionItemReason::Group);
            self.push_job(job, &member.name);
        }

        let mut entry = TransactionGroup::new(
            &group.id,
            &group.name,
            TransactionItemAction::Install,
            install.reason,
            install.types,
        );
        entry.set_packages(members);
        self.groups.push(entry);
    }

    fn remove_group(&mut self, group_id: &str, strict: bool, clean_deps: bool) {
        let sack = self.sack;
        let state = self.base.state();
        let Some(group_state) = state.get_group_state(group_id) else {
            return;
        };
        let kept: BTreeSet<&str> = state
            .group_states()
            .iter()
            .filter(|(id, _)| !self.removing_groups.contains(*id))
            .flat_map(|(_, g)| g.packages.iter().map(String::as_str))
            .collect();

        let mut ids = Vec::new();
        for name in &group_state.packages {
            if kept.contains(name.as_str()) {
                continue;
            }
            for pkg in sack.query().filter_installed().filter_name(name).iter() {
                if state.get_installed_reason(&pkg.na()) == TransactionItemReason::Group {
                    ids.push(pkg.id);
                }
            }
        }
        if !ids.is_empty() {
            let job = SolverJob::new(JobKind::Erase { clean_deps }, ids)
                .with_strict(strict)
                .with_reason(TransactionItemReason::Group);
            self.push_job(job, group_id);
        }

        let name = self
            .base
            .comps()
            .group(group_id)
            .map(|g| g.name.clone())
            .unwrap_or_default();
        let mut entry = TransactionGroup::new(
            group_id,
            name,
            TransactionItemAction::Remove,
            TransactionItemReason::User,
            group_state.package_types,
        );
        entry.set_packages(group_state.packages.clone());
        self.groups.push(entry);
    }

    fn remove_environment(&mut self, environment_id: &str, strict: bool, clean_deps: bool) {
        let state = self.base.state();
        let Some(env_state) = state.get_environment_state(environment_id) else {
            return;
        };
        let kept: BTreeSet<&str> = state
            .environment_states()
            .iter()
            .filter(|(id, _)| !self.removing_environments.contains(*id))
            .flat_map(|(_, e)| e.groups.iter().map(String::as_str))
            .collect();

        for group_id in &env_state.groups {
            if kept.contains(group_id.as_str()) {
                continue;
            }
            let pulled_in = state
                .get_group_state(group_id)
                .is_some_and(|g| !g.userinstalled);
            if pulled_in && self.removing_groups.insert(group_id.clone()) {
                self.remove_group(group_id, strict, clean_deps);
            }
        }

        let name = self
            .base
            .comps()
            .environment(environment_id)
            .map(|e| e.name.clone())
            .unwrap_or_default();
        let mut entry = TransactionEnvironment::new(
            environment_id,
            name,
            TransactionItemAction::Remove,
            TransactionItemReason::User,
            false,
        );
        entry.set_groups(env_state.groups.clone());
        self.environments.push(entry);
    }

    // Replay

    /// Installed packages sharing the name.arch of `nevra` in another version
    fn installed_other_versions(&self, nevra: &str) -> Vec<&'r Package> {
        let Some(parsed) = Nevra::parse(nevra, NevraForm::Nevra) else {
            return Vec::new();
        };
        self.sack
            .query()
            .filter_installed()
            .filter_na(&parsed.name, &parsed.arch)
            .retain(|p| p.nevra() != nevra && p.full_nevra() != nevra)
            .sorted()
    }

    /// Log NOT_INSTALLED for a replayed entry, or INSTALLED_IN_DIFFERENT_VERSION
    /// when its name.arch is installed in another version
    fn report_replay_not_installed(
        &mut self,
        action: GoalAction,
        nevra: &str,
        settings: &GoalJobSettings,
        severity: Severity,
    ) {
        let others = self.installed_other_versions(nevra);
        let (problem, data) = if others.is_empty() {
            (GoalProblem::NOT_INSTALLED, BTreeSet::new())
        } else {
            (
                GoalProblem::INSTALLED_IN_DIFFERENT_VERSION,
                others.iter().map(|p| p.nevra()).collect(),
            )
        };
        self.log(action, problem, data, settings, TransactionItemType::Package, nevra, severity);
    }

    fn add_replay(&mut self, document: &ReplayDocument, settings: &mut GoalJobSettings) -> Result<()> {
        let cfg = self.cfg;
        let sack = self.sack;
        let strict = settings.resolve_strict(cfg)?;
        let severity = unavailable_severity(settings.resolve_skip_unavailable(cfg)?);
        let presence_severity = if settings.ignore_installed {
            Severity::Warning
        } else {
            Severity::Error
        };
        let mut expected = BTreeSet::new();
        let mut replayed_names = BTreeSet::new();

        for rpm in &document.rpms {
            let action = match rpm.action {
                TransactionItemAction::Install => GoalAction::Install,
                TransactionItemAction::Upgrade => GoalAction::Upgrade,
                TransactionItemAction::Downgrade => GoalAction::Downgrade,
                TransactionItemAction::Reinstall => GoalAction::Reinstall,
                TransactionItemAction::Remove => GoalAction::Remove,
                TransactionItemAction::ReasonChange => GoalAction::ReasonChange,
                other => {
                    debug!("Ignoring replayed {} entry {}", other, rpm.nevra);
                    continue;
                }
            };
            expected.insert(rpm.nevra.clone());

            let matched = sack.query().filter_nevra(&BTreeSet::from([rpm.nevra.clone()]));
            let mut full_nevras = Vec::new();
            for pkg in matched.iter() {
                full_nevras.push(pkg.full_nevra());
                expected.insert(pkg.full_nevra());
                expected.insert(pkg.nevra());
                replayed_names.insert(pkg.name.clone());
            }
            let installed = matched.clone().filter_installed();
            let mut available = matched.filter_available().retain(|p| self.is_compatible(p));
            if !rpm.repo_id.is_empty() {
                let in_repo = available
                    .clone()
                    .filter_repo_ids(std::slice::from_ref(&rpm.repo_id));
                if !in_repo.is_empty() {
                    available = in_repo;
                }
            }
            let package = TransactionItemType::Package;

            match rpm.action {
                TransactionItemAction::Install
                | TransactionItemAction::Upgrade
                | TransactionItemAction::Downgrade => {
                    if let Some(pkg) = installed.iter().next() {
                        self.log(
                            action,
                            GoalProblem::ALREADY_INSTALLED,
                            BTreeSet::from([pkg.nevra()]),
                            settings,
                            package,
                            &rpm.nevra,
                            presence_severity,
                        );
                        continue;
                    }
                    if available.is_empty() {
                        self.log(action, GoalProblem::NOT_FOUND, BTreeSet::new(), settings, package, &rpm.nevra, severity);
                        continue;
                    }
                    if rpm.action == TransactionItemAction::Install {
                        // Versions the document itself removes do not count
                        let others: BTreeSet<String> = self
                            .installed_other_versions(&rpm.nevra)
                            .into_iter()
                            .filter(|p| !p.is_installonly(&cfg.installonlypkgs))
                            .filter(|p| {
                                !document.rpms.iter().any(|r| {
                                    r.action.is_outbound() && (r.nevra == p.nevra() || r.nevra == p.full_nevra())
                                })
                            })
                            .map(|p| p.nevra())
                            .collect();
                        if !others.is_empty() {
                            self.log(
                                action,
                                GoalProblem::INSTALLED_IN_DIFFERENT_VERSION,
                                others,
                                settings,
                                package,
                                &rpm.nevra,
                                presence_severity,
                            );
                        }
                    }
                    for key in &full_nevras {
                        self.overrides.insert(key.clone(), rpm.reason);
                    }
                    let job = SolverJob::new(JobKind::Install, available.ids().iter().copied().collect())
                        .with_strict(strict)
                        .with_reason(rpm.reason);
                    self.push_job(job, &rpm.nevra);
                }
                TransactionItemAction::Reinstall => {
                    if installed.is_empty() {
                        self.report_replay_not_installed(action, &rpm.nevra, settings, presence_severity);
                        continue;
                    }
                    if available.is_empty() {
                        self.log(action, GoalProblem::NOT_AVAILABLE, BTreeSet::new(), settings, package, &rpm.nevra, severity);
                        continue;
                    }
                    for key in &full_nevras {
                        self.overrides.insert(key.clone(), rpm.reason);
                    }
                    let ids = installed.union(&available).ids().iter().copied().collect();
                    let job = SolverJob::new(JobKind::Reinstall, ids).with_strict(strict);
                    self.push_job(job, &rpm.nevra);
                }
                TransactionItemAction::Remove => {
                    if installed.is_empty() {
                        self.report_replay_not_installed(action, &rpm.nevra, settings, presence_severity);
                        continue;
                    }
                    for key in &full_nevras {
                        self.overrides.insert(key.clone(), rpm.reason);
                    }
                    let job = SolverJob::new(
                        JobKind::Erase { clean_deps: false },
                        installed.ids().iter().copied().collect(),
                    )
                    .with_strict(strict)
                    .with_reason(rpm.reason);
                    self.push_job(job, &rpm.nevra);
                }
                _ => {
                    if installed.is_empty() {
                        self.report_replay_not_installed(action, &rpm.nevra, settings, presence_severity);
                        continue;
                    }
                    for pkg in installed.iter() {
                        self.reason_changes.push((pkg.id, rpm.reason, rpm.group_id.clone()));
                    }
                }
            }
        }

        self.replay_comps(document, settings, &replayed_names, severity);
        self.replay = Some(ReplayCheck {
            expected,
            ignore_extras: settings.ignore_extras,
        });
        Ok(())
    }

    fn replay_comps(
        &mut self,
        document: &ReplayDocument,
        settings: &GoalJobSettings,
        replayed_names: &BTreeSet<String>,
        severity: Severity,
    ) {
        let comps = self.base.comps();
        let state = self.base.state();

        for replay in &document.groups {
            let entry = match replay.action {
                TransactionItemAction::Remove => state.get_group_state(&replay.id).map(|installed| {
                    let mut entry = TransactionGroup::new(
                        &replay.id,
                        comps.group(&replay.id).map(|g| g.name.clone()).unwrap_or_default(),
                        replay.action,
                        replay.reason,
                        installed.package_types,
                    );
                    entry.set_packages(installed.packages.clone());
                    entry
                }),
                _ => comps.group(&replay.id).map(|group| {
                    let mut entry = TransactionGroup::new(
                        &group.id,
                        &group.name,
                        replay.action,
                        replay.reason,
                        replay.package_types,
                    );
                    entry.set_packages(
                        group
                            .packages_of_type(replay.package_types)
                            .filter(|m| replayed_names.contains(&m.name))
                            .map(|m| m.name.clone())
                            .collect(),
                    );
                    entry
                }),
            };
            match entry {
                Some(entry) => self.groups.push(entry),
                None => self.log(
                    GoalAction::from_item_action(replay.action),
                    GoalProblem::NOT_FOUND,
                    BTreeSet::new(),
                    settings,
                    TransactionItemType::Group,
                    &replay.id,
                    severity,
                ),
            }
        }

        for replay in &document.environments {
            let groups = match replay.action {
                TransactionItemAction::Remove => state
                    .get_environment_state(&replay.id)
                    .map(|installed| installed.groups.clone()),
                _ => comps.environment(&replay.id).map(|env| env.groups.clone()),
            };
            match groups {
                Some(groups) => {
                    let name = comps
                        .environment(&replay.id)
                        .map(|e| e.name.clone())
                        .unwrap_or_default();
                    let mut entry =
                        TransactionEnvironment::new(&replay.id, name, replay.action, replay.reason, false);
                    entry.set_groups(groups);
                    self.environments.push(entry);
                }
                None => self.log(
                    GoalAction::from_item_action(replay.action),
                    GoalProblem::NOT_FOUND,
                    BTreeSet::new(),
                    settings,
                    TransactionItemType::Environment,
                    &replay.id,
                    severity,
                ),
            }
        }
    }

    // Solving

    fn solve(mut self, allow_erasing: bool, modules: Vec<TransactionModule>) -> Result<Transaction> {
        let cfg = self.cfg;
        let sack = self.sack;
        let state = self.base.state();
        let pool = Pool::new(sack, &self.arches).with_installonly(&cfg.installonlypkgs);

        let user_installed = pool
            .installed()
            .iter()
            .copied()
            .filter(|id| state.get_installed_reason(&sack.package(*id).na()) >= TransactionItemReason::Group)
            .collect();
        let request = Request {
            jobs: std::mem::take(&mut self.solver_jobs),
            allow_erasing,
            allow_downgrade: cfg.allow_downgrade,
            install_weak_deps: cfg.install_weak_deps,
            obsoletes: cfg.obsoletes,
            user_installed,
            installonly_limit: cfg.installonly_limit,
        };
        info!("Resolving {} solver jobs", request.jobs.len());

        let oracle = BacktrackSolver::new(cfg.solver_step_limit);
        match oracle.solve(&pool, &request)? {
            SolverOutcome::Unsolvable(problems) => {
                info!("Resolution failed with {} problems", problems.len());
                self.record(LogEvent::from_solver(
                    GoalProblem::SOLVER_ERROR,
                    SolverProblems::new(problems),
                    Severity::Error,
                ));
            }
            SolverOutcome::Solved(solution) => {
                self.assemble(&pool, &solution, allow_erasing, modules);
            }
        }

        if self.transaction.get_problems().any() {
            self.transaction.clear_entries();
        }
        Ok(self.transaction)
    }

    fn assemble(
        &mut self,
        pool: &Pool<'_>,
        solution: &Solution,
        allow_erasing: bool,
        modules: Vec<TransactionModule>,
    ) {
        let cfg = self.cfg;
        let sack = self.sack;
        let state = self.base.state();

        if !solution.skipped.is_empty() {
            for skipped in &solution.skipped {
                info!("Skipping '{}' with broken dependencies", self.job_specs[skipped.job]);
            }
            let problems = SolverProblems::new(
                solution
                    .skipped
                    .iter()
                    .map(|skipped| skipped.problem.clone())
                    .collect(),
            );
            self.record(LogEvent::from_solver(
                GoalProblem::SOLVER_PROBLEM_STRICT_RESOLVEMENT,
                problems,
                Severity::Warning,
            ));
        }

        if !allow_erasing {
            let protected: BTreeSet<&str> = solution
                .removes
                .iter()
                .map(|id| sack.package(*id).name.as_str())
                .filter(|name| cfg.is_protected(name))
                .collect();
            if !protected.is_empty() {
                let names: Vec<&str> = protected.into_iter().collect();
                let mut problems = SolverProblems::default();
                problems.push_front(vec![(
                    ProblemRules::RulePkgRemovalOfProtected,
                    vec![names.join(", ")],
                )]);
                self.record(LogEvent::from_solver(
                    GoalProblem::REMOVAL_OF_PROTECTED,
                    problems,
                    Severity::Error,
                ));
            }
        }

        let mut assembler = TransactionAssembler::new(sack, state)
            .with_reason_overrides(std::mem::take(&mut self.overrides));
        // Kept packages a job selected with a stronger reason than recorded
        for &id in pool.installed() {
            if !solution.installed.contains(&id) {
                continue;
            }
            let wanted = solution.reason(id);
            let pkg = sack.package(id);
            if wanted >= TransactionItemReason::Group && wanted > state.get_installed_reason(&pkg.na()) {
                let group_id = if wanted == TransactionItemReason::Group {
                    self.group_members.get(&pkg.name).cloned()
                } else {
                    None
                };
                assembler.add_reason_change(id, wanted, group_id);
            }
        }
        for (id, reason, group_id) in std::mem::take(&mut self.reason_changes) {
            assembler.add_reason_change(id, reason, group_id);
        }
        let packages = assembler.assemble(solution);

        let installed_names: BTreeSet<&str> = solution
            .installed
            .iter()
            .map(|id| sack.package(*id).name.as_str())
            .collect();
        for group in &mut self.groups {
            if group.action() == TransactionItemAction::Install {
                let members = group
                    .packages()
                    .iter()
                    .filter(|name| installed_names.contains(name.as_str()))
                    .cloned()
                    .collect();
                group.set_packages(members);
            }
        }

        if let Some(check) = &self.replay {
            let severity = if check.ignore_extras {
                Severity::Warning
            } else {
                Severity::Error
            };
            let extras: Vec<LogEvent> = packages
                .iter()
                .filter(|entry| entry.action() != TransactionItemAction::Replaced)
                .filter(|entry| {
                    !check.expected.contains(&entry.full_nevra()) && !check.expected.contains(&entry.nevra())
                })
                .map(|entry| {
                    LogEvent::new(
                        GoalAction::Resolve,
                        GoalProblem::EXTRA,
                        BTreeSet::from([entry.action().to_string()]),
                        None,
                        TransactionItemType::Package,
                        entry.nevra(),
                        severity,
                    )
                })
                .collect();
            for event in extras {
                self.record(event);
            }
        }

        info!("Resolved transaction with {} package entries", packages.len());
        self.transaction.set_packages(packages);
        self.transaction.set_groups(std::mem::take(&mut self.groups));
        self.transaction
            .set_environments(std::mem::take(&mut self.environments));
        self.transaction.set_modules(modules);
    }
}

/// Settings shared by every group an install job pulls in
struct GroupInstall {
    reason: TransactionItemReason,
    types: PackageType,
    strict: bool,
    best: bool,
    severity: Severity,
}
