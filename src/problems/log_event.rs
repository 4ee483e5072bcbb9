// src/problems/log_event.rs

//! Diagnostic records produced during resolve

use super::{GoalProblem, SolverProblems};
use crate::goal::{GoalAction, GoalJobSettings};
use crate::transaction::TransactionItemType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Whether an event blocks the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// One diagnostic: which job, what went wrong, and the data needed to
/// render a message. Formatting happens only in `Display`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    action: GoalAction,
    problem: GoalProblem,
    additional_data: BTreeSet<String>,
    job_settings: Option<GoalJobSettings>,
    spec_type: Option<TransactionItemType>,
    spec: Option<String>,
    solver_problems: Option<SolverProblems>,
    severity: Severity,
}

impl LogEvent {
    /// Event about one job spec
    pub fn new(
        action: GoalAction,
        problem: GoalProblem,
        additional_data: BTreeSet<String>,
        job_settings: Option<GoalJobSettings>,
        spec_type: TransactionItemType,
        spec: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            action,
            problem,
            additional_data,
            job_settings,
            spec_type: Some(spec_type),
            spec: Some(spec.into()),
            solver_problems: None,
            severity,
        }
    }

    /// Event carrying solver problems (solver errors, skipped jobs,
    /// protected removals)
    pub fn from_solver(problem: GoalProblem, solver_problems: SolverProblems, severity: Severity) -> Self {
        Self {
            action: GoalAction::Resolve,
            problem,
            additional_data: BTreeSet::new(),
            job_settings: None,
            spec_type: None,
            spec: None,
            solver_problems: Some(solver_problems),
            severity,
        }
    }

    pub fn action(&self) -> GoalAction {
        self.action
    }

    pub fn problem(&self) -> GoalProblem {
        self.problem
    }

    pub fn additional_data(&self) -> &BTreeSet<String> {
        &self.additional_data
    }

    pub fn job_settings(&self) -> Option<&GoalJobSettings> {
        self.job_settings.as_ref()
    }

    pub fn spec_type(&self) -> Option<TransactionItemType> {
        self.spec_type
    }

    pub fn spec(&self) -> Option<&str> {
        self.spec.as_deref()
    }

    pub fn solver_problems(&self) -> Option<&SolverProblems> {
        self.solver_problems.as_ref()
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    fn first_data(&self) -> &str {
        self.additional_data.iter().next().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spec = self.spec.as_deref().unwrap_or("");
        let p = self.problem;

        if p == GoalProblem::SOLVER_ERROR
            || p == GoalProblem::SOLVER_PROBLEM_STRICT_RESOLVEMENT
            || p == GoalProblem::REMOVAL_OF_PROTECTED
        {
            return match &self.solver_problems {
                Some(problems) => write!(f, "{}", problems),
                None => Ok(()),
            };
        }
        if p == GoalProblem::NOT_FOUND {
            if self.action.is_removal() {
                return match self.spec_type {
                    Some(TransactionItemType::Group) => {
                        write!(f, "No groups to remove for argument: {}", spec)
                    }
                    Some(TransactionItemType::Environment) => {
                        write!(f, "No environmental groups to remove for argument: {}", spec)
                    }
                    Some(TransactionItemType::Module) => {
                        write!(f, "No modules to remove for argument: {}", spec)
                    }
                    _ => write!(f, "No packages to remove for argument: {}", spec),
                };
            }
            if self.action == GoalAction::InstallByComps {
                return if self.spec_type == Some(TransactionItemType::Group) {
                    write!(f, "No match for group from environment: {}", spec)
                } else {
                    write!(f, "No match for group package: {}", spec)
                };
            }
            return write!(f, "No match for argument: {}", spec);
        }
        if p == GoalProblem::NOT_FOUND_IN_REPOSITORIES {
            let repos: Vec<&str> = self
                .job_settings
                .as_ref()
                .map(|s| s.to_repo_ids.iter().map(String::as_str).collect())
                .unwrap_or_default();
            return write!(
                f,
                "No match for argument '{}' in repositories '{}'",
                spec,
                repos.join("', '")
            );
        }
        if p == GoalProblem::NOT_INSTALLED {
            return write!(f, "Packages for argument '{}' available, but not installed.", spec);
        }
        if p == GoalProblem::NOT_INSTALLED_FOR_ARCHITECTURE {
            return write!(
                f,
                "Packages for argument '{}' available, but installed for a different architecture.",
                spec
            );
        }
        if p == GoalProblem::ONLY_SRC {
            return write!(f, "Argument '{}' matches only source packages.", spec);
        }
        if p == GoalProblem::EXCLUDED {
            return write!(f, "Argument '{}' matches only excluded packages.", spec);
        }
        if p == GoalProblem::EXCLUDED_VERSIONLOCK {
            return write!(
                f,
                "Argument '{}' matches only packages excluded by versionlock.",
                spec
            );
        }
        if p == GoalProblem::HINT_ICASE {
            return write!(f, "  * Maybe you meant: {}", self.first_data());
        }
        if p == GoalProblem::HINT_ALTERNATIVES {
            let alternatives: Vec<&str> = self.additional_data.iter().map(String::as_str).collect();
            return write!(
                f,
                "There are following alternatives for '{}': {}",
                spec,
                alternatives.join(", ")
            );
        }
        if p == GoalProblem::INSTALLED_LOWEST_VERSION {
            return write!(
                f,
                "The lowest available version of the \"{}\" package is already installed, cannot downgrade it.",
                self.first_data()
            );
        }
        if p == GoalProblem::INSTALLED_IN_DIFFERENT_VERSION {
            return write!(
                f,
                "Packages for argument '{}' installed and available, but in a different version.",
                spec
            );
        }
        if p == GoalProblem::NOT_AVAILABLE {
            return write!(f, "Packages for argument '{}' installed, but not available.", spec);
        }
        if p == GoalProblem::ALREADY_INSTALLED {
            if self.action == GoalAction::ReasonChange {
                return write!(
                    f,
                    "Package \"{}\" is already installed with reason \"{}\".",
                    spec,
                    self.first_data()
                );
            }
            return match self.spec_type {
                Some(TransactionItemType::Group) => {
                    write!(f, "Group \"{}\" is already installed.", self.first_data())
                }
                Some(TransactionItemType::Environment) => {
                    write!(f, "Environment \"{}\" is already installed.", self.first_data())
                }
                Some(TransactionItemType::Module) => {
                    write!(f, "Module stream \"{}\" is already enabled.", self.first_data())
                }
                _ => write!(f, "Package \"{}\" is already installed.", self.first_data()),
            };
        }
        if p == GoalProblem::WRITE_DEBUG {
            return write!(f, "Debug data written to \"{}\"", self.first_data());
        }
        if p == GoalProblem::UNSUPPORTED_ACTION {
            return write!(f, "{} action for argument \"{}\" is not supported.", self.action, spec);
        }
        if p == GoalProblem::MULTIPLE_STREAMS {
            return write_multiple_streams(f, spec, &self.additional_data);
        }
        if p == GoalProblem::MODULE_CANNOT_SWITCH_STREAMS {
            let mut original = "";
            let mut wanted = "";
            for entry in &self.additional_data {
                match entry.split_once(':') {
                    Some(("0", stream)) => original = stream,
                    Some((_, stream)) => wanted = stream,
                    None => {}
                }
            }
            return write!(
                f,
                "The operation would result in switching of module '{}' stream '{}' to stream '{}'\n\
                 Error: It is not possible to switch enabled streams of a module unless explicitly enabled.",
                spec, original, wanted
            );
        }
        if p == GoalProblem::EXTRA {
            return writeln!(
                f,
                "Extra package '{}' (with action '{}') which is not present in the stored transaction was pulled into the transaction.",
                spec,
                self.first_data()
            );
        }
        if p == GoalProblem::MALFORMED {
            return write!(f, "Malformed entry '{}': {}", spec, self.first_data());
        }
        Ok(())
    }
}

fn write_multiple_streams(
    f: &mut fmt::Formatter<'_>,
    spec: &str,
    data: &BTreeSet<String>,
) -> fmt::Result {
    let mut modules: std::collections::BTreeMap<&str, Vec<&str>> = Default::default();
    for entry in data {
        let (name, stream) = entry.split_once(':').unwrap_or((entry.as_str(), ""));
        modules.entry(name).or_default().push(stream);
    }
    write!(f, "Unable to resolve argument '{}':", spec)?;
    for (name, streams) in modules {
        if streams.len() == 1 {
            write!(
                f,
                "\n  - Argument '{}' matches 1 stream ('{}') of module '{}', but the stream is not enabled or default.",
                spec, streams[0], name
            )?;
        } else {
            write!(
                f,
                "\n  - Argument '{}' matches {} streams ('{}') of module '{}', but none of the streams are enabled or default.",
                spec,
                streams.len(),
                streams.join("', '"),
                name
            )?;
        }
    }
    Ok(())
}
