// src/problems/mod.rs

//! Problem classification and reporting
//!
//! - [`GoalProblem`]: bit set of failure categories, OR-combined per resolve
//! - [`ProblemRules`]: the closed taxonomy of solver rule conflicts
//! - [`SolverProblems`]: independent unsatisfiable sub-problems, each a
//!   list of rules with the packages/dependencies they mention
//! - [`LogEvent`]: one diagnostic record, rendered on demand

mod log_event;

pub use log_event::{LogEvent, Severity};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use strum_macros::{AsRefStr, Display, EnumString};

/// Set of resolution-failure categories
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoalProblem(u32);

impl GoalProblem {
    pub const NO_PROBLEM: GoalProblem = GoalProblem(0);
    pub const SOLVER_ERROR: GoalProblem = GoalProblem(1 << 0);
    pub const NOT_FOUND: GoalProblem = GoalProblem(1 << 1);
    pub const EXCLUDED: GoalProblem = GoalProblem(1 << 2);
    pub const ONLY_SRC: GoalProblem = GoalProblem(1 << 3);
    pub const NOT_FOUND_IN_REPOSITORIES: GoalProblem = GoalProblem(1 << 4);
    pub const NOT_INSTALLED: GoalProblem = GoalProblem(1 << 5);
    pub const NOT_INSTALLED_FOR_ARCHITECTURE: GoalProblem = GoalProblem(1 << 6);
    pub const HINT_ICASE: GoalProblem = GoalProblem(1 << 7);
    pub const HINT_ALTERNATIVES: GoalProblem = GoalProblem(1 << 8);
    pub const INSTALLED_LOWEST_VERSION: GoalProblem = GoalProblem(1 << 9);
    pub const INSTALLED_IN_DIFFERENT_VERSION: GoalProblem = GoalProblem(1 << 10);
    pub const NOT_AVAILABLE: GoalProblem = GoalProblem(1 << 11);
    pub const ALREADY_INSTALLED: GoalProblem = GoalProblem(1 << 12);
    pub const SOLVER_PROBLEM_STRICT_RESOLVEMENT: GoalProblem = GoalProblem(1 << 13);
    pub const WRITE_DEBUG: GoalProblem = GoalProblem(1 << 14);
    pub const UNSUPPORTED_ACTION: GoalProblem = GoalProblem(1 << 15);
    pub const MULTIPLE_STREAMS: GoalProblem = GoalProblem(1 << 16);
    pub const EXCLUDED_VERSIONLOCK: GoalProblem = GoalProblem(1 << 17);
    pub const MODULE_SOLVER_ERROR: GoalProblem = GoalProblem(1 << 18);
    pub const MODULE_CANNOT_SWITCH_STREAMS: GoalProblem = GoalProblem(1 << 21);
    pub const EXTRA: GoalProblem = GoalProblem(1 << 22);
    pub const MALFORMED: GoalProblem = GoalProblem(1 << 23);
    pub const REMOVAL_OF_PROTECTED: GoalProblem = GoalProblem(1 << 24);

    const NAMES: [(GoalProblem, &'static str); 24] = [
        (GoalProblem::SOLVER_ERROR, "SOLVER_ERROR"),
        (GoalProblem::NOT_FOUND, "NOT_FOUND"),
        (GoalProblem::EXCLUDED, "EXCLUDED"),
        (GoalProblem::ONLY_SRC, "ONLY_SRC"),
        (GoalProblem::NOT_FOUND_IN_REPOSITORIES, "NOT_FOUND_IN_REPOSITORIES"),
        (GoalProblem::NOT_INSTALLED, "NOT_INSTALLED"),
        (GoalProblem::NOT_INSTALLED_FOR_ARCHITECTURE, "NOT_INSTALLED_FOR_ARCHITECTURE"),
        (GoalProblem::HINT_ICASE, "HINT_ICASE"),
        (GoalProblem::HINT_ALTERNATIVES, "HINT_ALTERNATIVES"),
        (GoalProblem::INSTALLED_LOWEST_VERSION, "INSTALLED_LOWEST_VERSION"),
        (GoalProblem::INSTALLED_IN_DIFFERENT_VERSION, "INSTALLED_IN_DIFFERENT_VERSION"),
        (GoalProblem::NOT_AVAILABLE, "NOT_AVAILABLE"),
        (GoalProblem::ALREADY_INSTALLED, "ALREADY_INSTALLED"),
        (GoalProblem::SOLVER_PROBLEM_STRICT_RESOLVEMENT, "SOLVER_PROBLEM_STRICT_RESOLVEMENT"),
        (GoalProblem::WRITE_DEBUG, "WRITE_DEBUG"),
        (GoalProblem::UNSUPPORTED_ACTION, "UNSUPPORTED_ACTION"),
        (GoalProblem::MULTIPLE_STREAMS, "MULTIPLE_STREAMS"),
        (GoalProblem::EXCLUDED_VERSIONLOCK, "EXCLUDED_VERSIONLOCK"),
        (GoalProblem::MODULE_SOLVER_ERROR, "MODULE_SOLVER_ERROR"),
        (GoalProblem::MODULE_CANNOT_SWITCH_STREAMS, "MODULE_CANNOT_SWITCH_STREAMS"),
        (GoalProblem::EXTRA, "EXTRA"),
        (GoalProblem::MALFORMED, "MALFORMED"),
        (GoalProblem::REMOVAL_OF_PROTECTED, "REMOVAL_OF_PROTECTED"),
        (GoalProblem::NO_PROBLEM, "NO_PROBLEM"),
    ];

    pub fn union(self, other: GoalProblem) -> Self {
        GoalProblem(self.0 | other.0)
    }

    pub fn intersection(self, other: GoalProblem) -> Self {
        GoalProblem(self.0 & other.0)
    }

    /// Whether every flag of `other` is set (`NO_PROBLEM` is never contained)
    pub fn contains(self, other: GoalProblem) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// Whether any flag is set
    pub fn any(self) -> bool {
        self.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The single flags contained, in bit order
    pub fn iter(self) -> impl Iterator<Item = GoalProblem> {
        (0..32)
            .map(|bit| GoalProblem(1 << bit))
            .filter(move |flag| self.contains(*flag))
    }

    /// Name of a single flag
    pub fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(flag, _)| *flag == self)
            .map(|(_, name)| *name)
            .unwrap_or("UNKNOWN")
    }
}

impl BitOr for GoalProblem {
    type Output = GoalProblem;
    fn bitor(self, rhs: GoalProblem) -> GoalProblem {
        self.union(rhs)
    }
}

impl BitOrAssign for GoalProblem {
    fn bitor_assign(&mut self, rhs: GoalProblem) {
        *self = self.union(rhs);
    }
}

impl BitAnd for GoalProblem {
    type Output = GoalProblem;
    fn bitand(self, rhs: GoalProblem) -> GoalProblem {
        self.intersection(rhs)
    }
}

impl fmt::Display for GoalProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "NO_PROBLEM");
        }
        let names: Vec<&str> = self.iter().map(GoalProblem::name).collect();
        write!(f, "{}", names.join(" | "))
    }
}

/// Kinds of solver rule conflicts
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProblemRules {
    RuleDistupgrade,
    RuleInfarch,
    RuleUpdate,
    RuleJob,
    RuleJobUnsupported,
    RuleJobNothingProvidesDep,
    RuleJobUnknownPackage,
    RuleJobProvidedBySystem,
    RulePkg,
    RuleBest1,
    RuleBest2,
    RulePkgNotInstallable1,
    RulePkgNotInstallable2,
    RulePkgNotInstallable3,
    RulePkgNotInstallable4,
    RulePkgNothingProvidesDep,
    RulePkgSameName,
    RulePkgConflicts,
    RulePkgObsoletes,
    RulePkgInstalledObsoletes,
    RulePkgImplicitObsoletes,
    RulePkgRequires,
    RulePkgSelfConflict,
    RuleYumobs,
    RuleUnknown,
    RulePkgRemovalOfProtected,
    RulePkgRemovalOfRunningKernel,
    RulePkgInstalledConflicts,
    RulePkgInstalledRequires,
}

impl ProblemRules {
    fn template(self) -> &'static str {
        match self {
            ProblemRules::RuleDistupgrade => "{0} does not belong to a distupgrade repository",
            ProblemRules::RuleInfarch => "{0} has inferior architecture",
            ProblemRules::RuleUpdate => "problem with installed package {0}",
            ProblemRules::RuleJob => "conflicting requests",
            ProblemRules::RuleJobUnsupported => "unsupported request",
            ProblemRules::RuleJobNothingProvidesDep => "nothing provides requested {0}",
            ProblemRules::RuleJobUnknownPackage => "package {0} does not exist",
            ProblemRules::RuleJobProvidedBySystem => "{0} is provided by the system",
            ProblemRules::RulePkg => "some dependency problem",
            ProblemRules::RuleBest1 => "cannot install the best update candidate for package {0}",
            ProblemRules::RuleBest2 => "cannot install the best candidate for the job",
            ProblemRules::RulePkgNotInstallable1 => "package {0} is not installable",
            ProblemRules::RulePkgNotInstallable2 => {
                "package {0} is filtered out by modular filtering"
            }
            ProblemRules::RulePkgNotInstallable3 => {
                "package {0} does not have a compatible architecture"
            }
            ProblemRules::RulePkgNotInstallable4 => {
                "package {0} is filtered out by exclude filtering"
            }
            ProblemRules::RulePkgNothingProvidesDep => "nothing provides {0} needed by {1}",
            ProblemRules::RulePkgSameName => "cannot install both {0} and {1}",
            ProblemRules::RulePkgConflicts => "package {0} conflicts with {1} provided by {2}",
            ProblemRules::RulePkgObsoletes => "package {0} obsoletes {1} provided by {2}",
            ProblemRules::RulePkgInstalledObsoletes => {
                "installed package {0} obsoletes {1} provided by {2}"
            }
            ProblemRules::RulePkgImplicitObsoletes => {
                "package {0} implicitly obsoletes {1} provided by {2}"
            }
            ProblemRules::RulePkgRequires => {
                "package {1} requires {0}, but none of the providers can be installed"
            }
            ProblemRules::RulePkgSelfConflict => "package {1} conflicts with {0} provided by itself",
            ProblemRules::RuleYumobs => "both package {0} and {2} obsolete {1}",
            ProblemRules::RuleUnknown => "bad rule type",
            ProblemRules::RulePkgRemovalOfProtected => {
                "The operation would result in removing the following protected packages: {0}"
            }
            ProblemRules::RulePkgRemovalOfRunningKernel => {
                "The operation would result in removing of running kernel: {0}"
            }
            ProblemRules::RulePkgInstalledConflicts => {
                "installed package {0} conflicts with {1} provided by {2}"
            }
            ProblemRules::RulePkgInstalledRequires => {
                "installed package {1} requires {0}, but none of the providers can be installed"
            }
        }
    }

    /// Render this rule with its elements
    pub fn format(self, elements: &[String]) -> String {
        format_positional(self.template(), elements)
    }
}

/// Replace `{N}` placeholders with `elements[N]` (missing ones become "")
fn format_positional(template: &str, elements: &[String]) -> String {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => match after[..end].parse::<usize>() {
                Ok(index) => {
                    out.push_str(elements.get(index).map(String::as_str).unwrap_or(""));
                    rest = &after[end + 1..];
                }
                Err(_) => {
                    out.push('{');
                    rest = after;
                }
            },
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// One rule of a problem: its kind and the strings it refers to
pub type ProblemRule = (ProblemRules, Vec<String>);

/// Independent unsatisfiable sub-problems of one resolve
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverProblems {
    problems: Vec<Vec<ProblemRule>>,
}

impl SolverProblems {
    /// Build from raw problems, dropping duplicate rules inside a problem
    /// and duplicate problems
    pub fn new(raw: Vec<Vec<ProblemRule>>) -> Self {
        let mut out = SolverProblems::default();
        for problem in raw {
            out.push(problem);
        }
        out
    }

    /// Append one problem unless an identical one is present
    pub fn push(&mut self, problem: Vec<ProblemRule>) {
        let problem = dedup_rules(problem);
        if !problem.is_empty() && !self.problems.contains(&problem) {
            self.problems.push(problem);
        }
    }

    /// Put `problem` first (protected-package removal is reported first)
    pub fn push_front(&mut self, problem: Vec<ProblemRule>) {
        let problem = dedup_rules(problem);
        if !problem.is_empty() && !self.problems.contains(&problem) {
            self.problems.insert(0, problem);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    /// Structured access: per problem, its `(rule, elements)` pairs
    pub fn get_problems(&self) -> &[Vec<ProblemRule>] {
        &self.problems
    }

    /// Render one rule
    pub fn problem_to_string(rule: &ProblemRule) -> String {
        rule.0.format(&rule.1)
    }

    /// Rendered lines of one problem, grouping consecutive "nothing
    /// provides" rules for the same dependency
    fn problem_lines(problem: &[ProblemRule]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut i = 0;
        while i < problem.len() {
            let (rule, elements) = &problem[i];
            if *rule == ProblemRules::RulePkgNothingProvidesDep && elements.len() >= 2 {
                let mut needed_by = vec![elements[1].clone()];
                let mut j = i + 1;
                while j < problem.len()
                    && problem[j].0 == ProblemRules::RulePkgNothingProvidesDep
                    && problem[j].1.first() == elements.first()
                {
                    if let Some(pkg) = problem[j].1.get(1) {
                        needed_by.push(pkg.clone());
                    }
                    j += 1;
                }
                lines.push(format!(
                    "nothing provides {} needed by {}",
                    elements[0],
                    needed_by.join(", or ")
                ));
                i = j;
            } else {
                lines.push(Self::problem_to_string(&problem[i]));
                i += 1;
            }
        }
        lines
    }
}

fn dedup_rules(problem: Vec<ProblemRule>) -> Vec<ProblemRule> {
    let mut out: Vec<ProblemRule> = Vec::with_capacity(problem.len());
    for rule in problem {
        if !out.contains(&rule) {
            out.push(rule);
        }
    }
    out
}

impl fmt::Display for SolverProblems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let single = self.problems.len() == 1;
        for (index, problem) in self.problems.iter().enumerate() {
            if single {
                write!(f, "Problem: ")?;
            } else {
                if index > 0 {
                    write!(f, "\n ")?;
                }
                write!(f, "Problem {}: ", index + 1)?;
            }
            for (line_no, line) in Self::problem_lines(problem).iter().enumerate() {
                if line_no > 0 {
                    write!(f, "\n  - ")?;
                }
                write!(f, "{}", line)?;
            }
        }
        Ok(())
    }
}
