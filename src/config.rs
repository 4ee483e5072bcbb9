// src/config.rs

//! Global configuration
//!
//! `ConfigMain` holds the defaults that per-job `GoalJobSettings` fall back
//! to when left on `AUTO`, plus sack-level options (excludes, protected
//! packages, architecture, state location).
//!
//! # Example rpmgoal.toml
//!
//! ```toml
//! best = true
//! skip_unavailable = false
//! protected_packages = ["rpmgoal", "glibc", "systemd"]
//! excludepkgs = ["kernel-debug*"]
//! group_package_types = ["mandatory", "default"]
//! installonly_limit = 2
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default path for the main configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rpmgoal/rpmgoal.toml";

/// Default directory for persisted system state
pub const DEFAULT_STATE_DIR: &str = "/var/lib/rpmgoal/state";

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigMain {
    /// Only accept the best available candidate for each job
    pub best: bool,
    /// Fail a job if any part of it is unsatisfiable
    pub strict: bool,
    /// Downgrade missing-package errors to warnings
    pub skip_unavailable: bool,
    /// Remove dependencies no longer needed after a removal
    pub clean_requirements_on_remove: bool,
    /// Pull in weak dependencies (Recommends)
    pub install_weak_deps: bool,
    /// Let the solver downgrade installed packages to satisfy dependencies
    pub allow_downgrade: bool,
    /// Honor Obsoletes of available packages
    pub obsoletes: bool,
    /// Comps package types pulled in by group operations
    pub group_package_types: Vec<String>,
    /// Package names that must never be removed
    pub protected_packages: Vec<String>,
    /// Glob patterns of packages hidden from resolution
    pub excludepkgs: Vec<String>,
    /// When non-empty, only available packages matching these globs are used
    pub includepkgs: Vec<String>,
    /// Base architecture of the system
    pub arch: String,
    /// Directory holding the persisted system state
    pub state_dir: PathBuf,
    /// Names or provides of packages installed side by side instead of
    /// replacing each other
    pub installonlypkgs: Vec<String>,
    /// Versions of each installonly package kept installed; 0 keeps all
    pub installonly_limit: u32,
    /// Upper bound on solver search steps per job
    pub solver_step_limit: usize,
}

/// Default installonly package names and provides
pub const DEFAULT_INSTALLONLYPKGS: [&str; 6] = [
    "kernel",
    "kernel-PAE",
    "installonlypkg(kernel)",
    "installonlypkg(kernel-module)",
    "installonlypkg(vm)",
    "multiversion(kernel)",
];

impl Default for ConfigMain {
    fn default() -> Self {
        Self {
            best: false,
            strict: true,
            skip_unavailable: false,
            clean_requirements_on_remove: true,
            install_weak_deps: true,
            allow_downgrade: true,
            obsoletes: true,
            group_package_types: vec![
                "mandatory".to_string(),
                "default".to_string(),
                "conditional".to_string(),
            ],
            protected_packages: vec!["rpmgoal".to_string()],
            excludepkgs: Vec::new(),
            includepkgs: Vec::new(),
            arch: "x86_64".to_string(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            installonlypkgs: DEFAULT_INSTALLONLYPKGS.iter().map(|s| s.to_string()).collect(),
            installonly_limit: 3,
            solver_step_limit: 100_000,
        }
    }
}

impl ConfigMain {
    /// Load configuration from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: ConfigMain = toml::from_str(content)?;
        if config.solver_step_limit == 0 {
            return Err(Error::ConfigError(
                "solver_step_limit must be positive".to_string(),
            ));
        }
        Ok(config)
    }

    /// Architectures installable on this system, best first
    pub fn compatible_arches(&self) -> Vec<&str> {
        let mut arches: Vec<&str> = match self.arch.as_str() {
            "x86_64" => vec!["x86_64", "i686", "i586", "i486", "i386"],
            "i686" => vec!["i686", "i586", "i486", "i386"],
            "aarch64" => vec!["aarch64"],
            "ppc64le" => vec!["ppc64le"],
            "s390x" => vec!["s390x"],
            other => vec![other],
        };
        arches.push("noarch");
        arches
    }

    /// Whether `name` is configured as protected
    pub fn is_protected(&self, name: &str) -> bool {
        self.protected_packages.iter().any(|p| p == name)
    }
}
