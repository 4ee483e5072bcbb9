// src/base.rs

//! Ownership root of one package-management session
//!
//! A [`Base`] owns the configuration, the package universe (installed
//! packages plus repositories), comps and module metadata, and the system
//! state. Goals borrow it, so a goal can never outlive the data it
//! resolves against.
//!
//! ```ignore
//! let mut base = Base::new(ConfigMain::load(path)?);
//! base.load_snapshot(Snapshot::load(metadata)?)?;
//! base.load_state()?;
//! base.setup()?;
//!
//! let mut goal = Goal::new(&base);
//! goal.add_install("vim", GoalJobSettings::default());
//! let transaction = goal.resolve()?;
//! ```

use crate::comps::CompsSack;
use crate::config::ConfigMain;
use crate::error::{Error, Result};
use crate::module::ModuleSack;
use crate::sack::{PackageSack, Snapshot};
use crate::state::SystemState;
use tracing::info;

#[derive(Debug)]
pub struct Base {
    config: ConfigMain,
    sack: PackageSack,
    comps: CompsSack,
    modules: ModuleSack,
    state: SystemState,
    initialized: bool,
}

impl Base {
    /// Base with empty metadata and an empty state bound to the
    /// configured state directory
    pub fn new(config: ConfigMain) -> Self {
        let state = SystemState::new(config.state_dir.clone());
        Self {
            config,
            sack: PackageSack::new(),
            comps: CompsSack::default(),
            modules: ModuleSack::default(),
            state,
            initialized: false,
        }
    }

    /// Replace the package, comps and module metadata
    pub fn load_snapshot(&mut self, snapshot: Snapshot) -> Result<()> {
        self.ensure_not_initialized("load metadata")?;
        let (sack, comps, modules) = snapshot.into_sacks()?;
        info!(
            "Loaded {} packages from {} repositories",
            sack.len(),
            sack.repo_ids().len()
        );
        self.sack = sack;
        self.comps = comps;
        self.modules = modules;
        Ok(())
    }

    /// Load the system state from the configured state directory
    pub fn load_state(&mut self) -> Result<()> {
        self.ensure_not_initialized("load system state")?;
        self.state = SystemState::load(self.config.state_dir.clone())?;
        Ok(())
    }

    /// Use an already loaded state
    pub fn set_state(&mut self, state: SystemState) -> Result<()> {
        self.ensure_not_initialized("replace system state")?;
        self.state = state;
        Ok(())
    }

    /// Freeze the universe: apply excludes and modular filtering
    ///
    /// Goals can only be resolved against an initialized base.
    pub fn setup(&mut self) -> Result<()> {
        self.ensure_not_initialized("set up")?;
        self.sack
            .apply_excludes(&self.config.excludepkgs, &self.config.includepkgs)?;
        let hidden = self.modules.filtered_nevras(self.state.module_states());
        self.sack.apply_modular_filter(&hidden);
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &ConfigMain {
        &self.config
    }

    pub fn sack(&self) -> &PackageSack {
        &self.sack
    }

    pub fn comps(&self) -> &CompsSack {
        &self.comps
    }

    pub fn modules(&self) -> &ModuleSack {
        &self.modules
    }

    pub fn state(&self) -> &SystemState {
        &self.state
    }

    /// Mutable state, for recording executed transactions
    pub fn state_mut(&mut self) -> &mut SystemState {
        &mut self.state
    }

    fn ensure_not_initialized(&self, what: &str) -> Result<()> {
        if self.initialized {
            return Err(Error::AssertionError(format!(
                "Cannot {} after the base was set up",
                what
            )));
        }
        Ok(())
    }
}
