// src/commands/mod.rs
//! Command handlers for the rpmgoal CLI

mod comps;
mod output;
mod packages;
mod replay;
mod session;
mod state;

pub use comps::{
    cmd_environment_install, cmd_environment_remove, cmd_group_install, cmd_group_remove,
    cmd_module_disable, cmd_module_enable, cmd_module_reset,
};
pub use packages::{
    cmd_distro_sync, cmd_downgrade, cmd_install, cmd_mark, cmd_reinstall, cmd_remove, cmd_upgrade,
};
pub use replay::cmd_replay;
pub use session::{open_base, Outcome};
pub use state::cmd_show_state;
