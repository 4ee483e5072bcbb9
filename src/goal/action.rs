// src/goal/action.rs

//! Job actions

use crate::transaction::TransactionItemAction;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// What a job asks for
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum GoalAction {
    #[strum(serialize = "Install")]
    Install,
    #[strum(serialize = "Install via provide")]
    InstallViaProvide,
    #[strum(serialize = "Install by group")]
    InstallByComps,
    #[strum(serialize = "Upgrade")]
    Upgrade,
    #[strum(serialize = "Upgrade all")]
    UpgradeAll,
    #[strum(serialize = "Downgrade")]
    Downgrade,
    #[strum(serialize = "Reinstall")]
    Reinstall,
    #[strum(serialize = "Remove")]
    Remove,
    #[strum(serialize = "Distrosync")]
    DistroSync,
    #[strum(serialize = "Distrosync all")]
    DistroSyncAll,
    #[strum(serialize = "Reason Change")]
    ReasonChange,
    #[strum(serialize = "Enable")]
    Enable,
    #[strum(serialize = "Disable")]
    Disable,
    #[strum(serialize = "Reset")]
    Reset,
    #[strum(serialize = "Resolve")]
    Resolve,
}

impl GoalAction {
    /// Whether the action removes what the spec names
    pub fn is_removal(self) -> bool {
        matches!(self, GoalAction::Remove)
    }

    /// Job action that produces a transaction item action, used when
    /// reporting replayed entries
    pub fn from_item_action(action: TransactionItemAction) -> Self {
        match action {
            TransactionItemAction::Install => GoalAction::Install,
            TransactionItemAction::Upgrade => GoalAction::Upgrade,
            TransactionItemAction::Downgrade => GoalAction::Downgrade,
            TransactionItemAction::Reinstall => GoalAction::Reinstall,
            TransactionItemAction::Remove | TransactionItemAction::Replaced => GoalAction::Remove,
            TransactionItemAction::ReasonChange => GoalAction::ReasonChange,
            TransactionItemAction::Enable => GoalAction::Enable,
            TransactionItemAction::Disable => GoalAction::Disable,
            TransactionItemAction::Reset => GoalAction::Reset,
        }
    }

    /// Whether the action only makes sense for installed packages
    pub fn needs_installed(self) -> bool {
        matches!(
            self,
            GoalAction::Upgrade
                | GoalAction::Downgrade
                | GoalAction::Reinstall
                | GoalAction::Remove
                | GoalAction::ReasonChange
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_action_strings() {
        assert_eq!(GoalAction::InstallViaProvide.to_string(), "Install via provide");
        assert_eq!(GoalAction::ReasonChange.as_ref(), "Reason Change");
        assert_eq!(GoalAction::from_str("Distrosync all").unwrap(), GoalAction::DistroSyncAll);
    }
}
