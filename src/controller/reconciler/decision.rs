//! # Decision
//!
//! The transition table of one reconciliation.
//!
//! ```text
//! needRemove = found && (recreate || disabled)
//! needUpdate = found && !recreate && !disabled
//! needCreate = (!found || recreate) && !disabled
//! ```

use crate::api::Action;

/// What the reconciler does with a workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Render and create; reports `Created`, or `Recreated` when recreate was asked for
    Create(Action),
    /// Restart the running workload in place
    Update,
    /// Remove, wait, render and create
    Recreate,
    /// Remove only
    Remove,
    /// Nothing to do
    Skip,
}

#[must_use]
pub fn decide(found: bool, recreate: bool, disabled: bool) -> Plan {
    let need_remove = found && (recreate || disabled);
    let need_update = found && !recreate && !disabled;
    let need_create = (!found || recreate) && !disabled;

    match (need_remove, need_update, need_create) {
        (true, _, true) => Plan::Recreate,
        (true, _, false) => Plan::Remove,
        (false, true, _) => Plan::Update,
        (false, false, true) => Plan::Create(if recreate {
            Action::Recreated
        } else {
            Action::Created
        }),
        (false, false, false) => Plan::Skip,
    }
}

impl Plan {
    /// Action reported when the plan completes without a policy override
    #[must_use]
    pub fn reported_action(self) -> Action {
        match self {
            Plan::Create(action) => action,
            Plan::Update => Action::Updated,
            Plan::Recreate => Action::Recreated,
            Plan::Remove => Action::Removed,
            Plan::Skip => Action::NotChanged,
        }
    }
}
