//! Lifecycle state machine — which operation is legal from which state.
//!
//! The current state of a deployment group is the state of the last entry
//! in its action log. Every operation is gated here before any collaborator
//! is called; a rejected operation leaves the log untouched.

use std::fmt;

use fleetgrid_state::GroupState;

use crate::error::{LifecycleError, LifecycleResult};

/// Operations on a deployment group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Approve,
    Instantiate,
    Update,
    Terminate,
    Stop,
    /// Migrate, checked against the source group.
    Migrate,
    /// Migrate, checked against the target group.
    MigrateTarget,
    Rollback,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Approve => "approve",
            Operation::Instantiate => "instantiate",
            Operation::Update => "update",
            Operation::Terminate => "terminate",
            Operation::Stop => "stop",
            Operation::Migrate => "migrate",
            Operation::MigrateTarget => "migrate into",
            Operation::Rollback => "rollback",
            Operation::Delete => "delete",
        }
    }

    /// States this operation may start from.
    pub fn legal_from(&self) -> &'static [GroupState] {
        use GroupState::*;
        match self {
            // Approved is accepted and treated as a no-op by the caller.
            Operation::Approve => &[Created, Approved, Terminated, Updated],
            Operation::Instantiate => &[Approved],
            Operation::Update | Operation::Terminate | Operation::Migrate => {
                &[Instantiated, InstantiateStopped]
            }
            Operation::Stop => &[Instantiated, Terminated],
            Operation::MigrateTarget => &[Approved],
            Operation::Rollback => &[
                Created,
                Approved,
                Instantiated,
                InstantiateStopped,
                Terminated,
                TerminateStopped,
                Updated,
            ],
            Operation::Delete => &[
                Created,
                Approved,
                Terminated,
                TerminateStopped,
                InstantiateStopped,
            ],
        }
    }

    /// Reject the operation unless `state` is one it may start from.
    pub fn check(&self, state: GroupState) -> LifecycleResult<()> {
        if self.legal_from().contains(&state) {
            Ok(())
        } else {
            Err(LifecycleError::InvalidState {
                operation: *self,
                state,
            })
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State a stop request moves `state` to, if it can be stopped at all.
pub fn stopped_state(state: GroupState) -> Option<GroupState> {
    match state {
        GroupState::Instantiated => Some(GroupState::InstantiateStopped),
        GroupState::Terminated => Some(GroupState::TerminateStopped),
        _ => None,
    }
}
