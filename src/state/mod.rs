//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `GroupState`: Tracks the state of one outer group (pending, discovering, batching, done, failed)
//! - `GroupTracker`: Applies validated transitions and logs them

mod group_state;

pub use group_state::GroupState;

use crate::HarvestError;

/// Tracks one group through its state machine
#[derive(Debug)]
pub struct GroupTracker {
    key: String,
    state: GroupState,
}

impl GroupTracker {
    /// Creates a tracker in the `Pending` state
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: GroupState::Pending,
        }
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    /// Moves the group to `next`, rejecting transitions the state machine forbids
    pub fn transition(&mut self, next: GroupState) -> Result<(), HarvestError> {
        if !self.state.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        tracing::trace!("Group {}: {} -> {}", self.key, self.state, next);
        self.state = next;
        Ok(())
    }
}
