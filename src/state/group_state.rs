/// Group state definitions for tracking harvest progress
///
/// Every outer group (a designer or a subreddit) walks through these states
/// while the coordinator processes it.
use std::fmt;

/// Represents the current state of a group in the harvest process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupState {
    // ===== Active States =====
    /// Group is waiting for its turn in the outer iteration
    Pending,

    /// Child links are being discovered
    Discovering,

    /// Links are known and about to be partitioned into batches
    BatchingPending,

    /// A batch of fetch+extract tasks is in flight
    BatchRunning,

    // ===== Terminal States =====
    /// Every batch of the group completed
    GroupDone,

    /// Discovery failed; the group was skipped
    Failed,
}

impl GroupState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::GroupDone | Self::Failed)
    }

    /// Returns true if the state machine allows moving from `self` to `next`
    ///
    /// `Failed` is reachable from any non-terminal state. `GroupDone` loops
    /// back to `Pending` when the next group starts.
    pub fn can_transition_to(&self, next: GroupState) -> bool {
        use GroupState::*;

        if next == Failed {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Pending, Discovering)
                | (Discovering, BatchingPending)
                | (BatchingPending, BatchRunning)
                | (BatchingPending, GroupDone)
                | (BatchRunning, BatchRunning)
                | (BatchRunning, GroupDone)
                | (GroupDone, Pending)
                | (Failed, Pending)
        )
    }

    /// Returns a short lowercase label for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Discovering => "discovering",
            Self::BatchingPending => "batching_pending",
            Self::BatchRunning => "batch_running",
            Self::GroupDone => "group_done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
