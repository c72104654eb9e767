use std::fmt;

/// Lifecycle of a lead node.
///
/// ```text
/// Uninitialized --start()--> Running | Standby
/// Standby --waiter acquires lock--> Running
/// Uninitialized | Standby | Running --stop()--> Stopped
/// ```
/// There is no Running -> Standby edge: a primary is never demoted, it dies
/// and the lock service hands the lock to a competitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeadState {
    Uninitialized,
    Standby,
    Running,
    Stopped,
}

impl LeadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadState::Uninitialized => "UNINITIALIZED",
            LeadState::Standby => "STANDBY",
            LeadState::Running => "RUNNING",
            LeadState::Stopped => "STOPPED",
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, LeadState::Running)
    }

    /// Edges reachable through `start()` and promotion. `Stopped` is entered
    /// only through `stop()`, which bypasses this check.
    pub(crate) fn can_transition_to(
        &self,
        next: LeadState,
    ) -> bool {
        matches!(
            (self, next),
            (LeadState::Uninitialized, LeadState::Standby)
                | (LeadState::Uninitialized, LeadState::Running)
                | (LeadState::Standby, LeadState::Running)
        )
    }
}

impl fmt::Display for LeadState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
