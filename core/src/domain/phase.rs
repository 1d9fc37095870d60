//! Launch lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Phase of a single launcher invocation.
///
/// ```text
/// Idle → CheckingPrereqs → KillingStaleProcesses
///      → (StartingBackground → HealthCheck)
///      → StartingForeground → Running → ShuttingDown → Terminated
/// ```
///
/// `Aborted` is reachable from `CheckingPrereqs`, `HealthCheck` and the two
/// starting phases (spawn failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LaunchPhase {
    Idle,
    CheckingPrereqs,
    KillingStaleProcesses,
    StartingBackground,
    HealthCheck,
    StartingForeground,
    Running,
    ShuttingDown,
    Terminated,
    Aborted,
}

impl LaunchPhase {
    /// Whether the launcher may move from `self` to `next`.
    pub fn can_transition_to(self, next: LaunchPhase) -> bool {
        use LaunchPhase::*;

        matches!(
            (self, next),
            (Idle, CheckingPrereqs)
                | (CheckingPrereqs, KillingStaleProcesses)
                | (CheckingPrereqs, Aborted)
                | (KillingStaleProcesses, StartingBackground)
                | (KillingStaleProcesses, StartingForeground)
                | (StartingBackground, HealthCheck)
                | (StartingBackground, Aborted)
                | (HealthCheck, StartingForeground)
                | (HealthCheck, ShuttingDown)
                | (HealthCheck, Aborted)
                | (StartingForeground, Running)
                | (StartingForeground, Aborted)
                | (Running, ShuttingDown)
                | (ShuttingDown, Terminated)
        )
    }

    /// Whether this phase ends the invocation.
    pub fn is_terminal(self) -> bool {
        matches!(self, LaunchPhase::Terminated | LaunchPhase::Aborted)
    }

    /// Get the display name for this phase.
    pub fn display_name(&self) -> &'static str {
        match self {
            LaunchPhase::Idle => "idle",
            LaunchPhase::CheckingPrereqs => "checking prerequisites",
            LaunchPhase::KillingStaleProcesses => "killing stale processes",
            LaunchPhase::StartingBackground => "starting background service",
            LaunchPhase::HealthCheck => "waiting for health check",
            LaunchPhase::StartingForeground => "starting foreground service",
            LaunchPhase::Running => "running",
            LaunchPhase::ShuttingDown => "shutting down",
            LaunchPhase::Terminated => "terminated",
            LaunchPhase::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for LaunchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Recorded walk through the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTrace {
    phases: Vec<LaunchPhase>,
}

impl PhaseTrace {
    /// Start a new trace in `Idle`.
    pub fn new() -> Self {
        Self {
            phases: vec![LaunchPhase::Idle],
        }
    }

    /// The phase the invocation is currently in.
    pub fn current(&self) -> LaunchPhase {
        *self.phases.last().unwrap_or(&LaunchPhase::Idle)
    }

    /// Move to `next`.
    ///
    /// Illegal edges are a programming error in the launcher.
    pub fn advance(&mut self, next: LaunchPhase) {
        let current = self.current();
        debug_assert!(
            current.can_transition_to(next),
            "illegal launch transition {:?} -> {:?}",
            current,
            next
        );
        tracing::debug!(from = %current, to = %next, "Launch phase change");
        self.phases.push(next);
    }

    /// Every phase visited, in order.
    pub fn phases(&self) -> &[LaunchPhase] {
        &self.phases
    }
}

impl Default for PhaseTrace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LaunchPhase::*;

    #[test]
    fn test_happy_path_single_process() {
        let path = [
            Idle,
            CheckingPrereqs,
            KillingStaleProcesses,
            StartingForeground,
            Running,
            ShuttingDown,
            Terminated,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_two_process_path() {
        assert!(KillingStaleProcesses.can_transition_to(StartingBackground));
        assert!(StartingBackground.can_transition_to(HealthCheck));
        assert!(HealthCheck.can_transition_to(StartingForeground));
    }

    #[test]
    fn test_abort_edges() {
        assert!(CheckingPrereqs.can_transition_to(Aborted));
        assert!(HealthCheck.can_transition_to(Aborted));
        assert!(!Running.can_transition_to(Aborted));
        assert!(!Idle.can_transition_to(Running));
        assert!(!Terminated.can_transition_to(Idle));
    }

    #[test]
    fn test_terminal() {
        assert!(Terminated.is_terminal());
        assert!(Aborted.is_terminal());
        assert!(!Running.is_terminal());
    }

    #[test]
    fn test_trace_records_order() {
        let mut trace = PhaseTrace::new();
        trace.advance(CheckingPrereqs);
        trace.advance(Aborted);
        assert_eq!(trace.current(), Aborted);
        assert_eq!(trace.phases(), &[Idle, CheckingPrereqs, Aborted]);
    }
}
