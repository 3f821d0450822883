use std::fmt::Display;

use thiserror::Error;

/// Failures of the PDKIND solver layer. None of them is retried.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Solver error: {0}")]
    Solver(String),
    #[error("SMT oracle returned unknown during {context}: {reason}")]
    Incomplete { context: String, reason: String },
    #[error("pdkind: deadlock detected at reachability frame {frame}")]
    ReachabilityDeadlock { frame: usize },
    #[error("pdkind: deadlock detected when checking induction of depth {depth}")]
    InductionDeadlock { depth: usize },
    #[error("interpolation query on the {solver} solver is satisfiable")]
    InterpolationInvariant { solver: String },
    #[error("frame {frame} is out of range (pool has {size} frames)")]
    FrameOutOfRange { frame: usize, size: usize },
    #[error("reset expects content for {size} frames, got {frames}")]
    FrameCountMismatch { frames: usize, size: usize },
    #[error("induction solver has not been built")]
    InductionNotBuilt,
    #[error("frame 0 only holds the initial states")]
    InitialFrameLocked,
    #[error("Invalid transition system: {0}")]
    InvalidSystem(String),
}

impl EngineError {
    /// Wrap a backend error.
    pub fn solver(err: impl Display) -> Self {
        EngineError::Solver(err.to_string())
    }

    /// Whether the error is a caller bug rather than an oracle-contract
    /// violation.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            EngineError::FrameOutOfRange { .. }
                | EngineError::FrameCountMismatch { .. }
                | EngineError::InductionNotBuilt
                | EngineError::InitialFrameLocked
                | EngineError::InvalidSystem(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_classification() {
        assert!(EngineError::InductionNotBuilt.is_precondition());
        assert!(EngineError::FrameOutOfRange { frame: 3, size: 2 }.is_precondition());
        assert!(!EngineError::ReachabilityDeadlock { frame: 1 }.is_precondition());
        assert!(!EngineError::Incomplete {
            context: "frame 0".into(),
            reason: "timeout".into(),
        }
        .is_precondition());
    }

    #[test]
    fn deadlock_messages_name_the_location() {
        assert_eq!(
            EngineError::ReachabilityDeadlock { frame: 4 }.to_string(),
            "pdkind: deadlock detected at reachability frame 4"
        );
        assert_eq!(
            EngineError::InductionDeadlock { depth: 2 }.to_string(),
            "pdkind: deadlock detected when checking induction of depth 2"
        );
    }
}
