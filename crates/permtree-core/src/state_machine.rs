//! Session phase state machine
//!
//! `Idle -> Loading -> Ready -> Submitting -> Done`, with `Failed` reachable
//! from `Loading` and `Submitting`. Every phase may return to `Idle` when the
//! hosting editor is closed or a load is cancelled.

use crate::error::TransitionError;
use serde::{Deserialize, Serialize};

/// Phase of a [`SyncCoordinator`](crate::SyncCoordinator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No session loaded
    Idle,
    /// Tree and grant fetches in flight
    Loading,
    /// Session loaded and editable
    Ready,
    /// Encoded selection being saved
    Submitting,
    /// Selection saved
    Done,
    /// Last load or submit failed
    Failed,
}

impl SessionPhase {
    /// All phases
    pub const ALL: [SessionPhase; 6] = [
        SessionPhase::Idle,
        SessionPhase::Loading,
        SessionPhase::Ready,
        SessionPhase::Submitting,
        SessionPhase::Done,
        SessionPhase::Failed,
    ];
}

/// Validates a phase transition.
pub fn validate_transition(from: SessionPhase, to: SessionPhase) -> Result<(), TransitionError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// Phases reachable from `from` in one step.
///
/// `Loading -> Loading` and `Submitting -> Submitting` restart a load or
/// submit whose future was dropped before it settled; `Submitting -> Loading`
/// reloads after such a drop. `Failed -> Submitting` retries a failed submit;
/// the coordinator additionally requires a loaded session for it.
#[must_use]
pub fn allowed_transitions(from: SessionPhase) -> Vec<SessionPhase> {
    use SessionPhase::*;
    match from {
        Idle => vec![Loading, Idle],
        Loading => vec![Ready, Failed, Loading, Idle],
        Ready => vec![Submitting, Loading, Idle],
        Submitting => vec![Done, Failed, Submitting, Loading, Idle],
        Done => vec![Idle],
        Failed => vec![Loading, Submitting, Idle],
    }
}

fn allowed(from: SessionPhase, to: SessionPhase) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_allowed() {
        use SessionPhase::*;
        for (from, to) in [
            (Idle, Loading),
            (Loading, Ready),
            (Ready, Submitting),
            (Submitting, Done),
        ] {
            assert!(validate_transition(from, to).is_ok(), "{from:?} -> {to:?}");
        }
    }

    #[test]
    fn failed_only_from_loading_and_submitting() {
        for from in SessionPhase::ALL {
            let ok = validate_transition(from, SessionPhase::Failed).is_ok();
            assert_eq!(
                ok,
                matches!(from, SessionPhase::Loading | SessionPhase::Submitting),
                "{from:?}"
            );
        }
    }

    #[test]
    fn every_phase_can_close() {
        for from in SessionPhase::ALL {
            assert!(validate_transition(from, SessionPhase::Idle).is_ok());
        }
    }

    #[test]
    fn dropped_calls_can_restart() {
        use SessionPhase::*;
        for (from, to) in [
            (Loading, Loading),
            (Submitting, Submitting),
            (Submitting, Loading),
        ] {
            assert!(validate_transition(from, to).is_ok(), "{from:?} -> {to:?}");
        }
        assert!(validate_transition(Submitting, Ready).is_err());
    }

    #[test]
    fn submit_requires_loaded_phase() {
        assert_eq!(
            validate_transition(SessionPhase::Idle, SessionPhase::Submitting),
            Err(TransitionError {
                from: SessionPhase::Idle,
                to: SessionPhase::Submitting,
            })
        );
        assert!(validate_transition(SessionPhase::Done, SessionPhase::Submitting).is_err());
    }
}
