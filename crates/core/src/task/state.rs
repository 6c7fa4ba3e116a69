//! The task state machine.
//!
//! Every status mutation in the store consults [`is_valid_transition`];
//! an illegal transition is rejected with a typed error, never applied.

use super::TaskStatus;

/// Returns true if a task may move from `from` to `to`.
///
/// Transition table:
///
/// | From      | Allowed To                |
/// |-----------|---------------------------|
/// | Pending   | Running, Cancelled        |
/// | Running   | Success, Failed, Cancelled|
/// | Success   | (none - terminal)         |
/// | Failed    | Pending (retry)           |
/// | Cancelled | Pending (retry)           |
///
/// Pure function: no side effects, no hidden state.
pub fn is_valid_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Pending, Running)
            | (Pending, Cancelled)
            | (Running, Success)
            | (Running, Failed)
            | (Running, Cancelled)
            | (Failed, Pending)
            | (Cancelled, Pending)
    )
}
