//! Reflector state machine.
//!
//! # State Machine
//!
//! ```text
//!     ┌─────────┐
//!     │ Initial │
//!     └────┬────┘
//!          │ (start)
//!          ▼
//!     ┌─────────┐  (list ok)   ┌──────────┐
//!     │ Listing │─────────────▶│ Watching │
//!     └────┬────┘              └────┬─────┘
//!          │ (list failed)          │ (watch error, 410, stream closed)
//!          ▼                        ▼
//!     ┌─────────┐◄──────────────────┘
//!     │  Error  │
//!     └────┬────┘
//!          │
//!          ▼
//!     ┌─────────┐
//!     │ Backoff │───▶ Listing
//!     └─────────┘
//! ```
//!
//! Every state can move to `Stopped` when the reflector is cancelled.
//! `Stopped` is terminal.

use std::fmt;

/// Where a reflector is in its list/watch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReflectorState {
    /// Created, not yet started.
    Initial,
    /// Paging through a full LIST.
    Listing,
    /// Applying events from a WATCH stream.
    Watching,
    /// The last LIST or WATCH failed.
    Error,
    /// Waiting before the next LIST.
    Backoff,
    /// Cancelled; subscriptions are closed.
    Stopped,
}

impl ReflectorState {
    /// Returns true once the reflector has stopped.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Listing => "listing",
            Self::Watching => "watching",
            Self::Error => "error",
            Self::Backoff => "backoff",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ReflectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check if a state transition is valid according to the state machine.
#[must_use]
pub const fn is_valid_transition(from: ReflectorState, to: ReflectorState) -> bool {
    use ReflectorState::{Backoff, Error, Initial, Listing, Stopped, Watching};

    matches!(
        (from, to),
        (Initial | Backoff, Listing)
            | (Listing, Watching)
            | (Listing | Watching, Error)
            | (Error, Backoff)
            | (Initial | Listing | Watching | Error | Backoff, Stopped)
    )
}

/// Get all valid next states from a given state.
#[must_use]
pub fn valid_transitions_from(state: ReflectorState) -> Vec<ReflectorState> {
    use ReflectorState::{Backoff, Error, Initial, Listing, Stopped, Watching};

    [Initial, Listing, Watching, Error, Backoff, Stopped]
        .into_iter()
        .filter(|&to| is_valid_transition(state, to))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReflectorState::{Backoff, Error, Initial, Listing, Stopped, Watching};

    #[test]
    fn happy_path() {
        assert!(is_valid_transition(Initial, Listing));
        assert!(is_valid_transition(Listing, Watching));
    }

    #[test]
    fn failures_go_through_backoff() {
        assert!(is_valid_transition(Watching, Error));
        assert!(is_valid_transition(Error, Backoff));
        assert!(is_valid_transition(Backoff, Listing));

        assert!(!is_valid_transition(Error, Listing));
        assert!(!is_valid_transition(Watching, Listing));
        assert!(!is_valid_transition(Backoff, Watching));
    }

    #[test]
    fn stopped_is_terminal() {
        assert!(valid_transitions_from(Stopped).is_empty());
        assert!(Stopped.is_terminal());
        for state in [Initial, Listing, Watching, Error, Backoff] {
            assert!(is_valid_transition(state, Stopped), "{state} -> stopped");
        }
    }

    #[test]
    fn transitions_from_listing() {
        assert_eq!(valid_transitions_from(Listing), vec![Watching, Error, Stopped]);
    }
}
