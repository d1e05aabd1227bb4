//! Error taxonomy shared by every Organa crate.
//!
//! All failures surface as [`OrganaError`]. Errors are `Clone` so a single
//! failure can be handed to every party waiting on the same operation.

use crate::lifecycle::LifecycleState;
use thiserror::Error;

/// Result alias used throughout the framework.
pub type Result<T> = std::result::Result<T, OrganaError>;

/// Errors raised by settings stores, organizers and the state engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrganaError {
    /// A state change was requested while the component is mid-transition
    /// and the requested state is not a legal successor.
    #[error("Illegal transition. name={name}, fromState={from}, toState={to}")]
    IllegalTransition {
        /// Name of the component
        name: String,
        /// State the component was in
        from: LifecycleState,
        /// State that was requested
        to: LifecycleState,
    },

    /// A wait registered with the state engine was not satisfied in time.
    #[error(
        "waitFor() timed out after {timeout_ms} milliseconds waiting for {waitlist}, name={waiter}."
    )]
    WaitTimeout {
        /// Name of the waiting component
        waiter: String,
        /// The unmet waitlist, serialized as JSON
        waitlist: String,
        /// Timeout that elapsed, in milliseconds
        timeout_ms: u64,
    },

    /// A pending wait was dropped before it could resolve (engine cleared).
    #[error("waitFor() abandoned before completion, name={waiter}.")]
    WaitAbandoned {
        /// Name of the waiting component
        waiter: String,
    },

    /// An organizer, its registration or its per-component override does not
    /// satisfy the organizer contract.
    #[error("Organizer contract violated. organizer={organizer}, reason={reason}")]
    OrganizerContract {
        /// Organizer name
        organizer: String,
        /// What was wrong
        reason: String,
    },

    /// A settings store could not be chained to the given parent.
    #[error("Settings store is not chainable: {0}")]
    NotChainable(String),

    /// An organizer hook failed.
    #[error("Organizer failed. organizer={organizer}, message={message}")]
    Organizer {
        /// Organizer name
        organizer: String,
        /// Failure description
        message: String,
    },

    /// An event handler failed.
    #[error("Event handler failed. event={event}, message={message}")]
    Handler {
        /// Event being triggered
        event: String,
        /// Failure description
        message: String,
    },
}

impl OrganaError {
    /// Build an [`OrganaError::OrganizerContract`].
    #[must_use]
    pub fn contract(organizer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OrganizerContract {
            organizer: organizer.into(),
            reason: reason.into(),
        }
    }

    /// Build an [`OrganaError::Organizer`].
    #[must_use]
    pub fn organizer(organizer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Organizer {
            organizer: organizer.into(),
            message: message.into(),
        }
    }

    /// True for [`OrganaError::WaitTimeout`].
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_transition_message_names_both_states() {
        let err = OrganaError::IllegalTransition {
            name: "Menu".to_string(),
            from: LifecycleState::Opening,
            to: LifecycleState::Closed,
        };
        assert_eq!(
            err.to_string(),
            "Illegal transition. name=Menu, fromState=opening, toState=closed"
        );
    }

    #[test]
    fn timeout_message_carries_waitlist() {
        let err = OrganaError::WaitTimeout {
            waiter: "Header".to_string(),
            waitlist: r#"[{"name":"Ghost","state":"opened"}]"#.to_string(),
            timeout_ms: 50,
        };
        let message = err.to_string();
        assert!(message.contains("Ghost"));
        assert!(message.contains("50 milliseconds"));
        assert!(message.contains("name=Header"));
        assert!(err.is_timeout());
    }
}
