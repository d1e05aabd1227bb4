//! Component lifecycle states and the transition rules between them.
//!
//! A component starts in [`LifecycleState::Initial`] and moves through the
//! `starting → started → opening → opened → closing → closed` phases, with
//! `stopping → stopped` available as teardown. States ending in "ing" are
//! in-flight: while a component sits in one of them only its completion (and
//! a small set of escape hatches) may follow.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `LifecycleState` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid lifecycle state: {0}")]
pub struct ParseStateError(String);

/// One of the fixed phases a component passes through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Before any transition (serialized as the empty string)
    #[default]
    #[serde(rename = "")]
    Initial,
    /// Start in progress
    Starting,
    /// Started
    Started,
    /// Stop in progress
    Stopping,
    /// Stopped
    Stopped,
    /// Open in progress
    Opening,
    /// Opened
    Opened,
    /// Close in progress
    Closing,
    /// Closed
    Closed,
}

impl LifecycleState {
    /// All states, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Initial,
        Self::Starting,
        Self::Started,
        Self::Stopping,
        Self::Stopped,
        Self::Opening,
        Self::Opened,
        Self::Closing,
        Self::Closed,
    ];

    /// The wire name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "",
            Self::Starting => "starting",
            Self::Started => "started",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Opening => "opening",
            Self::Opened => "opened",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    /// True while a transition is in flight (the state name ends in "ing").
    #[must_use]
    pub const fn is_transitional(self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Stopping | Self::Opening | Self::Closing
        )
    }

    /// Whether a component currently in `self` may move to `next`.
    ///
    /// Settled states may move anywhere. In-flight states only accept their
    /// own completion, plus `stopping → closing` and a re-entrant
    /// `opening → opening`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Starting => matches!(next, Self::Started),
            Self::Stopping => matches!(next, Self::Stopped | Self::Closing),
            Self::Opening => matches!(next, Self::Opened | Self::Opening),
            Self::Closing => matches!(next, Self::Closed),
            _ => true,
        }
    }

    /// Whether a component in `self` satisfies a wait for `expected`.
    ///
    /// Equality everywhere except `started`, which stays satisfied once the
    /// component has moved on to any open/close phase.
    #[must_use]
    pub const fn satisfies(self, expected: Self) -> bool {
        match expected {
            Self::Started => matches!(
                self,
                Self::Started | Self::Opening | Self::Opened | Self::Closing | Self::Closed
            ),
            _ => self as u8 == expected as u8,
        }
    }

    /// True once the component has started and is not being torn down.
    #[must_use]
    pub const fn is_initialized(self) -> bool {
        !matches!(
            self,
            Self::Initial | Self::Starting | Self::Stopping | Self::Stopped
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ParseStateError(s.to_string()))
    }
}
