//! Event targeting for organizers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;

/// Which lifecycle events an organizer reacts to.
///
/// In settings the wildcard is written `"*"`, a single event as a string and
/// several events as an array of strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetEvents {
    /// Every event (`"*"`)
    All,
    /// Only the named events
    Specific(BTreeSet<String>),
}

impl TargetEvents {
    /// Target only the given events.
    #[must_use]
    pub fn only<I, S>(events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Specific(events.into_iter().map(Into::into).collect())
    }

    /// Target nothing (the organizer is only ever initialised).
    #[must_use]
    pub const fn none() -> Self {
        Self::Specific(BTreeSet::new())
    }

    /// True if `event` is targeted: wildcard, or an exact name match.
    #[must_use]
    pub fn matches(&self, event: &str) -> bool {
        match self {
            Self::All => true,
            Self::Specific(events) => events.contains(event),
        }
    }
}

impl Default for TargetEvents {
    fn default() -> Self {
        Self::none()
    }
}

impl Serialize for TargetEvents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str("*"),
            Self::Specific(events) => events.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for TargetEvents {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(BTreeSet<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::One(event) if event == "*" => Self::All,
            Raw::One(event) => Self::Specific(BTreeSet::from([event])),
            Raw::Many(events) => Self::Specific(events),
        })
    }
}
