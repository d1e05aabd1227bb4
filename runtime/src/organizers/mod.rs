//! Built-in organizers.

/// `events` key: binds named event handlers
pub mod event;

/// Settings phase run ahead of every chain
pub mod settings;

/// `waitFor` key: blocks the lifecycle on other components
pub mod state;

pub use event::EventOrganizer;
pub use settings::{SettingsLoader, SettingsOrganizer};
pub use state::StateOrganizer;
