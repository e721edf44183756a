//! Engine configuration.
//!
//! # Invariants
//! - `slot_prefix` is non-empty so property slots never collide with
//!   unrelated keys in a shared store.
//! - `first_sync_marker` names a registered property id (checked at engine
//!   start).

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default prefix for local slot keys.
pub const DEFAULT_SLOT_PREFIX: &str = "guide:userData:";
/// Default property inspected to decide whether local data is worth pushing.
pub const DEFAULT_FIRST_SYNC_MARKER: &str = "lastViewedModule";

const SLOT_PREFIX_ENV: &str = "USERSYNC_SLOT_PREFIX";
const FIRST_SYNC_MARKER_ENV: &str = "USERSYNC_FIRST_SYNC_MARKER";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptySlotPrefix,
    EmptyFirstSyncMarker,
    /// `first_sync_marker` does not name a registered property.
    UnknownFirstSyncMarker(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySlotPrefix => write!(f, "slot_prefix cannot be empty"),
            Self::EmptyFirstSyncMarker => write!(f, "first_sync_marker cannot be empty"),
            Self::UnknownFirstSyncMarker(value) => {
                write!(f, "first_sync_marker `{value}` is not a registered property")
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub slot_prefix: String,
    pub first_sync_marker: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            slot_prefix: DEFAULT_SLOT_PREFIX.to_string(),
            first_sync_marker: DEFAULT_FIRST_SYNC_MARKER.to_string(),
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `USERSYNC_SLOT_PREFIX` / `USERSYNC_FIRST_SYNC_MARKER`.
    ///
    /// Blank variables are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();
        Self {
            slot_prefix: read(SLOT_PREFIX_ENV).unwrap_or(defaults.slot_prefix),
            first_sync_marker: read(FIRST_SYNC_MARKER_ENV).unwrap_or(defaults.first_sync_marker),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_prefix.trim().is_empty() {
            return Err(ConfigError::EmptySlotPrefix);
        }
        if self.first_sync_marker.trim().is_empty() {
            return Err(ConfigError::EmptyFirstSyncMarker);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, SyncConfig, DEFAULT_FIRST_SYNC_MARKER};

    #[test]
    fn lookup_overrides_defaults_and_ignores_blank_values() {
        let config = SyncConfig::from_lookup(|name| match name {
            "USERSYNC_SLOT_PREFIX" => Some(" app:v2: ".to_string()),
            "USERSYNC_FIRST_SYNC_MARKER" => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(config.slot_prefix, "app:v2:");
        assert_eq!(config.first_sync_marker, DEFAULT_FIRST_SYNC_MARKER);
    }

    #[test]
    fn validate_rejects_empty_fields() {
        let config = SyncConfig {
            slot_prefix: " ".to_string(),
            ..SyncConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptySlotPrefix));
        assert!(SyncConfig::default().validate().is_ok());
    }
}
