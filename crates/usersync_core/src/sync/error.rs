//! Engine-level error kinds.

use crate::config::ConfigError;
use crate::identity::IdentityError;
use crate::property::registry::RegistryError;
use crate::remote::RemoteError;
use crate::storage::LocalStorageError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors observed by the sync engine and the consumer API.
///
/// Only `RemoteRead`, `RemoteWrite` and `Identity` are ever surfaced to the
/// user; the other kinds are logged or returned to the embedding code.
#[derive(Debug)]
pub enum SyncError {
    /// Snapshot stream or subscribe failure. Prior state is retained.
    RemoteRead(RemoteError),
    /// Remote push failure. Not retried by the engine.
    RemoteWrite(RemoteError),
    /// Local slot failure. The value stays in memory for the session.
    LocalStorage(LocalStorageError),
    /// Inbound value for `key` did not match the property's type.
    ImportValidation { key: String, message: String },
    Identity(IdentityError),
    /// A typed lookup named a property missing from the registry.
    PropertyNotRegistered(String),
    Registry(RegistryError),
    Config(ConfigError),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RemoteRead(err) => write!(f, "failed to read user data: {err}"),
            Self::RemoteWrite(err) => write!(f, "failed to save user data: {err}"),
            Self::LocalStorage(err) => write!(f, "{err}"),
            Self::ImportValidation { key, message } => {
                write!(f, "invalid value for `{key}`: {message}")
            }
            Self::Identity(err) => write!(f, "{err}"),
            Self::PropertyNotRegistered(name) => write!(f, "property not registered: {name}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::RemoteRead(err) | Self::RemoteWrite(err) => Some(err),
            Self::LocalStorage(err) => Some(err),
            Self::Identity(err) => Some(err),
            Self::Registry(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::ImportValidation { .. } | Self::PropertyNotRegistered(_) => None,
        }
    }
}

impl From<LocalStorageError> for SyncError {
    fn from(value: LocalStorageError) -> Self {
        Self::LocalStorage(value)
    }
}

impl From<IdentityError> for SyncError {
    fn from(value: IdentityError) -> Self {
        Self::Identity(value)
    }
}

impl From<RegistryError> for SyncError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<ConfigError> for SyncError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}
