//! Client-side user-state synchronization.
//!
//! A fixed registry of typed properties is persisted to local slots and,
//! while an identity is bound, mirrored to one remote per-user document.

pub mod api;
pub mod config;
pub mod db;
pub mod identity;
pub mod logging;
pub mod model;
pub mod property;
pub mod remote;
pub mod storage;
pub mod sync;

pub use api::UserData;
pub use config::{ConfigError, SyncConfig};
pub use identity::{Identity, IdentityError, IdentityProvider, StaticIdentityProvider};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::document::DocumentMap;
pub use property::registry::{PropertyRegistry, RegistryError};
pub use property::Property;
pub use remote::{
    InMemoryRemoteChannel, RemoteDocumentChannel, RemoteError, Subscription, SubscriptionId,
    WriteMode,
};
pub use storage::{LocalStorage, LocalStorageError, MemoryLocalStorage, SqliteLocalStorage};
pub use sync::{
    ConfirmationPrompt, ConfirmationRequest, LogReporter, SyncCollaborators, SyncEngine,
    SyncError, SyncReporter, SyncState,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
