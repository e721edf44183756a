//! Sync engine and its collaborator contracts.

pub mod collaborators;
pub mod engine;
pub mod error;
pub mod events;

pub use collaborators::{
    ConfirmationPrompt, ConfirmationRequest, LogReporter, SyncReporter, TelemetryContext,
};
pub use engine::{SyncCollaborators, SyncEngine, SyncState};
pub use error::SyncError;
pub use events::{IdentityListener, SnapshotListener, SyncEvent};
