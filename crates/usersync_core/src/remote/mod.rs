//! Remote per-user document channel contract.
//!
//! # Responsibility
//! - Define subscribe/write operations against the remote document store.
//! - Provide `RemoteDocumentRef`, the per-identity write target handed to
//!   every property.
//!
//! # Invariants
//! - One live `Subscription` per bound identity; dropping or cancelling it
//!   stops deliveries.
//! - Property pushes are fire-and-forget: failures are logged and reported,
//!   never returned to the caller of a setter.

use crate::identity::Identity;
use crate::model::document::DocumentMap;
use crate::sync::collaborators::{SyncReporter, TelemetryContext};
use crate::sync::error::SyncError;
use crate::sync::events::SnapshotListener;
use log::error;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;
use uuid::Uuid;

mod memory;

pub use memory::{InMemoryRemoteChannel, RecordedWrite};

/// How a write combines with the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create if absent; fields not present in the write are kept.
    Merge,
    /// The write becomes the whole document.
    Replace,
}

/// Remote store failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// Stable machine-readable code (`permission_denied`, `unavailable`, ...).
    pub code: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for RemoteError {}

/// Token identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Live snapshot subscription. Cancelled on `cancel` or drop.
pub struct Subscription {
    id: SubscriptionId,
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(id: SubscriptionId, unsubscribe: impl FnOnce() + 'static) -> Self {
        Self {
            id,
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn cancel(mut self) {
        self.run_unsubscribe();
    }

    fn run_unsubscribe(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_unsubscribe();
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Remote document store keyed by identity.
pub trait RemoteDocumentChannel {
    /// Starts delivering snapshots of `identity`'s document to `listener`.
    ///
    /// Implementations deliver the current state (possibly absent) as the
    /// first snapshot.
    fn subscribe(
        &self,
        identity: &Identity,
        listener: SnapshotListener,
    ) -> Result<Subscription, RemoteError>;

    fn write(
        &self,
        identity: &Identity,
        document: DocumentMap,
        mode: WriteMode,
    ) -> Result<(), RemoteError>;
}

/// Write target for one identity's document.
#[derive(Clone)]
pub struct RemoteDocumentRef {
    identity: Identity,
    channel: Rc<dyn RemoteDocumentChannel>,
    reporter: Rc<dyn SyncReporter>,
}

impl RemoteDocumentRef {
    pub fn new(
        identity: Identity,
        channel: Rc<dyn RemoteDocumentChannel>,
        reporter: Rc<dyn SyncReporter>,
    ) -> Self {
        Self {
            identity,
            channel,
            reporter,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Writes `document`, returning the failure to the caller.
    pub fn write(&self, document: DocumentMap, mode: WriteMode) -> Result<(), RemoteError> {
        self.channel.write(&self.identity, document, mode)
    }

    /// Merges `fields` into the document, reporting failures instead of
    /// returning them.
    pub fn push(&self, fields: DocumentMap, operation: &'static str) {
        if fields.is_empty() {
            return;
        }
        let keys = fields.keys().cloned().collect::<Vec<_>>().join(",");
        if let Err(err) = self.write(fields, WriteMode::Merge) {
            error!(
                "event=remote_push module=remote status=error operation={operation} keys={keys} code={}",
                err.code
            );
            let err = SyncError::RemoteWrite(err);
            self.reporter.report_user_visible_error(&err);
            self.reporter.report_telemetry_exception(
                &err,
                &TelemetryContext {
                    user_id: Some(self.identity.uid.clone()),
                    operation,
                },
            );
        }
    }
}

impl Debug for RemoteDocumentRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDocumentRef")
            .field("uid", &self.identity.uid)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Subscription, SubscriptionId};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn subscription_unsubscribes_once_on_cancel_or_drop() {
        let calls = Rc::new(Cell::new(0));

        let counter = Rc::clone(&calls);
        let subscription = Subscription::new(SubscriptionId::new(), move || {
            counter.set(counter.get() + 1)
        });
        subscription.cancel();
        assert_eq!(calls.get(), 1);

        let counter = Rc::clone(&calls);
        drop(Subscription::new(SubscriptionId::new(), move || {
            counter.set(counter.get() + 1)
        }));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn subscription_ids_are_unique() {
        assert_ne!(SubscriptionId::new(), SubscriptionId::new());
    }
}
