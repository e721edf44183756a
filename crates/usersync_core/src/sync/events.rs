//! Inbound event queue shared by the identity provider and the remote channel.
//!
//! External sources never call into the engine directly; they enqueue
//! `SyncEvent`s through listener handles and the engine drains them in
//! `SyncEngine::process_pending_events`.

use crate::identity::Identity;
use crate::model::document::DocumentMap;
use crate::remote::{RemoteError, SubscriptionId};
use log::debug;
use std::sync::mpsc::Sender;

/// One inbound event, in delivery order.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    IdentityChanged(Option<Identity>),
    Snapshot {
        subscription: SubscriptionId,
        /// `None` when the remote document does not exist.
        document: Option<DocumentMap>,
    },
    SnapshotError {
        subscription: SubscriptionId,
        error: RemoteError,
    },
}

/// Cloneable sender side of the engine queue.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    sender: Sender<SyncEvent>,
}

impl EventSink {
    pub(crate) fn new(sender: Sender<SyncEvent>) -> Self {
        Self { sender }
    }

    fn send(&self, event: SyncEvent) {
        if self.sender.send(event).is_err() {
            debug!("event=sync_event_dropped module=sync status=skipped reason=engine_dropped");
        }
    }
}

/// Handle given to the identity provider.
#[derive(Debug, Clone)]
pub struct IdentityListener {
    sink: EventSink,
}

impl IdentityListener {
    pub(crate) fn new(sink: EventSink) -> Self {
        Self { sink }
    }

    /// Reports the current identity (`None` when signed out or expired).
    pub fn identity_changed(&self, identity: Option<Identity>) {
        self.sink.send(SyncEvent::IdentityChanged(identity));
    }
}

/// Handle given to the remote channel for one subscription.
///
/// Every delivery carries the subscription id, so deliveries made after the
/// subscription was replaced are recognized and dropped.
#[derive(Debug, Clone)]
pub struct SnapshotListener {
    subscription: SubscriptionId,
    sink: EventSink,
}

impl SnapshotListener {
    pub(crate) fn new(subscription: SubscriptionId, sink: EventSink) -> Self {
        Self { subscription, sink }
    }

    pub fn subscription_id(&self) -> SubscriptionId {
        self.subscription
    }

    pub fn on_data(&self, document: Option<DocumentMap>) {
        self.sink.send(SyncEvent::Snapshot {
            subscription: self.subscription,
            document,
        });
    }

    pub fn on_error(&self, error: RemoteError) {
        self.sink.send(SyncEvent::SnapshotError {
            subscription: self.subscription,
            error,
        });
    }
}
