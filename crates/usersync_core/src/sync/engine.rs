//! Sync engine lifecycle and first-sync conflict resolution.
//!
//! # Responsibility
//! - Bind every property to local storage and the re-render hook at start.
//! - Rebind properties to the remote document on identity transitions and
//!   own the single live snapshot subscription.
//! - Apply inbound snapshots atomically (import, local write-through, one
//!   re-render) and resolve the "remote document missing" case once per
//!   identity binding.
//!
//! # Invariants
//! - `initialize_all` runs once at start and again only after sign-out erase.
//! - Snapshots from a cancelled subscription are never applied.
//! - Within one drained batch only the latest snapshot per subscription is
//!   applied.
//! - A stream error never erases local data and never changes state.
//! - An applied snapshot is authoritative: keys it lacks end up unset.

use crate::config::{ConfigError, SyncConfig};
use crate::identity::{Identity, IdentityProvider};
use crate::model::document::{is_blank, DocumentMap};
use crate::property::registry::PropertyRegistry;
use crate::property::RerenderTrigger;
use crate::remote::{
    RemoteDocumentChannel, RemoteDocumentRef, RemoteError, Subscription, SubscriptionId, WriteMode,
};
use crate::storage::LocalStorage;
use crate::sync::collaborators::{
    ConfirmationPrompt, ConfirmationRequest, SyncReporter, TelemetryContext,
};
use crate::sync::error::SyncError;
use crate::sync::events::{EventSink, IdentityListener, SnapshotListener, SyncEvent};
use log::{debug, error, info, warn};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver};

/// External collaborators the engine is wired to.
pub struct SyncCollaborators {
    pub local_storage: Rc<dyn LocalStorage>,
    pub remote: Rc<dyn RemoteDocumentChannel>,
    pub identity: Rc<dyn IdentityProvider>,
    pub prompt: Rc<dyn ConfirmationPrompt>,
    pub reporter: Rc<dyn SyncReporter>,
}

/// Engine lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    SignedOut,
    /// Identity known, first snapshot not yet applied.
    SigningIn { identity: Identity },
    Synced { identity: Identity },
}

impl SyncState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::SignedOut => None,
            Self::SigningIn { identity } | Self::Synced { identity } => Some(identity),
        }
    }

    pub fn is_loaded(&self) -> bool {
        !matches!(self, Self::SigningIn { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            Self::SignedOut => "signed_out",
            Self::SigningIn { .. } => "signing_in",
            Self::Synced { .. } => "synced",
        }
    }
}

type RenderListener = Rc<dyn Fn(u64)>;

/// Re-render counter shared with every property trigger.
#[derive(Clone, Default)]
struct RenderSignal {
    revision: Rc<Cell<u64>>,
    listener: Rc<RefCell<Option<RenderListener>>>,
}

impl RenderSignal {
    fn fire(&self) {
        let revision = self.revision.get() + 1;
        self.revision.set(revision);
        let listener = self.listener.borrow().clone();
        if let Some(listener) = listener {
            listener(revision);
        }
    }

    fn trigger(&self) -> RerenderTrigger {
        let signal = self.clone();
        RerenderTrigger::new(move || signal.fire())
    }
}

/// Orchestrates properties, identity transitions and remote snapshots.
pub struct SyncEngine {
    config: SyncConfig,
    registry: PropertyRegistry,
    collaborators: SyncCollaborators,
    state: SyncState,
    subscription: Option<Subscription>,
    online: bool,
    render: RenderSignal,
    sink: EventSink,
    events: Receiver<SyncEvent>,
}

impl SyncEngine {
    /// Starts an engine over the built-in property set.
    pub fn start(config: SyncConfig, collaborators: SyncCollaborators) -> Result<Self, SyncError> {
        Self::start_with_registry(config, PropertyRegistry::standard()?, collaborators)
    }

    /// Starts an engine over `registry`.
    ///
    /// # Side effects
    /// - Loads every property from local storage.
    /// - Registers the identity listener; the provider's first report is
    ///   applied on the next `process_pending_events`.
    pub fn start_with_registry(
        config: SyncConfig,
        mut registry: PropertyRegistry,
        collaborators: SyncCollaborators,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        if registry.find(config.first_sync_marker.as_str()).is_none() {
            let marker = config.first_sync_marker.clone();
            return Err(ConfigError::UnknownFirstSyncMarker(marker).into());
        }

        let (sender, events) = mpsc::channel();
        let sink = EventSink::new(sender);
        let render = RenderSignal::default();

        registry.bind_local_storage_all(
            Rc::clone(&collaborators.local_storage),
            config.slot_prefix.as_str(),
        );
        registry.rerender_binding_all(&render.trigger());
        registry.initialize_all();

        collaborators
            .identity
            .watch(IdentityListener::new(sink.clone()));

        info!(
            "event=sync_engine_start module=sync status=ok properties={} slot_prefix={} marker={}",
            registry.len(),
            config.slot_prefix,
            config.first_sync_marker
        );

        Ok(Self {
            config,
            registry,
            collaborators,
            state: SyncState::SignedOut,
            subscription: None,
            online: false,
            render,
            sink,
            events,
        })
    }

    /// Installs the UI callback invoked with the new revision after every
    /// re-render trigger. The callback must not call back into the engine.
    pub fn on_render(&mut self, listener: impl Fn(u64) + 'static) {
        *self.render.listener.borrow_mut() = Some(Rc::new(listener));
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.state.identity()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_loaded()
    }

    /// Whether a subscription is live and its last delivery succeeded.
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Number of re-renders triggered so far.
    pub fn revision(&self) -> u64 {
        self.render.revision.get()
    }

    pub fn registry(&self) -> &PropertyRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut PropertyRegistry {
        &mut self.registry
    }

    pub(crate) fn collaborators(&self) -> &SyncCollaborators {
        &self.collaborators
    }

    /// Listener for hosts that observe identity changes themselves.
    pub fn identity_listener(&self) -> IdentityListener {
        IdentityListener::new(self.sink.clone())
    }

    /// Drains and applies every queued event, including events enqueued while
    /// processing. Returns the number of events applied.
    pub fn process_pending_events(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let batch = self.events.try_iter().collect::<Vec<_>>();
            if batch.is_empty() {
                return applied;
            }

            let mut latest_snapshot = HashMap::new();
            for (index, event) in batch.iter().enumerate() {
                if let SyncEvent::Snapshot { subscription, .. } = event {
                    latest_snapshot.insert(*subscription, index);
                }
            }

            for (index, event) in batch.into_iter().enumerate() {
                match event {
                    SyncEvent::IdentityChanged(identity) => {
                        if self.handle_identity_changed(identity) {
                            applied += 1;
                        }
                    }
                    SyncEvent::Snapshot {
                        subscription,
                        document,
                    } => {
                        if latest_snapshot.get(&subscription) != Some(&index) {
                            debug!(
                                "event=snapshot module=sync status=skipped reason=superseded subscription={subscription}"
                            );
                            continue;
                        }
                        if self.handle_snapshot(subscription, document) {
                            applied += 1;
                        }
                    }
                    SyncEvent::SnapshotError {
                        subscription,
                        error,
                    } => {
                        if self.handle_snapshot_error(subscription, error) {
                            applied += 1;
                        }
                    }
                }
            }
        }
    }

    /// Re-subscribes the current identity after a failed subscribe.
    ///
    /// No-op when signed out or already subscribed.
    pub fn retry_subscription(&mut self) -> Result<(), SyncError> {
        if self.subscription.is_some() || self.state.identity().is_none() {
            return Ok(());
        }
        self.subscribe_current()
    }

    pub(crate) fn trigger_rerender(&self) {
        self.render.fire();
    }

    pub(crate) fn report(&self, err: &SyncError, operation: &'static str) {
        self.collaborators.reporter.report_user_visible_error(err);
        self.collaborators.reporter.report_telemetry_exception(
            err,
            &TelemetryContext {
                user_id: self.state.identity().map(|identity| identity.uid.clone()),
                operation,
            },
        );
    }

    /// Cancels the subscription, erases local slots, restores defaults and
    /// detaches the remote document.
    pub(crate) fn sign_out_locally(&mut self) {
        self.cancel_subscription();
        self.registry.rebind_remote_all(None);
        self.registry.erase_all();
        self.registry.initialize_all();
        self.state = SyncState::SignedOut;
        self.online = false;
        info!("event=identity_unbound module=sync status=ok state=signed_out");
        self.trigger_rerender();
    }

    fn handle_identity_changed(&mut self, identity: Option<Identity>) -> bool {
        if self.state.identity() == identity.as_ref() {
            debug!(
                "event=identity_changed module=sync status=skipped reason=unchanged state={}",
                self.state.label()
            );
            return false;
        }

        match identity {
            Some(identity) => {
                if let Some(previous) = self.state.identity().cloned() {
                    info!(
                        "event=identity_switched module=sync status=ok from={} to={}",
                        previous.uid, identity.uid
                    );
                    self.cancel_subscription();
                    self.registry.erase_all();
                    self.registry.initialize_all();
                }
                self.bind_identity(identity)
            }
            None => self.sign_out_locally(),
        }
        true
    }

    fn bind_identity(&mut self, identity: Identity) {
        self.cancel_subscription();
        self.registry.rebind_remote_all(Some(RemoteDocumentRef::new(
            identity.clone(),
            Rc::clone(&self.collaborators.remote),
            Rc::clone(&self.collaborators.reporter),
        )));
        info!(
            "event=identity_bound module=sync status=ok state=signing_in uid={}",
            identity.uid
        );
        self.state = SyncState::SigningIn { identity };
        self.online = false;

        // Failure is already reported; `retry_subscription` recovers.
        let _ = self.subscribe_current();
        self.trigger_rerender();
    }

    fn subscribe_current(&mut self) -> Result<(), SyncError> {
        let Some(identity) = self.state.identity().cloned() else {
            return Ok(());
        };
        let listener = SnapshotListener::new(SubscriptionId::new(), self.sink.clone());
        match self.collaborators.remote.subscribe(&identity, listener) {
            Ok(subscription) => {
                debug!(
                    "event=subscribe module=sync status=ok uid={} subscription={}",
                    identity.uid,
                    subscription.id()
                );
                self.subscription = Some(subscription);
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=subscribe module=sync status=error uid={} code={}",
                    identity.uid, err.code
                );
                let err = SyncError::RemoteRead(err);
                self.report(&err, "subscribe");
                Err(err)
            }
        }
    }

    fn cancel_subscription(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            debug!(
                "event=unsubscribe module=sync status=ok subscription={}",
                subscription.id()
            );
            subscription.cancel();
        }
    }

    fn is_active(&self, subscription: SubscriptionId) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|active| active.id() == subscription)
    }

    fn handle_snapshot(
        &mut self,
        subscription: SubscriptionId,
        document: Option<DocumentMap>,
    ) -> bool {
        if !self.is_active(subscription) {
            debug!(
                "event=snapshot module=sync status=skipped reason=stale_subscription subscription={subscription}"
            );
            return false;
        }
        let Some(identity) = self.state.identity().cloned() else {
            return false;
        };

        let first_sync = matches!(self.state, SyncState::SigningIn { .. });
        let keys = match document {
            Some(document) => {
                self.registry.replace_all(&document);
                document.len()
            }
            // Absent document: local values stay as they are.
            None => {
                if first_sync {
                    self.offer_local_data(&identity);
                }
                0
            }
        };
        self.registry.write_all_to_local_storage();
        self.state = SyncState::Synced {
            identity: identity.clone(),
        };
        self.online = true;
        info!(
            "event=snapshot module=sync status=ok uid={} first_sync={first_sync} keys={keys}",
            identity.uid
        );
        self.trigger_rerender();
        true
    }

    /// Remote document is missing on first sync: push local data only with
    /// the user's consent, and only if the marker property holds a value.
    fn offer_local_data(&self, identity: &Identity) {
        if !self.local_data_is_not_empty() {
            info!(
                "event=first_sync_push module=sync status=skipped reason=local_empty uid={}",
                identity.uid
            );
            return;
        }
        if !self
            .collaborators
            .prompt
            .confirm(ConfirmationRequest::PushLocalData)
        {
            info!(
                "event=first_sync_push module=sync status=skipped reason=declined uid={}",
                identity.uid
            );
            return;
        }

        let export = self.registry.export_all();
        match self
            .collaborators
            .remote
            .write(identity, export.clone(), WriteMode::Merge)
        {
            Ok(()) => {
                info!(
                    "event=first_sync_push module=sync status=ok uid={} keys={}",
                    identity.uid,
                    export.len()
                );
            }
            Err(err) => {
                error!(
                    "event=first_sync_push module=sync status=error uid={} code={}",
                    identity.uid, err.code
                );
                self.report(&SyncError::RemoteWrite(err), "first_sync_push");
            }
        }
    }

    fn local_data_is_not_empty(&self) -> bool {
        self.registry
            .find(self.config.first_sync_marker.as_str())
            .is_some_and(|marker| !is_blank(&marker.export_value()))
    }

    fn handle_snapshot_error(&mut self, subscription: SubscriptionId, error: RemoteError) -> bool {
        if !self.is_active(subscription) {
            debug!(
                "event=snapshot_error module=sync status=skipped reason=stale_subscription subscription={subscription}"
            );
            return false;
        }
        warn!(
            "event=snapshot_error module=sync status=error state={} code={}",
            self.state.label(),
            error.code
        );
        self.online = false;
        self.report(&SyncError::RemoteRead(error), "snapshot");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{RenderSignal, SyncState};
    use crate::identity::Identity;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn only_signing_in_is_not_loaded() {
        let identity = Identity::new("u1");
        assert!(SyncState::SignedOut.is_loaded());
        assert!(!SyncState::SigningIn {
            identity: identity.clone()
        }
        .is_loaded());
        assert!(SyncState::Synced {
            identity: identity.clone()
        }
        .is_loaded());
        assert_eq!(
            SyncState::Synced {
                identity: identity.clone()
            }
            .identity(),
            Some(&identity)
        );
    }

    #[test]
    fn triggers_share_one_revision_counter() {
        let signal = RenderSignal::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let listener: Rc<dyn Fn(u64)> = Rc::new(move |revision| sink.borrow_mut().push(revision));
        *signal.listener.borrow_mut() = Some(listener);

        let first = signal.trigger();
        let second = signal.trigger();
        first.fire();
        second.fire();

        assert_eq!(signal.revision.get(), 2);
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }
}
