//! In-process remote document store.
//!
//! Behaves like a last-write-wins document database with live listeners:
//! every successful write re-delivers the whole document to the owner's
//! subscribers. Used by the CLI and as a test double (failure injection,
//! write log, out-of-band edits from "another device").

use super::{RemoteDocumentChannel, RemoteError, Subscription, WriteMode};
use crate::identity::Identity;
use crate::model::document::DocumentMap;
use crate::sync::events::SnapshotListener;
use log::debug;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

/// One accepted write, as observed by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub uid: String,
    pub document: DocumentMap,
    pub mode: WriteMode,
}

struct Subscriber {
    token: u64,
    uid: String,
    listener: SnapshotListener,
}

#[derive(Default)]
struct StoreState {
    documents: BTreeMap<String, DocumentMap>,
    subscribers: Vec<Subscriber>,
    next_token: u64,
    writes: Vec<RecordedWrite>,
    next_write_error: Option<RemoteError>,
    next_subscribe_error: Option<RemoteError>,
}

impl StoreState {
    fn listeners_for(&self, uid: &str) -> Vec<SnapshotListener> {
        self.subscribers
            .iter()
            .filter(|subscriber| subscriber.uid == uid)
            .map(|subscriber| subscriber.listener.clone())
            .collect()
    }
}

#[derive(Default)]
pub struct InMemoryRemoteChannel {
    state: Rc<RefCell<StoreState>>,
}

impl InMemoryRemoteChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self, uid: &str) -> Option<DocumentMap> {
        self.state.borrow().documents.get(uid).cloned()
    }

    /// Writes accepted so far, oldest first. Out-of-band edits are not included.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state.borrow().writes.clone()
    }

    pub fn subscriber_count(&self, uid: &str) -> usize {
        self.state
            .borrow()
            .subscribers
            .iter()
            .filter(|subscriber| subscriber.uid == uid)
            .count()
    }

    /// Replaces `uid`'s document as another device would, notifying subscribers.
    pub fn put_document(&self, uid: &str, document: DocumentMap) {
        self.state
            .borrow_mut()
            .documents
            .insert(uid.to_string(), document);
        self.notify(uid);
    }

    /// Deletes `uid`'s document, notifying subscribers with an absent snapshot.
    pub fn remove_document(&self, uid: &str) {
        self.state.borrow_mut().documents.remove(uid);
        self.notify(uid);
    }

    /// Delivers a stream error to every subscriber of `uid`.
    pub fn emit_error(&self, uid: &str, error: RemoteError) {
        let listeners = self.state.borrow().listeners_for(uid);
        for listener in listeners {
            listener.on_error(error.clone());
        }
    }

    /// Makes the next `write` fail with `error`.
    pub fn fail_next_write(&self, error: RemoteError) {
        self.state.borrow_mut().next_write_error = Some(error);
    }

    /// Makes the next `subscribe` fail with `error`.
    pub fn fail_next_subscribe(&self, error: RemoteError) {
        self.state.borrow_mut().next_subscribe_error = Some(error);
    }

    fn notify(&self, uid: &str) {
        let (listeners, document) = {
            let state = self.state.borrow();
            (state.listeners_for(uid), state.documents.get(uid).cloned())
        };
        for listener in listeners {
            listener.on_data(document.clone());
        }
    }
}

impl RemoteDocumentChannel for InMemoryRemoteChannel {
    fn subscribe(
        &self,
        identity: &Identity,
        listener: SnapshotListener,
    ) -> Result<Subscription, RemoteError> {
        let (token, current) = {
            let mut state = self.state.borrow_mut();
            if let Some(error) = state.next_subscribe_error.take() {
                return Err(error);
            }
            let token = state.next_token;
            state.next_token += 1;
            state.subscribers.push(Subscriber {
                token,
                uid: identity.uid.clone(),
                listener: listener.clone(),
            });
            (token, state.documents.get(identity.uid.as_str()).cloned())
        };
        debug!(
            "event=remote_subscribe module=remote status=ok uid={} subscription={}",
            identity.uid,
            listener.subscription_id()
        );
        listener.on_data(current);

        let state: Weak<RefCell<StoreState>> = Rc::downgrade(&self.state);
        Ok(Subscription::new(listener.subscription_id(), move || {
            if let Some(state) = state.upgrade() {
                state
                    .borrow_mut()
                    .subscribers
                    .retain(|subscriber| subscriber.token != token);
            }
        }))
    }

    fn write(
        &self,
        identity: &Identity,
        document: DocumentMap,
        mode: WriteMode,
    ) -> Result<(), RemoteError> {
        {
            let mut state = self.state.borrow_mut();
            if let Some(error) = state.next_write_error.take() {
                return Err(error);
            }
            state.writes.push(RecordedWrite {
                uid: identity.uid.clone(),
                document: document.clone(),
                mode,
            });
            match mode {
                WriteMode::Replace => {
                    state.documents.insert(identity.uid.clone(), document);
                }
                WriteMode::Merge => {
                    let stored = state.documents.entry(identity.uid.clone()).or_default();
                    for (key, value) in document {
                        stored.insert(key, value);
                    }
                }
            }
        }
        self.notify(identity.uid.as_str());
        Ok(())
    }
}
