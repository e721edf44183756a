#![allow(dead_code)]

use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use usersync_core::sync::TelemetryContext;
use usersync_core::{
    ConfirmationRequest, DocumentMap, Identity, InMemoryRemoteChannel, LocalStorage,
    MemoryLocalStorage, StaticIdentityProvider, SyncCollaborators, SyncConfig, SyncEngine,
    SyncError, SyncReporter,
};

pub const UID: &str = "user-1";

/// Reporter that records what would have been shown to the user.
#[derive(Default)]
pub struct RecordingReporter {
    pub user_visible: RefCell<Vec<String>>,
    pub telemetry: RefCell<Vec<TelemetryContext>>,
}

impl SyncReporter for RecordingReporter {
    fn report_user_visible_error(&self, err: &SyncError) {
        self.user_visible.borrow_mut().push(err.to_string());
    }

    fn report_telemetry_exception(&self, _err: &SyncError, context: &TelemetryContext) {
        self.telemetry.borrow_mut().push(context.clone());
    }
}

pub struct Harness {
    pub storage: Rc<dyn LocalStorage>,
    pub remote: Rc<InMemoryRemoteChannel>,
    pub identity: Rc<StaticIdentityProvider>,
    pub reporter: Rc<RecordingReporter>,
    pub answer: Rc<Cell<bool>>,
    pub prompts: Rc<RefCell<Vec<ConfirmationRequest>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_storage(Rc::new(MemoryLocalStorage::new()))
    }

    pub fn with_storage(storage: Rc<dyn LocalStorage>) -> Self {
        Self {
            storage,
            remote: Rc::new(InMemoryRemoteChannel::new()),
            identity: Rc::new(StaticIdentityProvider::new(Identity::new(UID))),
            reporter: Rc::new(RecordingReporter::default()),
            answer: Rc::new(Cell::new(true)),
            prompts: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn collaborators(&self) -> SyncCollaborators {
        let answer = Rc::clone(&self.answer);
        let prompts = Rc::clone(&self.prompts);
        SyncCollaborators {
            local_storage: Rc::clone(&self.storage),
            remote: self.remote.clone(),
            identity: self.identity.clone(),
            prompt: Rc::new(move |request: ConfirmationRequest| {
                prompts.borrow_mut().push(request);
                answer.get()
            }),
            reporter: self.reporter.clone(),
        }
    }

    /// Starts an engine and applies the provider's initial signed-out report.
    pub fn start(&self) -> SyncEngine {
        let mut engine =
            SyncEngine::start(SyncConfig::default(), self.collaborators()).expect("engine start");
        engine.process_pending_events();
        engine
    }

    pub fn signed_in(&self) -> SyncEngine {
        let mut engine = self.start();
        engine.sign_in().expect("sign in");
        engine.process_pending_events();
        engine
    }

    pub fn slot(&self, property_id: &str) -> Option<String> {
        self.storage
            .read_slot(&format!("guide:userData:{property_id}"))
            .expect("read slot")
    }
}

pub fn doc(value: Value) -> DocumentMap {
    value.as_object().cloned().expect("object literal")
}
