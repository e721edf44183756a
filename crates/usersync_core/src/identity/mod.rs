//! Identity binding contract.
//!
//! The engine never manages sessions itself: it registers an
//! `IdentityListener` with the provider and reacts to the identities the
//! provider reports.

use crate::sync::events::IdentityListener;
use std::cell::RefCell;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Signed-in user. The `uid` keys the remote document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            email: None,
        }
    }
}

/// Identity provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The user dismissed the sign-in flow.
    Cancelled,
    /// No provider is configured for this session.
    Unavailable,
    Provider(String),
}

impl Display for IdentityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "sign-in was cancelled"),
            Self::Unavailable => write!(f, "identity provider is unavailable"),
            Self::Provider(message) => write!(f, "identity provider error: {message}"),
        }
    }
}

impl Error for IdentityError {}

/// External sign-in/sign-out flow.
///
/// `sign_in`/`sign_out` return once the provider accepted or rejected the
/// request; the resulting identity transition is reported through the
/// listener passed to `watch`.
pub trait IdentityProvider {
    fn watch(&self, listener: IdentityListener);
    fn sign_in(&self) -> Result<(), IdentityError>;
    fn sign_out(&self) -> Result<(), IdentityError>;
}

/// Provider that always signs in as one fixed identity.
///
/// Used by the CLI and tests; `expire_session` simulates a server-side
/// session end.
#[derive(Debug)]
pub struct StaticIdentityProvider {
    identity: Identity,
    listener: RefCell<Option<IdentityListener>>,
    next_sign_in_error: RefCell<Option<IdentityError>>,
}

impl StaticIdentityProvider {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            listener: RefCell::new(None),
            next_sign_in_error: RefCell::new(None),
        }
    }

    /// Makes the next `sign_in` call fail with `error`.
    pub fn fail_next_sign_in(&self, error: IdentityError) {
        *self.next_sign_in_error.borrow_mut() = Some(error);
    }

    pub fn expire_session(&self) {
        self.emit(None);
    }

    fn emit(&self, identity: Option<Identity>) {
        if let Some(listener) = self.listener.borrow().as_ref() {
            listener.identity_changed(identity);
        }
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn watch(&self, listener: IdentityListener) {
        // Mirrors auth observers that report the current state on registration.
        listener.identity_changed(None);
        *self.listener.borrow_mut() = Some(listener);
    }

    fn sign_in(&self) -> Result<(), IdentityError> {
        if let Some(error) = self.next_sign_in_error.borrow_mut().take() {
            return Err(error);
        }
        self.emit(Some(self.identity.clone()));
        Ok(())
    }

    fn sign_out(&self) -> Result<(), IdentityError> {
        self.emit(None);
        Ok(())
    }
}
