//! Property contract shared by every unit of synchronized user state.
//!
//! # Responsibility
//! - Define the `Property` trait the engine drives without knowing concrete
//!   value types.
//! - Provide `PropertyBinding` (local slot, remote target, re-render hook)
//!   and `Field` (one document key) so concrete properties only describe
//!   their values.
//!
//! # Invariants
//! - `export_value` omits unset fields; an empty export means "never set".
//! - `import_value_from_object` only touches the property's own keys and
//!   leaves the value unchanged when a key is absent or malformed.
//! - Local slot failures never propagate out of a property.

use crate::api::UserData;
use crate::model::document::DocumentMap;
use crate::remote::RemoteDocumentRef;
use crate::storage::{LocalStorage, LocalStorageError};
use crate::sync::error::SyncError;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

pub mod last_visit;
pub mod progress;
pub mod registry;
pub mod value;

/// Callback fired after a mutation the UI must observe.
#[derive(Clone)]
pub struct RerenderTrigger(Rc<dyn Fn()>);

impl RerenderTrigger {
    pub fn new(callback: impl Fn() + 'static) -> Self {
        Self(Rc::new(callback))
    }

    pub fn fire(&self) {
        (self.0)()
    }
}

impl Debug for RerenderTrigger {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("RerenderTrigger")
    }
}

struct LocalSlot {
    storage: Rc<dyn LocalStorage>,
    key: String,
}

/// Persistence surfaces a property is bound to.
#[derive(Default)]
pub struct PropertyBinding {
    local: Option<LocalSlot>,
    remote: Option<RemoteDocumentRef>,
    rerender: Option<RerenderTrigger>,
}

impl PropertyBinding {
    pub fn bind_local(&mut self, storage: Rc<dyn LocalStorage>, slot_key: String) {
        self.local = Some(LocalSlot {
            storage,
            key: slot_key,
        });
    }

    pub fn slot_key(&self) -> Option<&str> {
        self.local.as_ref().map(|slot| slot.key.as_str())
    }

    pub fn set_remote(&mut self, document: Option<RemoteDocumentRef>) {
        self.remote = document;
    }

    pub fn remote(&self) -> Option<&RemoteDocumentRef> {
        self.remote.as_ref()
    }

    pub fn set_rerender(&mut self, trigger: RerenderTrigger) {
        self.rerender = Some(trigger);
    }

    /// Reads the stored slot; unreadable or corrupt slots read as absent.
    pub fn read_local(&self) -> Option<DocumentMap> {
        let slot = self.local.as_ref()?;
        let raw = match slot.storage.read_slot(slot.key.as_str()) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(
                    "event=local_read module=property status=error slot={} error={err}",
                    slot.key
                );
                return None;
            }
        };
        match serde_json::from_str::<DocumentMap>(raw.as_str()) {
            Ok(document) => Some(document),
            Err(err) => {
                warn!(
                    "event=local_read module=property status=skipped slot={} reason=corrupt_payload error={err}",
                    slot.key
                );
                None
            }
        }
    }

    /// Persists `contribution`; an empty contribution removes the slot.
    ///
    /// Failures are logged here. Callers keep the in-memory value either way.
    pub fn write_local(&self, contribution: &DocumentMap) -> Result<(), SyncError> {
        let Some(slot) = self.local.as_ref() else {
            return Ok(());
        };
        if contribution.is_empty() {
            self.erase_local();
            return Ok(());
        }
        serde_json::to_string(contribution)
            .map_err(|err| LocalStorageError::Serialization(err.to_string()))
            .and_then(|payload| slot.storage.write_slot(slot.key.as_str(), payload.as_str()))
            .map_err(|err| {
                let err = SyncError::from(err);
                warn!(
                    "event=local_write module=property status=error slot={} fallback=memory_only error={err}",
                    slot.key
                );
                err
            })
    }

    pub fn erase_local(&self) {
        let Some(slot) = self.local.as_ref() else {
            return;
        };
        if let Err(err) = slot.storage.delete_slot(slot.key.as_str()) {
            warn!(
                "event=local_erase module=property status=error slot={} error={err}",
                slot.key
            );
        }
    }

    pub fn rerender(&self) {
        if let Some(trigger) = self.rerender.as_ref() {
            trigger.fire();
        }
    }

    /// Write-through after a user mutation: local slot, remote merge, re-render.
    pub fn commit(&self, contribution: DocumentMap, operation: &'static str) {
        let _ = self.write_local(&contribution);
        if let Some(remote) = self.remote.as_ref() {
            remote.push(contribution, operation);
        }
        self.rerender();
    }
}

impl Debug for PropertyBinding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyBinding")
            .field("slot", &self.slot_key())
            .field("remote", &self.remote)
            .field("rerender", &self.rerender.is_some())
            .finish()
    }
}

/// One self-contained unit of user state.
pub trait Property: Any {
    /// Stable identifier; also names the local slot.
    fn id(&self) -> &'static str;

    /// Remote document keys owned by this property.
    fn document_keys(&self) -> &'static [&'static str];

    fn binding(&self) -> &PropertyBinding;

    fn binding_mut(&mut self) -> &mut PropertyBinding;

    /// Restores the documented default (unset) value in memory.
    fn reset(&mut self);

    fn export_value(&self) -> DocumentMap;

    fn import_value_from_object(&mut self, document: &DocumentMap);

    /// Fills this property's getter fields on the consumer record.
    fn expose_api(&self, api: &mut UserData);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn bind_local_storage(&mut self, storage: Rc<dyn LocalStorage>, slot_prefix: &str) {
        let slot_key = format!("{slot_prefix}{}", self.id());
        self.binding_mut().bind_local(storage, slot_key);
    }

    fn set_remote_document(&mut self, document: Option<RemoteDocumentRef>) {
        self.binding_mut().set_remote(document);
    }

    fn set_trigger_rerender(&mut self, trigger: RerenderTrigger) {
        self.binding_mut().set_rerender(trigger);
    }

    fn initialize_from_local_storage(&mut self) {
        self.reset();
        if let Some(stored) = self.binding().read_local() {
            self.import_value_from_object(&stored);
        }
    }

    fn write_value_to_local_storage(&self) {
        let _ = self.binding().write_local(&self.export_value());
    }

    fn erase_from_local_storage(&self) {
        self.binding().erase_local();
    }
}

/// One document key holding an optional typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct Field<T> {
    key: &'static str,
    value: Option<T>,
}

impl<T> Field<T>
where
    T: Serialize + DeserializeOwned,
{
    pub const fn new(key: &'static str) -> Self {
        Self { key, value: None }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }

    pub fn get_or_insert_with(&mut self, default: impl FnOnce() -> T) -> &mut T {
        self.value.get_or_insert_with(default)
    }

    pub fn clear(&mut self) {
        self.value = None;
    }

    pub fn export_into(&self, document: &mut DocumentMap) {
        let Some(value) = self.value.as_ref() else {
            return;
        };
        match serde_json::to_value(value) {
            Ok(serialized) => {
                document.insert(self.key.to_string(), serialized);
            }
            Err(err) => warn!(
                "event=property_export module=property status=skipped key={} error={err}",
                self.key
            ),
        }
    }

    /// Absent key: unchanged. `null`: cleared. Malformed: unchanged.
    pub fn import_from(&mut self, document: &DocumentMap) {
        let Some(raw) = document.get(self.key) else {
            return;
        };
        if raw.is_null() {
            debug!(
                "event=property_import module=property status=cleared key={}",
                self.key
            );
            self.value = None;
            return;
        }
        match T::deserialize(raw) {
            Ok(value) => self.value = Some(value),
            Err(err) => {
                let err = SyncError::ImportValidation {
                    key: self.key.to_string(),
                    message: err.to_string(),
                };
                warn!(
                    "event=property_import module=property status=skipped reason=invalid_value value_kind={} error={err}",
                    value_kind(raw)
                );
            }
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::{Field, PropertyBinding};
    use crate::model::document::DocumentMap;
    use crate::storage::{LocalStorage, LocalStorageError, MemoryLocalStorage};
    use crate::sync::error::SyncError;
    use serde_json::json;
    use std::rc::Rc;

    fn doc(value: serde_json::Value) -> DocumentMap {
        value.as_object().cloned().expect("test document is an object")
    }

    #[test]
    fn field_distinguishes_absent_null_and_malformed() {
        let mut field = Field::<bool>::new("showIgnored");
        field.set(true);

        field.import_from(&doc(json!({ "theme": "dark" })));
        assert_eq!(field.get(), Some(&true));

        field.import_from(&doc(json!({ "showIgnored": "yes" })));
        assert_eq!(field.get(), Some(&true));

        field.import_from(&doc(json!({ "showIgnored": false })));
        assert_eq!(field.get(), Some(&false));

        field.import_from(&doc(json!({ "showIgnored": null })));
        assert_eq!(field.get(), None);
    }

    #[test]
    fn field_exports_falsy_values_but_not_unset_ones() {
        let mut field = Field::<bool>::new("showIgnored");
        let mut document = DocumentMap::new();
        field.export_into(&mut document);
        assert!(document.is_empty());

        field.set(false);
        field.export_into(&mut document);
        assert_eq!(document, doc(json!({ "showIgnored": false })));
    }

    #[test]
    fn binding_removes_slot_for_empty_contribution_and_ignores_corrupt_payload() {
        let storage = Rc::new(MemoryLocalStorage::new());
        let mut binding = PropertyBinding::default();
        binding.bind_local(storage.clone(), "p:theme".to_string());

        binding.write_local(&doc(json!({ "theme": "dark" }))).unwrap();
        assert_eq!(binding.read_local(), Some(doc(json!({ "theme": "dark" }))));

        binding.write_local(&DocumentMap::new()).unwrap();
        assert!(storage.read_slot("p:theme").expect("read").is_none());

        storage.write_slot("p:theme", "not json").expect("write");
        assert_eq!(binding.read_local(), None);
    }

    #[test]
    fn quota_failure_is_returned_as_local_storage_error() {
        let storage = Rc::new(MemoryLocalStorage::with_quota(16));
        let mut binding = PropertyBinding::default();
        binding.bind_local(storage.clone(), "p:lastViewedModule".to_string());

        let err = binding
            .write_local(&doc(json!({ "lastViewedModule": "two-pointers" })))
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::LocalStorage(LocalStorageError::QuotaExceeded { quota_bytes: 16, .. })
        ));
        assert!(std::error::Error::source(&err).is_some());
        assert!(storage.slot_keys().unwrap().is_empty());
    }

    #[test]
    fn unbound_binding_is_inert() {
        let binding = PropertyBinding::default();
        binding.write_local(&doc(json!({ "theme": "dark" }))).unwrap();
        binding.erase_local();
        binding.rerender();
        assert_eq!(binding.read_local(), None);
    }
}
