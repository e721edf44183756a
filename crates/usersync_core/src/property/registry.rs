//! Ordered property registry and aggregate operations.
//!
//! # Responsibility
//! - Own every registered property in insertion order.
//! - Fan aggregate operations (initialize/export/import/erase/rebind) out to
//!   each member.
//!
//! # Invariants
//! - Property ids are unique camelCase identifiers.
//! - Document keys are disjoint across properties, so `export_all` never
//!   overwrites one property's key with another's.
//! - Iteration order is insertion order.

use super::last_visit::LastVisitProperty;
use super::progress::{UserProgressOnModulesProperty, UserProgressOnProblemsProperty};
use super::value::{
    AdSettingsProperty, DivisionTableQueryProperty, HideTagsAndDifficultyProperty,
    LastReadAnnouncementProperty, LastViewedModuleProperty, ShowIgnoredProperty, ThemeProperty,
    UserLangProperty,
};
use super::{Property, RerenderTrigger};
use crate::model::document::{merge_into, DocumentMap};
use crate::remote::RemoteDocumentRef;
use crate::storage::LocalStorage;
use log::error;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

static PROPERTY_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][A-Za-z0-9]*$").expect("valid property id regex"));

/// Property registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidId(String),
    DuplicateId(String),
    DuplicateDocumentKey {
        key: String,
        owner: String,
        contender: String,
    },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(value) => write!(f, "property id is invalid: `{value}`"),
            Self::DuplicateId(value) => write!(f, "property id already registered: {value}"),
            Self::DuplicateDocumentKey {
                key,
                owner,
                contender,
            } => write!(
                f,
                "document key `{key}` of property `{contender}` is already owned by `{owner}`"
            ),
        }
    }
}

impl Error for RegistryError {}

/// Fixed, ordered collection of properties.
#[derive(Default)]
pub struct PropertyRegistry {
    properties: Vec<Box<dyn Property>>,
}

impl PropertyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry with every built-in property.
    pub fn standard() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(UserLangProperty::new())?;
        registry.register(LastViewedModuleProperty::new())?;
        registry.register(HideTagsAndDifficultyProperty::new())?;
        registry.register(DivisionTableQueryProperty::new())?;
        registry.register(ShowIgnoredProperty::new())?;
        registry.register(ThemeProperty::new())?;
        registry.register(LastReadAnnouncementProperty::new())?;
        registry.register(UserProgressOnModulesProperty::new())?;
        registry.register(UserProgressOnProblemsProperty::new())?;
        registry.register(LastVisitProperty::new())?;
        registry.register(AdSettingsProperty::new())?;
        Ok(registry)
    }

    /// Appends one property after id and key-ownership validation.
    pub fn register(&mut self, property: impl Property) -> Result<(), RegistryError> {
        let id = property.id();
        if !PROPERTY_ID_RE.is_match(id) {
            return Err(RegistryError::InvalidId(id.to_string()));
        }
        if self.find(id).is_some() {
            return Err(RegistryError::DuplicateId(id.to_string()));
        }
        for key in property.document_keys() {
            if let Some(owner) = self.owner_of(key) {
                return Err(RegistryError::DuplicateDocumentKey {
                    key: key.to_string(),
                    owner: owner.to_string(),
                    contender: id.to_string(),
                });
            }
        }

        self.properties.push(Box::new(property));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Property ids in iteration order.
    pub fn ids(&self) -> Vec<&'static str> {
        self.properties.iter().map(|property| property.id()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Property> {
        self.properties.iter().map(|property| property.as_ref())
    }

    pub fn find(&self, id: &str) -> Option<&dyn Property> {
        self.iter().find(|property| property.id() == id)
    }

    /// Returns the registered property of concrete type `P`.
    pub fn property<P: Property>(&self) -> Option<&P> {
        self.properties
            .iter()
            .find_map(|property| property.as_any().downcast_ref::<P>())
    }

    pub fn property_mut<P: Property>(&mut self) -> Option<&mut P> {
        self.properties
            .iter_mut()
            .find_map(|property| property.as_any_mut().downcast_mut::<P>())
    }

    fn owner_of(&self, key: &str) -> Option<&'static str> {
        self.iter()
            .find(|property| property.document_keys().contains(&key))
            .map(|property| property.id())
    }

    pub fn bind_local_storage_all(&mut self, storage: Rc<dyn LocalStorage>, slot_prefix: &str) {
        for property in &mut self.properties {
            property.bind_local_storage(Rc::clone(&storage), slot_prefix);
        }
    }

    pub fn rerender_binding_all(&mut self, trigger: &RerenderTrigger) {
        for property in &mut self.properties {
            property.set_trigger_rerender(trigger.clone());
        }
    }

    pub fn rebind_remote_all(&mut self, document: Option<RemoteDocumentRef>) {
        for property in &mut self.properties {
            property.set_remote_document(document.clone());
        }
    }

    pub fn initialize_all(&mut self) {
        for property in &mut self.properties {
            property.initialize_from_local_storage();
        }
    }

    /// Concatenates every property's export contribution.
    pub fn export_all(&self) -> DocumentMap {
        self.iter().fold(DocumentMap::new(), |mut document, property| {
            for key in merge_into(&mut document, property.export_value()) {
                error!(
                    "event=export_all module=registry status=error reason=key_collision key={key} property={}",
                    property.id()
                );
            }
            document
        })
    }

    pub fn import_all(&mut self, document: &DocumentMap) {
        for property in &mut self.properties {
            property.import_value_from_object(document);
        }
    }

    /// Makes `document` authoritative: every property is reset, then imports
    /// its keys. Keys absent from `document` end up unset.
    pub fn replace_all(&mut self, document: &DocumentMap) {
        for property in &mut self.properties {
            property.reset();
            property.import_value_from_object(document);
        }
    }

    pub fn write_all_to_local_storage(&self) {
        for property in self.iter() {
            property.write_value_to_local_storage();
        }
    }

    pub fn erase_all(&self) {
        for property in self.iter() {
            property.erase_from_local_storage();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PropertyRegistry, RegistryError};
    use crate::api::UserData;
    use crate::model::values::Theme;
    use crate::property::value::{ThemeProperty, UserLangProperty, ValueKind, ValueProperty};

    enum ShoutyKey {}

    impl ValueKind for ShoutyKey {
        type Value = bool;
        const KEY: &'static str = "Shouty Key";

        fn default_value() -> bool {
            false
        }

        fn expose(_value: Option<&bool>, _api: &mut UserData) {}
    }

    enum ThemeAgain {}

    impl ValueKind for ThemeAgain {
        type Value = String;
        const KEY: &'static str = "themeAgain";
        const DOCUMENT_KEYS: &'static [&'static str] = &["theme"];

        fn default_value() -> String {
            String::new()
        }

        fn expose(_value: Option<&String>, _api: &mut UserData) {}
    }

    #[test]
    fn standard_registry_has_every_builtin_in_order() {
        let registry = PropertyRegistry::standard().expect("standard registry");
        assert_eq!(
            registry.ids(),
            vec![
                "lang",
                "lastViewedModule",
                "hideTagsAndDifficulty",
                "divisionTableQuery",
                "showIgnored",
                "theme",
                "lastReadAnnouncement",
                "userProgressOnModules",
                "userProgressOnProblems",
                "lastVisit",
                "adSettings",
            ]
        );
    }

    #[test]
    fn rejects_invalid_duplicate_and_colliding_registrations() {
        let mut registry = PropertyRegistry::new();
        registry
            .register(ThemeProperty::new())
            .expect("first registration");

        assert!(matches!(
            registry.register(ValueProperty::<ShoutyKey>::new()),
            Err(RegistryError::InvalidId(_))
        ));
        assert!(matches!(
            registry.register(ThemeProperty::new()),
            Err(RegistryError::DuplicateId(_))
        ));
        assert_eq!(
            registry.register(ValueProperty::<ThemeAgain>::new()),
            Err(RegistryError::DuplicateDocumentKey {
                key: "theme".to_string(),
                owner: "theme".to_string(),
                contender: "themeAgain".to_string(),
            })
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn replace_all_drops_keys_missing_from_document_while_import_all_keeps_them() {
        let mut registry = PropertyRegistry::standard().expect("standard registry");
        let first = serde_json::json!({ "theme": "dark", "lang": "java" });
        let second = serde_json::json!({ "lang": "py" });

        registry.import_all(first.as_object().expect("object"));
        registry.import_all(second.as_object().expect("object"));
        assert_eq!(registry.export_all().len(), 2);

        registry.replace_all(second.as_object().expect("object"));
        assert_eq!(registry.export_all(), second.as_object().cloned().expect("object"));
    }

    #[test]
    fn typed_lookup_finds_concrete_property() {
        let mut registry = PropertyRegistry::standard().expect("standard registry");
        registry
            .property_mut::<ThemeProperty>()
            .expect("theme registered")
            .set(Theme::Dark);

        assert_eq!(
            registry.property::<ThemeProperty>().and_then(|p| p.get()),
            Some(&Theme::Dark)
        );
        assert!(registry.property::<UserLangProperty>().is_some());
        assert_eq!(
            registry.export_all().get("theme"),
            Some(&serde_json::json!("dark"))
        );
    }
}
