//! Single-key properties.
//!
//! Each concrete property is `ValueProperty<K>` for a marker type `K` that
//! names the document key, the value type and the default. Distinct markers
//! give distinct Rust types, so the registry can look properties up by type.

use super::{Field, Property, PropertyBinding};
use crate::api::UserData;
use crate::model::document::DocumentMap;
use crate::model::values::{AdSettings, DivisionTableQuery, Lang, Theme};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::fmt::Debug;
use std::marker::PhantomData;

/// Describes one single-key property.
pub trait ValueKind: 'static {
    type Value: Clone + PartialEq + Debug + Serialize + DeserializeOwned;

    /// Property id and document key.
    const KEY: &'static str;

    const DOCUMENT_KEYS: &'static [&'static str] = &[Self::KEY];

    fn default_value() -> Self::Value;

    /// Copies the stored value (`None` when unset) onto the consumer record.
    fn expose(value: Option<&Self::Value>, api: &mut UserData);
}

/// Property holding one optional value under one document key.
pub struct ValueProperty<K: ValueKind> {
    field: Field<K::Value>,
    binding: PropertyBinding,
    kind: PhantomData<K>,
}

impl<K: ValueKind> ValueProperty<K> {
    pub fn new() -> Self {
        Self {
            field: Field::new(K::KEY),
            binding: PropertyBinding::default(),
            kind: PhantomData,
        }
    }

    /// Stored value, `None` when never set.
    pub fn get(&self) -> Option<&K::Value> {
        self.field.get()
    }

    /// Stored value or the documented default.
    pub fn value(&self) -> K::Value {
        self.field.get().cloned().unwrap_or_else(K::default_value)
    }

    /// Sets the value and writes it through to local and remote storage.
    pub fn set(&mut self, value: K::Value) {
        self.field.set(value);
        self.binding.commit(self.export_value(), K::KEY);
    }
}

impl<K: ValueKind> Default for ValueProperty<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ValueKind> Property for ValueProperty<K> {
    fn id(&self) -> &'static str {
        K::KEY
    }

    fn document_keys(&self) -> &'static [&'static str] {
        K::DOCUMENT_KEYS
    }

    fn binding(&self) -> &PropertyBinding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut PropertyBinding {
        &mut self.binding
    }

    fn reset(&mut self) {
        self.field.clear();
    }

    fn export_value(&self) -> DocumentMap {
        let mut document = DocumentMap::new();
        self.field.export_into(&mut document);
        document
    }

    fn import_value_from_object(&mut self, document: &DocumentMap) {
        self.field.import_from(document);
    }

    fn expose_api(&self, api: &mut UserData) {
        K::expose(self.field.get(), api);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub enum UserLang {}

impl ValueKind for UserLang {
    type Value = Lang;
    const KEY: &'static str = "lang";

    fn default_value() -> Lang {
        Lang::default()
    }

    fn expose(value: Option<&Lang>, api: &mut UserData) {
        api.lang = value.copied().unwrap_or_default();
    }
}

pub enum LastViewedModule {}

impl ValueKind for LastViewedModule {
    type Value = String;
    const KEY: &'static str = "lastViewedModule";

    fn default_value() -> String {
        String::new()
    }

    fn expose(value: Option<&String>, api: &mut UserData) {
        api.last_viewed_module = value.cloned();
    }
}

pub enum HideTagsAndDifficulty {}

impl ValueKind for HideTagsAndDifficulty {
    type Value = bool;
    const KEY: &'static str = "hideTagsAndDifficulty";

    fn default_value() -> bool {
        false
    }

    fn expose(value: Option<&bool>, api: &mut UserData) {
        api.hide_tags_and_difficulty = value.copied().unwrap_or_default();
    }
}

pub enum DivisionTable {}

impl ValueKind for DivisionTable {
    type Value = DivisionTableQuery;
    const KEY: &'static str = "divisionTableQuery";

    fn default_value() -> DivisionTableQuery {
        DivisionTableQuery::default()
    }

    fn expose(value: Option<&DivisionTableQuery>, api: &mut UserData) {
        api.division_table_query = value.cloned().unwrap_or_default();
    }
}

pub enum ShowIgnored {}

impl ValueKind for ShowIgnored {
    type Value = bool;
    const KEY: &'static str = "showIgnored";

    fn default_value() -> bool {
        false
    }

    fn expose(value: Option<&bool>, api: &mut UserData) {
        api.show_ignored = value.copied().unwrap_or_default();
    }
}

pub enum UserTheme {}

impl ValueKind for UserTheme {
    type Value = Theme;
    const KEY: &'static str = "theme";

    fn default_value() -> Theme {
        Theme::default()
    }

    fn expose(value: Option<&Theme>, api: &mut UserData) {
        api.theme = value.copied().unwrap_or_default();
    }
}

pub enum LastReadAnnouncement {}

impl ValueKind for LastReadAnnouncement {
    type Value = String;
    const KEY: &'static str = "lastReadAnnouncement";

    fn default_value() -> String {
        String::new()
    }

    fn expose(value: Option<&String>, api: &mut UserData) {
        api.last_read_announcement = value.cloned();
    }
}

pub enum UserAdSettings {}

impl ValueKind for UserAdSettings {
    type Value = AdSettings;
    const KEY: &'static str = "adSettings";

    fn default_value() -> AdSettings {
        AdSettings::default()
    }

    fn expose(value: Option<&AdSettings>, api: &mut UserData) {
        api.ad_settings = value.copied().unwrap_or_default();
    }
}

pub type UserLangProperty = ValueProperty<UserLang>;
pub type LastViewedModuleProperty = ValueProperty<LastViewedModule>;
pub type HideTagsAndDifficultyProperty = ValueProperty<HideTagsAndDifficulty>;
pub type DivisionTableQueryProperty = ValueProperty<DivisionTable>;
pub type ShowIgnoredProperty = ValueProperty<ShowIgnored>;
pub type ThemeProperty = ValueProperty<UserTheme>;
pub type LastReadAnnouncementProperty = ValueProperty<LastReadAnnouncement>;
pub type AdSettingsProperty = ValueProperty<UserAdSettings>;

#[cfg(test)]
mod tests {
    use super::{LastViewedModuleProperty, ShowIgnoredProperty, ThemeProperty};
    use crate::model::document::DocumentMap;
    use crate::model::values::Theme;
    use crate::property::{Property, RerenderTrigger};
    use crate::storage::{LocalStorage, MemoryLocalStorage};
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn unset_property_exports_nothing_and_reports_default() {
        let theme = ThemeProperty::new();
        assert!(theme.export_value().is_empty());
        assert_eq!(theme.get(), None);
        assert_eq!(theme.value(), Theme::System);
    }

    #[test]
    fn set_writes_local_slot_and_fires_rerender() {
        let storage = Rc::new(MemoryLocalStorage::new());
        let renders = Rc::new(Cell::new(0));
        let counter = Rc::clone(&renders);

        let mut show_ignored = ShowIgnoredProperty::new();
        show_ignored.bind_local_storage(storage.clone(), "guide:userData:");
        show_ignored.set_trigger_rerender(RerenderTrigger::new(move || {
            counter.set(counter.get() + 1)
        }));

        show_ignored.set(false);

        assert_eq!(renders.get(), 1);
        assert_eq!(
            storage
                .read_slot("guide:userData:showIgnored")
                .expect("read")
                .as_deref(),
            Some(r#"{"showIgnored":false}"#)
        );
    }

    #[test]
    fn initialize_restores_stored_value_and_resets_when_slot_missing() {
        let storage = Rc::new(MemoryLocalStorage::new());
        storage
            .write_slot("p:lastViewedModule", r#"{"lastViewedModule":"dp-intro"}"#)
            .expect("seed slot");

        let mut module = LastViewedModuleProperty::new();
        module.bind_local_storage(storage.clone(), "p:");
        module.initialize_from_local_storage();
        module.initialize_from_local_storage();
        assert_eq!(module.get().map(String::as_str), Some("dp-intro"));

        module.erase_from_local_storage();
        module.initialize_from_local_storage();
        assert_eq!(module.get(), None);
    }

    #[test]
    fn import_ignores_unrelated_keys() {
        let mut theme = ThemeProperty::new();
        theme.import_value_from_object(
            json!({ "theme": "dark", "lang": "py" })
                .as_object()
                .expect("object"),
        );
        assert_eq!(theme.get(), Some(&Theme::Dark));

        theme.import_value_from_object(&DocumentMap::new());
        assert_eq!(theme.get(), Some(&Theme::Dark));
    }
}
