//! Progress-tracking properties: a status map plus an append-only activity log.

use super::{Field, Property, PropertyBinding};
use crate::api::UserData;
use crate::model::document::DocumentMap;
use crate::model::values::{ModuleActivity, ModuleProgress, ProblemActivity, ProblemProgress};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::{SystemTime, UNIX_EPOCH};

/// Describes one progress-tracking property.
pub trait ProgressKind: 'static {
    type Status: Copy + PartialEq + Debug + Serialize + DeserializeOwned;
    type Activity: Clone + PartialEq + Debug + Serialize + DeserializeOwned;

    const ID: &'static str;
    const PROGRESS_KEY: &'static str;
    const ACTIVITY_KEY: &'static str;
    const DOCUMENT_KEYS: &'static [&'static str] = &[Self::PROGRESS_KEY, Self::ACTIVITY_KEY];

    fn activity(item_id: &str, status: Self::Status, timestamp_ms: i64) -> Self::Activity;

    fn expose(
        progress: BTreeMap<String, Self::Status>,
        activity: Vec<Self::Activity>,
        api: &mut UserData,
    );
}

pub struct ProgressProperty<K: ProgressKind> {
    progress: Field<BTreeMap<String, K::Status>>,
    activity: Field<Vec<K::Activity>>,
    binding: PropertyBinding,
    kind: PhantomData<K>,
}

impl<K: ProgressKind> ProgressProperty<K> {
    pub fn new() -> Self {
        Self {
            progress: Field::new(K::PROGRESS_KEY),
            activity: Field::new(K::ACTIVITY_KEY),
            binding: PropertyBinding::default(),
            kind: PhantomData,
        }
    }

    pub fn status(&self, item_id: &str) -> Option<K::Status> {
        self.progress.get()?.get(item_id).copied()
    }

    pub fn progress(&self) -> BTreeMap<String, K::Status> {
        self.progress.get().cloned().unwrap_or_default()
    }

    pub fn activity(&self) -> &[K::Activity] {
        self.activity.get().map(Vec::as_slice).unwrap_or_default()
    }

    /// Records `status` for `item_id` and appends an activity entry.
    pub fn set_status_at(&mut self, item_id: &str, status: K::Status, timestamp_ms: i64) {
        self.progress
            .get_or_insert_with(BTreeMap::new)
            .insert(item_id.to_string(), status);
        self.activity
            .get_or_insert_with(Vec::new)
            .push(K::activity(item_id, status, timestamp_ms));
        self.binding.commit(self.export_value(), K::ID);
    }

    pub fn set_status(&mut self, item_id: &str, status: K::Status) {
        self.set_status_at(item_id, status, now_epoch_ms());
    }
}

impl<K: ProgressKind> Default for ProgressProperty<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ProgressKind> Property for ProgressProperty<K> {
    fn id(&self) -> &'static str {
        K::ID
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
        self.progress.clear();
        self.activity.clear();
    }

    fn export_value(&self) -> DocumentMap {
        let mut document = DocumentMap::new();
        self.progress.export_into(&mut document);
        self.activity.export_into(&mut document);
        document
    }

    fn import_value_from_object(&mut self, document: &DocumentMap) {
        self.progress.import_from(document);
        self.activity.import_from(document);
    }

    fn expose_api(&self, api: &mut UserData) {
        K::expose(self.progress(), self.activity().to_vec(), api);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub enum ModulesProgress {}

impl ProgressKind for ModulesProgress {
    type Status = ModuleProgress;
    type Activity = ModuleActivity;

    const ID: &'static str = "userProgressOnModules";
    const PROGRESS_KEY: &'static str = "userProgressOnModules";
    const ACTIVITY_KEY: &'static str = "userProgressOnModulesActivity";

    fn activity(item_id: &str, status: ModuleProgress, timestamp_ms: i64) -> ModuleActivity {
        ModuleActivity {
            timestamp: timestamp_ms,
            module_id: item_id.to_string(),
            module_progress: status,
        }
    }

    fn expose(
        progress: BTreeMap<String, ModuleProgress>,
        activity: Vec<ModuleActivity>,
        api: &mut UserData,
    ) {
        api.user_progress_on_modules = progress;
        api.user_progress_on_modules_activity = activity;
    }
}

pub enum ProblemsProgress {}

impl ProgressKind for ProblemsProgress {
    type Status = ProblemProgress;
    type Activity = ProblemActivity;

    const ID: &'static str = "userProgressOnProblems";
    const PROGRESS_KEY: &'static str = "userProgressOnProblems";
    const ACTIVITY_KEY: &'static str = "userProgressOnProblemsActivity";

    fn activity(item_id: &str, status: ProblemProgress, timestamp_ms: i64) -> ProblemActivity {
        ProblemActivity {
            timestamp: timestamp_ms,
            problem_id: item_id.to_string(),
            problem_progress: status,
        }
    }

    fn expose(
        progress: BTreeMap<String, ProblemProgress>,
        activity: Vec<ProblemActivity>,
        api: &mut UserData,
    ) {
        api.user_progress_on_problems = progress;
        api.user_progress_on_problems_activity = activity;
    }
}

pub type UserProgressOnModulesProperty = ProgressProperty<ModulesProgress>;
pub type UserProgressOnProblemsProperty = ProgressProperty<ProblemsProgress>;

/// Current wall-clock time in Unix epoch milliseconds (0 if the clock is before 1970).
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{UserProgressOnModulesProperty, UserProgressOnProblemsProperty};
    use crate::model::values::{ModuleProgress, ProblemProgress};
    use crate::property::Property;
    use serde_json::json;

    #[test]
    fn set_status_updates_map_and_appends_activity() {
        let mut modules = UserProgressOnModulesProperty::new();
        modules.set_status_at("intro-dp", ModuleProgress::Reading, 100);
        modules.set_status_at("intro-dp", ModuleProgress::Complete, 200);

        assert_eq!(modules.status("intro-dp"), Some(ModuleProgress::Complete));
        assert_eq!(modules.activity().len(), 2);
        assert_eq!(
            serde_json::Value::Object(modules.export_value()),
            json!({
                "userProgressOnModules": { "intro-dp": "Complete" },
                "userProgressOnModulesActivity": [
                    { "timestamp": 100, "moduleID": "intro-dp", "moduleProgress": "Reading" },
                    { "timestamp": 200, "moduleID": "intro-dp", "moduleProgress": "Complete" }
                ]
            })
        );
    }

    #[test]
    fn import_handles_each_key_independently() {
        let mut problems = UserProgressOnProblemsProperty::new();
        problems.set_status_at("cses-1068", ProblemProgress::Solving, 5);

        problems.import_value_from_object(
            json!({ "userProgressOnProblems": { "cses-1068": "Solved" } })
                .as_object()
                .expect("object"),
        );

        assert_eq!(problems.status("cses-1068"), Some(ProblemProgress::Solved));
        assert_eq!(problems.activity().len(), 1);
    }

    #[test]
    fn malformed_map_entry_leaves_progress_unchanged() {
        let mut problems = UserProgressOnProblemsProperty::new();
        problems.set_status_at("cses-1068", ProblemProgress::Solving, 5);

        problems.import_value_from_object(
            json!({ "userProgressOnProblems": { "cses-1068": "Bogus" } })
                .as_object()
                .expect("object"),
        );

        assert_eq!(problems.status("cses-1068"), Some(ProblemProgress::Solving));
    }
}
