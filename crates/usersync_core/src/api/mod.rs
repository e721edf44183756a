//! Consumer-facing API.
//!
//! # Responsibility
//! - Expose one flat `UserData` record rebuilt from every property.
//! - Provide typed setters and the export/import/sign-in entry points the UI
//!   calls.
//!
//! # Invariants
//! - `user_data` always builds a fresh record; fields are never merged
//!   across calls.
//! - Setters never fail on local or remote storage errors; they only fail
//!   when the target property is not registered.

use crate::identity::Identity;
use crate::model::document::DocumentMap;
use crate::model::values::{
    AdSettings, DivisionTableQuery, Lang, ModuleActivity, ModuleProgress, ProblemActivity,
    ProblemProgress, Theme,
};
use crate::property::last_visit::LastVisitProperty;
use crate::property::progress::{
    now_epoch_ms, UserProgressOnModulesProperty, UserProgressOnProblemsProperty,
};
use crate::property::value::{
    AdSettingsProperty, DivisionTableQueryProperty, HideTagsAndDifficultyProperty,
    LastReadAnnouncementProperty, LastViewedModuleProperty, ShowIgnoredProperty, ThemeProperty,
    UserLangProperty,
};
use crate::property::Property;
use crate::remote::WriteMode;
use crate::sync::{ConfirmationRequest, SyncEngine, SyncError};
use log::{error, info};
use std::any::type_name;
use std::collections::BTreeMap;

/// Snapshot of every property plus engine status, as shown to the UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserData {
    pub identity: Option<Identity>,
    pub is_loaded: bool,
    pub is_online: bool,
    /// Re-render counter at the time the record was built.
    pub revision: u64,

    pub lang: Lang,
    pub last_viewed_module: Option<String>,
    pub hide_tags_and_difficulty: bool,
    pub division_table_query: DivisionTableQuery,
    pub show_ignored: bool,
    pub theme: Theme,
    pub last_read_announcement: Option<String>,
    pub user_progress_on_modules: BTreeMap<String, ModuleProgress>,
    pub user_progress_on_modules_activity: Vec<ModuleActivity>,
    pub user_progress_on_problems: BTreeMap<String, ProblemProgress>,
    pub user_progress_on_problems_activity: Vec<ProblemActivity>,
    pub last_visit_date: Option<i64>,
    pub consecutive_visits: u32,
    pub num_pageviews: u64,
    /// Page views keyed by UTC day start (epoch ms, as a string).
    pub pageviews_per_day: BTreeMap<String, u64>,
    pub ad_settings: AdSettings,
}

impl SyncEngine {
    /// Builds the consumer record from the current property values.
    pub fn user_data(&self) -> UserData {
        let mut data = UserData {
            identity: self.identity().cloned(),
            is_loaded: self.is_loaded(),
            is_online: self.is_online(),
            revision: self.revision(),
            ..UserData::default()
        };
        for property in self.registry().iter() {
            property.expose_api(&mut data);
        }
        data
    }

    fn property_mut<P: Property>(&mut self) -> Result<&mut P, SyncError> {
        self.registry_mut()
            .property_mut::<P>()
            .ok_or_else(|| SyncError::PropertyNotRegistered(type_name::<P>().to_string()))
    }

    pub fn set_lang(&mut self, lang: Lang) -> Result<(), SyncError> {
        self.property_mut::<UserLangProperty>()?.set(lang);
        Ok(())
    }

    pub fn set_last_viewed_module(
        &mut self,
        module_id: impl Into<String>,
    ) -> Result<(), SyncError> {
        self.property_mut::<LastViewedModuleProperty>()?
            .set(module_id.into());
        Ok(())
    }

    pub fn set_hide_tags_and_difficulty(&mut self, hide: bool) -> Result<(), SyncError> {
        self.property_mut::<HideTagsAndDifficultyProperty>()?.set(hide);
        Ok(())
    }

    pub fn set_division_table_query(&mut self, query: DivisionTableQuery) -> Result<(), SyncError> {
        self.property_mut::<DivisionTableQueryProperty>()?.set(query);
        Ok(())
    }

    pub fn set_show_ignored(&mut self, show: bool) -> Result<(), SyncError> {
        self.property_mut::<ShowIgnoredProperty>()?.set(show);
        Ok(())
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<(), SyncError> {
        self.property_mut::<ThemeProperty>()?.set(theme);
        Ok(())
    }

    pub fn set_last_read_announcement(
        &mut self,
        announcement_id: impl Into<String>,
    ) -> Result<(), SyncError> {
        self.property_mut::<LastReadAnnouncementProperty>()?
            .set(announcement_id.into());
        Ok(())
    }

    /// Records module progress and appends an activity entry stamped now.
    pub fn set_module_progress(
        &mut self,
        module_id: &str,
        progress: ModuleProgress,
    ) -> Result<(), SyncError> {
        self.property_mut::<UserProgressOnModulesProperty>()?
            .set_status(module_id, progress);
        Ok(())
    }

    /// Records problem progress and appends an activity entry stamped now.
    pub fn set_user_progress_on_problems(
        &mut self,
        problem_id: &str,
        progress: ProblemProgress,
    ) -> Result<(), SyncError> {
        self.property_mut::<UserProgressOnProblemsProperty>()?
            .set_status(problem_id, progress);
        Ok(())
    }

    /// Counts one page view at the current time.
    pub fn record_visit(&mut self) -> Result<(), SyncError> {
        self.property_mut::<LastVisitProperty>()?
            .record_visit(now_epoch_ms());
        Ok(())
    }

    pub fn set_ad_settings(&mut self, settings: AdSettings) -> Result<(), SyncError> {
        self.property_mut::<AdSettingsProperty>()?.set(settings);
        Ok(())
    }

    /// Full export of every property, suitable for a user-facing backup.
    pub fn get_data_export(&self) -> DocumentMap {
        self.registry().export_all()
    }

    /// Replaces local (and remote, when signed in) data with `data` after
    /// user confirmation. Returns whether the import was applied.
    pub fn import_user_data(&mut self, data: &DocumentMap) -> bool {
        if !self
            .collaborators()
            .prompt
            .confirm(ConfirmationRequest::ReplaceWithImport)
        {
            info!("event=import_user_data module=api status=skipped reason=declined");
            return false;
        }

        self.registry_mut().replace_all(data);
        self.registry().write_all_to_local_storage();

        if let Some(identity) = self.identity().cloned() {
            let export = self.registry().export_all();
            if let Err(err) = self
                .collaborators()
                .remote
                .write(&identity, export, WriteMode::Replace)
            {
                error!(
                    "event=import_user_data module=api status=error uid={} code={}",
                    identity.uid, err.code
                );
                self.report(&SyncError::RemoteWrite(err), "import_user_data");
            }
        }

        info!(
            "event=import_user_data module=api status=ok keys={}",
            data.len()
        );
        self.trigger_rerender();
        true
    }

    /// Starts the provider's sign-in flow. The identity transition arrives
    /// as an event.
    pub fn sign_in(&self) -> Result<(), SyncError> {
        self.collaborators().identity.sign_in().map_err(|err| {
            let err = SyncError::Identity(err);
            self.report(&err, "sign_in");
            err
        })
    }

    /// Signs out and clears local data immediately.
    pub fn sign_out(&mut self) -> Result<(), SyncError> {
        if let Err(err) = self.collaborators().identity.sign_out() {
            let err = SyncError::Identity(err);
            self.report(&err, "sign_out");
            return Err(err);
        }
        self.sign_out_locally();
        Ok(())
    }
}
