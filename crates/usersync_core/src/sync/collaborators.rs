//! User-facing collaborators consumed by the engine: confirmation prompts and
//! error reporting.

use crate::sync::error::SyncError;
use log::{error, warn};

/// Destructive or ambiguous actions that need the user's consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationRequest {
    /// First sync found no remote document but local progress exists.
    PushLocalData,
    /// User-initiated import replaces all current data.
    ReplaceWithImport,
}

impl ConfirmationRequest {
    /// Text shown to the user.
    pub fn message(self) -> &'static str {
        match self {
            Self::PushLocalData => {
                "Override server data with local progress? (You'll lose your local progress if you choose no.)"
            }
            Self::ReplaceWithImport => {
                "Import user data (beta)? All existing data will be lost. Make sure to back up your data before proceeding."
            }
        }
    }
}

/// Blocking yes/no prompt.
pub trait ConfirmationPrompt {
    fn confirm(&self, request: ConfirmationRequest) -> bool;
}

impl<F> ConfirmationPrompt for F
where
    F: Fn(ConfirmationRequest) -> bool,
{
    fn confirm(&self, request: ConfirmationRequest) -> bool {
        self(request)
    }
}

/// Extra metadata attached to telemetry reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryContext {
    pub user_id: Option<String>,
    pub operation: &'static str,
}

/// Notification + telemetry sink.
pub trait SyncReporter {
    fn report_user_visible_error(&self, err: &SyncError);
    fn report_telemetry_exception(&self, err: &SyncError, context: &TelemetryContext);
}

/// Reporter that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl SyncReporter for LogReporter {
    fn report_user_visible_error(&self, err: &SyncError) {
        warn!("event=user_notification module=sync status=error error={err}");
    }

    fn report_telemetry_exception(&self, err: &SyncError, context: &TelemetryContext) {
        error!(
            "event=telemetry_exception module=sync status=error operation={} user_id={} error={err}",
            context.operation,
            context.user_id.as_deref().unwrap_or("-")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfirmationPrompt, ConfirmationRequest};

    #[test]
    fn closures_act_as_prompts() {
        let decline_imports =
            |request: ConfirmationRequest| request != ConfirmationRequest::ReplaceWithImport;
        assert!(decline_imports.confirm(ConfirmationRequest::PushLocalData));
        assert!(!decline_imports.confirm(ConfirmationRequest::ReplaceWithImport));
    }

    #[test]
    fn messages_are_distinct() {
        assert_ne!(
            ConfirmationRequest::PushLocalData.message(),
            ConfirmationRequest::ReplaceWithImport.message()
        );
    }
}
