//! Typed values carried by the built-in properties.
//!
//! Field names follow the remote document schema (camelCase), which is
//! shared with other clients of the same user document.

use serde::{Deserialize, Serialize};

/// Preferred solution language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Cpp,
    Java,
    Py,
}

/// UI color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    /// Follow the operating system preference.
    #[default]
    System,
}

/// Last query entered in the division results table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DivisionTableQuery {
    pub division: String,
    pub season: String,
}

/// Advertisement dismissal flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdSettings {
    #[serde(rename = "hideMarch2021")]
    pub hide_march_2021: bool,
}

/// Reading progress on one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleProgress {
    #[serde(rename = "Not Started")]
    NotStarted,
    Reading,
    Practicing,
    Complete,
    Skipped,
    Ignored,
}

/// Solving progress on one problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProblemProgress {
    #[serde(rename = "Not Attempted")]
    NotAttempted,
    Solving,
    Solved,
    Reviewing,
    Skipped,
    Ignored,
}

/// One entry of the module progress activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleActivity {
    /// Unix epoch milliseconds.
    pub timestamp: i64,
    #[serde(rename = "moduleID")]
    pub module_id: String,
    #[serde(rename = "moduleProgress")]
    pub module_progress: ModuleProgress,
}

/// One entry of the problem progress activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemActivity {
    /// Unix epoch milliseconds.
    pub timestamp: i64,
    #[serde(rename = "problemID")]
    pub problem_id: String,
    #[serde(rename = "problemProgress")]
    pub problem_progress: ProblemProgress,
}
