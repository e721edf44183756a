//! CLI smoke entry point.
//!
//! # Responsibility
//! - Run one local sign-in cycle against the bundled in-memory remote and a
//!   SQLite slot store, then print the resulting export.
//! - Keep output deterministic apart from timestamps.

use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use usersync_core::model::values::{ModuleProgress, Theme};
use usersync_core::{
    default_log_level, init_logging, ConfirmationRequest, Identity, InMemoryRemoteChannel,
    LocalStorage, LogReporter, SqliteLocalStorage, StaticIdentityProvider, SyncCollaborators,
    SyncConfig, SyncEngine, SyncError,
};

const DB_FILE_NAME: &str = "usersync_cli.sqlite3";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("usersync_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    if let Some(log_dir) = env_value("USERSYNC_LOG_DIR") {
        init_logging(default_log_level(), &log_dir).map_err(|err| err.to_string())?;
    }

    let db_path = resolve_db_path();
    let storage = Rc::new(
        SqliteLocalStorage::open(&db_path)
            .map_err(|err| format!("slot store open failed: {err}"))?,
    );

    let collaborators = SyncCollaborators {
        local_storage: storage.clone(),
        remote: Rc::new(InMemoryRemoteChannel::new()),
        identity: Rc::new(StaticIdentityProvider::new(Identity::new("cli-user"))),
        prompt: Rc::new(|request: ConfirmationRequest| {
            println!("confirm: {} -> yes", request.message());
            true
        }),
        reporter: Rc::new(LogReporter),
    };

    let mut engine =
        SyncEngine::start(SyncConfig::from_env(), collaborators).map_err(|err| err.to_string())?;
    engine.process_pending_events();

    seed_local_progress(&mut engine).map_err(|err| err.to_string())?;

    engine.sign_in().map_err(|err| err.to_string())?;
    engine.process_pending_events();

    let data = engine.user_data();
    let export = serde_json::to_string_pretty(&engine.get_data_export())
        .map_err(|err| format!("export serialization failed: {err}"))?;
    let slots = storage
        .slot_keys()
        .map_err(|err| format!("slot listing failed: {err}"))?;

    println!("usersync_core version={}", usersync_core::core_version());
    println!("db_path={}", db_path.display());
    println!("local_slots={}", slots.join(","));
    println!(
        "state uid={} loaded={} online={} revision={}",
        data.identity.map(|identity| identity.uid).unwrap_or_default(),
        data.is_loaded,
        data.is_online,
        data.revision
    );
    println!("{export}");

    log::info!("event=cli_run module=cli status=ok");
    Ok(())
}

fn seed_local_progress(engine: &mut SyncEngine) -> Result<(), SyncError> {
    engine.set_last_viewed_module("two-pointers")?;
    engine.set_theme(Theme::Dark)?;
    engine.set_module_progress("two-pointers", ModuleProgress::Reading)?;
    engine.record_visit()
}

fn resolve_db_path() -> PathBuf {
    env_value("USERSYNC_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join(DB_FILE_NAME))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}
