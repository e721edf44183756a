use rusqlite::Connection;
use usersync_core::db::migrations::latest_version;
use usersync_core::db::{open_db, open_db_in_memory, DbError};
use usersync_core::{LocalStorage, LocalStorageError, SqliteLocalStorage};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "local_slots");
}

#[test]
fn reopening_store_keeps_slots_and_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("usersync.db");

    let store = SqliteLocalStorage::open(&path).unwrap();
    store
        .write_slot("guide:userData:theme", r#"{"theme":"dark"}"#)
        .unwrap();
    drop(store);

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    let store = SqliteLocalStorage::from_connection(conn);
    assert_eq!(
        store.read_slot("guide:userData:theme").unwrap().as_deref(),
        Some(r#"{"theme":"dark"}"#)
    );
    assert_eq!(store.slot_keys().unwrap(), vec!["guide:userData:theme"]);
}

#[test]
fn opening_store_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir
        .path()
        .join("profiles")
        .join("default")
        .join("usersync.db");

    let store = SqliteLocalStorage::open(&path).unwrap();
    store
        .write_slot("guide:userData:lang", r#"{"lang":"py"}"#)
        .unwrap();

    assert!(path.is_file());
}

#[test]
fn parent_path_that_is_a_file_is_reported_as_create_dir_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"occupied").unwrap();

    match open_db(blocker.join("usersync.db")).unwrap_err() {
        DbError::CreateDir { path, .. } => assert_eq!(path, blocker),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn opening_store_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(matches!(
        SqliteLocalStorage::open(&path),
        Err(LocalStorageError::Db(DbError::UnsupportedSchemaVersion { .. }))
    ));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
