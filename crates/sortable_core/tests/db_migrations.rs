use rusqlite::Connection;
use sortable_core::db::migrations::latest_version;
use sortable_core::db::{open_db, open_db_in_memory, DbError};
use sortable_core::{EntryRepoError, SqliteEntryRepository};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "entries");
    assert!(SqliteEntryRepository::try_new(&conn).is_ok());
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sortable_entries.db");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute(
            "INSERT INTO entries (content_type, document_id, data, created_at)
             VALUES ('api::product.product', 'd1', '{\"sortOrder\":0}', 1);",
            [],
        )
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let count: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM entries;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn initial_schema_carries_both_timestamps() {
    let conn = open_db_in_memory().unwrap();
    assert_eq!(latest_version(), 1);

    conn.execute(
        "INSERT INTO entries (content_type, document_id)
         VALUES ('api::product.product', 'd1');",
        [],
    )
    .unwrap();
    let (created_at, updated_at): (i64, i64) = conn
        .query_row(
            "SELECT created_at, updated_at FROM entries WHERE document_id = 'd1';",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert!(created_at > 0);
    assert_eq!(updated_at, created_at);
}

#[test]
fn entries_data_must_be_a_json_object() {
    let conn = open_db_in_memory().unwrap();
    let result = conn.execute(
        "INSERT INTO entries (content_type, document_id, data, created_at)
         VALUES ('api::product.product', 'd1', '[1,2]', 1);",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteEntryRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        EntryRepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
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
