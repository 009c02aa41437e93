//! Local SQLite database layer for Depot Admin.
//!
//! Uses rusqlite with WAL mode. Holds the per-entity fallback ledgers, their
//! id sequences, and the local settings table. Provides schema migrations
//! and settings helpers.

use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Shared database handle. The mutex doubles as the ledger critical section.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

/// Schema migrations, applied in order. Each runs in its own transaction
/// together with its `schema_version` row.
const MIGRATIONS: &[(i32, &str)] = &[
    (
        1,
        "CREATE TABLE IF NOT EXISTS local_settings (
            setting_category TEXT NOT NULL,
            setting_key TEXT NOT NULL,
            setting_value TEXT NOT NULL,
            updated_at TEXT DEFAULT (datetime('now')),
            PRIMARY KEY (setting_category, setting_key)
         );
         CREATE TABLE IF NOT EXISTS fallback_ledger (
            entity_type TEXT PRIMARY KEY,
            records TEXT NOT NULL,
            updated_at TEXT DEFAULT (datetime('now'))
         );",
    ),
    (
        2,
        "CREATE TABLE IF NOT EXISTS ledger_sequence (
            entity_type TEXT PRIMARY KEY,
            high_water INTEGER NOT NULL DEFAULT 0
         );",
    ),
];

fn schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

/// Open `{data_dir}/depot.db`, creating the directory when needed. A file
/// that fails to open or migrate is removed (with its WAL/SHM siblings) and
/// opened fresh once; the fallback ledgers reseed on next read.
pub fn init(data_dir: &Path) -> Result<DbState, String> {
    fs::create_dir_all(data_dir).map_err(|e| format!("Failed to create data dir: {e}"))?;
    let db_path = data_dir.join("depot.db");
    info!(path = %db_path.display(), "opening database");

    let conn = match open_file(&db_path) {
        Ok(conn) => conn,
        Err(first) => {
            warn!(error = %first, "database unusable, recreating");
            for suffix in ["db", "db-wal", "db-shm"] {
                let _ = fs::remove_file(db_path.with_extension(suffix));
            }
            open_file(&db_path).map_err(|e| format!("Database open failed after retry: {e}"))?
        }
    };

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path,
    })
}

/// In-memory database with the full schema. Used by `--ephemeral` runs.
pub fn open_in_memory() -> Result<DbState, String> {
    let conn = Connection::open_in_memory().map_err(|e| format!("sqlite open: {e}"))?;
    run_migrations(&conn)?;
    Ok(DbState {
        conn: Mutex::new(conn),
        db_path: PathBuf::from(":memory:"),
    })
}

fn open_file(path: &Path) -> Result<Connection, String> {
    let conn = Connection::open(path).map_err(|e| format!("sqlite open: {e}"))?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )
    .map_err(|e| format!("pragma setup: {e}"))?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn run_migrations(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("create schema_version: {e}"))?;

    let current = schema_version(conn);
    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        let batch = format!(
            "BEGIN;\n{sql}\nINSERT INTO schema_version (version) VALUES ({version});\nCOMMIT;"
        );
        if let Err(e) = conn.execute_batch(&batch) {
            let _ = conn.execute_batch("ROLLBACK;");
            error!(version, error = %e, "migration failed");
            return Err(format!("migration v{version}: {e}"));
        }
        info!(version, "schema migrated");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Settings helpers
// ---------------------------------------------------------------------------

pub fn get_setting(conn: &Connection, category: &str, key: &str) -> Option<String> {
    conn.query_row(
        "SELECT setting_value FROM local_settings WHERE setting_category = ?1 AND setting_key = ?2",
        params![category, key],
        |row| row.get(0),
    )
    .ok()
}

/// Upsert one setting.
pub fn set_setting(
    conn: &Connection,
    category: &str,
    key: &str,
    value: &str,
) -> Result<(), String> {
    conn.execute(
        "INSERT INTO local_settings (setting_category, setting_key, setting_value, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(setting_category, setting_key) DO UPDATE SET
            setting_value = excluded.setting_value,
            updated_at = excluded.updated_at",
        params![category, key, value],
    )
    .map_err(|e| format!("set_setting: {e}"))?;
    Ok(())
}

/// All settings of one category as `(key, value)` pairs.
pub fn get_category_settings(conn: &Connection, category: &str) -> Vec<(String, String)> {
    let query = || -> rusqlite::Result<Vec<(String, String)>> {
        let mut stmt = conn.prepare(
            "SELECT setting_key, setting_value FROM local_settings
             WHERE setting_category = ?1 ORDER BY setting_key",
        )?;
        let rows = stmt.query_map(params![category], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.flatten().collect())
    };
    query().unwrap_or_else(|e| {
        error!(category, error = %e, "reading settings failed");
        Vec::new()
    })
}

pub fn delete_all_settings(conn: &Connection, category: &str) -> Result<(), String> {
    conn.execute(
        "DELETE FROM local_settings WHERE setting_category = ?1",
        params![category],
    )
    .map_err(|e| format!("delete_all_settings: {e}"))?;
    Ok(())
}

#[cfg(test)]
pub fn run_migrations_for_test(conn: &Connection) {
    run_migrations(conn).expect("migrations");
}

/// Fresh in-memory database state for tests.
#[cfg(test)]
pub fn test_state() -> DbState {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    run_migrations_for_test(&conn);
    DbState {
        conn: Mutex::new(conn),
        db_path: PathBuf::from(":memory:"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        Connection::open_in_memory().expect("open in-memory db")
    }

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .flatten()
            .collect()
    }

    #[test]
    fn migrations_create_all_tables() {
        let conn = test_db();
        run_migrations(&conn).expect("migrations");
        let tables = table_names(&conn);
        for expected in [
            "fallback_ledger",
            "ledger_sequence",
            "local_settings",
            "schema_version",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = test_db();
        run_migrations(&conn).expect("first run");
        run_migrations(&conn).expect("second run");
        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as i32);
    }

    #[test]
    fn init_creates_file_db() {
        let dir = std::env::temp_dir().join(format!("depot-db-test-{}", uuid::Uuid::new_v4()));
        let state = init(&dir).expect("init");
        assert!(state.db_path.exists());
        drop(state);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn settings_round_trip() {
        let conn = test_db();
        run_migrations(&conn).expect("migrations");

        set_setting(&conn, "app", "page_size", "20").expect("set");
        assert_eq!(get_setting(&conn, "app", "page_size"), Some("20".to_string()));

        set_setting(&conn, "app", "page_size", "50").expect("update");
        assert_eq!(get_setting(&conn, "app", "page_size"), Some("50".to_string()));
        assert_eq!(
            get_category_settings(&conn, "app"),
            vec![("page_size".to_string(), "50".to_string())]
        );

        delete_all_settings(&conn, "app").expect("delete");
        assert!(get_setting(&conn, "app", "page_size").is_none());
    }
}
