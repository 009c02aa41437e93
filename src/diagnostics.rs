//! Diagnostics for Depot Admin.
//!
//! Provides:
//! - **About info**: version, build timestamp, git SHA, platform, data dir,
//!   offline flag and per-entity fallback ledger sizes
//! - **Log rotation helpers**: used by `lib.rs` to configure rolling log files.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::params;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::config::AppConfig;
use crate::db::DbState;
use crate::entities::EntityType;

/// Maximum number of log files to retain.
pub const MAX_LOG_FILES: usize = 10;

/// Prefix of the daily rolling log files (`depot.2024-05-01`).
pub const LOG_FILE_PREFIX: &str = "depot";

/// Returns version, build and runtime info.
pub fn about(config: &AppConfig, db: &DbState) -> Value {
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "buildTimestamp": env!("BUILD_TIMESTAMP"),
        "gitSha": env!("BUILD_GIT_SHA"),
        "platform": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "rustVersion": env!("CARGO_PKG_RUST_VERSION"),
        "apiBaseUrl": config.api_base_url,
        "dataDir": config.data_dir.display().to_string(),
        "database": db.db_path.display().to_string(),
        "offlineMode": config.offline_mode,
        "ledgers": ledger_sizes(db),
    })
}

/// Record count per persisted fallback ledger. Ledgers never read yet are
/// absent (they are created with seed data on first use).
fn ledger_sizes(db: &DbState) -> Value {
    let mut sizes = Map::new();
    let conn = match db.conn.lock() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "ledger sizes unavailable");
            return Value::Object(sizes);
        }
    };
    for entity in EntityType::ALL {
        let raw: Option<String> = conn
            .query_row(
                "SELECT records FROM fallback_ledger WHERE entity_type = ?1",
                params![entity.key()],
                |row| row.get(0),
            )
            .ok();
        if let Some(raw) = raw {
            let count = serde_json::from_str::<Value>(&raw)
                .ok()
                .and_then(|v| v.as_array().map(Vec::len))
                .unwrap_or(0);
            sizes.insert(entity.key().to_string(), json!(count));
        }
    }
    Value::Object(sizes)
}

// ---------------------------------------------------------------------------
// Log rotation
// ---------------------------------------------------------------------------

/// Returns the log directory path (same location used by lib.rs).
pub fn get_log_dir(config: &AppConfig) -> PathBuf {
    config.data_dir.join("logs")
}

/// Prune old log files in `log_dir`, keeping only the most recent
/// `MAX_LOG_FILES`.
pub fn prune_old_logs(log_dir: &Path) {
    if !log_dir.exists() {
        return;
    }

    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    if let Ok(entries) = fs::read_dir(log_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if name.starts_with(&format!("{LOG_FILE_PREFIX}.")) {
                        let modified = entry
                            .metadata()
                            .ok()
                            .and_then(|m| m.modified().ok())
                            .unwrap_or(std::time::UNIX_EPOCH);
                        log_files.push((path, modified));
                    }
                }
            }
        }
    }

    // Sort newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to prune log file {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::fallback::FallbackLedger;
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    #[test]
    fn about_reports_build_and_ledgers() {
        let state = Arc::new(db::test_state());
        FallbackLedger::new(state.clone(), EntityType::Products)
            .read_all()
            .unwrap();
        let info = about(&AppConfig::default(), &state);
        assert!(info.get("version").is_some());
        assert!(info.get("gitSha").is_some());
        assert_eq!(info["offlineMode"], json!(false));
        assert_eq!(info["ledgers"]["products"], json!(5));
        assert!(info["ledgers"].get("expenses").is_none());
    }

    #[test]
    fn prune_keeps_newest_log_files() {
        let dir = std::env::temp_dir().join(format!("depot-logs-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let base = SystemTime::now() - Duration::from_secs(3600);
        for i in 0..(MAX_LOG_FILES + 3) {
            let path = dir.join(format!("{LOG_FILE_PREFIX}.2024-01-{:02}", i + 1));
            let file = fs::File::create(&path).unwrap();
            file.set_modified(base + Duration::from_secs(i as u64 * 60)).unwrap();
        }
        fs::write(dir.join("notes.txt"), "keep").unwrap();

        prune_old_logs(&dir);

        let remaining: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(remaining.len(), MAX_LOG_FILES + 1);
        assert!(remaining.contains(&"notes.txt".to_string()));
        assert!(!remaining.contains(&format!("{LOG_FILE_PREFIX}.2024-01-01")));
        fs::remove_dir_all(&dir).ok();
    }
}
