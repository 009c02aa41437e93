//! Application configuration.
//!
//! Resolution order: built-in defaults, then the `app` category of
//! `local_settings`, then `DEPOT_*` environment variables. A value that does
//! not parse is logged and skipped; it never aborts startup.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::db::{self, DbState};
use crate::error::{AppError, AppResult};
use crate::query::DEFAULT_PAGE_SIZE;
use crate::selection::SelectionPolicy;

pub const SETTINGS_CATEGORY: &str = "app";
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
const MAX_PAGE_SIZE: u64 = 500;

/// Environment variable -> setting key.
const ENV_VARS: &[(&str, &str)] = &[
    ("DEPOT_API_URL", "api_url"),
    ("DEPOT_DATA_DIR", "data_dir"),
    ("DEPOT_OFFLINE", "offline"),
    ("DEPOT_PAGE_SIZE", "page_size"),
    ("DEPOT_SELECTION_POLICY", "selection_policy"),
    ("DEPOT_REQUEST_TIMEOUT_SECS", "request_timeout_secs"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub offline_mode: bool,
    pub page_size: u64,
    pub selection_policy: SelectionPolicy,
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            data_dir: default_data_dir(),
            offline_mode: false,
            page_size: DEFAULT_PAGE_SIZE,
            selection_policy: SelectionPolicy::Retain,
            request_timeout_secs: 30,
        }
    }
}

/// Per-user data directory: `~/.local/share/depot-admin` on Linux,
/// `~/Library/Application Support/depot-admin` on macOS, `%LOCALAPPDATA%`
/// on Windows. Falls back to the working directory.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("depot-admin")
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AppConfig {
    /// Defaults plus environment only. Used to locate the database before
    /// persisted settings can be read.
    pub fn bootstrap() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Full resolution: defaults, persisted settings, environment.
    pub fn load(db: &DbState) -> Self {
        let mut config = Self::bootstrap();
        let persisted = match db.conn.lock() {
            Ok(conn) => db::get_category_settings(&conn, SETTINGS_CATEGORY),
            Err(e) => {
                warn!(error = %e, "settings unavailable, using defaults");
                Vec::new()
            }
        };
        for (key, value) in persisted {
            if key == "data_dir" {
                continue;
            }
            if let Err(e) = config.apply(&key, &value) {
                warn!(key, error = %e, "ignoring persisted setting");
            }
        }
        // Environment wins over anything persisted.
        config.apply_env();
        info!(
            api = %config.api_base_url,
            offline = config.offline_mode,
            page_size = config.page_size,
            "configuration loaded"
        );
        config
    }

    fn apply_env(&mut self) {
        for (var, key) in ENV_VARS {
            let Ok(value) = std::env::var(var) else {
                continue;
            };
            if let Err(e) = self.apply(key, &value) {
                warn!(var, error = %e, "ignoring environment override");
            }
        }
    }

    /// Set one key from its string form.
    pub fn apply(&mut self, key: &str, value: &str) -> AppResult<()> {
        let value = value.trim();
        let invalid = |what: &str| AppError::Config(format!("{key}: expected {what}, got '{value}'"));
        match key {
            "api_url" => {
                if value.is_empty() {
                    return Err(invalid("a URL"));
                }
                self.api_base_url = value.to_string();
            }
            "data_dir" => {
                if value.is_empty() {
                    return Err(invalid("a directory"));
                }
                self.data_dir = PathBuf::from(value);
            }
            "offline" => self.offline_mode = parse_bool(value).ok_or_else(|| invalid("true or false"))?,
            "page_size" => {
                self.page_size = value
                    .parse::<u64>()
                    .ok()
                    .filter(|n| (1..=MAX_PAGE_SIZE).contains(n))
                    .ok_or_else(|| invalid("a page size between 1 and 500"))?;
            }
            "selection_policy" => self.selection_policy = value.parse()?,
            "request_timeout_secs" => {
                self.request_timeout_secs = value
                    .parse::<u64>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| invalid("a positive number of seconds"))?;
            }
            other => return Err(AppError::Config(format!("unknown setting '{other}'"))),
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Validate and persist one setting. `data_dir` decides where the database
/// lives, so it can only come from the environment.
pub fn save_setting(db: &DbState, key: &str, value: &str) -> AppResult<()> {
    if key == "data_dir" {
        return Err(AppError::Config(
            "data_dir can only be set through DEPOT_DATA_DIR".into(),
        ));
    }
    AppConfig::default().apply(key, value)?;
    let conn = db
        .conn
        .lock()
        .map_err(|e| AppError::Storage(e.to_string()))?;
    db::set_setting(&conn, SETTINGS_CATEGORY, key, value.trim()).map_err(AppError::Storage)?;
    info!(key, "setting saved");
    Ok(())
}
