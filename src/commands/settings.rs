use serde_json::{json, Value};

use crate::config::{self, AppConfig, SETTINGS_CATEGORY};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::AppState;

fn value_to_settings_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Accepts `{"key": .., "value": ..}` or a bare `"app.page_size"` key with
/// the value as the second argument.
fn parse_set_payload(arg0: &Value, arg1: Option<&Value>) -> AppResult<(String, String)> {
    let (key, value) = match arg0 {
        Value::Object(obj) => {
            let key = obj
                .get("key")
                .or_else(|| obj.get("settingKey"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let value = arg1
                .or_else(|| obj.get("value"))
                .or_else(|| obj.get("settingValue"))
                .cloned()
                .unwrap_or(Value::Null);
            (key, value)
        }
        Value::String(raw) => {
            let trimmed = raw.trim();
            let key = trimmed
                .strip_prefix(&format!("{SETTINGS_CATEGORY}."))
                .unwrap_or(trimmed);
            (Some(key.to_string()), arg1.cloned().unwrap_or(Value::Null))
        }
        _ => (None, Value::Null),
    };
    let key = key
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::Config("Missing setting key".into()))?;
    Ok((key, value_to_settings_string(&value)))
}

/// Effective configuration plus what is stored locally.
pub fn get_settings(state: &AppState) -> AppResult<Value> {
    let stored = {
        let conn = state
            .db
            .conn
            .lock()
            .map_err(|e| AppError::Storage(e.to_string()))?;
        db::get_category_settings(&conn, SETTINGS_CATEGORY)
    };
    let stored: serde_json::Map<String, Value> = stored
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    Ok(json!({
        "effective": state.config,
        "stored": stored,
    }))
}

/// Persist one setting. Takes effect on the next start.
pub fn set_setting(state: &AppState, arg0: &Value, arg1: Option<&Value>) -> AppResult<Value> {
    let (key, value) = parse_set_payload(arg0, arg1)?;
    config::save_setting(&state.db, &key, &value)?;
    state.events.success(format!("Saved {key}"));
    Ok(json!({ "key": key, "value": value }))
}

/// Drop every stored setting, returning to defaults and environment.
pub fn reset_settings(state: &AppState) -> AppResult<Value> {
    {
        let conn = state
            .db
            .conn
            .lock()
            .map_err(|e| AppError::Storage(e.to_string()))?;
        db::delete_all_settings(&conn, SETTINGS_CATEGORY).map_err(AppError::Storage)?;
    }
    Ok(json!({ "reset": true, "defaults": AppConfig::default() }))
}
