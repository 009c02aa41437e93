//! Local fallback ledger.
//!
//! One persisted JSON array of records per entity type, used whenever the
//! remote API is unreachable or offline mode is on. Each operation is a
//! single read-modify-write inside one SQLite transaction while the
//! connection mutex is held, so no partial state is ever observable and two
//! mutations cannot lose each other's updates.
//!
//! Ids come from `max(existing ids, highest id ever assigned) + 1`; the
//! high-water mark lives in `ledger_sequence`, so a deleted id is never
//! handed out again.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Transaction};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::db::DbState;
use crate::entities::EntityType;
use crate::error::{AppError, AppResult};
use crate::record::RecordId;
use crate::seed;

/// Result of a best-effort bulk delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteOutcome {
    pub deleted_count: usize,
    pub failed_count: usize,
}

impl BulkDeleteOutcome {
    pub fn merge(self, other: BulkDeleteOutcome) -> Self {
        Self {
            deleted_count: self.deleted_count + other.deleted_count,
            failed_count: self.failed_count + other.failed_count,
        }
    }
}

/// Working copy of one ledger inside a transaction.
struct LedgerState {
    records: Vec<Value>,
    high_water: i64,
    dirty: bool,
}

impl LedgerState {
    fn max_id(&self) -> i64 {
        max_numeric_id(&self.records).unwrap_or(0).max(self.high_water)
    }

    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|r| id.matches(r))
    }
}

#[derive(Clone)]
pub struct FallbackLedger {
    db: Arc<DbState>,
    entity: EntityType,
    seed: Option<Arc<Vec<Value>>>,
}

impl FallbackLedger {
    pub fn new(db: Arc<DbState>, entity: EntityType) -> Self {
        Self {
            db,
            entity,
            seed: None,
        }
    }

    /// Ledger seeded with `records` instead of the built-in dataset.
    pub fn with_seed(db: Arc<DbState>, entity: EntityType, records: Vec<Value>) -> Self {
        Self {
            db,
            entity,
            seed: Some(Arc::new(records)),
        }
    }

    pub fn entity(&self) -> EntityType {
        self.entity
    }

    /// Every persisted record, seeding the ledger on first use.
    pub fn read_all(&self) -> AppResult<Vec<Value>> {
        self.transact(|state| Ok(state.records.clone()))
    }

    /// Replace the whole ledger.
    pub fn write_all(&self, records: Vec<Value>) -> AppResult<()> {
        self.transact(|state| {
            state.high_water = state.max_id().max(max_numeric_id(&records).unwrap_or(0));
            state.records = records;
            state.dirty = true;
            Ok(())
        })
    }

    /// Id the next `create` will assign.
    pub fn next_id(&self) -> AppResult<i64> {
        self.transact(|state| Ok(state.max_id() + 1))
    }

    pub fn get(&self, id: &RecordId) -> AppResult<Option<Value>> {
        self.transact(|state| Ok(state.position(id).map(|idx| state.records[idx].clone())))
    }

    pub fn create(&self, payload: &Value) -> AppResult<Value> {
        let mut fields = object_payload(payload)?;
        self.transact(|state| {
            let id = state.max_id() + 1;
            let now = Utc::now().to_rfc3339();
            fields.insert("id".to_string(), Value::from(id));
            fields.insert("created_at".to_string(), Value::String(now.clone()));
            fields.insert("updated_at".to_string(), Value::String(now));
            let record = Value::Object(std::mem::take(&mut fields));
            state.records.push(record.clone());
            state.high_water = id;
            state.dirty = true;
            debug!(entity = %self.entity, id, "fallback: created record");
            Ok(record)
        })
    }

    /// Merge `patch` onto the record (patch wins; `id` is immutable).
    pub fn update(&self, id: &RecordId, patch: &Value) -> AppResult<Value> {
        let patch = object_payload(patch)?;
        self.update_with(id, |_| Ok(Value::Object(patch)))
    }

    /// Like [`update`](Self::update) with the patch computed from the current
    /// record inside the same critical section.
    pub fn update_with(
        &self,
        id: &RecordId,
        make_patch: impl FnOnce(&Value) -> AppResult<Value>,
    ) -> AppResult<Value> {
        self.transact(|state| {
            let idx = state.position(id).ok_or_else(|| self.not_found(id))?;
            let patch = object_payload(&make_patch(&state.records[idx])?)?;
            let record = &mut state.records[idx];
            if let Some(obj) = record.as_object_mut() {
                for (key, value) in &patch {
                    if key != "id" {
                        obj.insert(key.clone(), value.clone());
                    }
                }
                obj.insert(
                    "updated_at".to_string(),
                    Value::String(Utc::now().to_rfc3339()),
                );
            }
            state.dirty = true;
            debug!(entity = %self.entity, id = %id, "fallback: updated record");
            Ok(state.records[idx].clone())
        })
    }

    /// Delete if present; a missing id is a no-op.
    pub fn remove(&self, id: &RecordId) -> AppResult<()> {
        self.transact(|state| {
            let before = state.records.len();
            state.records.retain(|r| !id.matches(r));
            if state.records.len() != before {
                state.dirty = true;
                debug!(entity = %self.entity, id = %id, "fallback: removed record");
            }
            Ok(())
        })
    }

    /// Best-effort bulk delete; unknown ids count as failures.
    pub fn remove_many(&self, ids: &[RecordId]) -> AppResult<BulkDeleteOutcome> {
        self.transact(|state| {
            let mut outcome = BulkDeleteOutcome::default();
            for id in ids {
                match state.position(id) {
                    Some(idx) => {
                        state.records.remove(idx);
                        outcome.deleted_count += 1;
                    }
                    None => outcome.failed_count += 1,
                }
            }
            if outcome.deleted_count > 0 {
                state.dirty = true;
            }
            Ok(outcome)
        })
    }

    fn not_found(&self, id: &RecordId) -> AppError {
        AppError::NotFound {
            entity: self.entity.label().to_string(),
            id: id.to_string(),
        }
    }

    fn seed_records(&self) -> Vec<Value> {
        match &self.seed {
            Some(records) => records.as_ref().clone(),
            None => seed::default_records(self.entity),
        }
    }

    /// Run `op` against the ledger inside one transaction. Changes are
    /// persisted only when `op` succeeds and marked the state dirty.
    fn transact<T>(&self, op: impl FnOnce(&mut LedgerState) -> AppResult<T>) -> AppResult<T> {
        let mut conn = self
            .db
            .conn
            .lock()
            .map_err(|e| AppError::Storage(format!("ledger lock poisoned: {e}")))?;
        let tx = conn.transaction()?;

        let mut state = self.load(&tx)?;
        let result = op(&mut state)?;

        if state.dirty {
            let encoded = serde_json::to_string(&state.records)?;
            tx.execute(
                "INSERT INTO fallback_ledger (entity_type, records, updated_at)
                 VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(entity_type) DO UPDATE SET
                    records = excluded.records,
                    updated_at = excluded.updated_at",
                params![self.entity.key(), encoded],
            )?;
            tx.execute(
                "INSERT INTO ledger_sequence (entity_type, high_water) VALUES (?1, ?2)
                 ON CONFLICT(entity_type) DO UPDATE SET
                    high_water = MAX(high_water, excluded.high_water)",
                params![self.entity.key(), state.high_water],
            )?;
        }
        tx.commit()?;
        Ok(result)
    }

    fn load(&self, tx: &Transaction<'_>) -> AppResult<LedgerState> {
        let raw: Option<String> = tx
            .query_row(
                "SELECT records FROM fallback_ledger WHERE entity_type = ?1",
                params![self.entity.key()],
                |row| row.get(0),
            )
            .optional()?;
        let high_water: i64 = tx
            .query_row(
                "SELECT high_water FROM ledger_sequence WHERE entity_type = ?1",
                params![self.entity.key()],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);

        let parsed = raw.and_then(|s| match serde_json::from_str::<Value>(&s) {
            Ok(Value::Array(items)) => Some(items),
            Ok(_) => {
                warn!(entity = %self.entity, "fallback ledger is not an array, reseeding");
                None
            }
            Err(e) => {
                warn!(entity = %self.entity, error = %e, "fallback ledger is malformed, reseeding");
                None
            }
        });

        Ok(match parsed {
            Some(records) => LedgerState {
                records,
                high_water,
                dirty: false,
            },
            None => {
                let records = self.seed_records();
                let high_water = high_water.max(max_numeric_id(&records).unwrap_or(0));
                LedgerState {
                    records,
                    high_water,
                    dirty: true,
                }
            }
        })
    }
}

fn max_numeric_id(records: &[Value]) -> Option<i64> {
    records
        .iter()
        .filter_map(RecordId::of)
        .filter_map(|id| id.as_int())
        .max()
}

fn object_payload(payload: &Value) -> AppResult<Map<String, Value>> {
    match payload {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        _ => Err(AppError::validation("payload", "payload must be an object")),
    }
}
