//! Generic record operations for any entity page.

use serde_json::Value;
use tracing::warn;

use crate::coalesce::project;
use crate::entities::EntityType;
use crate::error::{AppError, AppResult};
use crate::forms::{self, Modal};
use crate::orchestrator::{MutationReport, Operation, PendingMutation};
use crate::query::{ListOutcome, ListQuery};
use crate::record::RecordId;
use crate::status::TransitionAction;
use crate::AppState;

use super::page_envelope;

/// Rows projected through the entity's coalescing table.
pub fn rows(entity: EntityType, records: &[Value]) -> Vec<Value> {
    records
        .iter()
        .map(|r| project(r, entity.display_fields()))
        .collect()
}

pub async fn fetch(state: &AppState, entity: EntityType, query: &ListQuery) -> ListOutcome {
    state.lists.fetch(entity, query).await
}

pub async fn list(state: &AppState, entity: EntityType, query: &ListQuery) -> Value {
    let outcome = fetch(state, entity, query).await;
    page_envelope(&outcome, rows(entity, &outcome.records))
}

/// Detail view: remote first, then the fallback ledger.
pub async fn get(state: &AppState, entity: EntityType, id: &RecordId) -> AppResult<Value> {
    if !state.config.offline_mode {
        match state.api.retrieve(entity.resource(), id).await {
            Ok(record) if record.is_object() => return Ok(record),
            Ok(_) => warn!(entity = %entity, id = %id, "detail response was not an object"),
            Err(e) if e.is_remote() => {
                warn!(entity = %entity, id = %id, error = %e, "detail fetch failed, reading fallback ledger");
            }
            Err(e) => return Err(e),
        }
    }
    state
        .orchestrator
        .ledger(entity)
        .get(id)?
        .ok_or_else(|| AppError::NotFound {
            entity: entity.label().to_string(),
            id: id.to_string(),
        })
}

pub async fn create(
    state: &AppState,
    entity: EntityType,
    payload: Value,
    modal: Option<&mut Modal>,
) -> AppResult<MutationReport> {
    let errors = forms::validate(entity, &payload);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    state
        .orchestrator
        .execute(
            PendingMutation::new(entity, Operation::Create { payload }),
            modal,
        )
        .await
}

pub async fn update(
    state: &AppState,
    entity: EntityType,
    id: RecordId,
    patch: Value,
    modal: Option<&mut Modal>,
) -> AppResult<MutationReport> {
    let errors = forms::validate_patch(entity, &patch);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    state
        .orchestrator
        .execute(
            PendingMutation::new(entity, Operation::Update { id, patch }),
            modal,
        )
        .await
}

pub async fn delete(
    state: &AppState,
    entity: EntityType,
    id: RecordId,
    modal: Option<&mut Modal>,
) -> AppResult<MutationReport> {
    state
        .orchestrator
        .execute(PendingMutation::new(entity, Operation::Delete { id }), modal)
        .await
}

pub async fn bulk_delete(
    state: &AppState,
    entity: EntityType,
    ids: Vec<RecordId>,
) -> AppResult<crate::fallback::BulkDeleteOutcome> {
    let mut selection = state.selection();
    for id in ids {
        selection.select(id);
    }
    selection.bulk_delete(&state.orchestrator, entity, None).await
}

pub async fn transition(
    state: &AppState,
    entity: EntityType,
    id: RecordId,
    action: TransitionAction,
    modal: Option<&mut Modal>,
) -> AppResult<MutationReport> {
    state
        .orchestrator
        .execute(
            PendingMutation::new(entity, Operation::Transition { id, action }),
            modal,
        )
        .await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::{ApiRequest, RemoteApi};
    use crate::auth::MemoryTokenStore;
    use crate::config::AppConfig;
    use crate::db;
    use crate::query::ListSource;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    pub(crate) struct Unreachable;

    #[async_trait]
    impl RemoteApi for Unreachable {
        async fn send(&self, _request: ApiRequest) -> AppResult<Value> {
            Err(AppError::Network("Cannot reach server at http://localhost:8000".into()))
        }
    }

    /// State backed by an in-memory database and an API that is always down.
    pub(crate) fn offline_state() -> AppState {
        AppState::new(
            AppConfig::default(),
            Arc::new(db::test_state()),
            Arc::new(Unreachable),
            Arc::new(MemoryTokenStore::default()),
        )
    }

    #[tokio::test]
    async fn list_projects_rows_from_fallback() {
        let state = offline_state();
        let page = list(&state, EntityType::Departments, &ListQuery::default()).await;
        assert_eq!(page["source"], json!(ListSource::Fallback));
        assert_eq!(page["rows"].as_array().unwrap().len(), 4);
        assert_eq!(page["rows"][0]["name"], json!("Operations"));
        assert_eq!(page["rows"][0]["head"], json!(""));
    }

    #[tokio::test]
    async fn create_validates_before_anything_else() {
        let state = offline_state();
        let err = create(&state, EntityType::Expenses, json!({ "name": "Diesel" }), None)
            .await
            .unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("amount"));
        assert!(state.orchestrator.ledger(EntityType::Expenses).read_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_reads_ledger_when_api_is_down() {
        let state = offline_state();
        let record = get(&state, EntityType::Warehouses, &RecordId::Int(2)).await.unwrap();
        assert_eq!(record["code"], json!("WH-SAT"));
        let err = get(&state, EntityType::Warehouses, &RecordId::Int(9)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn bulk_delete_reports_counts() {
        let state = offline_state();
        let outcome = bulk_delete(
            &state,
            EntityType::Departments,
            vec![RecordId::Int(1), RecordId::Int(2), RecordId::Int(50)],
        )
        .await
        .unwrap();
        assert_eq!((outcome.deleted_count, outcome.failed_count), (2, 1));
    }

    #[tokio::test]
    async fn bulk_delete_ignores_repeated_ids() {
        let state = offline_state();
        let outcome = bulk_delete(
            &state,
            EntityType::Departments,
            vec![RecordId::Int(2), RecordId::Int(2)],
        )
        .await
        .unwrap();
        assert_eq!((outcome.deleted_count, outcome.failed_count), (1, 0));
        let err = get(&state, EntityType::Departments, &RecordId::Int(2)).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
