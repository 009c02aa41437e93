//! Remote-first, fallback-second mutation execution.
//!
//! Every create/update/delete/transition goes to the remote API first. Any
//! remote failure (transport or non-2xx) is logged and the same operation is
//! replayed against the entity's [`FallbackLedger`]. Whichever path succeeds,
//! dependent lists are invalidated, the owning modal is closed and a toast
//! is raised. When both paths fail the modal stays open with the error.
//!
//! ```text
//! Pending -> RemoteAttempt -> Success
//!                          -> RemoteFailed -> FallbackAttempt -> Success | Failure
//! ```

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::api::RemoteApi;
use crate::coalesce::resolve_text;
use crate::db::DbState;
use crate::entities::EntityType;
use crate::error::{AppError, AppResult};
use crate::events::{AppEvent, EventBus};
use crate::fallback::{BulkDeleteOutcome, FallbackLedger};
use crate::forms::Modal;
use crate::record::RecordId;
use crate::status::{ApprovalStatus, PrfStatus, StatusDomain, TransitionAction};

const STATUS_KEYS: &[&str] = &["status", "approval_status", "approvalStatus"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Create { payload: Value },
    Update { id: RecordId, patch: Value },
    Delete { id: RecordId },
    BulkDelete { ids: Vec<RecordId> },
    Transition { id: RecordId, action: TransitionAction },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Create { .. } => "create",
            Operation::Update { .. } => "update",
            Operation::Delete { .. } => "delete",
            Operation::BulkDelete { .. } => "bulk_delete",
            Operation::Transition { .. } => "transition",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMutation {
    pub entity: EntityType,
    pub operation: Operation,
}

impl PendingMutation {
    pub fn new(entity: EntityType, operation: Operation) -> Self {
        Self { entity, operation }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationPhase {
    Pending,
    RemoteAttempt,
    RemoteFailed,
    FallbackAttempt,
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPath {
    Remote,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationOutcome {
    Record { record: Value },
    Deleted { id: RecordId },
    Bulk(BulkDeleteOutcome),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationReport {
    pub path: MutationPath,
    pub outcome: MutationOutcome,
    pub phases: Vec<MutationPhase>,
    /// Why the remote path was abandoned, when it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
}

pub struct MutationOrchestrator {
    api: Arc<dyn RemoteApi>,
    db: Arc<DbState>,
    events: EventBus,
    offline: bool,
}

impl MutationOrchestrator {
    pub fn new(api: Arc<dyn RemoteApi>, db: Arc<DbState>, events: EventBus) -> Self {
        Self {
            api,
            db,
            events,
            offline: false,
        }
    }

    /// Skip the remote attempt entirely and go straight to the ledger.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The only handle through which a fallback ledger is mutated.
    pub fn ledger(&self, entity: EntityType) -> FallbackLedger {
        FallbackLedger::new(self.db.clone(), entity)
    }

    pub async fn execute(
        &self,
        mutation: PendingMutation,
        modal: Option<&mut Modal>,
    ) -> AppResult<MutationReport> {
        let PendingMutation { entity, operation } = mutation;
        let mut phases = vec![MutationPhase::Pending];

        if let Operation::Transition { action, .. } = &operation {
            if !entity.supports(action) {
                let message = format!("{} records cannot {}", entity.label(), action.name());
                let err = AppError::validation("action", &message);
                return Err(self.fail(entity, &operation, modal, None, err));
            }
        }

        let mut remote_error = None;
        if !self.offline {
            phases.push(MutationPhase::RemoteAttempt);
            match self.run_remote(entity, &operation).await {
                Ok(RemoteResult::Done(outcome)) => {
                    phases.push(MutationPhase::Success);
                    info!(entity = %entity, operation = operation.name(), "remote mutation succeeded");
                    return Ok(self.succeed(entity, &operation, modal, MutationPath::Remote, outcome, phases, None));
                }
                Ok(RemoteResult::Partial { done, remaining, cause }) => {
                    // Bulk delete lost the connection midway: finish on the ledger.
                    warn!(entity = %entity, remaining = remaining.len(), error = %cause, "remote bulk delete interrupted, finishing on fallback ledger");
                    phases.push(MutationPhase::RemoteFailed);
                    phases.push(MutationPhase::FallbackAttempt);
                    return match self.ledger(entity).remove_many(&remaining) {
                        Ok(rest) => {
                            phases.push(MutationPhase::Success);
                            let outcome = MutationOutcome::Bulk(done.merge(rest));
                            Ok(self.succeed(
                                entity,
                                &operation,
                                modal,
                                MutationPath::Fallback,
                                outcome,
                                phases,
                                Some(cause.to_string()),
                            ))
                        }
                        Err(e) => {
                            error!(entity = %entity, error = %e, "fallback bulk delete failed");
                            Err(self.fail(entity, &operation, modal, Some(cause), e))
                        }
                    };
                }
                Err(e) => {
                    warn!(entity = %entity, operation = operation.name(), error = %e, "remote mutation failed, using fallback ledger");
                    phases.push(MutationPhase::RemoteFailed);
                    remote_error = Some(e);
                }
            }
        }

        phases.push(MutationPhase::FallbackAttempt);
        match self.run_fallback(entity, &operation) {
            Ok(outcome) => {
                phases.push(MutationPhase::Success);
                info!(entity = %entity, operation = operation.name(), "fallback mutation succeeded");
                let remote = remote_error.map(|e| e.to_string());
                Ok(self.succeed(entity, &operation, modal, MutationPath::Fallback, outcome, phases, remote))
            }
            Err(e) => {
                error!(entity = %entity, operation = operation.name(), error = %e, "fallback mutation failed");
                Err(self.fail(entity, &operation, modal, remote_error, e))
            }
        }
    }

    async fn run_remote(&self, entity: EntityType, operation: &Operation) -> AppResult<RemoteResult> {
        let resource = entity.resource();
        let outcome = match operation {
            Operation::Create { payload } => {
                let resp = self.api.create(resource, payload).await?;
                MutationOutcome::Record {
                    record: or_payload(resp, payload, None),
                }
            }
            Operation::Update { id, patch } => {
                let resp = self.api.patch(resource, id, patch).await?;
                MutationOutcome::Record {
                    record: or_payload(resp, patch, Some(id)),
                }
            }
            Operation::Delete { id } => {
                match self.api.delete(resource, id).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        info!(entity = %entity, id = %id, "record already gone remotely");
                    }
                    Err(e) => return Err(e),
                }
                MutationOutcome::Deleted { id: id.clone() }
            }
            Operation::BulkDelete { ids } => return self.remote_bulk_delete(resource, ids).await,
            Operation::Transition { id, action } => {
                let resp = match entity.status_domain() {
                    Some(StatusDomain::ActiveFlag) => {
                        let patch = json!({ "is_active": matches!(action, TransitionAction::Activate) });
                        self.api.patch(resource, id, &patch).await?
                    }
                    _ => {
                        let body = match action {
                            TransitionAction::Reject { reason: Some(reason) } => {
                                Some(json!({ "reason": reason }))
                            }
                            _ => None,
                        };
                        self.api.action(resource, id, action.name(), body).await?
                    }
                };
                MutationOutcome::Record {
                    record: or_payload(resp, &Value::Null, Some(id)),
                }
            }
        };
        Ok(RemoteResult::Done(outcome))
    }

    /// Deletes one id at a time. An API error on a single id counts as a
    /// failure for that id; a transport failure hands the rest to the ledger.
    async fn remote_bulk_delete(&self, resource: &str, ids: &[RecordId]) -> AppResult<RemoteResult> {
        let mut done = BulkDeleteOutcome::default();
        for (idx, id) in ids.iter().enumerate() {
            match self.api.delete(resource, id).await {
                Ok(()) => done.deleted_count += 1,
                Err(AppError::Network(msg)) => {
                    let cause = AppError::Network(msg);
                    if idx == 0 {
                        return Err(cause);
                    }
                    return Ok(RemoteResult::Partial {
                        done,
                        remaining: ids[idx..].to_vec(),
                        cause,
                    });
                }
                Err(e) if idx == 0 && !e.is_not_found() => return Err(e),
                Err(e) => {
                    warn!(resource, id = %id, error = %e, "remote delete failed in bulk batch");
                    done.failed_count += 1;
                }
            }
        }
        Ok(RemoteResult::Done(MutationOutcome::Bulk(done)))
    }

    fn run_fallback(&self, entity: EntityType, operation: &Operation) -> AppResult<MutationOutcome> {
        let ledger = self.ledger(entity);
        Ok(match operation {
            Operation::Create { payload } => MutationOutcome::Record {
                record: ledger.create(payload)?,
            },
            Operation::Update { id, patch } => MutationOutcome::Record {
                record: ledger.update(id, patch)?,
            },
            Operation::Delete { id } => {
                ledger.remove(id)?;
                MutationOutcome::Deleted { id: id.clone() }
            }
            Operation::BulkDelete { ids } => MutationOutcome::Bulk(ledger.remove_many(ids)?),
            Operation::Transition { id, action } => MutationOutcome::Record {
                record: ledger.update_with(id, |current| transition_patch(entity, current, action))?,
            },
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn succeed(
        &self,
        entity: EntityType,
        operation: &Operation,
        modal: Option<&mut Modal>,
        path: MutationPath,
        outcome: MutationOutcome,
        phases: Vec<MutationPhase>,
        remote_error: Option<String>,
    ) -> MutationReport {
        self.events.invalidate(entity);
        for related in entity.related() {
            self.events.invalidate(*related);
        }
        if let Some(modal) = modal {
            modal.close();
            self.events.publish(AppEvent::ModalClosed { modal: modal.id });
        }

        let mut message = success_message(entity, operation, &outcome);
        if path == MutationPath::Fallback {
            message.push_str(" (saved offline)");
        }
        self.events.success(message);

        MutationReport {
            path,
            outcome,
            phases,
            remote_error,
        }
    }

    fn fail(
        &self,
        entity: EntityType,
        operation: &Operation,
        modal: Option<&mut Modal>,
        remote_error: Option<AppError>,
        fallback_error: AppError,
    ) -> AppError {
        let message = match (&remote_error, &fallback_error) {
            (Some(remote), _) => remote.user_message(),
            (
                None,
                AppError::NotFound { .. } | AppError::InvalidTransition { .. } | AppError::Validation(_),
            ) => fallback_error.user_message(),
            (None, _) => format!(
                "Failed to {} {}. Please try again.",
                operation.name().replace('_', " "),
                entity.label().to_lowercase()
            ),
        };
        self.events.error(message.clone());
        if let Some(modal) = modal {
            modal.fail(message);
        }
        match (remote_error, fallback_error) {
            // Server field errors belong on the form whatever the ledger said.
            (Some(remote), _) if remote.field_errors().is_some() => remote,
            // Domain errors from the ledger explain more than the network hiccup.
            (_, fallback @ (AppError::NotFound { .. } | AppError::InvalidTransition { .. })) => fallback,
            (remote, other) => remote.unwrap_or(other),
        }
    }
}

enum RemoteResult {
    Done(MutationOutcome),
    Partial {
        done: BulkDeleteOutcome,
        remaining: Vec<RecordId>,
        cause: AppError,
    },
}

/// Servers answering 204 (or an empty body) still need a record to show.
fn or_payload(resp: Value, sent: &Value, id: Option<&RecordId>) -> Value {
    if resp.is_object() {
        return resp;
    }
    let mut record = sent.as_object().cloned().unwrap_or_default();
    if let Some(id) = id {
        record.insert("id".to_string(), id.to_value());
    }
    Value::Object(record)
}

/// Patch applying `action` to `current` under the entity's status table.
fn transition_patch(entity: EntityType, current: &Value, action: &TransitionAction) -> AppResult<Value> {
    let raw = resolve_text(current, STATUS_KEYS);
    match entity.status_domain() {
        Some(StatusDomain::Prf) => {
            let from = raw.as_deref().and_then(PrfStatus::parse).unwrap_or(PrfStatus::Draft);
            let next = from.apply(action)?;
            let mut patch = json!({ "status": next.as_str() });
            if let TransitionAction::Reject { reason: Some(reason) } = action {
                patch["rejection_reason"] = Value::String(reason.clone());
            }
            Ok(patch)
        }
        Some(StatusDomain::Approval) => {
            let from = raw
                .as_deref()
                .and_then(ApprovalStatus::parse)
                .unwrap_or(ApprovalStatus::Pending);
            let next = from.apply(action)?;
            let mut patch = json!({ "status": next.as_str() });
            if let TransitionAction::Reject { reason: Some(reason) } = action {
                patch["rejection_reason"] = Value::String(reason.clone());
            }
            Ok(patch)
        }
        Some(StatusDomain::ActiveFlag) => Ok(json!({
            "is_active": matches!(action, TransitionAction::Activate)
        })),
        None => Err(AppError::InvalidTransition {
            from: entity.label().to_string(),
            action: action.name().to_string(),
        }),
    }
}

fn success_message(entity: EntityType, operation: &Operation, outcome: &MutationOutcome) -> String {
    let label = entity.label();
    match (operation, outcome) {
        (Operation::Create { .. }, _) => format!("{label} created"),
        (Operation::Update { .. }, _) => format!("{label} updated"),
        (Operation::Delete { .. }, _) => format!("{label} deleted"),
        (Operation::BulkDelete { .. }, MutationOutcome::Bulk(bulk)) if bulk.failed_count > 0 => format!(
            "{} deleted, {} failed",
            bulk.deleted_count, bulk.failed_count
        ),
        (Operation::BulkDelete { .. }, MutationOutcome::Bulk(bulk)) => {
            format!("{} records deleted", bulk.deleted_count)
        }
        (Operation::BulkDelete { ids }, _) => format!("{} records deleted", ids.len()),
        (Operation::Transition { id, action }, _) => {
            format!("{label} #{id} {}", action.past_tense())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiRequest;
    use crate::db;
    use crate::error::FieldErrors;
    use crate::events::{drain, NotificationLevel};
    use crate::forms::ModalKind;
    use async_trait::async_trait;
    use reqwest::Method;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Remote double answering from a script; unscripted calls fail with a
    /// network error.
    #[derive(Default)]
    struct ScriptedApi {
        seen: Mutex<Vec<ApiRequest>>,
        script: Mutex<VecDeque<AppResult<Value>>>,
    }

    impl ScriptedApi {
        fn rejecting() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn answering(responses: Vec<AppResult<Value>>) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                script: Mutex::new(responses.into()),
            })
        }

        fn calls(&self) -> Vec<(Method, String)> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|r| (r.method.clone(), r.path.clone()))
                .collect()
        }
    }

    #[async_trait]
    impl RemoteApi for ScriptedApi {
        async fn send(&self, request: ApiRequest) -> AppResult<Value> {
            self.seen.lock().unwrap().push(request);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::Network("Cannot reach server".into())))
        }
    }

    fn api_error(status: u16, message: &str) -> AppError {
        AppError::Api {
            status,
            message: message.into(),
            errors: FieldErrors::new(),
        }
    }

    fn orchestrator(api: Arc<ScriptedApi>) -> MutationOrchestrator {
        MutationOrchestrator::new(api, Arc::new(db::test_state()), EventBus::new())
    }

    fn notifications(events: &[AppEvent]) -> Vec<(NotificationLevel, String)> {
        events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Notification(n) => Some((n.level, n.message.clone())),
                _ => None,
            })
            .collect()
    }

    fn invalidated(events: &[AppEvent]) -> Vec<EntityType> {
        events
            .iter()
            .filter_map(|e| match e {
                AppEvent::ListInvalidated { entity } => Some(*entity),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn rejected_remote_create_lands_in_fallback_ledger() {
        let orch = orchestrator(ScriptedApi::rejecting());
        let mut rx = orch.events().subscribe();
        let mut modal = Modal::open(ModalKind::Form);

        let report = orch
            .execute(
                PendingMutation::new(
                    EntityType::Products,
                    Operation::Create {
                        payload: json!({ "name": "Gear Oil 80W-90", "selling_price": 7200 }),
                    },
                ),
                Some(&mut modal),
            )
            .await
            .expect("fallback path succeeds");

        assert_eq!(report.path, MutationPath::Fallback);
        assert_eq!(
            report.phases,
            vec![
                MutationPhase::Pending,
                MutationPhase::RemoteAttempt,
                MutationPhase::RemoteFailed,
                MutationPhase::FallbackAttempt,
                MutationPhase::Success,
            ]
        );
        let MutationOutcome::Record { record } = &report.outcome else {
            panic!("expected record outcome");
        };
        assert_eq!(record["id"], json!(6));

        let stored = orch.ledger(EntityType::Products).read_all().unwrap();
        assert!(stored.iter().any(|r| r["name"] == json!("Gear Oil 80W-90")));

        assert!(!modal.is_open());
        let events = drain(&mut rx);
        assert_eq!(invalidated(&events), vec![EntityType::Products, EntityType::Inventory]);
        assert!(events
            .iter()
            .any(|e| matches!(e, AppEvent::ModalClosed { modal: m } if *m == modal.id)));
        assert_eq!(
            notifications(&events),
            vec![(NotificationLevel::Success, "Product created (saved offline)".to_string())]
        );
    }

    #[tokio::test]
    async fn remote_success_skips_ledger() {
        let api = ScriptedApi::answering(vec![Ok(json!({ "id": 501, "name": "Diesel", "amount": 90000 }))]);
        let orch = orchestrator(api.clone());
        let report = orch
            .execute(
                PendingMutation::new(
                    EntityType::Expenses,
                    Operation::Create {
                        payload: json!({ "name": "Diesel", "amount": 90000 }),
                    },
                ),
                None,
            )
            .await
            .unwrap();
        assert_eq!(report.path, MutationPath::Remote);
        assert_eq!(
            report.phases,
            vec![MutationPhase::Pending, MutationPhase::RemoteAttempt, MutationPhase::Success]
        );
        assert_eq!(api.calls(), vec![(Method::POST, "/expenses/".to_string())]);
        assert!(orch.ledger(EntityType::Expenses).read_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn api_error_also_falls_back() {
        let api = ScriptedApi::answering(vec![Err(api_error(500, "Internal failure"))]);
        let orch = orchestrator(api);
        let report = orch
            .execute(
                PendingMutation::new(
                    EntityType::Products,
                    Operation::Update {
                        id: RecordId::Int(2),
                        patch: json!({ "selling_price": 41000 }),
                    },
                ),
                None,
            )
            .await
            .unwrap();
        assert_eq!(report.path, MutationPath::Fallback);
        assert_eq!(report.remote_error.as_deref(), Some("Internal failure (HTTP 500)"));
        let stored = orch.ledger(EntityType::Products).get(&RecordId::Int(2)).unwrap().unwrap();
        assert_eq!(stored["selling_price"], json!(41000));
    }

    #[tokio::test]
    async fn deleting_twice_is_not_an_error() {
        let orch = orchestrator(ScriptedApi::rejecting());
        for _ in 0..2 {
            let report = orch
                .execute(
                    PendingMutation::new(EntityType::Departments, Operation::Delete { id: RecordId::Int(3) }),
                    None,
                )
                .await
                .expect("delete is idempotent");
            assert_eq!(report.outcome, MutationOutcome::Deleted { id: RecordId::Int(3) });
        }
        let remaining = orch.ledger(EntityType::Departments).read_all().unwrap();
        assert_eq!(remaining.len(), 3);
    }

    #[tokio::test]
    async fn remote_404_on_delete_is_success() {
        let api = ScriptedApi::answering(vec![Err(api_error(404, "Not found."))]);
        let orch = orchestrator(api);
        let report = orch
            .execute(
                PendingMutation::new(EntityType::Expenses, Operation::Delete { id: RecordId::Int(8) }),
                None,
            )
            .await
            .unwrap();
        assert_eq!(report.path, MutationPath::Remote);
    }

    #[tokio::test]
    async fn server_field_errors_outrank_ledger_not_found() {
        let mut errors = FieldErrors::new();
        errors.insert("amount".into(), vec!["Ensure this value is positive.".into()]);
        let orch = orchestrator(ScriptedApi::answering(vec![Err(AppError::Api {
            status: 400,
            message: "Invalid input.".into(),
            errors,
        })]));
        let err = orch
            .execute(
                PendingMutation::new(
                    EntityType::Expenses,
                    Operation::Update {
                        id: RecordId::Int(12),
                        patch: json!({ "amount": -1 }),
                    },
                ),
                None,
            )
            .await
            .unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("amount"));
    }

    #[tokio::test]
    async fn both_paths_failing_keeps_modal_open_with_remote_message() {
        let orch = orchestrator(ScriptedApi::rejecting());
        let mut rx = orch.events().subscribe();
        let mut modal = Modal::open(ModalKind::Form);
        let err = orch
            .execute(
                PendingMutation::new(
                    EntityType::Expenses,
                    Operation::Update {
                        id: RecordId::Int(12),
                        patch: json!({ "amount": 10 }),
                    },
                ),
                Some(&mut modal),
            )
            .await
            .unwrap_err();

        // The ledger's NotFound explains the failure better than the outage.
        assert!(err.is_not_found());
        assert!(modal.is_open());
        assert_eq!(
            modal.error.as_deref(),
            Some("Network error. Check your connection and try again.")
        );
        let events = drain(&mut rx);
        assert!(invalidated(&events).is_empty());
        assert_eq!(notifications(&events)[0].0, NotificationLevel::Error);
    }

    #[tokio::test]
    async fn offline_transition_follows_prf_table() {
        let api = ScriptedApi::rejecting();
        let orch = orchestrator(api.clone()).offline(true);

        // PRF #2 is seeded as a draft.
        let report = orch
            .execute(
                PendingMutation::new(
                    EntityType::Prfs,
                    Operation::Transition {
                        id: RecordId::Int(2),
                        action: TransitionAction::Submit,
                    },
                ),
                None,
            )
            .await
            .unwrap();
        let MutationOutcome::Record { record } = report.outcome else {
            panic!("expected record");
        };
        assert_eq!(record["status"], json!("pending"));
        assert!(api.calls().is_empty());

        let report = orch
            .execute(
                PendingMutation::new(
                    EntityType::Prfs,
                    Operation::Transition {
                        id: RecordId::Int(2),
                        action: TransitionAction::Reject {
                            reason: Some("Over budget".into()),
                        },
                    },
                ),
                None,
            )
            .await
            .unwrap();
        let MutationOutcome::Record { record } = report.outcome else {
            panic!("expected record");
        };
        assert_eq!(record["status"], json!("rejected"));
        assert_eq!(record["rejection_reason"], json!("Over budget"));
    }

    #[tokio::test]
    async fn illegal_transition_leaves_record_untouched() {
        let orch = orchestrator(ScriptedApi::rejecting()).offline(true);
        let mut modal = Modal::open(ModalKind::ConfirmDelete);
        let err = orch
            .execute(
                PendingMutation::new(
                    EntityType::Prfs,
                    Operation::Transition {
                        id: RecordId::Int(2),
                        action: TransitionAction::Approve,
                    },
                ),
                Some(&mut modal),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_eq!(modal.error.as_deref(), Some("Cannot approve a record in status 'draft'"));
        let prf = orch.ledger(EntityType::Prfs).get(&RecordId::Int(2)).unwrap().unwrap();
        assert_eq!(prf["status"], json!("draft"));
    }

    #[tokio::test]
    async fn unsupported_action_never_reaches_the_network() {
        let api = ScriptedApi::rejecting();
        let orch = orchestrator(api.clone());
        let err = orch
            .execute(
                PendingMutation::new(
                    EntityType::BinCards,
                    Operation::Transition {
                        id: RecordId::Int(1),
                        action: TransitionAction::Approve,
                    },
                ),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn activation_patches_is_active_remotely() {
        let api = ScriptedApi::answering(vec![Ok(Value::Null)]);
        let orch = orchestrator(api.clone());
        let report = orch
            .execute(
                PendingMutation::new(
                    EntityType::Warehouses,
                    Operation::Transition {
                        id: RecordId::Int(2),
                        action: TransitionAction::Deactivate,
                    },
                ),
                None,
            )
            .await
            .unwrap();
        assert_eq!(report.path, MutationPath::Remote);
        assert_eq!(api.calls(), vec![(Method::PATCH, "/warehouses/2/".to_string())]);
        let body = api.seen.lock().unwrap()[0].body.clone().unwrap();
        assert_eq!(body, json!({ "is_active": false }));
    }

    #[tokio::test]
    async fn bulk_delete_falls_back_with_partial_counts() {
        let orch = orchestrator(ScriptedApi::rejecting());
        orch.ledger(EntityType::Expenses)
            .write_all(vec![json!({ "id": 1 }), json!({ "id": 2 }), json!({ "id": 3 })])
            .unwrap();
        let report = orch
            .execute(
                PendingMutation::new(
                    EntityType::Expenses,
                    Operation::BulkDelete {
                        ids: vec![RecordId::Int(2), RecordId::Int(3), RecordId::Int(99)],
                    },
                ),
                None,
            )
            .await
            .unwrap();
        assert_eq!(
            report.outcome,
            MutationOutcome::Bulk(BulkDeleteOutcome {
                deleted_count: 2,
                failed_count: 1
            })
        );
    }

    #[tokio::test]
    async fn bulk_delete_interrupted_midway_finishes_offline() {
        let api = ScriptedApi::answering(vec![Ok(Value::Null)]);
        let orch = orchestrator(api.clone());
        orch.ledger(EntityType::Expenses)
            .write_all(vec![json!({ "id": 1 }), json!({ "id": 2 }), json!({ "id": 3 })])
            .unwrap();
        let report = orch
            .execute(
                PendingMutation::new(
                    EntityType::Expenses,
                    Operation::BulkDelete {
                        ids: vec![RecordId::Int(1), RecordId::Int(2), RecordId::Int(3)],
                    },
                ),
                None,
            )
            .await
            .unwrap();
        assert_eq!(report.path, MutationPath::Fallback);
        assert_eq!(
            report.outcome,
            MutationOutcome::Bulk(BulkDeleteOutcome {
                deleted_count: 3,
                failed_count: 0
            })
        );
        // Remote handled id 1; the ledger only saw 2 and 3.
        let left = orch.ledger(EntityType::Expenses).read_all().unwrap();
        assert_eq!(left, vec![json!({ "id": 1 })]);
    }
}
