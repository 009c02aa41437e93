//! Expenses page.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::coalesce::{number_value, resolve_number, resolve_text};
use crate::entities::EntityType;
use crate::error::AppResult;
use crate::forms::Modal;
use crate::metrics;
use crate::orchestrator::MutationReport;
use crate::query::ListQuery;
use crate::record::RecordId;
use crate::status::{ApprovalStatus, TransitionAction};
use crate::AppState;

use super::{page_envelope, records, with_summary};

const AMOUNT: &[&str] = &["amount"];

/// Expenses without a status are awaiting approval.
fn approval_of(row: &Value) -> Option<ApprovalStatus> {
    match resolve_text(row, &["status"]) {
        Some(raw) => ApprovalStatus::parse(&raw),
        None => Some(ApprovalStatus::Pending),
    }
}

pub async fn expenses_page(state: &AppState, query: &ListQuery) -> Value {
    let outcome = state.lists.fetch(EntityType::Expenses, query).await;
    let rows = records::rows(EntityType::Expenses, &outcome.records);

    let mut by_status: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut pending_amount = 0.0;
    for row in &rows {
        let status = approval_of(row);
        let key = status.map(ApprovalStatus::as_str).unwrap_or("other");
        *by_status.entry(key).or_insert(0) += 1;
        if status == Some(ApprovalStatus::Pending) {
            pending_amount += resolve_number(row, AMOUNT);
        }
    }
    let by_category: serde_json::Map<String, Value> = metrics::sum_by(&rows, &["category"], AMOUNT)
        .into_iter()
        .map(|(k, v)| (k, number_value(metrics::round2(v))))
        .collect();

    let summary = json!({
        "total": outcome.meta.count,
        "totalAmount": number_value(metrics::round2(metrics::sum_field(&rows, AMOUNT))),
        "pendingAmount": number_value(metrics::round2(pending_amount)),
        "byCategory": by_category,
        "byStatus": by_status,
    });
    with_summary(page_envelope(&outcome, rows), summary)
}

pub async fn approve(state: &AppState, id: RecordId, modal: Option<&mut Modal>) -> AppResult<MutationReport> {
    records::transition(state, EntityType::Expenses, id, TransitionAction::Approve, modal).await
}

pub async fn reject(
    state: &AppState,
    id: RecordId,
    reason: Option<String>,
    modal: Option<&mut Modal>,
) -> AppResult<MutationReport> {
    let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
    records::transition(state, EntityType::Expenses, id, TransitionAction::Reject { reason }, modal).await
}
