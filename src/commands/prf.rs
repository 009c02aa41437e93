//! Purchase requisition (PRF) page.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::coalesce::{number_value, resolve_text};
use crate::entities::EntityType;
use crate::error::AppResult;
use crate::forms::Modal;
use crate::metrics;
use crate::orchestrator::MutationReport;
use crate::query::ListQuery;
use crate::record::RecordId;
use crate::status::{PrfStatus, TransitionAction};
use crate::AppState;

use super::{page_envelope, records, with_summary};

/// Count of rows per PRF status. Every status appears (zero when absent);
/// strings outside the table are counted under `other`.
pub fn status_counts(rows: &[Value]) -> BTreeMap<&'static str, usize> {
    let mut counts: BTreeMap<&'static str, usize> =
        PrfStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for row in rows {
        let key = resolve_text(row, &["status"])
            .and_then(|s| PrfStatus::parse(&s))
            .map(PrfStatus::as_str)
            .unwrap_or("other");
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

pub async fn prf_page(state: &AppState, query: &ListQuery) -> Value {
    let outcome = state.lists.fetch(EntityType::Prfs, query).await;
    let rows = records::rows(EntityType::Prfs, &outcome.records);
    let summary = json!({
        "total": outcome.meta.count,
        "byStatus": status_counts(&rows),
        "totalRequested": number_value(metrics::round2(metrics::sum_field(&rows, &["total_amount"]))),
        "awaitingApproval": metrics::count_by(&rows, |r| {
            resolve_text(r, &["status"]).and_then(|s| PrfStatus::parse(&s)) == Some(PrfStatus::Pending)
        }),
    });
    with_summary(page_envelope(&outcome, rows), summary)
}

async fn apply(
    state: &AppState,
    id: RecordId,
    action: TransitionAction,
    modal: Option<&mut Modal>,
) -> AppResult<MutationReport> {
    records::transition(state, EntityType::Prfs, id, action, modal).await
}

pub async fn submit(state: &AppState, id: RecordId, modal: Option<&mut Modal>) -> AppResult<MutationReport> {
    apply(state, id, TransitionAction::Submit, modal).await
}

pub async fn approve(state: &AppState, id: RecordId, modal: Option<&mut Modal>) -> AppResult<MutationReport> {
    apply(state, id, TransitionAction::Approve, modal).await
}

pub async fn reject(
    state: &AppState,
    id: RecordId,
    reason: Option<String>,
    modal: Option<&mut Modal>,
) -> AppResult<MutationReport> {
    let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
    apply(state, id, TransitionAction::Reject { reason }, modal).await
}

pub async fn cancel(state: &AppState, id: RecordId, modal: Option<&mut Modal>) -> AppResult<MutationReport> {
    apply(state, id, TransitionAction::Cancel, modal).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::records::tests::offline_state;
    use crate::error::AppError;

    #[tokio::test]
    async fn summary_counts_seeded_prfs() {
        let state = offline_state();
        let page = prf_page(&state, &ListQuery::default()).await;
        assert_eq!(page["summary"]["byStatus"]["pending"], json!(1));
        assert_eq!(page["summary"]["byStatus"]["draft"], json!(1));
        assert_eq!(page["summary"]["byStatus"]["approved"], json!(0));
        assert_eq!(page["summary"]["awaitingApproval"], json!(1));
        assert_eq!(page["summary"]["totalRequested"], json!(1335000));
    }

    #[tokio::test]
    async fn approve_then_cancel_is_rejected() {
        let state = offline_state();
        approve(&state, RecordId::Int(1), None).await.unwrap();
        let err = cancel(&state, RecordId::Int(1), None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        let page = prf_page(&state, &ListQuery::default()).await;
        assert_eq!(page["summary"]["byStatus"]["approved"], json!(1));
    }

    #[test]
    fn unknown_statuses_counted_as_other() {
        let counts = status_counts(&[json!({ "status": "on_hold" }), json!({ "status": "Submitted" })]);
        assert_eq!(counts["other"], 1);
        assert_eq!(counts["pending"], 1);
    }
}
