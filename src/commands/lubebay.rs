//! Lubebay point-of-sale page: transactions for one bay and the form that
//! records a sale.

use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::coalesce::{coerce_number, number_value, resolve_number, resolve_text};
use crate::entities::EntityType;
use crate::error::{AppError, AppResult};
use crate::forms::{self, Modal};
use crate::metrics;
use crate::orchestrator::{MutationReport, Operation, PendingMutation};
use crate::query::ListQuery;
use crate::record::RecordId;
use crate::AppState;

use super::{page_envelope, records, with_summary};

const AMOUNT: &[&str] = &["total_amount"];

/// Accepts `12`, `12.5` and `"12.50"`.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_number(&value))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItem {
    #[serde(default, alias = "product_name", alias = "product")]
    pub name: String,
    #[serde(default, alias = "qty", deserialize_with = "lenient_number")]
    pub quantity: f64,
    #[serde(default, alias = "unit_price", alias = "price", deserialize_with = "lenient_number")]
    pub unit_price: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    #[serde(default, alias = "customer_name")]
    pub customer: String,
    #[serde(default, alias = "payment_method")]
    pub payment_method: Option<String>,
    #[serde(default, alias = "lubebay_id")]
    pub lubebay: Option<RecordId>,
    #[serde(default, alias = "line_items")]
    pub items: Vec<TransactionItem>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TransactionPayload {
    pub fn total(&self) -> f64 {
        self.items.iter().map(|i| i.quantity * i.unit_price).sum()
    }

    fn to_record(&self) -> Value {
        let items: Vec<Value> = self
            .items
            .iter()
            .map(|i| {
                json!({
                    "name": i.name,
                    "quantity": number_value(i.quantity),
                    "unit_price": number_value(i.unit_price),
                    "line_total": number_value(metrics::round2(i.quantity * i.unit_price)),
                })
            })
            .collect();
        let mut record = json!({
            "customer": self.customer.trim(),
            "payment_method": self.payment_method.as_deref().unwrap_or("cash"),
            "items": items,
            "total_amount": number_value(metrics::round2(self.total())),
            "status": "completed",
        });
        if let Some(lubebay) = &self.lubebay {
            record["lubebay"] = lubebay.to_value();
        }
        if let Some(notes) = self.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            record["notes"] = json!(notes);
        }
        record
    }
}

pub async fn transactions_page(state: &AppState, lubebay: Option<&RecordId>, query: &ListQuery) -> Value {
    let mut query = query.clone();
    if let Some(id) = lubebay {
        query.scope.retain(|(k, _)| k != "lubebay");
        query.scope.push(("lubebay".to_string(), id.to_string()));
    }
    let outcome = state.lists.fetch(EntityType::LubebayTransactions, &query).await;
    let rows = records::rows(EntityType::LubebayTransactions, &outcome.records);

    let by_method = metrics::sum_by(&rows, &["payment_method"], AMOUNT);
    let by_method: serde_json::Map<String, Value> = by_method
        .into_iter()
        .map(|(k, v)| (k.to_lowercase(), number_value(metrics::round2(v))))
        .collect();
    let revenue = metrics::round2(metrics::sum_field(&rows, AMOUNT));
    let count = rows.len();
    let summary = json!({
        "revenue": number_value(revenue),
        "transactions": count,
        "averageTicket": number_value(if count == 0 { 0.0 } else { metrics::round2(revenue / count as f64) }),
        "revenueByPaymentMethod": by_method,
    });
    with_summary(page_envelope(&outcome, rows), summary)
}

/// Validate and record a sale. The total is computed from the line items.
pub async fn create_transaction(
    state: &AppState,
    payload: Value,
    modal: Option<&mut Modal>,
) -> AppResult<MutationReport> {
    let errors = forms::validate(EntityType::LubebayTransactions, &payload);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    let parsed: TransactionPayload = serde_json::from_value(payload)?;
    let record = parsed.to_record();
    state
        .orchestrator
        .execute(
            PendingMutation::new(EntityType::LubebayTransactions, Operation::Create { payload: record }),
            modal,
        )
        .await
}

/// Revenue for the day prefix `date` (`YYYY-MM-DD`) over already-loaded rows.
pub fn revenue_on(rows: &[Value], date: &str) -> f64 {
    rows.iter()
        .filter(|r| resolve_text(r, &["date"]).is_some_and(|d| d.starts_with(date)))
        .map(|r| resolve_number(r, AMOUNT))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::records::tests::offline_state;
    use crate::orchestrator::{MutationOutcome, MutationPath};

    #[tokio::test]
    async fn sale_is_totalled_and_scoped_to_its_bay() {
        let state = offline_state();
        let report = create_transaction(
            &state,
            json!({
                "customer_name": "Walk-in",
                "paymentMethod": "POS",
                "lubebay_id": 2,
                "items": [
                    { "product_name": "Engine Oil 20W-50 (4L)", "qty": 2, "unit_price": 11800 },
                    { "name": "Oil Change", "quantity": 1, "price": "5000.00" }
                ]
            }),
            None,
        )
        .await
        .unwrap();
        assert_eq!(report.path, MutationPath::Fallback);
        let MutationOutcome::Record { record } = &report.outcome else {
            panic!("expected record");
        };
        assert_eq!(record["total_amount"], json!(28600));

        let page = transactions_page(&state, Some(&RecordId::Int(2)), &ListQuery::default()).await;
        assert_eq!(page["summary"]["transactions"], json!(1));
        assert_eq!(page["summary"]["revenue"], json!(28600));
        assert_eq!(page["summary"]["revenueByPaymentMethod"]["pos"], json!(28600));

        let other_bay = transactions_page(&state, Some(&RecordId::Int(1)), &ListQuery::default()).await;
        assert_eq!(other_bay["summary"]["transactions"], json!(0));
    }

    #[tokio::test]
    async fn invalid_sale_never_reaches_the_ledger() {
        let state = offline_state();
        let err = create_transaction(&state, json!({ "customer": "", "items": [] }), None)
            .await
            .unwrap_err();
        let fields = err.field_errors().unwrap();
        assert!(fields.contains_key("customer"));
        assert!(fields.contains_key("items"));
        assert!(state
            .orchestrator
            .ledger(EntityType::LubebayTransactions)
            .read_all()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn revenue_for_a_day() {
        let rows = vec![
            json!({ "date": "2024-05-01T10:00:00Z", "total_amount": 100 }),
            json!({ "date": "2024-05-02T10:00:00Z", "total_amount": 50 }),
        ];
        assert_eq!(revenue_on(&rows, "2024-05-01"), 100.0);
    }
}
