//! Inventory page and bin cards (per-product stock movement history).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::coalesce::{number_value, resolve_number, resolve_text};
use crate::entities::EntityType;
use crate::error::{AppError, AppResult};
use crate::forms::Modal;
use crate::metrics::{self, StockSummary};
use crate::orchestrator::MutationReport;
use crate::query::ListQuery;
use crate::record::RecordId;
use crate::AppState;

use super::{page_envelope, records, with_summary};

/// Bin cards are shown whole, not paged.
const BIN_CARD_PAGE_SIZE: u64 = 1000;

pub async fn stock_page(state: &AppState, query: &ListQuery) -> Value {
    let outcome = state.lists.fetch(EntityType::Inventory, query).await;
    let rows: Vec<Value> = records::rows(EntityType::Inventory, &outcome.records)
        .into_iter()
        .map(|mut row| {
            row["stock_status"] = json!(metrics::stock_status_of(&row));
            row["stock_value"] = number_value(metrics::round2(
                resolve_number(&row, &["current_stock"]).max(0.0) * resolve_number(&row, &["unit_cost"]),
            ));
            row
        })
        .collect();
    let summary = StockSummary::from_records(&rows);
    let by_warehouse: serde_json::Map<String, Value> =
        metrics::sum_by(&rows, &["warehouse"], &["stock_value"])
            .into_iter()
            .map(|(k, v)| (k, number_value(metrics::round2(v))))
            .collect();
    let summary = json!({
        "total": summary.total,
        "inStock": summary.in_stock,
        "lowStock": summary.low_stock,
        "outOfStock": summary.out_of_stock,
        "stockValue": number_value(metrics::round2(metrics::sum_field(&rows, &["stock_value"]))),
        "valueByWarehouse": by_warehouse,
    });
    with_summary(page_envelope(&outcome, rows), summary)
}

/// Bin card for one product, optionally narrowed to a warehouse. Entries
/// are ordered by date then id and carry a running `balance`.
/// RFC 3339 timestamps compare by instant; bare `YYYY-MM-DD` dates count
/// as midnight UTC.
fn parse_movement_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

pub async fn bin_card(state: &AppState, product: &RecordId, warehouse: Option<&RecordId>) -> Value {
    let mut query = ListQuery::default()
        .page_size(BIN_CARD_PAGE_SIZE)
        .scoped("product", product.to_string());
    if let Some(warehouse) = warehouse {
        query = query.scoped("warehouse", warehouse.to_string());
    }
    let outcome = state.lists.fetch(EntityType::BinCards, &query).await;

    let mut entries: Vec<(Option<DateTime<Utc>>, Option<RecordId>, Value)> = outcome
        .records
        .iter()
        .map(|raw| {
            let row = records::rows(EntityType::BinCards, std::slice::from_ref(raw))
                .pop()
                .unwrap_or(Value::Null);
            let date = resolve_text(&row, &["date"]).and_then(|d| parse_movement_date(&d));
            (date, RecordId::of(raw), row)
        })
        .collect();
    // Undated movements go last.
    entries.sort_by(|a, b| (a.0.is_none(), a.0, &a.1).cmp(&(b.0.is_none(), b.0, &b.1)));

    let mut balance = 0.0;
    let mut received = 0.0;
    let mut issued = 0.0;
    let rows: Vec<Value> = entries
        .into_iter()
        .map(|(_, _, mut row)| {
            let r = resolve_number(&row, &["received"]);
            let i = resolve_number(&row, &["issued"]);
            received += r;
            issued += i;
            balance += r - i;
            row["balance"] = number_value(balance);
            row
        })
        .collect();

    let summary = json!({
        "product": product.to_value(),
        "warehouse": warehouse.map(RecordId::to_value),
        "entries": rows.len(),
        "totalReceived": number_value(received),
        "totalIssued": number_value(issued),
        "closingBalance": number_value(balance),
    });
    with_summary(page_envelope(&outcome, rows), summary)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    #[serde(alias = "receive", alias = "in")]
    Receipt,
    #[serde(alias = "issuance", alias = "out")]
    Issue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    #[serde(alias = "product_id")]
    pub product: RecordId,
    #[serde(default, alias = "warehouse_id")]
    pub warehouse: Option<RecordId>,
    #[serde(alias = "movement_type", alias = "type")]
    pub kind: MovementKind,
    pub quantity: f64,
    #[serde(default)]
    pub reference: Option<String>,
    /// RFC 3339; defaults to now.
    #[serde(default)]
    pub date: Option<String>,
}

impl StockMovement {
    fn to_record(&self) -> Value {
        let (received, issued) = match self.kind {
            MovementKind::Receipt => (self.quantity, 0.0),
            MovementKind::Issue => (0.0, self.quantity),
        };
        let mut record = json!({
            "product_id": self.product.to_value(),
            "movement_type": self.kind,
            "quantity_received": number_value(received),
            "quantity_issued": number_value(issued),
            "date": self.date.clone().unwrap_or_else(|| Utc::now().to_rfc3339()),
        });
        if let Some(warehouse) = &self.warehouse {
            record["warehouse_id"] = warehouse.to_value();
        }
        if let Some(reference) = self.reference.as_deref().filter(|r| !r.trim().is_empty()) {
            record["reference"] = json!(reference.trim());
        }
        record
    }
}

/// Record a receipt or issue on a product's bin card.
pub async fn record_movement(
    state: &AppState,
    movement: Value,
    modal: Option<&mut Modal>,
) -> AppResult<MutationReport> {
    let movement: StockMovement = serde_json::from_value(movement)?;
    if !movement.quantity.is_finite() || movement.quantity <= 0.0 {
        return Err(AppError::validation("quantity", "quantity must be > 0"));
    }
    records::create(state, EntityType::BinCards, movement.to_record(), modal).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::records::tests::offline_state;

    #[tokio::test]
    async fn stock_page_classifies_seeded_inventory() {
        let state = offline_state();
        let page = stock_page(&state, &ListQuery::default()).await;
        let summary = &page["summary"];
        assert_eq!(summary["total"], json!(3));
        assert_eq!(summary["inStock"], json!(1));
        assert_eq!(summary["lowStock"], json!(1));
        assert_eq!(summary["outOfStock"], json!(1));
        assert_eq!(summary["stockValue"], json!(1330000));
        assert_eq!(summary["valueByWarehouse"]["Satellite Store"], json!(190000));
        assert_eq!(page["rows"][2]["stock_status"], json!("out-of-stock"));
    }

    #[tokio::test]
    async fn bin_card_runs_balance_in_date_order() {
        let state = offline_state();
        record_movement(
            &state,
            json!({ "product_id": 1, "warehouse_id": 1, "type": "issue", "quantity": 20, "date": "2024-05-02T09:00:00Z" }),
            None,
        )
        .await
        .unwrap();
        record_movement(
            &state,
            json!({ "product": 1, "warehouse": 1, "kind": "receipt", "quantity": 50, "date": "2024-05-01T09:00:00Z" }),
            None,
        )
        .await
        .unwrap();
        record_movement(
            &state,
            json!({ "product": 2, "kind": "receipt", "quantity": 7, "date": "2024-05-01T10:00:00Z" }),
            None,
        )
        .await
        .unwrap();

        let card = bin_card(&state, &RecordId::Int(1), Some(&RecordId::Int(1))).await;
        let rows = card["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["product"], json!("1"));
        assert_eq!(rows[0]["warehouse"], json!("1"));
        assert_eq!(rows[0]["received"], json!(50));
        assert_eq!(rows[0]["balance"], json!(50));
        assert_eq!(rows[1]["issued"], json!(20));
        assert_eq!(rows[1]["balance"], json!(30));
        assert_eq!(card["summary"]["closingBalance"], json!(30));
    }

    #[tokio::test]
    async fn bin_card_orders_by_instant_across_offsets() {
        let state = offline_state();
        record_movement(
            &state,
            json!({ "product": 1, "kind": "issue", "quantity": 20, "date": "2024-05-01T09:00:00Z" }),
            None,
        )
        .await
        .unwrap();
        // 05:00 UTC, earlier than the issue despite the later wall-clock time.
        record_movement(
            &state,
            json!({ "product": 1, "kind": "receipt", "quantity": 50, "date": "2024-05-01T10:00:00+05:00" }),
            None,
        )
        .await
        .unwrap();
        record_movement(
            &state,
            json!({ "product": 1, "kind": "receipt", "quantity": 5, "date": "someday" }),
            None,
        )
        .await
        .unwrap();

        let card = bin_card(&state, &RecordId::Int(1), None).await;
        let rows = card["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["received"], json!(50));
        assert_eq!(rows[0]["balance"], json!(50));
        assert_eq!(rows[1]["balance"], json!(30));
        assert_eq!(rows[2]["date"], json!("someday"));
        assert_eq!(rows[2]["balance"], json!(35));
    }

    #[test]
    fn movement_dates_parse_as_instants() {
        assert_eq!(
            parse_movement_date("2024-05-01T10:00:00+05:00"),
            parse_movement_date("2024-05-01T05:00:00Z")
        );
        assert_eq!(
            parse_movement_date("2024-05-01"),
            parse_movement_date("2024-05-01T00:00:00Z")
        );
        assert_eq!(parse_movement_date("May 1st"), None);
    }

    #[tokio::test]
    async fn zero_quantity_movement_is_rejected() {
        let state = offline_state();
        let err = record_movement(&state, json!({ "product": 1, "kind": "issue", "quantity": 0 }), None)
            .await
            .unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("quantity"));
    }
}
