//! Product & service catalog page.

use serde_json::{json, Value};

use crate::coalesce::{number_value, resolve_bool};
use crate::entities::EntityType;
use crate::metrics::{self, StockSummary};
use crate::query::{ListQuery, ListSource};
use crate::AppState;

use super::{page_envelope, records, with_summary};

/// Product rows with `stock_status` and `margin_percent` attached.
pub fn product_rows(records: &[Value]) -> Vec<Value> {
    records::rows(EntityType::Products, records)
        .into_iter()
        .map(|mut row| {
            let status = metrics::stock_status_of(&row);
            let margin = metrics::round2(metrics::margin_of(&row));
            row["stock_status"] = json!(status);
            row["margin_percent"] = number_value(margin);
            row
        })
        .collect()
}

/// Products page plus the services tab. The two lists load independently;
/// a failure on one never blanks the other.
pub async fn catalog_page(state: &AppState, products: &ListQuery, services: &ListQuery) -> Value {
    let (product_list, service_list) = tokio::join!(
        state.lists.fetch(EntityType::Products, products),
        state.lists.fetch(EntityType::Services, services),
    );

    let rows = product_rows(&product_list.records);
    let summary = StockSummary::from_records(&rows);
    let service_rows = records::rows(EntityType::Services, &service_list.records);
    let active_services = service_rows
        .iter()
        .filter(|r| resolve_bool(r, &["is_active"]).unwrap_or(false))
        .count();

    let page = page_envelope(&product_list, rows);
    let mut page = with_summary(
        page,
        json!({
            "products": summary,
            "services": {
                "total": service_list.meta.count,
                "active": active_services,
                "loaded": service_list.source != ListSource::Unavailable,
            },
        }),
    );
    page["services"] = page_envelope(&service_list, service_rows);
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::records::tests::offline_state;

    #[test]
    fn rows_carry_stock_status_and_margin() {
        let rows = product_rows(&[json!({
            "id": 9,
            "productName": "Grease 500g",
            "costPrice": "1200",
            "sellingPrice": "1500",
            "currentStock": 4,
            "reorderLevel": 10
        })]);
        assert_eq!(rows[0]["name"], json!("Grease 500g"));
        assert_eq!(rows[0]["stock_status"], json!("low-stock"));
        assert_eq!(rows[0]["margin_percent"], json!(25));
    }

    #[tokio::test]
    async fn catalog_summary_from_seed_data() {
        let state = offline_state();
        let page = catalog_page(&state, &ListQuery::default(), &ListQuery::default()).await;
        let products = &page["summary"]["products"];
        assert_eq!(products["total"], json!(5));
        assert_eq!(products["active"], json!(4));
        assert_eq!(products["outOfStock"], json!(1));
        assert_eq!(products["lowStock"], json!(2));
        assert_eq!(products["inStock"], json!(2));
        assert_eq!(page["summary"]["services"]["total"], json!(3));
        assert_eq!(page["services"]["rows"].as_array().unwrap().len(), 3);
    }
}
