//! Page-level aggregates. Pure functions of the current collection; nothing
//! here is persisted.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::coalesce::{resolve_bool, resolve_number, resolve_text};
use crate::status::StockStatus;

const CURRENT_STOCK: &[&str] = &["current_stock", "currentStock", "quantity", "stock", "qty_on_hand"];
const REORDER_LEVEL: &[&str] = &["reorder_level", "reorderLevel", "reorder_point", "min_stock"];
const COST_PRICE: &[&str] = &["cost_price", "costPrice", "unit_cost", "cost"];
const SELLING_PRICE: &[&str] = &["selling_price", "sellingPrice", "unit_price", "price"];

/// Sum of the coalesced numeric value of every record.
pub fn sum_field(records: &[Value], keys: &[&str]) -> f64 {
    records.iter().map(|r| resolve_number(r, keys)).sum()
}

pub fn count_by(records: &[Value], predicate: impl Fn(&Value) -> bool) -> usize {
    records.iter().filter(|r| predicate(r)).count()
}

/// Group and sum: `keys` picks the group label (missing labels go under
/// `"Uncategorized"`), `amount_keys` the value to total.
pub fn sum_by(records: &[Value], keys: &[&str], amount_keys: &[&str]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for record in records {
        let group = resolve_text(record, keys).unwrap_or_else(|| "Uncategorized".to_string());
        *totals.entry(group).or_insert(0.0) += resolve_number(record, amount_keys);
    }
    totals
}

/// Occurrences of each distinct value of `keys`, lowercased.
pub fn count_values(records: &[Value], keys: &[&str]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        if let Some(value) = resolve_text(record, keys) {
            *counts.entry(value.to_ascii_lowercase()).or_insert(0) += 1;
        }
    }
    counts
}

/// `reorder_level <= 0` means no threshold. Negative stock (oversold) is
/// treated as out of stock.
pub fn classify_stock_status(current_stock: f64, reorder_level: f64) -> StockStatus {
    if current_stock <= 0.0 {
        StockStatus::OutOfStock
    } else if reorder_level > 0.0 && current_stock <= reorder_level {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

pub fn stock_status_of(record: &Value) -> StockStatus {
    classify_stock_status(
        resolve_number(record, CURRENT_STOCK),
        resolve_number(record, REORDER_LEVEL),
    )
}

/// Markup over cost in percent; 0 when the cost is 0.
pub fn profit_margin_percent(selling_price: f64, cost_price: f64) -> f64 {
    if cost_price == 0.0 {
        return 0.0;
    }
    (selling_price - cost_price) / cost_price * 100.0
}

pub fn margin_of(record: &Value) -> f64 {
    profit_margin_percent(
        resolve_number(record, SELLING_PRICE),
        resolve_number(record, COST_PRICE),
    )
}

/// Round half away from zero to two decimals for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSummary {
    pub total: usize,
    pub active: usize,
    pub in_stock: usize,
    pub low_stock: usize,
    pub out_of_stock: usize,
    /// Sum of stock on hand times cost price.
    pub inventory_value: f64,
    /// Mean margin over records with a non-zero cost.
    pub average_margin: f64,
}

impl StockSummary {
    pub fn from_records(records: &[Value]) -> Self {
        let mut summary = StockSummary {
            total: records.len(),
            ..Default::default()
        };
        let mut margins = Vec::new();
        for record in records {
            if resolve_bool(record, &["is_active", "isActive", "active"]).unwrap_or(true) {
                summary.active += 1;
            }
            match stock_status_of(record) {
                StockStatus::InStock => summary.in_stock += 1,
                StockStatus::LowStock => summary.low_stock += 1,
                StockStatus::OutOfStock => summary.out_of_stock += 1,
            }
            let cost = resolve_number(record, COST_PRICE);
            summary.inventory_value += resolve_number(record, CURRENT_STOCK).max(0.0) * cost;
            if cost != 0.0 {
                margins.push(margin_of(record));
            }
        }
        if !margins.is_empty() {
            summary.average_margin = round2(margins.iter().sum::<f64>() / margins.len() as f64);
        }
        summary
    }
}
