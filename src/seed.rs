//! First-run datasets for the fallback ledgers.
//!
//! Catalog-style entities start with a small realistic set so an offline
//! first run never shows an empty table. Transactional ledgers (expenses,
//! lubebay transactions, PROs, bin cards) start empty.

use serde_json::{json, Value};

use crate::entities::EntityType;

const SEED_TIMESTAMP: &str = "2024-01-01T08:00:00+00:00";

pub fn default_records(entity: EntityType) -> Vec<Value> {
    let records = match entity {
        EntityType::Products => json!([
            {
                "id": 1, "name": "Engine Oil 20W-50 (4L)", "code": "LUB-2050-4",
                "category": "Engine Oils", "unit": "gallon",
                "cost_price": 9500, "selling_price": 11800,
                "current_stock": 140, "reorder_level": 40, "is_active": true
            },
            {
                "id": 2, "name": "Diesel Engine Oil 15W-40 (25L)", "code": "LUB-1540-25",
                "category": "Engine Oils", "unit": "keg",
                "cost_price": 52000, "selling_price": 61500,
                "current_stock": 18, "reorder_level": 20, "is_active": true
            },
            {
                "id": 3, "name": "Automatic Transmission Fluid (1L)", "code": "ATF-1",
                "category": "Transmission Fluids", "unit": "litre",
                "cost_price": 3100, "selling_price": 3900,
                "current_stock": 0, "reorder_level": 25, "is_active": true
            },
            {
                "id": 4, "name": "Oil Filter (Standard)", "code": "FLT-OIL-STD",
                "category": "Filters", "unit": "piece",
                "cost_price": 2200, "selling_price": 3500,
                "current_stock": 75, "reorder_level": 30, "is_active": true
            },
            {
                "id": 5, "name": "Brake Fluid DOT 4 (500ml)", "code": "BRK-DOT4",
                "category": "Brake Fluids", "unit": "bottle",
                "cost_price": 1800, "selling_price": 2600,
                "current_stock": 12, "reorder_level": 15, "is_active": false
            }
        ]),
        EntityType::Services => json!([
            { "id": 1, "name": "Oil Change", "code": "SVC-OIL", "category": "Maintenance", "price": 5000, "duration_minutes": 30, "is_active": true },
            { "id": 2, "name": "Filter Replacement", "code": "SVC-FLT", "category": "Maintenance", "price": 2500, "duration_minutes": 15, "is_active": true },
            { "id": 3, "name": "Car Wash", "code": "SVC-WASH", "category": "Cleaning", "price": 3000, "duration_minutes": 40, "is_active": true }
        ]),
        EntityType::Prfs => json!([
            {
                "id": 1, "prf_number": "PRF-2024-0001", "title": "Lubricant restock - Q1",
                "department": "Operations", "requested_by": "Operations Lead",
                "priority": "high", "status": "pending", "total_amount": "1250000.00",
                "items": [
                    { "description": "Engine Oil 20W-50 (4L)", "quantity": 100, "unit_price": 9500 },
                    { "description": "Oil Filter (Standard)", "quantity": 150, "unit_price": 2000 }
                ]
            },
            {
                "id": 2, "prf_number": "PRF-2024-0002", "title": "Office consumables",
                "department": "Administration", "requested_by": "Admin Officer",
                "priority": "low", "status": "draft", "total_amount": 85000,
                "items": [ { "description": "Printer toner", "quantity": 5, "unit_price": 17000 } ]
            }
        ]),
        EntityType::Lubebays => json!([
            { "id": 1, "name": "Lubebay - Main Depot", "location": "Main Depot", "manager": "Bay Supervisor", "is_active": true },
            { "id": 2, "name": "Lubebay - Highway Station", "location": "Highway Station", "manager": "Bay Supervisor", "is_active": true }
        ]),
        EntityType::Departments => json!([
            { "id": 1, "name": "Operations", "code": "OPS", "staff_count": 24, "is_active": true },
            { "id": 2, "name": "Administration", "code": "ADM", "staff_count": 8, "is_active": true },
            { "id": 3, "name": "Procurement", "code": "PRC", "staff_count": 5, "is_active": true },
            { "id": 4, "name": "Finance", "code": "FIN", "staff_count": 6, "is_active": true }
        ]),
        EntityType::Warehouses => json!([
            { "id": 1, "name": "Main Warehouse", "code": "WH-MAIN", "location": "Main Depot", "capacity": 50000, "is_active": true },
            { "id": 2, "name": "Satellite Store", "code": "WH-SAT", "location": "Highway Station", "capacity": 8000, "is_active": true }
        ]),
        EntityType::Inventory => json!([
            { "id": 1, "product_name": "Engine Oil 20W-50 (4L)", "code": "LUB-2050-4", "warehouse": "Main Warehouse", "current_stock": 120, "reorder_level": 40, "unit_cost": 9500 },
            { "id": 2, "product_name": "Engine Oil 20W-50 (4L)", "code": "LUB-2050-4", "warehouse": "Satellite Store", "current_stock": 20, "reorder_level": 20, "unit_cost": 9500 },
            { "id": 3, "product_name": "Automatic Transmission Fluid (1L)", "code": "ATF-1", "warehouse": "Main Warehouse", "current_stock": 0, "reorder_level": 25, "unit_cost": 3100 }
        ]),
        EntityType::Pros
        | EntityType::LubebayTransactions
        | EntityType::Expenses
        | EntityType::BinCards => json!([]),
    };

    match records {
        Value::Array(items) => items
            .into_iter()
            .map(|mut record| {
                if let Some(obj) = record.as_object_mut() {
                    obj.entry("created_at")
                        .or_insert_with(|| Value::String(SEED_TIMESTAMP.to_string()));
                    obj.entry("updated_at")
                        .or_insert_with(|| Value::String(SEED_TIMESTAMP.to_string()));
                }
                record
            })
            .collect(),
        _ => Vec::new(),
    }
}
