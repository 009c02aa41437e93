//! Entity catalog: REST resource, ledger namespace, search fields, and
//! coalescing table for every record type the admin pages manage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::coalesce::FieldSpec;
use crate::error::AppError;
use crate::status::{StatusDomain, TransitionAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Products,
    Services,
    Prfs,
    Pros,
    Lubebays,
    LubebayTransactions,
    Expenses,
    Departments,
    Warehouses,
    Inventory,
    BinCards,
}

// Shared candidate key lists.
const NAME: &[&str] = &["name", "product_name", "productName", "title"];
const CODE: &[&str] = &["code", "product_code", "productCode", "sku"];
const CATEGORY: &[&str] = &["category_name", "category", "categoryName"];
const AMOUNT: &[&str] = &["total_amount", "total", "amount", "totalAmount"];
const STATUS: &[&str] = &["status", "approval_status", "approvalStatus"];
const ACTIVE: &[&str] = &["is_active", "isActive", "active"];
const CREATED: &[&str] = &["date", "transaction_date", "created_datetime", "created_at", "createdAt"];
const DESCRIPTION: &[&str] = &["description", "notes", "remarks"];

const PRODUCT_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("name", NAME),
    FieldSpec::text("code", CODE),
    FieldSpec::text("category", CATEGORY),
    FieldSpec::text("unit", &["unit_of_measure", "unit", "uom"]),
    FieldSpec::number("cost_price", &["cost_price", "costPrice", "unit_cost", "cost"]),
    FieldSpec::number(
        "selling_price",
        &["selling_price", "sellingPrice", "unit_price", "price"],
    ),
    FieldSpec::number(
        "current_stock",
        &["current_stock", "currentStock", "quantity", "stock", "qty_on_hand"],
    ),
    FieldSpec::number(
        "reorder_level",
        &["reorder_level", "reorderLevel", "reorder_point", "minimum_stock"],
    ),
    FieldSpec::flag("is_active", ACTIVE),
    FieldSpec::text("created_at", CREATED),
];

const SERVICE_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("name", NAME),
    FieldSpec::text("code", CODE),
    FieldSpec::text("category", CATEGORY),
    FieldSpec::number("price", &["price", "service_price", "servicePrice", "amount"]),
    FieldSpec::number("duration_minutes", &["duration_minutes", "duration", "durationMinutes"]),
    FieldSpec::flag("is_active", ACTIVE),
];

const PRF_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("prf_number", &["prf_number", "prfNumber", "reference", "number"]),
    FieldSpec::text("title", &["title", "purpose", "name"]),
    FieldSpec::text("department", &["department_name", "department", "departmentName"]),
    FieldSpec::text("requested_by", &["requested_by_name", "requested_by", "requestedBy", "created_by"]),
    FieldSpec::text("priority", &["priority", "urgency"]),
    FieldSpec::text("status", STATUS),
    FieldSpec::number("total_amount", &["total_amount", "estimated_total", "total", "amount"]),
    FieldSpec::raw("items", &["items", "line_items", "lineItems"]),
    FieldSpec::text("created_at", CREATED),
];

const PRO_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("pro_number", &["pro_number", "proNumber", "reference", "number"]),
    FieldSpec::text("supplier", &["supplier_name", "supplier", "supplierName", "vendor"]),
    FieldSpec::text("warehouse", &["warehouse_name", "warehouse", "warehouseName"]),
    FieldSpec::text("status", STATUS),
    FieldSpec::text("delivery_status", &["delivery_status", "deliveryStatus"]),
    FieldSpec::number("total_amount", AMOUNT),
    FieldSpec::text("expected_delivery", &["expected_delivery_date", "expected_delivery", "expectedDelivery"]),
    FieldSpec::text("created_at", CREATED),
];

const LUBEBAY_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("name", NAME),
    FieldSpec::text("location", &["location", "address", "city"]),
    FieldSpec::text("manager", &["manager_name", "manager", "managerName"]),
    FieldSpec::text("phone", &["phone", "phone_number", "phoneNumber"]),
    FieldSpec::flag("is_active", ACTIVE),
];

const LUBEBAY_TRANSACTION_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("reference", &["reference", "transaction_id", "transactionId", "receipt_number"]),
    FieldSpec::text("customer", &["customer_name", "customer", "customerName"]),
    FieldSpec::text("lubebay", &["lubebay_name", "lubebay", "lubebayName"]),
    FieldSpec::text("payment_method", &["paymentMethod", "payment_method"]),
    FieldSpec::text("status", STATUS),
    FieldSpec::number("total_amount", AMOUNT),
    FieldSpec::raw("items", &["items", "line_items", "products"]),
    FieldSpec::text("date", CREATED),
];

const EXPENSE_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("name", &["name", "title", "description"]),
    FieldSpec::text("category", CATEGORY),
    FieldSpec::number("amount", &["amount", "total_amount", "total"]),
    FieldSpec::text("status", STATUS),
    FieldSpec::text("payment_method", &["paymentMethod", "payment_method"]),
    FieldSpec::text("description", DESCRIPTION),
    FieldSpec::text("date", CREATED),
];

const DEPARTMENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("name", NAME),
    FieldSpec::text("code", &["code", "department_code", "departmentCode"]),
    FieldSpec::text("head", &["head_name", "head", "headOfDepartment", "manager"]),
    FieldSpec::number("staff_count", &["staff_count", "staffCount", "employees"]),
    FieldSpec::text("description", DESCRIPTION),
    FieldSpec::flag("is_active", ACTIVE),
];

const WAREHOUSE_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("name", NAME),
    FieldSpec::text("code", &["code", "warehouse_code", "warehouseCode"]),
    FieldSpec::text("location", &["location", "address", "city"]),
    FieldSpec::text("manager", &["manager_name", "manager", "managerName"]),
    FieldSpec::number("capacity", &["capacity", "storage_capacity", "capacityLitres"]),
    FieldSpec::flag("is_active", ACTIVE),
];

const INVENTORY_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("product", &["product_name", "productName", "product", "name"]),
    FieldSpec::text("code", CODE),
    FieldSpec::text("warehouse", &["warehouse_name", "warehouse", "warehouseName"]),
    FieldSpec::number(
        "current_stock",
        &["current_stock", "currentStock", "quantity_on_hand", "quantity", "stock"],
    ),
    FieldSpec::number(
        "reorder_level",
        &["reorder_level", "reorderLevel", "reorder_point", "minimum_stock"],
    ),
    FieldSpec::number("unit_cost", &["unit_cost", "unitCost", "cost_price", "cost"]),
    FieldSpec::text("last_updated", &["last_updated", "updated_at", "updatedAt"]),
];

const BIN_CARD_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("product", &["product_name", "productName", "product", "product_id"]),
    FieldSpec::text(
        "warehouse",
        &["warehouse_name", "warehouse", "warehouseName", "warehouse_id"],
    ),
    FieldSpec::text("reference", &["reference", "document_number", "documentNumber"]),
    FieldSpec::text("movement", &["movement_type", "movementType", "type"]),
    FieldSpec::number("received", &["quantity_received", "received", "qty_in", "receipt"]),
    FieldSpec::number("issued", &["quantity_issued", "issued", "qty_out", "issue"]),
    FieldSpec::text("date", CREATED),
];

impl EntityType {
    pub const ALL: [EntityType; 11] = [
        EntityType::Products,
        EntityType::Services,
        EntityType::Prfs,
        EntityType::Pros,
        EntityType::Lubebays,
        EntityType::LubebayTransactions,
        EntityType::Expenses,
        EntityType::Departments,
        EntityType::Warehouses,
        EntityType::Inventory,
        EntityType::BinCards,
    ];

    /// Canonical name and fallback ledger namespace.
    pub fn key(self) -> &'static str {
        match self {
            EntityType::Products => "products",
            EntityType::Services => "services",
            EntityType::Prfs => "prfs",
            EntityType::Pros => "pros",
            EntityType::Lubebays => "lubebays",
            EntityType::LubebayTransactions => "lubebay_transactions",
            EntityType::Expenses => "expenses",
            EntityType::Departments => "departments",
            EntityType::Warehouses => "warehouses",
            EntityType::Inventory => "inventory",
            EntityType::BinCards => "bin_cards",
        }
    }

    /// REST collection path (trailing slash required by the API).
    pub fn resource(self) -> &'static str {
        match self {
            EntityType::Products => "/products/",
            EntityType::Services => "/services/",
            EntityType::Prfs => "/prfs/",
            EntityType::Pros => "/pros/",
            EntityType::Lubebays => "/lubebays/",
            EntityType::LubebayTransactions => "/lubebay-transactions/",
            EntityType::Expenses => "/expenses/",
            EntityType::Departments => "/departments/",
            EntityType::Warehouses => "/warehouses/",
            EntityType::Inventory => "/inventory/",
            EntityType::BinCards => "/bin-cards/",
        }
    }

    /// Singular label used in notifications.
    pub fn label(self) -> &'static str {
        match self {
            EntityType::Products => "Product",
            EntityType::Services => "Service",
            EntityType::Prfs => "PRF",
            EntityType::Pros => "PRO",
            EntityType::Lubebays => "Lubebay",
            EntityType::LubebayTransactions => "Transaction",
            EntityType::Expenses => "Expense",
            EntityType::Departments => "Department",
            EntityType::Warehouses => "Warehouse",
            EntityType::Inventory => "Inventory item",
            EntityType::BinCards => "Bin card entry",
        }
    }

    /// Fields searched by substring when filtering fallback data.
    pub fn search_fields(self) -> &'static [&'static str] {
        match self {
            EntityType::Products | EntityType::Services => &[
                "name",
                "product_name",
                "productName",
                "code",
                "product_code",
                "sku",
                "category",
                "category_name",
            ],
            EntityType::Prfs => &["prf_number", "prfNumber", "title", "purpose", "department", "department_name"],
            EntityType::Pros => &["pro_number", "proNumber", "supplier", "supplier_name"],
            EntityType::LubebayTransactions => &[
                "reference",
                "transaction_id",
                "customer",
                "customer_name",
                "customerName",
            ],
            EntityType::Expenses => &["name", "title", "description", "category", "category_name"],
            EntityType::Inventory => &["product_name", "productName", "product", "code", "warehouse", "warehouse_name"],
            EntityType::BinCards => &["reference", "product_name", "product"],
            EntityType::Lubebays | EntityType::Departments | EntityType::Warehouses => {
                &["name", "code", "location"]
            }
        }
    }

    pub fn display_fields(self) -> &'static [FieldSpec] {
        match self {
            EntityType::Products => PRODUCT_FIELDS,
            EntityType::Services => SERVICE_FIELDS,
            EntityType::Prfs => PRF_FIELDS,
            EntityType::Pros => PRO_FIELDS,
            EntityType::Lubebays => LUBEBAY_FIELDS,
            EntityType::LubebayTransactions => LUBEBAY_TRANSACTION_FIELDS,
            EntityType::Expenses => EXPENSE_FIELDS,
            EntityType::Departments => DEPARTMENT_FIELDS,
            EntityType::Warehouses => WAREHOUSE_FIELDS,
            EntityType::Inventory => INVENTORY_FIELDS,
            EntityType::BinCards => BIN_CARD_FIELDS,
        }
    }

    pub fn status_domain(self) -> Option<StatusDomain> {
        match self {
            EntityType::Prfs => Some(StatusDomain::Prf),
            EntityType::Pros | EntityType::Expenses => Some(StatusDomain::Approval),
            EntityType::Products
            | EntityType::Services
            | EntityType::Lubebays
            | EntityType::Departments
            | EntityType::Warehouses => Some(StatusDomain::ActiveFlag),
            EntityType::LubebayTransactions | EntityType::Inventory | EntityType::BinCards => None,
        }
    }

    pub fn supports(self, action: &TransitionAction) -> bool {
        match self.status_domain() {
            Some(StatusDomain::ActiveFlag) => action.is_activation(),
            Some(StatusDomain::Prf) => !action.is_activation(),
            Some(StatusDomain::Approval) => matches!(
                action,
                TransitionAction::Approve | TransitionAction::Reject { .. }
            ),
            None => false,
        }
    }

    /// Entity types whose lists change as a side effect of mutating this one.
    pub fn related(self) -> &'static [EntityType] {
        match self {
            EntityType::LubebayTransactions => &[EntityType::Inventory, EntityType::Lubebays],
            EntityType::BinCards => &[EntityType::Inventory],
            EntityType::Pros => &[EntityType::Inventory, EntityType::BinCards],
            EntityType::Products => &[EntityType::Inventory],
            EntityType::Inventory => &[EntityType::Products],
            _ => &[],
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for EntityType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let entity = match normalized.as_str() {
            "product" | "products" => EntityType::Products,
            "service" | "services" | "lubebay_service" | "lubebay_services" => EntityType::Services,
            "prf" | "prfs" | "purchase_requisition" | "purchase_requisitions" => EntityType::Prfs,
            "pro" | "pros" | "purchase_order" | "purchase_orders" => EntityType::Pros,
            "lubebay" | "lubebays" => EntityType::Lubebays,
            "lubebay_transaction" | "lubebay_transactions" | "transaction" | "transactions" => {
                EntityType::LubebayTransactions
            }
            "expense" | "expenses" => EntityType::Expenses,
            "department" | "departments" => EntityType::Departments,
            "warehouse" | "warehouses" => EntityType::Warehouses,
            "inventory" | "stock" | "inventories" => EntityType::Inventory,
            "bin_card" | "bin_cards" | "bincard" | "bincards" => EntityType::BinCards,
            _ => {
                return Err(AppError::Config(format!("Unknown entity type: {s}")));
            }
        };
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_singular_plural_and_kebab() {
        assert_eq!("product".parse::<EntityType>().unwrap(), EntityType::Products);
        assert_eq!("expenses".parse::<EntityType>().unwrap(), EntityType::Expenses);
        assert_eq!(
            "lubebay-transaction".parse::<EntityType>().unwrap(),
            EntityType::LubebayTransactions
        );
        assert_eq!("Bin Cards".parse::<EntityType>().unwrap(), EntityType::BinCards);
        assert!("widgets".parse::<EntityType>().is_err());
    }

    #[test]
    fn keys_round_trip_through_from_str() {
        for entity in EntityType::ALL {
            assert_eq!(entity.key().parse::<EntityType>().unwrap(), entity);
            assert!(entity.resource().starts_with('/'));
            assert!(entity.resource().ends_with('/'));
        }
    }

    #[test]
    fn transitions_follow_status_domain() {
        assert!(EntityType::Prfs.supports(&TransitionAction::Submit));
        assert!(!EntityType::Prfs.supports(&TransitionAction::Activate));
        assert!(EntityType::Products.supports(&TransitionAction::Deactivate));
        assert!(!EntityType::Expenses.supports(&TransitionAction::Submit));
        assert!(!EntityType::BinCards.supports(&TransitionAction::Approve));
    }
}
