//! Form state for add/edit modals and the pure validation that runs before
//! any network call.

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::coalesce::{project, resolve, resolve_number_opt, resolve_text};
use crate::entities::EntityType;
use crate::error::{AppError, AppResult, FieldErrors};
use crate::orchestrator::{MutationOrchestrator, MutationReport, Operation, PendingMutation};
use crate::record::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalKind {
    Form,
    ConfirmDelete,
    ConfirmBulk,
    Detail,
}

/// A dialog tied to a mutation. Successful mutations close it; failures
/// leave it open with the error message so the user can retry or cancel.
#[derive(Debug, Clone, Serialize)]
pub struct Modal {
    pub id: Uuid,
    pub kind: ModalKind,
    pub open: bool,
    pub error: Option<String>,
}

impl Modal {
    pub fn open(kind: ModalKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            open: true,
            error: None,
        }
    }

    pub fn close(&mut self) {
        self.open = false;
        self.error = None;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FormMode {
    Create,
    Edit { id: RecordId },
}

#[derive(Debug, Clone, Serialize)]
pub struct FormState {
    pub entity: EntityType,
    pub mode: FormMode,
    pub values: Map<String, Value>,
    pub errors: FieldErrors,
    pub modal: Modal,
}

impl FormState {
    pub fn create(entity: EntityType) -> Self {
        Self {
            entity,
            mode: FormMode::Create,
            values: Map::new(),
            errors: FieldErrors::new(),
            modal: Modal::open(ModalKind::Form),
        }
    }

    /// Edit form pre-filled from `record`: raw fields first, then the
    /// coalesced display fields so alternate key spellings land under the
    /// canonical names.
    pub fn edit(entity: EntityType, record: &Value) -> AppResult<Self> {
        let id = RecordId::of(record).ok_or_else(|| AppError::validation("id", "record has no id"))?;
        let mut values = record.as_object().cloned().unwrap_or_default();
        if let Value::Object(projected) = project(record, entity.display_fields()) {
            for (key, value) in projected {
                values.insert(key, value);
            }
        }
        for key in ["id", "created_at", "updated_at"] {
            values.remove(key);
        }
        Ok(Self {
            entity,
            mode: FormMode::Edit { id },
            values,
            errors: FieldErrors::new(),
            modal: Modal::open(ModalKind::Form),
        })
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.values.insert(field.to_string(), value);
        self.errors.remove(field);
    }

    pub fn payload(&self) -> Value {
        Value::Object(self.values.clone())
    }

    /// Run validation and store the inline errors. True when the form can
    /// be submitted.
    pub fn validate(&mut self) -> bool {
        self.errors = validate(self.entity, &self.payload());
        self.errors.is_empty()
    }

    fn to_mutation(&self) -> PendingMutation {
        let operation = match &self.mode {
            FormMode::Create => Operation::Create {
                payload: self.payload(),
            },
            FormMode::Edit { id } => Operation::Update {
                id: id.clone(),
                patch: self.payload(),
            },
        };
        PendingMutation {
            entity: self.entity,
            operation,
        }
    }
}

/// Validate, then hand the form to the orchestrator. Validation failures
/// never reach the network; server-side field errors are merged into the
/// form's inline errors.
pub async fn submit(
    orchestrator: &MutationOrchestrator,
    form: &mut FormState,
) -> AppResult<MutationReport> {
    if !form.validate() {
        return Err(AppError::Validation(form.errors.clone()));
    }
    let mutation = form.to_mutation();
    match orchestrator.execute(mutation, Some(&mut form.modal)).await {
        Ok(report) => Ok(report),
        Err(e) => {
            if let Some(fields) = e.field_errors() {
                for (field, messages) in fields {
                    form.errors
                        .entry(field.clone())
                        .or_default()
                        .extend(messages.iter().cloned());
                }
            }
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Validation rules
// ---------------------------------------------------------------------------

fn push(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

fn require_text(errors: &mut FieldErrors, values: &Value, field: &str, keys: &[&str]) {
    if resolve_text(values, keys).is_none() {
        push(errors, field, &format!("{field} is required"));
    }
}

fn require_positive(errors: &mut FieldErrors, values: &Value, field: &str, keys: &[&str]) {
    match resolve_number_opt(values, keys) {
        Some(n) if n > 0.0 => {}
        _ => push(errors, field, &format!("{field} must be greater than 0")),
    }
}

fn non_negative_if_present(errors: &mut FieldErrors, values: &Value, field: &str, keys: &[&str]) {
    if let Some(n) = resolve_number_opt(values, keys) {
        if n < 0.0 {
            push(errors, field, &format!("{field} must not be negative"));
        }
    }
}

fn require_items(errors: &mut FieldErrors, values: &Value) {
    let items = resolve(values, &["items", "line_items", "lineItems"])
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty());
    let Some(items) = items else {
        push(errors, "items", "at least one item required");
        return;
    };
    for (idx, item) in items.iter().enumerate() {
        let qty = resolve_number_opt(item, &["quantity", "qty"]).unwrap_or(0.0);
        if qty <= 0.0 {
            push(errors, &format!("items[{idx}].quantity"), "quantity must be > 0");
        }
    }
}

/// Client-side validation for a full record of `entity`.
pub fn validate(entity: EntityType, values: &Value) -> FieldErrors {
    let mut errors = FieldErrors::new();
    match entity {
        EntityType::Products => {
            require_text(&mut errors, values, "name", &["name", "product_name"]);
            non_negative_if_present(&mut errors, values, "cost_price", &["cost_price", "costPrice"]);
            non_negative_if_present(
                &mut errors,
                values,
                "selling_price",
                &["selling_price", "sellingPrice"],
            );
            non_negative_if_present(&mut errors, values, "reorder_level", &["reorder_level", "reorderLevel"]);
        }
        EntityType::Services => {
            require_text(&mut errors, values, "name", &["name"]);
            non_negative_if_present(&mut errors, values, "price", &["price"]);
        }
        EntityType::Expenses => {
            require_text(&mut errors, values, "name", &["name", "title", "description"]);
            require_positive(&mut errors, values, "amount", &["amount", "total_amount"]);
        }
        EntityType::LubebayTransactions => {
            require_text(
                &mut errors,
                values,
                "customer",
                &["customer", "customer_name", "customerName"],
            );
            require_items(&mut errors, values);
        }
        EntityType::Prfs => {
            require_text(
                &mut errors,
                values,
                "department",
                &["department", "department_name", "department_id"],
            );
            require_items(&mut errors, values);
        }
        EntityType::Pros => {
            require_text(&mut errors, values, "supplier", &["supplier", "supplier_name", "supplier_id"]);
        }
        EntityType::Departments | EntityType::Warehouses | EntityType::Lubebays => {
            require_text(&mut errors, values, "name", &["name"]);
        }
        EntityType::Inventory => {
            require_text(&mut errors, values, "product", &["product", "product_name", "product_id"]);
            non_negative_if_present(
                &mut errors,
                values,
                "current_stock",
                &["current_stock", "quantity"],
            );
        }
        EntityType::BinCards => {
            require_text(&mut errors, values, "product", &["product", "product_name", "product_id"]);
            let received = resolve_number_opt(values, &["quantity_received", "received"]).unwrap_or(0.0);
            let issued = resolve_number_opt(values, &["quantity_issued", "issued"]).unwrap_or(0.0);
            if received <= 0.0 && issued <= 0.0 {
                push(&mut errors, "quantity", "quantity must be > 0");
            }
        }
    }
    errors
}

/// Validation for a partial update: only the fields present in `patch` are
/// checked, so a patch that omits a required field is not rejected for it.
pub fn validate_patch(entity: EntityType, patch: &Value) -> FieldErrors {
    let present: Vec<&String> = match patch.as_object() {
        Some(map) => map.keys().collect(),
        None => return validate(entity, patch),
    };
    validate(entity, patch)
        .into_iter()
        .filter(|(field, _)| {
            let root = field.split('[').next().unwrap_or(field);
            present.iter().any(|key| key.as_str() == root)
                || (root == "quantity" && present.iter().any(|k| k.contains("quantity") || k.contains("received") || k.contains("issued")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiRequest, RemoteApi};
    use crate::db;
    use crate::events::EventBus;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Remote double that records every request and answers from a queue.
    #[derive(Default)]
    struct RecordingApi {
        paths: Mutex<Vec<String>>,
        replies: Mutex<VecDeque<AppResult<Value>>>,
    }

    #[async_trait]
    impl RemoteApi for RecordingApi {
        async fn send(&self, request: ApiRequest) -> AppResult<Value> {
            self.paths.lock().unwrap().push(request.path.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::Network("Cannot reach server".into())))
        }
    }

    fn orchestrator(api: Arc<RecordingApi>) -> MutationOrchestrator {
        MutationOrchestrator::new(api, Arc::new(db::test_state()), EventBus::new())
    }

    #[test]
    fn lubebay_transaction_rules() {
        let errors = validate(
            EntityType::LubebayTransactions,
            &json!({ "items": [{ "name": "ATF", "quantity": 0 }] }),
        );
        assert_eq!(errors["customer"], vec!["customer is required".to_string()]);
        assert_eq!(errors["items[0].quantity"], vec!["quantity must be > 0".to_string()]);

        let errors = validate(
            EntityType::LubebayTransactions,
            &json!({ "customer": "Walk-in", "items": [] }),
        );
        assert_eq!(errors["items"], vec!["at least one item required".to_string()]);
    }

    #[test]
    fn valid_expense_passes() {
        let errors = validate(
            EntityType::Expenses,
            &json!({ "name": "Generator diesel", "amount": "15000" }),
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn negative_price_rejected() {
        let errors = validate(
            EntityType::Products,
            &json!({ "name": "Grease", "selling_price": -5 }),
        );
        assert!(errors.contains_key("selling_price"));
    }

    #[test]
    fn patch_validation_ignores_absent_fields() {
        assert!(validate_patch(EntityType::Products, &json!({ "selling_price": 10 })).is_empty());
        assert!(validate_patch(EntityType::Products, &json!({ "name": " " })).contains_key("name"));
        assert!(validate_patch(EntityType::Expenses, &json!({ "amount": 0 })).contains_key("amount"));
    }

    #[test]
    fn edit_form_prefills_canonical_fields() {
        let form = FormState::edit(
            EntityType::Products,
            &json!({ "id": 4, "productName": "Oil Filter", "sellingPrice": "3500" }),
        )
        .unwrap();
        assert_eq!(form.mode, FormMode::Edit { id: RecordId::Int(4) });
        assert_eq!(form.values["name"], json!("Oil Filter"));
        assert_eq!(form.values["selling_price"], json!(3500));
        assert!(!form.values.contains_key("id"));
        assert!(form.modal.is_open());
    }

    #[test]
    fn setting_a_field_clears_its_error() {
        let mut form = FormState::create(EntityType::Departments);
        assert!(!form.validate());
        assert!(form.errors.contains_key("name"));
        form.set("name", json!("Logistics"));
        assert!(!form.errors.contains_key("name"));
        assert!(form.validate());
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_the_orchestrator() {
        let api = Arc::new(RecordingApi::default());
        let orch = orchestrator(api.clone());
        let seeded = orch.ledger(EntityType::Expenses).read_all().unwrap().len();
        let mut form = FormState::create(EntityType::Expenses);
        form.set("name", json!("Diesel"));

        let err = submit(&orch, &mut form).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(form.errors.contains_key("amount"));
        assert!(api.paths.lock().unwrap().is_empty());
        assert_eq!(orch.ledger(EntityType::Expenses).read_all().unwrap().len(), seeded);
        assert!(form.modal.is_open());
    }

    #[tokio::test]
    async fn server_field_errors_land_on_the_form() {
        let mut errors = FieldErrors::new();
        errors.insert("name".into(), vec!["An expense with this name exists.".into()]);
        let api = Arc::new(RecordingApi {
            paths: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::from([Err(AppError::Api {
                status: 400,
                message: "Invalid input.".into(),
                errors,
            })])),
        });
        let orch = orchestrator(api.clone());
        let mut form = FormState::edit(
            EntityType::Expenses,
            &json!({ "id": 999, "name": "Diesel", "amount": 1500 }),
        )
        .unwrap();

        let err = submit(&orch, &mut form).await.unwrap_err();
        assert!(matches!(err, AppError::Api { status: 400, .. }));
        assert_eq!(
            form.errors["name"],
            vec!["An expense with this name exists.".to_string()]
        );
        assert!(form.modal.is_open());
        assert_eq!(form.modal.error.as_deref(), Some("Invalid input."));
        assert_eq!(*api.paths.lock().unwrap(), vec!["/expenses/999/".to_string()]);
    }
}
