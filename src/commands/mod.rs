//! Page-level operations. Each returns display-ready JSON the way a page
//! would bind it: projected rows, pagination meta, and summary cards.

pub mod auth;
pub mod expenses;
pub mod inventory;
pub mod lubebay;
pub mod prf;
pub mod products;
pub mod records;
pub mod settings;

use serde_json::{json, Value};

use crate::query::ListOutcome;

/// Common envelope for a list page.
pub(crate) fn page_envelope(outcome: &ListOutcome, rows: Vec<Value>) -> Value {
    json!({
        "entity": outcome.entity,
        "rows": rows,
        "meta": outcome.meta,
        "source": outcome.source,
        "error": outcome.error,
        "retryable": outcome.retryable,
    })
}

/// Attach `summary` to a page envelope.
pub(crate) fn with_summary(mut page: Value, summary: Value) -> Value {
    page["summary"] = summary;
    page
}
