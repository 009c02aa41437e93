//! List queries.
//!
//! [`ListService::fetch`] never fails: it asks the remote API first and,
//! when that is unavailable (or offline mode is on), serves the fallback
//! ledger with the same filters applied client-side. Only when the ledger
//! itself cannot be read does a page get an empty, retryable result.
//!
//! [`PageScope`] and [`QuerySlot`] keep late responses from landing on a
//! page that is gone or on a query that has been superseded.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::api::RemoteApi;
use crate::coalesce::{resolve, resolve_bool, resolve_text};
use crate::db::DbState;
use crate::entities::EntityType;
use crate::fallback::FallbackLedger;
use crate::normalize::{normalize_with_page_size, total_pages, PageMeta};
use crate::status::{ApprovalStatus, PrfStatus};

pub const DEFAULT_PAGE_SIZE: u64 = 20;

const STATUS_KEYS: &[&str] = &["status", "approval_status", "approvalStatus"];
const CATEGORY_KEYS: &[&str] = &["category", "category_name", "categoryName"];
const PRIORITY_KEYS: &[&str] = &["priority"];
const ACTIVE_KEYS: &[&str] = &["is_active", "isActive", "active"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub is_active: Option<bool>,
    /// Foreign-key scoping such as `lubebay=<id>`.
    pub scope: Vec<(String, String)>,
}

impl ListQuery {
    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn page_size(mut self, size: u64) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn scoped(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.scope.push((field.into(), value.into()));
        self
    }

    /// Query-string pairs for the remote list call. Empty values are
    /// dropped later by [`crate::api::with_query`].
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                pairs.push((key.to_string(), value.trim().to_string()));
            }
        };
        push("page", self.page.map(|p| p.to_string()));
        push("page_size", self.page_size.map(|p| p.to_string()));
        push("search", self.search.clone());
        push("status", self.status.clone());
        push("category", self.category.clone());
        push("priority", self.priority.clone());
        push("is_active", self.is_active.map(|b| b.to_string()));
        for (field, value) in &self.scope {
            pairs.push((field.clone(), value.trim().to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListSource {
    Remote,
    Fallback,
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOutcome {
    pub entity: EntityType,
    pub records: Vec<Value>,
    pub meta: PageMeta,
    pub source: ListSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The page should offer a retry action.
    pub retryable: bool,
}

pub struct ListService {
    api: Arc<dyn RemoteApi>,
    db: Arc<DbState>,
    offline: bool,
    default_page_size: u64,
}

impl ListService {
    pub fn new(api: Arc<dyn RemoteApi>, db: Arc<DbState>) -> Self {
        Self {
            api,
            db,
            offline: false,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn default_page_size(mut self, size: u64) -> Self {
        self.default_page_size = size.max(1);
        self
    }

    pub async fn fetch(&self, entity: EntityType, query: &ListQuery) -> ListOutcome {
        if !self.offline {
            match self.api.list(entity.resource(), &query.to_pairs()).await {
                Ok(resp) => {
                    let page_size = query.page_size.or(Some(self.default_page_size));
                    let mut normalized = normalize_with_page_size(&resp, page_size);
                    if let Some(page) = query.page {
                        if resp.get("paginator").is_none() && resp.get("page").is_none() {
                            normalized.meta.page = page.max(1);
                        }
                    }
                    debug!(entity = %entity, count = normalized.meta.count, "list fetched from api");
                    return ListOutcome {
                        entity,
                        records: normalized.records,
                        meta: normalized.meta,
                        source: ListSource::Remote,
                        error: None,
                        retryable: false,
                    };
                }
                Err(e) => {
                    warn!(entity = %entity, error = %e, "list query failed, serving fallback ledger");
                }
            }
        }
        self.fetch_fallback(entity, query)
    }

    fn fetch_fallback(&self, entity: EntityType, query: &ListQuery) -> ListOutcome {
        let ledger = FallbackLedger::new(self.db.clone(), entity);
        match ledger.read_all() {
            Ok(records) => {
                let filtered = filter_records(entity, records, query);
                let page_size = query.page_size.unwrap_or(self.default_page_size).max(1);
                let (records, meta) = paginate(filtered, query.page.unwrap_or(1), page_size);
                ListOutcome {
                    entity,
                    records,
                    meta,
                    source: ListSource::Fallback,
                    error: None,
                    retryable: !self.offline,
                }
            }
            Err(e) => {
                error!(entity = %entity, error = %e, "fallback ledger unreadable");
                ListOutcome {
                    entity,
                    records: Vec::new(),
                    meta: PageMeta::single_page(0),
                    source: ListSource::Unavailable,
                    error: Some(format!("Error loading {}: {}", entity.key().replace('_', " "), e.user_message())),
                    retryable: true,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Client-side filtering for fallback data
// ---------------------------------------------------------------------------

fn text_eq(actual: Option<String>, wanted: &str) -> bool {
    actual.is_some_and(|a| a.eq_ignore_ascii_case(wanted.trim()))
}

fn status_matches(record: &Value, wanted: &str) -> bool {
    let actual = resolve_text(record, STATUS_KEYS);
    if text_eq(actual.clone(), wanted) {
        return true;
    }
    // Compare through the closed status types so "submitted" matches "pending".
    let Some(actual) = actual else {
        return false;
    };
    if let (Some(a), Some(w)) = (PrfStatus::parse(&actual), PrfStatus::parse(wanted)) {
        return a == w;
    }
    matches!(
        (ApprovalStatus::parse(&actual), ApprovalStatus::parse(wanted)),
        (Some(a), Some(w)) if a == w
    )
}

fn scope_matches(record: &Value, field: &str, wanted: &str) -> bool {
    let id_key = format!("{field}_id");
    let value = match resolve(record, &[field, id_key.as_str()]) {
        Some(v @ Value::Object(_)) => v.get("id").cloned().unwrap_or(Value::Null),
        Some(v) => v.clone(),
        None => return false,
    };
    let actual = match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    text_eq(actual, wanted)
}

fn search_matches(entity: EntityType, record: &Value, term: &str) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    entity
        .search_fields()
        .iter()
        .filter_map(|field| resolve_text(record, &[field]))
        .any(|value| value.to_lowercase().contains(&needle))
}

pub fn filter_records(entity: EntityType, records: Vec<Value>, query: &ListQuery) -> Vec<Value> {
    records
        .into_iter()
        .filter(|r| query.search.as_deref().map_or(true, |s| search_matches(entity, r, s)))
        .filter(|r| query.status.as_deref().map_or(true, |s| s.trim().is_empty() || status_matches(r, s)))
        .filter(|r| {
            query.category.as_deref().map_or(true, |c| {
                c.trim().is_empty() || text_eq(resolve_text(r, CATEGORY_KEYS), c)
            })
        })
        .filter(|r| {
            query.priority.as_deref().map_or(true, |p| {
                p.trim().is_empty() || text_eq(resolve_text(r, PRIORITY_KEYS), p)
            })
        })
        .filter(|r| {
            query
                .is_active
                .map_or(true, |want| resolve_bool(r, ACTIVE_KEYS).unwrap_or(true) == want)
        })
        .filter(|r| query.scope.iter().all(|(f, v)| scope_matches(r, f, v)))
        .collect()
}

/// Slice one page out of `records`. Pages are 1-based; a page past the end
/// is empty but keeps the real count.
pub fn paginate(records: Vec<Value>, page: u64, page_size: u64) -> (Vec<Value>, PageMeta) {
    let count = records.len() as u64;
    let page = page.max(1);
    let page_size = page_size.max(1);
    let start = (page - 1).saturating_mul(page_size).min(count) as usize;
    let rows = records
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .collect();
    (
        rows,
        PageMeta {
            count,
            page,
            page_size,
            total_pages: total_pages(count, page_size),
        },
    )
}

// ---------------------------------------------------------------------------
// Page scope and per-query state
// ---------------------------------------------------------------------------

/// Lifetime of a mounted page. Work started through [`PageScope::run`]
/// resolves to `None` once the page is closed, so a late response never
/// writes into a page that is gone. Dropping the scope closes it.
#[derive(Debug, Default)]
pub struct PageScope {
    token: CancellationToken,
}

impl PageScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token for background work spawned on behalf of this page.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            out = fut => {
                if self.token.is_cancelled() {
                    None
                } else {
                    Some(out)
                }
            }
        }
    }
}

impl Drop for PageScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum LoadState<T> {
    Idle,
    Loading,
    Loaded(T),
    Failed(String),
}

/// Ticket for one request against a [`QuerySlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Per-query load state. Each `begin` supersedes earlier requests; only
/// the latest ticket may settle the slot.
#[derive(Debug, Clone)]
pub struct QuerySlot<T> {
    state: LoadState<T>,
    generation: u64,
}

impl<T> Default for QuerySlot<T> {
    fn default() -> Self {
        Self {
            state: LoadState::Idle,
            generation: 0,
        }
    }
}

impl<T> QuerySlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> Ticket {
        self.generation += 1;
        self.state = LoadState::Loading;
        Ticket(self.generation)
    }

    /// Apply a response. Returns false (and changes nothing) for a stale
    /// ticket.
    pub fn settle(&mut self, ticket: Ticket, result: Result<T, String>) -> bool {
        if ticket.0 != self.generation {
            debug!(ticket = ticket.0, current = self.generation, "dropping superseded response");
            return false;
        }
        self.state = match result {
            Ok(value) => LoadState::Loaded(value),
            Err(message) => LoadState::Failed(message),
        };
        true
    }

    pub fn state(&self) -> &LoadState<T> {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading)
    }
}
