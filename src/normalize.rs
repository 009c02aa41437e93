//! Response normalisation.
//!
//! The API answers list calls in several envelopes: a bare array,
//! `{results: [...]}`, `{data: [...]}`, `{data: {results: [...]}}`, or
//! `{paginator: {...}, results: [...]}`. [`normalize`] flattens all of them
//! into records plus pagination metadata. It never fails; an unrecognised
//! shape is an empty list.

use serde::Serialize;
use serde_json::Value;

use crate::coalesce::{coerce_number, resolve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub count: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

impl PageMeta {
    /// Metadata for a list that is the whole result set.
    pub fn single_page(len: usize) -> Self {
        let len = len as u64;
        Self {
            count: len,
            page: 1,
            page_size: len,
            total_pages: total_pages(len, len),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub records: Vec<Value>,
    pub meta: PageMeta,
}

/// `ceil(count / page_size)`; a zero page size means everything fits on one
/// page (or none when empty).
pub fn total_pages(count: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return u64::from(count > 0);
    }
    count.div_ceil(page_size)
}

/// Normalise with no caller-side page size hint.
pub fn normalize(response: &Value) -> Normalized {
    normalize_with_page_size(response, None)
}

/// Normalise a list response. `requested_page_size` is used for `meta` when
/// the envelope does not state one.
pub fn normalize_with_page_size(response: &Value, requested_page_size: Option<u64>) -> Normalized {
    let (records, envelope) = match extract_records(response) {
        Some(found) => found,
        None => (Vec::new(), None),
    };

    let paginator = envelope
        .and_then(|e| e.get("paginator"))
        .filter(|p| p.is_object());

    let count = paginator
        .and_then(|p| positive(p, &["count", "total"]))
        .or_else(|| envelope.and_then(|e| positive(e, &["count", "total"])))
        .unwrap_or(records.len() as u64);

    let page = paginator
        .and_then(|p| positive(p, &["page", "current_page"]))
        .or_else(|| envelope.and_then(|e| positive(e, &["page", "current_page"])))
        .filter(|p| *p > 0)
        .unwrap_or(1);

    let page_size = paginator
        .and_then(|p| positive(p, &["page_size", "pageSize", "size"]))
        .or_else(|| envelope.and_then(|e| positive(e, &["page_size", "pageSize", "size"])))
        .or(requested_page_size)
        .unwrap_or(records.len() as u64);

    let total = paginator
        .and_then(|p| positive(p, &["total_pages", "totalPages", "num_pages"]))
        .unwrap_or_else(|| total_pages(count, page_size));

    Normalized {
        records,
        meta: PageMeta {
            count,
            page,
            page_size,
            total_pages: total,
        },
    }
}

/// Records plus the object that carried them (where count/paginator live).
fn extract_records(response: &Value) -> Option<(Vec<Value>, Option<&Value>)> {
    match response {
        Value::Array(items) => Some((items.clone(), None)),
        Value::Object(_) => {
            if let Some(Value::Array(items)) = response.get("results") {
                return Some((items.clone(), Some(response)));
            }
            match response.get("data") {
                Some(Value::Array(items)) => Some((items.clone(), Some(response))),
                // One level of nesting: {data: {results: [...], count, paginator}}.
                Some(inner @ Value::Object(_)) => match inner.get("results") {
                    Some(Value::Array(items)) => {
                        let envelope = if has_pagination(inner) { inner } else { response };
                        Some((items.clone(), Some(envelope)))
                    }
                    _ => None,
                },
                _ => None,
            }
        }
        _ => None,
    }
}

fn has_pagination(v: &Value) -> bool {
    v.get("paginator").is_some() || v.get("count").is_some()
}

fn positive(v: &Value, keys: &[&str]) -> Option<u64> {
    resolve(v, keys)
        .map(coerce_number)
        .filter(|n| *n >= 0.0)
        .map(|n| n as u64)
}
