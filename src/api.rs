//! Admin REST API client.
//!
//! Every collection lives at `/<resource>/` (trailing slash required) and
//! speaks JSON. Requests carry the bearer token from the [`TokenStore`].
//! Transport failures map to [`AppError::Network`]; non-2xx answers map to
//! [`AppError::Api`] with the server's `detail`/`message` and field errors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::TokenStore;
use crate::error::{AppError, AppResult, FieldErrors};
use crate::record::RecordId;

/// Default timeout for API requests (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// URL helpers
// ---------------------------------------------------------------------------

/// Normalise the API base URL:
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

/// `/<resource>/[<id>/][<action>/]` with exactly one slash between segments.
pub fn resource_path(resource: &str, id: Option<&RecordId>, action: Option<&str>) -> String {
    let mut path = format!("/{}/", resource.trim_matches('/'));
    if let Some(id) = id {
        path.push_str(&id.to_string());
        path.push('/');
    }
    if let Some(action) = action {
        path.push_str(action.trim_matches('/'));
        path.push('/');
    }
    path
}

/// Percent-encode every byte outside the RFC 3986 unreserved set.
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Append query pairs to `path`, skipping empty values.
pub fn with_query(path: &str, query: &[(String, String)]) -> String {
    let pairs: Vec<String> = query
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
        .collect();
    if pairs.is_empty() {
        return path.to_string();
    }
    format!("{path}?{}", pairs.join("&"))
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach server at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid API URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Default message for an HTTP status without a usable body.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        400 => "The request was rejected by the server".to_string(),
        401 => "Authentication credentials were not provided or are invalid".to_string(),
        403 => "You do not have permission to perform this action".to_string(),
        404 => "Record not found".to_string(),
        s if s >= 500 => format!("Server error (HTTP {s})"),
        s => format!("Unexpected response from server (HTTP {s})"),
    }
}

/// Build an [`AppError::Api`] from a non-2xx status and raw body text.
pub fn api_error_from_body(status: u16, body_text: &str) -> AppError {
    let fallback_message = StatusCode::from_u16(status)
        .map(status_error)
        .unwrap_or_else(|_| format!("Unexpected response from server (HTTP {status})"));

    let parsed = serde_json::from_str::<Value>(body_text).ok();
    let message = parsed
        .as_ref()
        .and_then(|json| {
            ["detail", "message", "error"]
                .iter()
                .filter_map(|key| json.get(*key).and_then(Value::as_str))
                .map(str::trim)
                .find(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or(fallback_message);
    let errors = parsed
        .as_ref()
        .and_then(|json| json.get("errors"))
        .map(field_errors_from_value)
        .unwrap_or_default();

    AppError::Api {
        status,
        message,
        errors,
    }
}

/// `errors` maps field -> message or list of messages.
fn field_errors_from_value(value: &Value) -> FieldErrors {
    let mut out = FieldErrors::new();
    if let Some(map) = value.as_object() {
        for (field, messages) in map {
            let list: Vec<String> = match messages {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .map(|m| match m {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
                Value::Null => continue,
                other => vec![other.to_string()],
            };
            if !list.is_empty() {
                out.insert(field.clone(), list);
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Remote API seam
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    /// Attach the bearer token (false only for the login call).
    pub authenticated: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            authenticated: true,
        }
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }
}

/// The external admin API. [`HttpApi`] is the production implementation;
/// tests plug in doubles.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn send(&self, request: ApiRequest) -> AppResult<Value>;

    async fn list(&self, resource: &str, query: &[(String, String)]) -> AppResult<Value> {
        let path = with_query(&resource_path(resource, None, None), query);
        self.send(ApiRequest::new(Method::GET, path)).await
    }

    async fn retrieve(&self, resource: &str, id: &RecordId) -> AppResult<Value> {
        self.send(ApiRequest::new(
            Method::GET,
            resource_path(resource, Some(id), None),
        ))
        .await
    }

    async fn create(&self, resource: &str, payload: &Value) -> AppResult<Value> {
        self.send(ApiRequest::new(Method::POST, resource_path(resource, None, None)).body(payload.clone()))
            .await
    }

    /// Partial update (PATCH).
    async fn patch(&self, resource: &str, id: &RecordId, patch: &Value) -> AppResult<Value> {
        self.send(
            ApiRequest::new(Method::PATCH, resource_path(resource, Some(id), None))
                .body(patch.clone()),
        )
        .await
    }

    /// Full replacement (PUT).
    async fn replace(&self, resource: &str, id: &RecordId, record: &Value) -> AppResult<Value> {
        self.send(
            ApiRequest::new(Method::PUT, resource_path(resource, Some(id), None))
                .body(record.clone()),
        )
        .await
    }

    async fn delete(&self, resource: &str, id: &RecordId) -> AppResult<()> {
        self.send(ApiRequest::new(
            Method::DELETE,
            resource_path(resource, Some(id), None),
        ))
        .await
        .map(|_| ())
    }

    /// Detail-route action, e.g. `POST /prfs/4/approve/`.
    async fn action(
        &self,
        resource: &str,
        id: &RecordId,
        action: &str,
        body: Option<Value>,
    ) -> AppResult<Value> {
        let mut request = ApiRequest::new(Method::POST, resource_path(resource, Some(id), Some(action)));
        if let Some(body) = body {
            request = request.body(body);
        }
        self.send(request).await
    }
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

pub struct HttpApi {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration, tokens: Arc<dyn TokenStore>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url),
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RemoteApi for HttpApi {
    async fn send(&self, request: ApiRequest) -> AppResult<Value> {
        let full_url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, path = %request.path, "api request");

        let mut req = self
            .client
            .request(request.method.clone(), &full_url)
            .header("Accept", "application/json");

        if request.authenticated {
            match self.tokens.load() {
                Some(token) => req = req.bearer_auth(token.as_str()),
                None => warn!(path = %request.path, "no access token stored, sending unauthenticated"),
            }
        }
        if let Some(body) = request.body {
            req = req.json(&body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AppError::Network(friendly_error(&self.base_url, &e)))?;
        let status = resp.status();
        let body_text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED && request.authenticated {
                warn!(path = %request.path, "api rejected access token");
            }
            return Err(api_error_from_body(status.as_u16(), &body_text));
        }

        // 204 No Content and empty bodies come back as null.
        if body_text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body_text)
            .map_err(|e| AppError::Serialization(format!("Invalid JSON from server: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base_url_gets_scheme_and_loses_trailing_slash() {
        assert_eq!(normalize_base_url("erp.example.com/api/"), "https://erp.example.com/api");
        assert_eq!(normalize_base_url("localhost:8000/"), "http://localhost:8000");
        assert_eq!(normalize_base_url("https://x.io"), "https://x.io");
    }

    #[test]
    fn resource_paths_keep_trailing_slash() {
        assert_eq!(resource_path("/products/", None, None), "/products/");
        assert_eq!(
            resource_path("prfs", Some(&RecordId::Int(4)), Some("approve")),
            "/prfs/4/approve/"
        );
    }

    #[test]
    fn query_pairs_are_encoded_and_empty_values_dropped() {
        let path = with_query(
            "/products/",
            &[
                ("search".into(), "oil & filter".into()),
                ("status".into(), String::new()),
                ("page".into(), "2".into()),
            ],
        );
        assert_eq!(path, "/products/?search=oil%20%26%20filter&page=2");
    }

    #[test]
    fn reserved_and_non_ascii_bytes_are_escaped() {
        assert_eq!(encode_component("a/b:c@d"), "a%2Fb%3Ac%40d");
        assert_eq!(encode_component("100% [x]"), "100%25%20%5Bx%5D");
        assert_eq!(encode_component("café"), "caf%C3%A9");
        assert_eq!(encode_component("A-z_0.9~"), "A-z_0.9~");
    }

    #[test]
    fn error_body_detail_and_field_errors() {
        let err = api_error_from_body(
            400,
            &json!({
                "detail": "Invalid input.",
                "errors": { "name": ["This field is required."], "code": "Duplicate code" }
            })
            .to_string(),
        );
        match err {
            AppError::Api {
                status,
                message,
                errors,
            } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid input.");
                assert_eq!(errors["name"], vec!["This field is required.".to_string()]);
                assert_eq!(errors["code"], vec!["Duplicate code".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn error_body_message_fallbacks() {
        let err = api_error_from_body(500, "<html>oops</html>");
        assert_eq!(err.user_message(), "Server error (HTTP 500)");
        let err = api_error_from_body(409, &json!({ "message": "Already approved" }).to_string());
        assert_eq!(err.user_message(), "Already approved");
    }
}
