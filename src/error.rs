//! Error taxonomy shared by every layer.
//!
//! Network and API failures are caught at the query/mutation boundary and
//! turned into fallback substitutions or notifications; nothing here is meant
//! to escape as a crash.

use std::collections::BTreeMap;

use thiserror::Error;

/// Field name -> list of messages, as rendered inline next to form inputs.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// Remote endpoint unreachable (connect failure, timeout, DNS).
    #[error("{0}")]
    Network(String),

    /// Remote endpoint reachable but answered with a non-2xx status.
    #[error("{message} (HTTP {status})")]
    Api {
        status: u16,
        message: String,
        errors: FieldErrors,
    },

    /// Fallback ledger has no record with this id.
    #[error("{entity} #{id} not found")]
    NotFound { entity: String, id: String },

    /// Client-side validation failed before any network call.
    #[error("Validation failed: {}", summarize_fields(.0))]
    Validation(FieldErrors),

    #[error("Cannot {action} a record in status '{from}'")]
    InvalidTransition { from: String, action: String },

    #[error("Not signed in")]
    Unauthorized,

    #[error("Local storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type AppResult<T> = Result<T, AppError>;

fn summarize_fields(errors: &FieldErrors) -> String {
    errors
        .iter()
        .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        AppError::Validation(errors)
    }

    /// True for failures raised by the remote side (transport or HTTP status).
    pub fn is_remote(&self) -> bool {
        matches!(self, AppError::Network(_) | AppError::Api { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::NotFound { .. } | AppError::Api { status: 404, .. }
        )
    }

    /// Per-field messages carried by the error, if any.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            AppError::Api { errors, .. } if !errors.is_empty() => Some(errors),
            AppError::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    /// Text shown in a toast notification.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(_) => {
                "Network error. Check your connection and try again.".to_string()
            }
            AppError::Api { message, .. } => message.clone(),
            AppError::Unauthorized => "Your session has expired. Please sign in again.".into(),
            other => other.to_string(),
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_render_connection_hint() {
        let err = AppError::Network("Cannot reach server at https://x".into());
        assert!(err.user_message().contains("Check your connection"));
        assert!(err.is_remote());
    }

    #[test]
    fn api_errors_surface_server_message() {
        let err = AppError::Api {
            status: 400,
            message: "Product code already exists".into(),
            errors: FieldErrors::new(),
        };
        assert_eq!(err.user_message(), "Product code already exists");
        assert_eq!(err.to_string(), "Product code already exists (HTTP 400)");
        assert!(err.field_errors().is_none());
    }

    #[test]
    fn remote_404_counts_as_not_found() {
        let err = AppError::Api {
            status: 404,
            message: "Not found.".into(),
            errors: FieldErrors::new(),
        };
        assert!(err.is_not_found());
    }

    #[test]
    fn validation_message_lists_fields() {
        let err = AppError::validation("customer", "customer is required");
        assert_eq!(
            err.to_string(),
            "Validation failed: customer: customer is required"
        );
    }
}
