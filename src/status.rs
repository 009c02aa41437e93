//! Closed status domains and their transition tables.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// User-triggered state change on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum TransitionAction {
    Submit,
    Approve,
    Reject {
        #[serde(default)]
        reason: Option<String>,
    },
    Cancel,
    Activate,
    Deactivate,
}

impl TransitionAction {
    pub fn name(&self) -> &'static str {
        match self {
            TransitionAction::Submit => "submit",
            TransitionAction::Approve => "approve",
            TransitionAction::Reject { .. } => "reject",
            TransitionAction::Cancel => "cancel",
            TransitionAction::Activate => "activate",
            TransitionAction::Deactivate => "deactivate",
        }
    }

    /// Parse a CLI/UI action name. `reject` carries no reason here.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "submit" | "submit_for_approval" | "submit-for-approval" => {
                Some(TransitionAction::Submit)
            }
            "approve" => Some(TransitionAction::Approve),
            "reject" | "decline" => Some(TransitionAction::Reject { reason: None }),
            "cancel" => Some(TransitionAction::Cancel),
            "activate" => Some(TransitionAction::Activate),
            "deactivate" => Some(TransitionAction::Deactivate),
            _ => None,
        }
    }

    /// Past-tense verb for notifications ("PRF #4 approved").
    pub fn past_tense(&self) -> &'static str {
        match self {
            TransitionAction::Submit => "submitted for approval",
            TransitionAction::Approve => "approved",
            TransitionAction::Reject { .. } => "rejected",
            TransitionAction::Cancel => "cancelled",
            TransitionAction::Activate => "activated",
            TransitionAction::Deactivate => "deactivated",
        }
    }

    pub fn is_activation(&self) -> bool {
        matches!(
            self,
            TransitionAction::Activate | TransitionAction::Deactivate
        )
    }
}

impl fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which status type governs an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDomain {
    Prf,
    Approval,
    ActiveFlag,
}

// ---------------------------------------------------------------------------
// PRF status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrfStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl PrfStatus {
    pub const ALL: [PrfStatus; 5] = [
        PrfStatus::Draft,
        PrfStatus::Pending,
        PrfStatus::Approved,
        PrfStatus::Rejected,
        PrfStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PrfStatus::Draft => "draft",
            PrfStatus::Pending => "pending",
            PrfStatus::Approved => "approved",
            PrfStatus::Rejected => "rejected",
            PrfStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" | "new" => Some(PrfStatus::Draft),
            "pending" | "submitted" | "pending_approval" | "awaiting_approval" => {
                Some(PrfStatus::Pending)
            }
            "approved" => Some(PrfStatus::Approved),
            "rejected" | "declined" => Some(PrfStatus::Rejected),
            "cancelled" | "canceled" => Some(PrfStatus::Cancelled),
            _ => None,
        }
    }

    pub fn apply(self, action: &TransitionAction) -> Result<Self, AppError> {
        use PrfStatus::*;
        let next = match (self, action) {
            (Draft | Rejected, TransitionAction::Submit) => Pending,
            (Pending, TransitionAction::Approve) => Approved,
            (Pending, TransitionAction::Reject { .. }) => Rejected,
            (Draft | Pending, TransitionAction::Cancel) => Cancelled,
            _ => return Err(invalid(self.as_str(), action)),
        };
        Ok(next)
    }
}

// ---------------------------------------------------------------------------
// Approval status (PROs, expenses)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "submitted" | "pending_approval" | "draft" => {
                Some(ApprovalStatus::Pending)
            }
            "approved" | "confirmed" => Some(ApprovalStatus::Approved),
            "rejected" | "declined" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }

    pub fn apply(self, action: &TransitionAction) -> Result<Self, AppError> {
        match (self, action) {
            (ApprovalStatus::Pending, TransitionAction::Approve) => Ok(ApprovalStatus::Approved),
            (ApprovalStatus::Pending, TransitionAction::Reject { .. }) => {
                Ok(ApprovalStatus::Rejected)
            }
            _ => Err(invalid(self.as_str(), action)),
        }
    }
}

fn invalid(from: &str, action: &TransitionAction) -> AppError {
    AppError::InvalidTransition {
        from: from.to_string(),
        action: action.name().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Stock status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockStatus {
    #[serde(rename = "in-stock")]
    InStock,
    #[serde(rename = "low-stock")]
    LowStock,
    #[serde(rename = "out-of-stock")]
    OutOfStock,
}

impl StockStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StockStatus::InStock => "in-stock",
            StockStatus::LowStock => "low-stock",
            StockStatus::OutOfStock => "out-of-stock",
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
