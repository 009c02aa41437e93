//! Row selection and bulk actions.
//!
//! Selection is a set of ids, independent of which page is rendered. What
//! happens to it on a page change is a [`SelectionPolicy`]: `Retain` keeps
//! ids from earlier pages selected (bulk actions then span pages), `Clear`
//! empties the set.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::entities::EntityType;
use crate::error::{AppError, AppResult};
use crate::fallback::BulkDeleteOutcome;
use crate::forms::Modal;
use crate::orchestrator::{MutationOrchestrator, MutationOutcome, Operation, PendingMutation};
use crate::record::RecordId;
use crate::status::TransitionAction;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    #[default]
    Retain,
    Clear,
}

impl FromStr for SelectionPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain" | "keep" => Ok(SelectionPolicy::Retain),
            "clear" | "reset" => Ok(SelectionPolicy::Clear),
            other => Err(AppError::Config(format!("unknown selection policy '{other}'"))),
        }
    }
}

/// Tri-state for the header checkbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderCheckbox {
    Unchecked,
    Indeterminate,
    Checked,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkTransitionOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    selected: BTreeSet<RecordId>,
    policy: SelectionPolicy,
}

fn visible_ids(visible: &[Value]) -> impl Iterator<Item = RecordId> + '_ {
    visible.iter().filter_map(RecordId::of)
}

impl SelectionController {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self {
            selected: BTreeSet::new(),
            policy,
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Add `id` without toggling; selecting twice keeps it selected.
    pub fn select(&mut self, id: RecordId) {
        self.selected.insert(id);
    }

    pub fn toggle(&mut self, id: RecordId) {
        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
    }

    /// If every visible row is selected, deselect exactly those rows;
    /// otherwise select all of them. Ids outside `visible` are untouched.
    pub fn toggle_all(&mut self, visible: &[Value]) {
        if self.is_all_selected(visible) {
            for id in visible_ids(visible) {
                self.selected.remove(&id);
            }
        } else {
            self.selected.extend(visible_ids(visible));
        }
    }

    pub fn is_selected(&self, id: &RecordId) -> bool {
        self.selected.contains(id)
    }

    pub fn is_all_selected(&self, visible: &[Value]) -> bool {
        let mut ids = visible_ids(visible).peekable();
        ids.peek().is_some() && ids.all(|id| self.selected.contains(&id))
    }

    pub fn is_partially_selected(&self, visible: &[Value]) -> bool {
        let (mut hit, mut miss) = (false, false);
        for id in visible_ids(visible) {
            if self.selected.contains(&id) {
                hit = true;
            } else {
                miss = true;
            }
        }
        hit && miss
    }

    pub fn header_state(&self, visible: &[Value]) -> HeaderCheckbox {
        if self.is_all_selected(visible) {
            HeaderCheckbox::Checked
        } else if self.is_partially_selected(visible) {
            HeaderCheckbox::Indeterminate
        } else {
            HeaderCheckbox::Unchecked
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn on_page_change(&mut self) {
        if self.policy == SelectionPolicy::Clear {
            debug!(dropped = self.selected.len(), "page changed, clearing selection");
            self.selected.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.selected.iter().cloned().collect()
    }

    /// Text for the bulk confirmation dialog, naming the exact count.
    pub fn confirmation_prompt(&self, entity: EntityType, verb: &str) -> String {
        let n = self.selected.len();
        let noun = if n == 1 { "record" } else { "records" };
        format!(
            "{} {n} {} {noun}? This cannot be undone.",
            capitalize(verb),
            entity.label().to_lowercase()
        )
    }

    /// Delete every selected id through the orchestrator. Selection is
    /// cleared afterwards whatever the outcome.
    pub async fn bulk_delete(
        &mut self,
        orchestrator: &MutationOrchestrator,
        entity: EntityType,
        modal: Option<&mut Modal>,
    ) -> AppResult<BulkDeleteOutcome> {
        let ids = self.ids();
        let result = orchestrator
            .execute(
                PendingMutation::new(entity, Operation::BulkDelete { ids }),
                modal,
            )
            .await;
        self.clear();
        match result?.outcome {
            MutationOutcome::Bulk(outcome) => Ok(outcome),
            other => Err(AppError::Serialization(format!(
                "bulk delete returned {other:?}"
            ))),
        }
    }

    /// Activate or deactivate every selected id, one mutation each.
    pub async fn bulk_set_active(
        &mut self,
        orchestrator: &MutationOrchestrator,
        entity: EntityType,
        active: bool,
    ) -> BulkTransitionOutcome {
        let action = if active {
            TransitionAction::Activate
        } else {
            TransitionAction::Deactivate
        };
        let mut outcome = BulkTransitionOutcome {
            succeeded: 0,
            failed: 0,
        };
        for id in self.ids() {
            let mutation = PendingMutation::new(
                entity,
                Operation::Transition {
                    id,
                    action: action.clone(),
                },
            );
            match orchestrator.execute(mutation, None).await {
                Ok(_) => outcome.succeeded += 1,
                Err(_) => outcome.failed += 1,
            }
        }
        self.clear();
        outcome
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
