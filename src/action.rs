//! Action log data model.
//!
//! A life-event record is an append-only log of immutable [`Action`]s
//! held by an [`EventDocument`]. Actions are never mutated or deleted;
//! every read is a fold over the log. Local, not-yet-confirmed intents
//! are [`Draft`]s, which only become Actions once the server accepts
//! them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::merge::FieldMap;

/// Kind of a log entry.
///
/// Write actions advance the record's legal state; meta actions
/// (assignment, viewing, printing) leave it untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Create,
    Notify,
    Declare,
    Validate,
    Register,
    RequestCorrection,
    ApproveCorrection,
    RejectCorrection,
    Reject,
    Archive,
    Assign,
    Unassign,
    View,
    Print,
}

impl ActionType {
    /// True for actions that never change the record's state or data.
    pub fn is_meta(self) -> bool {
        matches!(
            self,
            ActionType::Assign | ActionType::Unassign | ActionType::View | ActionType::Print
        )
    }

    /// True for actions that advance the record (Create through Archive).
    pub fn is_write(self) -> bool {
        !self.is_meta()
    }
}

/// Server-side disposition of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    /// Applied by the server; part of the authoritative log.
    Accepted,
    /// Refused by the server; kept for audit, ignored by projection.
    Rejected,
    /// Awaiting review (e.g. a correction pending approval).
    Requested,
}

/// Action-specific metadata, typed per action kind.
///
/// Confirmed actions carry structurally different payloads: a correction
/// request holds a field proposal, a rejection holds a reason. Drafts,
/// by contrast, carry raw [`FieldMap`] deltas — unfinished form state
/// only becomes a typed annotation at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Annotation {
    /// Proposed field changes awaiting approval. The proposal is NOT
    /// part of the declaration until an ApproveCorrection carries it.
    Correction { fields: FieldMap },
    /// Why a record was sent back or refused.
    Rejection {
        reason: String,
        #[serde(default)]
        duplicate: bool,
    },
    /// Why a record was archived.
    Archive {
        #[serde(default)]
        reason: Option<String>,
    },
    /// Who the record was assigned to.
    Assignment { assignee: String },
}

impl Annotation {
    /// Flatten the annotation into a field map.
    ///
    /// Used when composing the guard's evaluation scope and when merging
    /// correction proposals across draft sessions.
    pub fn fields(&self) -> FieldMap {
        match self {
            Annotation::Correction { fields } => fields.clone(),
            Annotation::Rejection { reason, duplicate } => {
                let mut map = FieldMap::new();
                map.insert("reason".to_string(), Value::String(reason.clone()));
                map.insert("duplicate".to_string(), Value::Bool(*duplicate));
                map
            }
            Annotation::Archive { reason } => {
                let mut map = FieldMap::new();
                if let Some(reason) = reason {
                    map.insert("reason".to_string(), Value::String(reason.clone()));
                }
                map
            }
            Annotation::Assignment { assignee } => {
                let mut map = FieldMap::new();
                map.insert("assignee".to_string(), Value::String(assignee.clone()));
                map
            }
        }
    }
}

/// One immutable entry in an event's append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Client-generated idempotency key for one logical user intent.
    pub transaction_id: Uuid,
    pub status: ActionStatus,
    /// Sparse declaration delta; absent key = no opinion.
    #[serde(default)]
    pub declaration: FieldMap,
    #[serde(default)]
    pub annotation: Option<Annotation>,
    /// Back-reference from Approve/RejectCorrection to the accepted
    /// RequestCorrection it resolves. `None` for every other type.
    #[serde(default)]
    pub original_action_id: Option<Uuid>,
    /// Display-only metadata. Confirmed actions are ordered by their
    /// position in the log, never by this timestamp.
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub created_by_role: String,
    #[serde(default)]
    pub created_at_location: Option<String>,
    #[serde(default)]
    pub created_by_signature: Option<String>,
}

impl Action {
    /// Convert a draft into an overlay pseudo-action for optimistic
    /// projection.
    ///
    /// The pseudo-action is Accepted so the ordinary fold applies it,
    /// and its `created_at` is clamped to `now` so a behind device
    /// clock can never make it display before its causes. It must never
    /// be persisted.
    pub fn pseudo_from_draft(draft: &Draft, now: DateTime<Utc>) -> Action {
        let annotation = match draft.action.action_type {
            ActionType::RequestCorrection if !draft.action.annotation.is_empty() => {
                Some(Annotation::Correction {
                    fields: draft.action.annotation.clone(),
                })
            }
            _ => None,
        };
        Action {
            id: draft.id,
            action_type: draft.action.action_type,
            transaction_id: draft.transaction_id,
            status: ActionStatus::Accepted,
            declaration: draft.action.declaration.clone(),
            annotation,
            original_action_id: None,
            created_at: now.max(draft.created_at),
            created_by: draft.created_by.clone(),
            created_by_role: draft.created_by_role.clone(),
            created_at_location: None,
            created_by_signature: None,
        }
    }
}

/// Aggregate root: a record's identity plus its ordered action log.
///
/// `actions` is in server-assigned order; that order is the only
/// ordering authority for confirmed actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDocument {
    pub id: Uuid,
    /// Schema identifier, e.g. "birth" or "death".
    pub event_type: String,
    pub actions: Vec<Action>,
}

impl EventDocument {
    /// Accepted actions in log order.
    pub fn accepted_actions(&self) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.status == ActionStatus::Accepted)
            .collect()
    }

    /// Last accepted non-meta action; decides which sub-workflow is
    /// currently active.
    pub fn last_write_action(&self) -> Option<&Action> {
        self.actions
            .iter()
            .rev()
            .find(|a| a.status == ActionStatus::Accepted && a.action_type.is_write())
    }

    /// Look up an accepted action by id.
    pub fn find_accepted(&self, id: Uuid) -> Option<&Action> {
        self.actions
            .iter()
            .find(|a| a.id == id && a.status == ActionStatus::Accepted)
    }

    /// Accepted write actions, suitable for a history view.
    pub fn action_history(&self) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.status == ActionStatus::Accepted && a.action_type.is_write())
            .collect()
    }

    /// Current assignee, derived from accepted Assign/Unassign actions.
    pub fn assignment(&self) -> Option<&str> {
        let mut assignee = None;
        for action in self.accepted_actions() {
            match (action.action_type, &action.annotation) {
                (ActionType::Assign, Some(Annotation::Assignment { assignee: who })) => {
                    assignee = Some(who.as_str());
                }
                (ActionType::Unassign, _) => assignee = None,
                _ => {}
            }
        }
        assignee
    }
}

/// Unfinished form state for a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub declaration: FieldMap,
    /// Raw annotation delta (e.g. a partially-filled correction form).
    #[serde(default)]
    pub annotation: FieldMap,
}

/// A client-local, not-yet-accepted intent.
///
/// Superseded once an Accepted action with the same `transaction_id`
/// appears in the event document; cleared on completion or explicit
/// abandonment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: Uuid,
    pub event_id: Uuid,
    pub transaction_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub created_by_role: String,
    pub action: DraftAction,
}
