//! Projection engine.
//!
//! Folds an accepted action log into the record's current
//! legally-meaningful state. Projections are ephemeral: recomputed on
//! every read, never persisted, and safe to compute on every render —
//! the fold is pure and synchronous.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::action::{Action, ActionType, Annotation, EventDocument};
use crate::merge::{deep_merge_into, FieldMap};

/// Coarse record state derived from the last accepted write action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// No accepted write action yet — the Create may still be in
    /// flight as a draft. Well-defined rather than an error.
    Unpersisted,
    Created,
    Notified,
    Declared,
    Validated,
    Registered,
    /// A correction proposal is pending review. The declaration still
    /// holds the pre-correction values.
    CorrectionRequested,
    Rejected,
    Archived,
}

impl EventStatus {
    /// Status implied by a write action of the given type.
    ///
    /// Approve/RejectCorrection both return the record to Registered:
    /// an approval's delta lands through the ordinary declaration fold,
    /// a rejection carries no delta and changes nothing.
    pub fn from_action_type(action_type: ActionType) -> Option<EventStatus> {
        match action_type {
            ActionType::Create => Some(EventStatus::Created),
            ActionType::Notify => Some(EventStatus::Notified),
            ActionType::Declare => Some(EventStatus::Declared),
            ActionType::Validate => Some(EventStatus::Validated),
            ActionType::Register => Some(EventStatus::Registered),
            ActionType::RequestCorrection => Some(EventStatus::CorrectionRequested),
            ActionType::ApproveCorrection | ActionType::RejectCorrection => {
                Some(EventStatus::Registered)
            }
            ActionType::Reject => Some(EventStatus::Rejected),
            ActionType::Archive => Some(EventStatus::Archived),
            ActionType::Assign | ActionType::Unassign | ActionType::View | ActionType::Print => {
                None
            }
        }
    }
}

/// Derived current state of a record. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Folded declaration field map.
    pub declaration: FieldMap,
    pub status: EventStatus,
    /// The pending correction proposal, present only while a
    /// RequestCorrection is the last write action.
    pub annotation: Option<FieldMap>,
}

/// Fold a sequence of actions' declaration deltas onto `base`.
///
/// Later actions win per the deep-merge rule. Pure: the split point
/// does not matter, so `fold(A)` equals `fold(fold(A[..k]), A[k..])`.
pub fn fold_declaration<'a, I>(mut base: FieldMap, actions: I) -> FieldMap
where
    I: IntoIterator<Item = &'a Action>,
{
    for action in actions {
        deep_merge_into(&mut base, &action.declaration);
    }
    base
}

/// Compute the current state of a record from its accepted actions.
pub fn project(doc: &EventDocument) -> Projection {
    let accepted = doc.accepted_actions();
    let declaration = fold_declaration(FieldMap::new(), accepted.iter().copied());

    let last_write = accepted
        .iter()
        .rev()
        .find(|a| a.action_type.is_write());

    let status = last_write
        .and_then(|a| EventStatus::from_action_type(a.action_type))
        .unwrap_or(EventStatus::Unpersisted);

    let annotation = match last_write {
        Some(action) if action.action_type == ActionType::RequestCorrection => {
            match &action.annotation {
                Some(Annotation::Correction { fields }) => Some(fields.clone()),
                _ => None,
            }
        }
        _ => None,
    };

    trace!(event = %doc.id, ?status, actions = accepted.len(), "projected event state");

    Projection {
        declaration,
        status,
        annotation,
    }
}
