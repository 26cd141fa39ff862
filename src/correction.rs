//! Correction sub-workflow.
//!
//! Once a record is Registered it can only be amended through a
//! request/approve/reject cycle: a RequestCorrection carries the
//! proposal in its annotation (the declaration stays untouched), an
//! ApproveCorrection carries the approved delta as an ordinary
//! declaration — the projection fold applies it like any other action —
//! and a RejectCorrection carries nothing, leaving the declaration
//! unchanged by construction.

use tracing::warn;
use uuid::Uuid;

use crate::action::{Action, ActionType, Annotation, Draft, EventDocument};
use crate::merge::{deep_merge_into, FieldMap};

/// Data-integrity fault in an action log.
///
/// These violate the append-only invariant and are reported, never
/// recovered from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("correction resolution {action_id} has no original_action_id")]
    MissingOriginalAction { action_id: Uuid },

    #[error(
        "correction resolution {action_id} references {original_action_id}, \
         which is not an accepted correction request in this log"
    )]
    OrphanCorrectionResolution {
        action_id: Uuid,
        original_action_id: Uuid,
    },
}

/// Annotation for the correction form.
///
/// If a correction is pending review (the last write action is an
/// accepted RequestCorrection), the annotation is what that requester
/// proposed. Otherwise the caller is composing a new request and the
/// annotation is built fresh from the draft trail.
pub fn action_annotation(doc: &EventDocument, drafts: &[Draft]) -> FieldMap {
    match doc.last_write_action() {
        Some(action) if action.action_type == ActionType::RequestCorrection => {
            match &action.annotation {
                Some(Annotation::Correction { fields }) => fields.clone(),
                _ => FieldMap::new(),
            }
        }
        _ => annotation_from_drafts(drafts),
    }
}

/// Merge draft annotation deltas in ascending `created_at` order.
///
/// A user who navigates away and back accumulates partial edits across
/// sessions without losing earlier answers.
pub fn annotation_from_drafts(drafts: &[Draft]) -> FieldMap {
    let mut ordered: Vec<&Draft> = drafts.iter().collect();
    ordered.sort_by_key(|d| d.created_at);

    let mut annotation = FieldMap::new();
    for draft in ordered {
        deep_merge_into(&mut annotation, &draft.action.annotation);
    }
    annotation
}

/// Resolve an Approve/RejectCorrection back to the accepted
/// RequestCorrection it answers.
pub fn resolve_correction_request<'a>(
    doc: &'a EventDocument,
    resolution: &Action,
) -> Result<&'a Action, IntegrityError> {
    let original_id = resolution
        .original_action_id
        .ok_or(IntegrityError::MissingOriginalAction {
            action_id: resolution.id,
        })?;

    doc.find_accepted(original_id)
        .filter(|a| a.action_type == ActionType::RequestCorrection)
        .ok_or(IntegrityError::OrphanCorrectionResolution {
            action_id: resolution.id,
            original_action_id: original_id,
        })
}

/// Sweep a log for correction resolutions that do not point at an
/// accepted request. Faults are logged and returned; the projection
/// itself stays total and is not affected.
pub fn integrity_faults(doc: &EventDocument) -> Vec<IntegrityError> {
    let mut faults = Vec::new();
    for action in doc.accepted_actions() {
        if matches!(
            action.action_type,
            ActionType::ApproveCorrection | ActionType::RejectCorrection
        ) {
            if let Err(fault) = resolve_correction_request(doc, action) {
                warn!(event = %doc.id, action = %action.id, %fault, "correction integrity fault");
                faults.push(fault);
            }
        }
    }
    faults
}
