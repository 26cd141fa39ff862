//! Write boundary.
//!
//! The core's responsibility ends at constructing a candidate action
//! payload and reacting to the server's answer. Submission goes through
//! the [`MutationDispatcher`] collaborator; the guard runs before any
//! network call, and a transport failure is never grounds for blind
//! resubmission — the request may have been applied before the response
//! was lost, so recovery is refetch-and-reproject, made safe by
//! transaction-id idempotency.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::action::{Action, ActionType, Annotation, Draft, EventDocument};
use crate::config::EventConfiguration;
use crate::drafts::DraftStore;
use crate::guard::{check_action, GuardRejected, ValidatorContext};
use crate::merge::FieldMap;
use crate::projection::project;

/// Candidate action handed to the network-mutation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Idempotency key; retries of one logical intent reuse it.
    pub transaction_id: Uuid,
    #[serde(default)]
    pub declaration: FieldMap,
    #[serde(default)]
    pub annotation: Option<Annotation>,
    /// Back-reference for correction resolutions.
    #[serde(default)]
    pub original_action_id: Option<Uuid>,
}

impl CandidateAction {
    /// Promote a finished draft to a submittable payload.
    pub fn from_draft(draft: &Draft) -> Self {
        let annotation = match draft.action.action_type {
            ActionType::RequestCorrection if !draft.action.annotation.is_empty() => {
                Some(Annotation::Correction {
                    fields: draft.action.annotation.clone(),
                })
            }
            _ => None,
        };
        Self {
            action_type: draft.action.action_type,
            transaction_id: draft.transaction_id,
            declaration: draft.action.declaration.clone(),
            annotation,
            original_action_id: None,
        }
    }

    /// A correction request carrying the proposed fields.
    pub fn correction_request(transaction_id: Uuid, proposal: FieldMap) -> Self {
        Self {
            action_type: ActionType::RequestCorrection,
            transaction_id,
            declaration: FieldMap::new(),
            annotation: Some(Annotation::Correction { fields: proposal }),
            original_action_id: None,
        }
    }

    /// Approve a pending request: the proposal becomes the declaration
    /// delta so the ordinary fold applies it.
    pub fn correction_approval(request: &Action, transaction_id: Uuid) -> Self {
        let declaration = match &request.annotation {
            Some(Annotation::Correction { fields }) => fields.clone(),
            _ => FieldMap::new(),
        };
        Self {
            action_type: ActionType::ApproveCorrection,
            transaction_id,
            declaration,
            annotation: None,
            original_action_id: Some(request.id),
        }
    }

    /// Reject a pending request; carries no declaration delta.
    pub fn correction_rejection(request: &Action, transaction_id: Uuid, reason: String) -> Self {
        Self {
            action_type: ActionType::RejectCorrection,
            transaction_id,
            declaration: FieldMap::new(),
            annotation: Some(Annotation::Rejection {
                reason,
                duplicate: false,
            }),
            original_action_id: Some(request.id),
        }
    }

    /// Send a record back with a reason.
    pub fn rejection(transaction_id: Uuid, reason: String, duplicate: bool) -> Self {
        Self {
            action_type: ActionType::Reject,
            transaction_id,
            declaration: FieldMap::new(),
            annotation: Some(Annotation::Rejection { reason, duplicate }),
            original_action_id: None,
        }
    }
}

/// Server's answer to a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Appended to the log; the local draft is superseded.
    Accepted { action_id: Uuid },
    /// Refused by server-side validation; the draft stays.
    Rejected { reason: String },
}

/// Transport-level failure. The action may or may not have applied
/// server-side.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(
        "transport failure submitting {action:?}: {message}; \
         refetch the event document before retrying"
    )]
    Transport {
        action: ActionType,
        message: String,
    },
}

/// Field-level errors from the external validator; the action is
/// withheld before dispatch. The validator itself is a collaborator,
/// so the core only carries its verdict.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation failed for {} field(s)", .errors.len())]
pub struct ValidationFailed {
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl ValidationFailed {
    /// Collect a validator's field errors, or nothing if the form is
    /// clean.
    pub fn from_errors(errors: Vec<FieldError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }
}

/// Why a submission did not reach an outcome.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Guard(#[from] GuardRejected),

    #[error(transparent)]
    Validation(#[from] ValidationFailed),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Network-mutation collaborator. Single-shot, `await`-style requests;
/// retry and backoff live behind this seam, not in the core.
#[async_trait]
pub trait MutationDispatcher: Send + Sync {
    async fn submit(
        &self,
        event_id: Uuid,
        action: CandidateAction,
    ) -> Result<SubmitOutcome, DispatchError>;
}

/// Guard-checked submission with draft lifecycle handling.
///
/// Runs the guard against the confirmed projection, dispatches, and on
/// acceptance clears the local draft. On rejection the draft stays for
/// rework; on transport failure the draft stays and the caller must
/// refetch the document rather than resubmit blindly.
pub async fn submit_action(
    dispatcher: &dyn MutationDispatcher,
    config: &EventConfiguration,
    doc: &EventDocument,
    store: &mut DraftStore,
    ctx: &ValidatorContext,
    candidate: CandidateAction,
) -> Result<SubmitOutcome, SubmitError> {
    let action_config =
        config
            .action(candidate.action_type)
            .ok_or(GuardRejected::Unconfigured {
                action: candidate.action_type,
            })?;

    check_action(action_config, &project(doc), ctx)?;

    debug!(event = %doc.id, action = ?candidate.action_type, transaction = %candidate.transaction_id, "dispatching action");

    match dispatcher.submit(doc.id, candidate).await {
        Ok(outcome @ SubmitOutcome::Accepted { .. }) => {
            store.clear(doc.id);
            Ok(outcome)
        }
        Ok(outcome @ SubmitOutcome::Rejected { .. }) => Ok(outcome),
        Err(e) => {
            warn!(event = %doc.id, error = %e, "dispatch failed; refetch before retrying");
            Err(e.into())
        }
    }
}

/// [`submit_action`] with the external validator's verdict applied
/// first.
///
/// Field errors withhold the action before the guard runs and before
/// any network call; the draft stays for rework.
pub async fn submit_checked(
    dispatcher: &dyn MutationDispatcher,
    config: &EventConfiguration,
    doc: &EventDocument,
    store: &mut DraftStore,
    ctx: &ValidatorContext,
    candidate: CandidateAction,
    field_errors: Vec<FieldError>,
) -> Result<SubmitOutcome, SubmitError> {
    if let Some(failed) = ValidationFailed::from_errors(field_errors) {
        debug!(
            event = %doc.id,
            action = ?candidate.action_type,
            fields = failed.errors.len(),
            "validator errors withheld action"
        );
        return Err(failed.into());
    }

    submit_action(dispatcher, config, doc, store, ctx, candidate).await
}
