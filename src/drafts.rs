//! Offline-draft reconciliation.
//!
//! Drafts are local stand-ins for actions the server has not accepted
//! yet. The overlay appends them after every accepted action and reuses
//! the ordinary projection fold, yielding the optimistic state shown
//! while a mutation is in flight or while offline. Once the server
//! confirms an action for a draft's transaction id, the draft is dead
//! weight and is silently dropped — otherwise the intent would be
//! applied twice.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::action::{Action, ActionStatus, ActionType, Draft, DraftAction, EventDocument};
use crate::merge::FieldMap;
use crate::projection::{project, Projection};

/// Select the drafts that still matter for `doc`.
///
/// A draft is active when it targets this event and no Accepted action
/// with its transaction id exists in the log. This is the staleness
/// filter; a stale draft is not an error.
pub fn find_active_drafts<'a>(doc: &EventDocument, drafts: &'a [Draft]) -> Vec<&'a Draft> {
    let confirmed: HashSet<Uuid> = doc
        .actions
        .iter()
        .filter(|a| a.status == ActionStatus::Accepted)
        .map(|a| a.transaction_id)
        .collect();

    drafts
        .iter()
        .filter(|d| d.event_id == doc.id)
        .filter(|d| {
            if confirmed.contains(&d.transaction_id) {
                debug!(
                    event = %doc.id,
                    draft = %d.id,
                    transaction = %d.transaction_id,
                    "dropping stale draft, transaction already accepted"
                );
                false
            } else {
                true
            }
        })
        .collect()
}

/// Optimistic projection: accepted actions, then active drafts.
///
/// Active drafts are converted to Accepted pseudo-actions ordered after
/// every confirmed action (oldest draft first), and the real projection
/// fold runs unchanged on the augmented clone. The result must never be
/// treated as authoritative or persisted as an action.
pub fn project_with_drafts(doc: &EventDocument, drafts: &[Draft]) -> Projection {
    let mut active = find_active_drafts(doc, drafts);
    active.sort_by_key(|d| d.created_at);

    let now = Utc::now();
    let mut overlay = doc.clone();
    overlay
        .actions
        .extend(active.iter().map(|d| Action::pseudo_from_draft(d, now)));

    project(&overlay)
}

/// Combine the draft being edited right now with previously-synced but
/// unconfirmed drafts for the same event.
///
/// The local draft is given the definitive `event_id` (the event may
/// have started life under a temporary client-generated id) and a
/// `created_at` strictly after every remote draft, so its edits win the
/// overlay fold. Drafts are concatenated, never deduplicated by
/// content.
pub fn event_drafts(event_id: Uuid, local: Option<Draft>, remote: &[Draft]) -> Vec<Draft> {
    let mut drafts: Vec<Draft> = remote
        .iter()
        .filter(|d| d.event_id == event_id)
        .cloned()
        .collect();

    if let Some(mut local) = local {
        local.event_id = event_id;
        let latest = drafts
            .iter()
            .map(|d| d.created_at)
            .max()
            .map(|t| t + Duration::milliseconds(1));
        local.created_at = match latest {
            Some(after_remote) => Utc::now().max(after_remote),
            None => Utc::now(),
        };
        drafts.push(local);
    }

    drafts
}

/// Explicit store for the "currently being edited" draft of each event.
///
/// One local draft per event: a second edit session for the same event
/// and action resumes the existing draft instead of starting from a
/// blank slate.
/// Clearing is synchronous and does not cancel an already-dispatched
/// mutation; that is safe because of transaction-id idempotency.
#[derive(Debug, Default)]
pub struct DraftStore {
    local: HashMap<Uuid, Draft>,
}

impl DraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume the existing local draft for `event_id`, or start a fresh
    /// one with new draft and transaction ids.
    ///
    /// An existing draft is resumed only when it is for the same action
    /// type; opening an edit session for a different action replaces it.
    /// The replacement gets a new transaction id so the abandoned draft
    /// can never be confirmed by a late server response.
    pub fn open(
        &mut self,
        event_id: Uuid,
        action_type: ActionType,
        created_by: &str,
        created_by_role: &str,
    ) -> Draft {
        if let Some(existing) = self.local.get(&event_id) {
            if existing.action.action_type == action_type {
                return existing.clone();
            }
            debug!(
                event = %event_id,
                open = ?action_type,
                held = ?existing.action.action_type,
                "replacing draft for a different action"
            );
        }
        let fresh = Draft {
            id: Uuid::new_v4(),
            event_id,
            transaction_id: Uuid::new_v4(),
            created_at: Utc::now(),
            created_by: created_by.to_string(),
            created_by_role: created_by_role.to_string(),
            action: DraftAction {
                action_type,
                declaration: FieldMap::new(),
                annotation: FieldMap::new(),
            },
        };
        self.local.insert(event_id, fresh.clone());
        fresh
    }

    /// Persist edited form state back into the store.
    pub fn save(&mut self, draft: Draft) {
        self.local.insert(draft.event_id, draft);
    }

    /// The local draft for an event, if one is open.
    pub fn get(&self, event_id: Uuid) -> Option<&Draft> {
        self.local.get(&event_id)
    }

    /// Abandon or complete the edit session for an event.
    pub fn clear(&mut self, event_id: Uuid) {
        if self.local.remove(&event_id).is_some() {
            debug!(event = %event_id, "cleared local draft");
        }
    }

    /// Drop every local draft whose transaction id the server has
    /// already accepted.
    pub fn prune_confirmed(&mut self, doc: &EventDocument) {
        let confirmed: HashSet<Uuid> = doc
            .actions
            .iter()
            .filter(|a| a.status == ActionStatus::Accepted)
            .map(|a| a.transaction_id)
            .collect();
        self.local.retain(|event_id, draft| {
            let keep = *event_id != doc.id || !confirmed.contains(&draft.transaction_id);
            if !keep {
                debug!(event = %doc.id, draft = %draft.id, "pruned confirmed draft");
            }
            keep
        });
    }
}
