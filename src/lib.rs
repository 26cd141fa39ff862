//! civreg — action-log projection and offline-draft reconciliation.
//!
//! Life-event records (birth/death/membership) are append-only logs of
//! immutable actions. This crate folds those logs into current state,
//! overlays local unsynced drafts for optimistic/offline editing,
//! implements the correction request/approve/reject sub-workflow, and
//! gates which action a user may dispatch next.
//!
//! All projection functions are pure and synchronous; the only async
//! seam is the [`dispatch::MutationDispatcher`] collaborator.

pub mod action;
pub mod condition;
pub mod config;
pub mod correction;
pub mod dispatch;
pub mod drafts;
pub mod guard;
pub mod merge;
pub mod projection;
pub mod telemetry;

pub use action::{Action, ActionStatus, ActionType, Annotation, Draft, DraftAction, EventDocument};
pub use config::{ActionConfig, EventConfiguration};
pub use drafts::{event_drafts, find_active_drafts, project_with_drafts, DraftStore};
pub use guard::{check_action, is_action_available, is_action_available_after, ValidatorContext};
pub use merge::{deep_merge, FieldMap};
pub use projection::{project, EventStatus, Projection};
