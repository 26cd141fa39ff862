//! Action availability guard.
//!
//! Decides whether a candidate action may be dispatched next:
//! scope check first (fails fast, independent of record state), then
//! status compatibility, then the configured precondition expression.
//! Denials are typed and surfaced before any network call.
//!
//! For "direct" compound actions (one click performing
//! declare+validate+register) the guard is re-run against a cloned
//! document with synthetic placeholder actions appended, and the real
//! projection engine is reused on that clone — so the simulated answer
//! always matches what would be computed once the real actions land.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::action::{Action, ActionStatus, ActionType, EventDocument};
use crate::condition::EvalScope;
use crate::config::ActionConfig;
use crate::merge::{deep_merge, FieldMap};
use crate::projection::{project, EventStatus, Projection};

/// Marker id carried by simulated placeholder actions.
///
/// Placeholders exist only inside cloned documents built by
/// [`simulate`]; they are never dispatched or persisted.
pub const SIMULATED_ACTION_ID: Uuid = Uuid::nil();

/// User scopes and system variables, supplied by the auth collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidatorContext {
    /// Permission grants, e.g. `record.register`.
    pub scopes: Vec<String>,
    /// System variables merged into the condition evaluation scope,
    /// e.g. the acting user's office.
    #[serde(default)]
    pub system: FieldMap,
}

impl ValidatorContext {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Typed guard denial. The action was never dispatched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardRejected {
    #[error("no configuration for {action:?} in this event type")]
    Unconfigured { action: ActionType },

    #[error("none of the granted scopes permit {action:?}")]
    ScopeDenied { action: ActionType },

    #[error("{action:?} is not legal from status {status:?}")]
    StatusIncompatible {
        action: ActionType,
        status: EventStatus,
    },

    #[error("precondition for {action:?} evaluated to false")]
    ConditionFailed { action: ActionType },
}

/// Check a candidate action against the current projection.
///
/// Short-circuits cheapest-first: scope, then status, then condition.
pub fn check_action(
    config: &ActionConfig,
    projection: &Projection,
    ctx: &ValidatorContext,
) -> Result<(), GuardRejected> {
    let action = config.action_type;

    if !config.allowed_scopes.iter().any(|s| ctx.has_scope(s)) {
        debug!(?action, "guard: scope denied");
        return Err(GuardRejected::ScopeDenied { action });
    }

    if !config.allowed_statuses.contains(&projection.status) {
        debug!(?action, status = ?projection.status, "guard: status incompatible");
        return Err(GuardRejected::StatusIncompatible {
            action,
            status: projection.status,
        });
    }

    if let Some(condition) = &config.condition {
        let scope = eval_scope(projection, ctx);
        if !condition.evaluate(&scope) {
            debug!(?action, "guard: condition failed");
            return Err(GuardRejected::ConditionFailed { action });
        }
    }

    Ok(())
}

/// Boolean convenience over [`check_action`].
pub fn is_action_available(
    config: &ActionConfig,
    projection: &Projection,
    ctx: &ValidatorContext,
) -> bool {
    check_action(config, projection, ctx).is_ok()
}

/// Clone `doc` with synthetic Accepted placeholder actions appended.
///
/// The input document is never mutated. Placeholders carry marker ids
/// and empty declarations; they exist to advance the simulated status.
pub fn simulate(doc: &EventDocument, steps: &[ActionType]) -> EventDocument {
    let mut simulated = doc.clone();
    simulated.actions.extend(steps.iter().map(|t| Action {
        id: SIMULATED_ACTION_ID,
        action_type: *t,
        transaction_id: SIMULATED_ACTION_ID,
        status: ActionStatus::Accepted,
        declaration: FieldMap::new(),
        annotation: None,
        original_action_id: None,
        created_at: Utc::now(),
        created_by: String::new(),
        created_by_role: String::new(),
        created_at_location: None,
        created_by_signature: None,
    }));
    simulated
}

/// Would `config`'s action be available after `steps` land as Accepted?
///
/// Runs the real projection over the simulated clone, so the answer is
/// consistent with what the fold would produce on the real log.
pub fn is_action_available_after(
    config: &ActionConfig,
    doc: &EventDocument,
    steps: &[ActionType],
    ctx: &ValidatorContext,
) -> bool {
    let simulated = simulate(doc, steps);
    is_action_available(config, &project(&simulated), ctx)
}

/// Build the condition evaluation scope:
/// `{..declaration, ..annotation, ..system}`.
fn eval_scope(projection: &Projection, ctx: &ValidatorContext) -> EvalScope {
    let mut fields = match &projection.annotation {
        Some(annotation) => deep_merge(&projection.declaration, annotation),
        None => projection.declaration.clone(),
    };
    if !ctx.system.is_empty() {
        fields = deep_merge(&fields, &ctx.system);
    }
    EvalScope {
        fields,
        scopes: ctx.scopes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use serde_json::json;

    fn ctx(scopes: &[&str]) -> ValidatorContext {
        ValidatorContext {
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            system: FieldMap::new(),
        }
    }

    fn register_config() -> ActionConfig {
        ActionConfig {
            action_type: ActionType::Register,
            allowed_scopes: vec!["record.register".to_string()],
            allowed_statuses: vec![EventStatus::Validated],
            condition: None,
        }
    }

    fn projection(status: EventStatus, declaration: serde_json::Value) -> Projection {
        Projection {
            declaration: serde_json::from_value(declaration).unwrap(),
            status,
            annotation: None,
        }
    }

    #[test]
    fn test_scope_check_fails_first() {
        let result = check_action(
            &register_config(),
            // Status would also fail; scope must be reported.
            &projection(EventStatus::Created, json!({})),
            &ctx(&[]),
        );
        assert_eq!(
            result,
            Err(GuardRejected::ScopeDenied {
                action: ActionType::Register
            })
        );
    }

    #[test]
    fn test_status_incompatible() {
        let result = check_action(
            &register_config(),
            &projection(EventStatus::Created, json!({})),
            &ctx(&["record.register"]),
        );
        assert_eq!(
            result,
            Err(GuardRejected::StatusIncompatible {
                action: ActionType::Register,
                status: EventStatus::Created,
            })
        );
    }

    #[test]
    fn test_condition_gates_last() {
        let mut config = register_config();
        config.condition = Some(Condition::FieldDefined {
            field: "informant.relation".to_string(),
        });

        let blocked = check_action(
            &config,
            &projection(EventStatus::Validated, json!({})),
            &ctx(&["record.register"]),
        );
        assert_eq!(
            blocked,
            Err(GuardRejected::ConditionFailed {
                action: ActionType::Register
            })
        );

        let allowed = check_action(
            &config,
            &projection(EventStatus::Validated, json!({"informant.relation": "MOTHER"})),
            &ctx(&["record.register"]),
        );
        assert_eq!(allowed, Ok(()));
    }

    #[test]
    fn test_condition_sees_annotation_and_system_vars() {
        let mut config = register_config();
        config.condition = Some(Condition::All {
            conditions: vec![
                Condition::FieldEquals {
                    field: "surname".to_string(),
                    value: json!("B"),
                },
                Condition::FieldEquals {
                    field: "$user.office".to_string(),
                    value: json!("HQ"),
                },
            ],
        });

        let mut p = projection(EventStatus::Validated, json!({"surname": "A"}));
        // Annotation overlays the declaration in the evaluation scope.
        p.annotation = Some(serde_json::from_value(json!({"surname": "B"})).unwrap());

        let mut context = ctx(&["record.register"]);
        context.system = serde_json::from_value(json!({"$user.office": "HQ"})).unwrap();

        assert!(is_action_available(&config, &p, &context));
    }

    #[test]
    fn test_simulate_does_not_mutate_input() {
        let doc = EventDocument {
            id: Uuid::new_v4(),
            event_type: "birth".to_string(),
            actions: vec![],
        };
        let before = doc.clone();

        let simulated = simulate(&doc, &[ActionType::Declare, ActionType::Validate]);
        assert_eq!(doc, before);
        assert_eq!(simulated.actions.len(), 2);
        assert!(simulated
            .actions
            .iter()
            .all(|a| a.id == SIMULATED_ACTION_ID && a.status == ActionStatus::Accepted));
    }

    #[test]
    fn test_lookahead_enables_direct_register() {
        let doc = EventDocument {
            id: Uuid::new_v4(),
            event_type: "birth".to_string(),
            actions: vec![],
        };

        let context = ctx(&["record.register"]);
        // Not available now (Unpersisted), but available once
        // declare+validate land.
        assert!(!is_action_available(
            &register_config(),
            &project(&doc),
            &context
        ));
        assert!(is_action_available_after(
            &register_config(),
            &doc,
            &[ActionType::Declare, ActionType::Validate],
            &context,
        ));
    }

    #[test]
    fn test_lookahead_cannot_bypass_scope() {
        let doc = EventDocument {
            id: Uuid::new_v4(),
            event_type: "birth".to_string(),
            actions: vec![],
        };

        // User lacks the register scope; no amount of simulated
        // progress can help.
        assert!(!is_action_available_after(
            &register_config(),
            &doc,
            &[ActionType::Declare, ActionType::Validate],
            &ctx(&["record.declare"]),
        ));
    }
}
