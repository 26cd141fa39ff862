//! Declarative precondition expressions.
//!
//! Event configuration is data, not code: per-action preconditions are
//! small serde-deserialized expression trees evaluated against the
//! record's folded fields and the acting user's scopes. Evaluation is
//! total — a missing field is simply undefined, never an error — so
//! the guard stays pure and safe to run on every render.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::merge::FieldMap;

/// What a condition is evaluated against: the projection's combined
/// declaration/annotation fields plus the user's granted scopes.
#[derive(Debug, Clone, Default)]
pub struct EvalScope {
    pub fields: FieldMap,
    pub scopes: Vec<String>,
}

/// Precondition expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Condition {
    Always,
    Never,
    /// Field is present and not explicitly null.
    FieldDefined { field: String },
    /// Field compares equal. An explicitly-null field equals a `null`
    /// expected value; an absent field equals nothing.
    FieldEquals { field: String, value: Value },
    UserHasScope { scope: String },
    Not { condition: Box<Condition> },
    All { conditions: Vec<Condition> },
    Any { conditions: Vec<Condition> },
}

impl Condition {
    pub fn evaluate(&self, scope: &EvalScope) -> bool {
        match self {
            Condition::Always => true,
            Condition::Never => false,
            Condition::FieldDefined { field } => {
                matches!(lookup(&scope.fields, field), Some(v) if !v.is_null())
            }
            Condition::FieldEquals { field, value } => {
                lookup(&scope.fields, field).map(|v| v == value).unwrap_or(false)
            }
            Condition::UserHasScope { scope: wanted } => {
                scope.scopes.iter().any(|s| s == wanted)
            }
            Condition::Not { condition } => !condition.evaluate(scope),
            Condition::All { conditions } => conditions.iter().all(|c| c.evaluate(scope)),
            Condition::Any { conditions } => conditions.iter().any(|c| c.evaluate(scope)),
        }
    }
}

/// Dotted-path lookup: `"child.name"` first as a literal key (field ids
/// are commonly dotted), then as a path into nested objects.
fn lookup<'a>(fields: &'a FieldMap, path: &str) -> Option<&'a Value> {
    if let Some(value) = fields.get(path) {
        return Some(value);
    }

    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = fields.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
