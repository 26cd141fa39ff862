//! Event configuration.
//!
//! Declarative schema for one event type: form pages, per-action scope
//! and status tables, and precondition expressions. Supplied by the
//! configuration collaborator; the core only reads it. Loaded from a
//! YAML file whose path the `CIVREG_CONFIG` variable selects.

use serde::Deserialize;
use std::path::Path;

use crate::action::ActionType;
use crate::condition::Condition;
use crate::projection::EventStatus;

/// Declarative configuration for one event type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventConfiguration {
    /// Schema identifier, e.g. "birth".
    pub event_type: String,
    /// Form pages, in declaration order.
    pub pages: Vec<FormPage>,
    /// Page ids a correction request may touch.
    pub correction_pages: Vec<String>,
    /// Per-action availability tables.
    pub actions: Vec<ActionConfig>,
}

/// One page of the declaration form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormPage {
    pub id: String,
    pub title: String,
    pub fields: Vec<FieldConfig>,
}

/// One field of a form page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub id: String,
    pub required: bool,
}

/// Availability table for one action type.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionConfig {
    /// The action this entry gates.
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Scopes permitting this action; one match suffices.
    pub allowed_scopes: Vec<String>,
    /// Legal predecessor statuses.
    pub allowed_statuses: Vec<EventStatus>,
    /// Optional precondition over the projected fields.
    #[serde(default)]
    pub condition: Option<Condition>,
}

impl EventConfiguration {
    /// Load configuration from file and environment.
    ///
    /// Reads the path from `CIVREG_CONFIG` (default `config.yaml`);
    /// falls back to an empty configuration when the file is absent.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CIVREG_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// The availability table for an action type, if configured.
    pub fn action(&self, action_type: ActionType) -> Option<&ActionConfig> {
        self.actions.iter().find(|a| a.action_type == action_type)
    }

    /// All field ids, in page order.
    pub fn field_ids(&self) -> Vec<&str> {
        self.pages
            .iter()
            .flat_map(|p| p.fields.iter().map(|f| f.id.as_str()))
            .collect()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}': {1}")]
    FileRead(String, String),

    #[error("Failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_empty() {
        let config = EventConfiguration::default();
        assert!(config.actions.is_empty());
        assert!(config.action(ActionType::Register).is_none());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
event_type: birth

pages:
  - id: child
    title: Child details
    fields:
      - id: child.name
        required: true
      - id: child.dob
  - id: informant
    title: Informant
    fields:
      - id: informant.relation

correction_pages:
  - child

actions:
  - type: DECLARE
    allowed_scopes: [record.declare]
    allowed_statuses: [UNPERSISTED, CREATED, NOTIFIED]
  - type: REGISTER
    allowed_scopes: [record.register]
    allowed_statuses: [VALIDATED]
    condition:
      op: field-defined
      field: informant.relation
  - type: REQUEST_CORRECTION
    allowed_scopes: [record.correct]
    allowed_statuses: [REGISTERED]
"#;

        let config: EventConfiguration = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.event_type, "birth");
        assert_eq!(config.pages.len(), 2);
        assert_eq!(
            config.field_ids(),
            vec!["child.name", "child.dob", "informant.relation"]
        );
        assert_eq!(config.correction_pages, vec!["child"]);

        let register = config.action(ActionType::Register).unwrap();
        assert_eq!(register.allowed_statuses, vec![EventStatus::Validated]);
        assert!(register.condition.is_some());

        let correction = config.action(ActionType::RequestCorrection).unwrap();
        assert_eq!(correction.allowed_scopes, vec!["record.correct"]);
    }
}
