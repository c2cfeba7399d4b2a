//! Lexicon evolution checking
//!
//! Decides whether a new version of a lexicon can replace an old one without
//! breaking data that validated against the old version.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LexiconError, Result};
use crate::schema::{SchemaDocument, TypeNode};
use crate::structural;

/// Result of an evolution check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionVerdict {
    /// Whether the new version is a compatible evolution
    pub is_compatible: bool,
    /// One reason per breaking change, in detection order
    pub reasons: Vec<String>,
    /// Every change detected, breaking or not
    pub changes: Vec<SchemaChange>,
    /// Summary of the check
    pub summary: String,
}

impl EvolutionVerdict {
    /// Create a compatible verdict
    pub fn compatible(changes: Vec<SchemaChange>) -> Self {
        let summary = if changes.is_empty() {
            "No changes detected".to_string()
        } else {
            format!("{} compatible changes detected", changes.len())
        };
        Self {
            is_compatible: true,
            reasons: Vec::new(),
            changes,
            summary,
        }
    }

    /// Create an incompatible verdict
    pub fn incompatible(changes: Vec<SchemaChange>, reasons: Vec<String>, summary: impl Into<String>) -> Self {
        Self {
            is_compatible: false,
            reasons,
            changes,
            summary: summary.into(),
        }
    }

    /// Breaking changes only
    pub fn breaking_changes(&self) -> impl Iterator<Item = &SchemaChange> {
        self.changes.iter().filter(|c| c.is_breaking)
    }
}

/// A detected change between lexicon versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChange {
    /// Type of change
    pub change_type: ChangeType,
    /// Path to the changed element (e.g., "properties.name")
    pub path: String,
    /// Old value (if applicable)
    pub old_value: Option<String>,
    /// New value (if applicable)
    pub new_value: Option<String>,
    /// Whether this change is breaking
    pub is_breaking: bool,
    /// Human-readable description
    pub description: String,
}

/// Type of lexicon change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// The two documents describe different lexicons
    IdChanged,
    /// A property was added
    FieldAdded,
    /// A property was removed
    FieldRemoved,
    /// A type tag changed
    TypeChanged,
    /// A property moved between required and optional
    OptionalityChanged,
}

/// Compatibility checker for lexicon versions
#[derive(Debug, Clone, Copy)]
pub struct CompatibilityChecker {
    /// Strict mode - any change is considered breaking
    strict_mode: bool,
    /// Treat a retained property whose type tag changed as breaking
    type_narrowing: bool,
}

impl CompatibilityChecker {
    /// Create a new compatibility checker
    pub fn new() -> Self {
        Self {
            strict_mode: false,
            type_narrowing: true,
        }
    }

    /// Enable strict mode
    pub fn strict(mut self) -> Self {
        self.strict_mode = true;
        self
    }

    /// Toggle type-tag comparison for retained properties
    pub fn with_type_narrowing(mut self, enabled: bool) -> Self {
        self.type_narrowing = enabled;
        self
    }

    /// Check whether `new` is a compatible evolution of `old`
    ///
    /// Both documents must be structurally valid.
    pub fn check(&self, old: &SchemaDocument, new: &SchemaDocument) -> Result<EvolutionVerdict> {
        require_valid("old", old)?;
        require_valid("new", new)?;

        // Different lexicons are not comparable.
        if old.id() != new.id() {
            let change = SchemaChange {
                change_type: ChangeType::IdChanged,
                path: "id".to_string(),
                old_value: Some(old.id().to_string()),
                new_value: Some(new.id().to_string()),
                is_breaking: true,
                description: format!("Lexicon id changed from '{}' to '{}'", old.id(), new.id()),
            };
            let reasons = vec![change.description.clone()];
            return Ok(EvolutionVerdict::incompatible(
                vec![change],
                reasons,
                "Documents describe different lexicons",
            ));
        }

        let mut changes = Vec::new();
        self.detect_changes(old.root_type(), new.root_type(), "", &mut changes);
        let breaking_count = changes.iter().filter(|c| c.is_breaking).count();

        debug!(
            id = old.id(),
            changes = changes.len(),
            breaking = breaking_count,
            "checked lexicon evolution"
        );

        if self.strict_mode && !changes.is_empty() {
            let reasons = changes.iter().map(|c| c.description.clone()).collect();
            let summary = format!("Strict mode: {} changes detected", changes.len());
            Ok(EvolutionVerdict::incompatible(changes, reasons, summary))
        } else if breaking_count > 0 {
            let reasons = changes
                .iter()
                .filter(|c| c.is_breaking)
                .map(|c| c.description.clone())
                .collect();
            Ok(EvolutionVerdict::incompatible(
                changes,
                reasons,
                format!("{} breaking changes detected", breaking_count),
            ))
        } else {
            Ok(EvolutionVerdict::compatible(changes))
        }
    }

    /// Detect changes between two type nodes at the same path
    fn detect_changes(&self, old: &TypeNode, new: &TypeNode, path: &str, changes: &mut Vec<SchemaChange>) {
        // Only reached for the root; retained properties are compared below.
        if old.tag() != new.tag() {
            let location = if path.is_empty() { "root" } else { path };
            changes.push(SchemaChange {
                change_type: ChangeType::TypeChanged,
                path: join(path, "type"),
                old_value: Some(old.tag().to_string()),
                new_value: Some(new.tag().to_string()),
                is_breaking: true,
                description: format!("Type of {} changed from {} to {}", location, old.tag(), new.tag()),
            });
            return;
        }

        let (
            TypeNode::Object { required: old_required, .. },
            TypeNode::Object { required: new_required, .. },
        ) = (old, new)
        else {
            return;
        };

        let old_declared = declared_names(old);
        let new_declared = declared_names(new);

        // Removed fields and changes to retained ones
        for name in &old_declared {
            let prop_path = join(path, &format!("properties.{}", name));
            let old_prop = old.property(name);
            if !new_declared.contains(name) {
                changes.push(SchemaChange {
                    change_type: ChangeType::FieldRemoved,
                    path: prop_path,
                    old_value: Some(type_label(old_prop)),
                    new_value: None,
                    is_breaking: true,
                    description: format!("Property '{}' was removed", name),
                });
                continue;
            }

            match (old_prop, new.property(name)) {
                (Some(old_prop), Some(new_prop)) if old_prop.tag() == new_prop.tag() => {
                    self.detect_changes(old_prop, new_prop, &prop_path, changes);
                }
                (None, None) => {}
                (old_prop, new_prop) => {
                    // Dropping the type entry leaves the field unconstrained.
                    let is_breaking = new_prop.is_some() && self.type_narrowing;
                    changes.push(SchemaChange {
                        change_type: ChangeType::TypeChanged,
                        path: join(&prop_path, "type"),
                        old_value: Some(type_label(old_prop)),
                        new_value: Some(type_label(new_prop)),
                        is_breaking,
                        description: format!(
                            "Property '{}' type changed from {} to {}",
                            name,
                            type_label(old_prop),
                            type_label(new_prop)
                        ),
                    });
                }
            }
        }

        // Added fields
        for name in &new_declared {
            if old_declared.contains(name) {
                continue;
            }
            let required = lists(new_required, name);
            changes.push(SchemaChange {
                change_type: ChangeType::FieldAdded,
                path: join(path, &format!("properties.{}", name)),
                old_value: None,
                new_value: Some(type_label(new.property(name))),
                is_breaking: required,
                description: if required {
                    format!("Required property '{}' was added", name)
                } else {
                    format!("Optional property '{}' was added", name)
                },
            });
        }

        // Optionality of fields declared in both versions
        for name in new_required {
            if lists(old_required, name) || !old_declared.contains(&name.as_str()) {
                continue;
            }
            changes.push(SchemaChange {
                change_type: ChangeType::OptionalityChanged,
                path: join(path, &format!("required.{}", name)),
                old_value: Some("optional".to_string()),
                new_value: Some("required".to_string()),
                is_breaking: true,
                description: format!("Property '{}' became required", name),
            });
        }
        for name in old_required {
            if lists(new_required, name) || !new_declared.contains(&name.as_str()) {
                continue;
            }
            changes.push(SchemaChange {
                change_type: ChangeType::OptionalityChanged,
                path: join(path, &format!("required.{}", name)),
                old_value: Some("required".to_string()),
                new_value: Some("optional".to_string()),
                is_breaking: false,
                description: format!("Property '{}' became optional", name),
            });
        }
    }
}

impl Default for CompatibilityChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Check evolution with default settings
pub fn check_evolution(old: &SchemaDocument, new: &SchemaDocument) -> Result<EvolutionVerdict> {
    CompatibilityChecker::new().check(old, new)
}

fn require_valid(which: &str, document: &SchemaDocument) -> Result<()> {
    structural::check(document.source()).map_err(|failure| LexiconError::SchemaValidation {
        rule: failure.rule,
        detail: format!("{} document: {}", which, failure.detail),
    })
}

/// Fields an object accepts: its properties, then names listed only in `required`
fn declared_names(node: &TypeNode) -> Vec<&str> {
    let TypeNode::Object { properties, required } = node else {
        return Vec::new();
    };
    let mut names: Vec<&str> = properties.iter().map(|(name, _)| name.as_str()).collect();
    for name in required {
        if node.property(name).is_none() {
            names.push(name.as_str());
        }
    }
    names
}

fn lists(required: &[String], name: &str) -> bool {
    required.iter().any(|r| r == name)
}

fn type_label(node: Option<&TypeNode>) -> String {
    node.map_or_else(|| "unconstrained".to_string(), |n| n.tag().to_string())
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_value;
    use crate::structural::StructuralRule;
    use serde_json::json;

    fn user(properties: serde_json::Value, required: serde_json::Value) -> SchemaDocument {
        parse_value(json!({
            "$schema": "lexicon/v1",
            "lexicon": 1,
            "id": "com.example.user",
            "type": "object",
            "properties": properties,
            "required": required
        }))
        .unwrap()
    }

    #[test]
    fn test_compatible_field_addition() {
        let old = user(json!({ "name": { "type": "string" } }), json!([]));
        let new = user(
            json!({ "name": { "type": "string" }, "age": { "type": "number" } }),
            json!([]),
        );

        let result = CompatibilityChecker::new().check(&old, &new).unwrap();

        assert!(result.is_compatible);
        assert!(result.reasons.is_empty());
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].change_type, ChangeType::FieldAdded);
    }

    #[test]
    fn test_breaking_field_removal() {
        let old = user(
            json!({ "name": { "type": "string" }, "age": { "type": "number" } }),
            json!([]),
        );
        let new = user(json!({ "name": { "type": "string" } }), json!([]));

        let result = check_evolution(&old, &new).unwrap();

        assert!(!result.is_compatible);
        assert_eq!(result.reasons, vec!["Property 'age' was removed"]);
    }

    #[test]
    fn test_type_change_is_breaking() {
        let old = user(json!({ "name": { "type": "string" } }), json!([]));
        let new = user(json!({ "name": { "type": "number" } }), json!([]));

        let result = check_evolution(&old, &new).unwrap();
        assert!(!result.is_compatible);
        assert_eq!(result.reasons.len(), 1);
        assert!(result.reasons[0].contains("'name'"));
        assert_eq!(result.changes[0].path, "properties.name.type");

        let lenient = CompatibilityChecker::new().with_type_narrowing(false);
        assert!(lenient.check(&old, &new).unwrap().is_compatible);
    }

    #[test]
    fn test_id_mismatch_is_incompatible() {
        let old = SchemaDocument::new("com.example.a", TypeNode::string());
        let new = SchemaDocument::new("com.example.b", TypeNode::string());

        let result = check_evolution(&old, &new).unwrap();
        assert!(!result.is_compatible);
        assert_eq!(result.reasons.len(), 1);
        assert!(result.reasons[0].contains("com.example.a"));
        assert!(result.reasons[0].contains("com.example.b"));
    }

    #[test]
    fn test_new_required_field_is_breaking() {
        let old = user(json!({ "name": { "type": "string" } }), json!([]));
        let added = user(
            json!({ "name": { "type": "string" }, "email": { "type": "string" } }),
            json!(["email"]),
        );
        let tightened = user(json!({ "name": { "type": "string" } }), json!(["name"]));

        let result = check_evolution(&old, &added).unwrap();
        assert_eq!(result.reasons, vec!["Required property 'email' was added"]);

        let result = check_evolution(&old, &tightened).unwrap();
        assert_eq!(result.reasons, vec!["Property 'name' became required"]);

        // Relaxing a requirement is compatible.
        let relaxed = check_evolution(&tightened, &old).unwrap();
        assert!(relaxed.is_compatible);
        assert_eq!(relaxed.changes[0].change_type, ChangeType::OptionalityChanged);
    }

    #[test]
    fn test_nested_removal_reports_path() {
        let old = user(
            json!({
                "profile": {
                    "type": "object",
                    "properties": { "bio": { "type": "string" }, "site": { "type": "string" } }
                }
            }),
            json!([]),
        );
        let new = user(
            json!({ "profile": { "type": "object", "properties": { "bio": { "type": "string" } } } }),
            json!([]),
        );

        let result = check_evolution(&old, &new).unwrap();
        assert!(!result.is_compatible);
        let breaking: Vec<&SchemaChange> = result.breaking_changes().collect();
        assert_eq!(breaking.len(), 1);
        assert_eq!(breaking[0].path, "properties.profile.properties.site");
    }

    #[test]
    fn test_strict_mode() {
        let old = user(json!({ "name": { "type": "string" } }), json!([]));
        let new = user(
            json!({ "name": { "type": "string" }, "age": { "type": "number" } }),
            json!([]),
        );

        let result = CompatibilityChecker::new().strict().check(&old, &new).unwrap();
        assert!(!result.is_compatible);
        assert_eq!(result.reasons, vec!["Optional property 'age' was added"]);
        assert_eq!(result.summary, "Strict mode: 1 changes detected");

        let unchanged = CompatibilityChecker::new().strict().check(&old, &old).unwrap();
        assert!(unchanged.is_compatible);
    }

    #[test]
    fn test_root_type_change_is_always_breaking() {
        let old = user(json!({ "name": { "type": "string" } }), json!([]));
        let new = SchemaDocument::new("com.example.user", TypeNode::string());

        for checker in [CompatibilityChecker::new(), CompatibilityChecker::new().with_type_narrowing(false)] {
            let result = checker.check(&old, &new).unwrap();
            assert!(!result.is_compatible);
            assert_eq!(result.changes.len(), 1);
            assert_eq!(result.changes[0].change_type, ChangeType::TypeChanged);
            assert_eq!(result.reasons, vec!["Type of root changed from object to string"]);
        }
    }

    #[test]
    fn test_required_only_fields_are_declared() {
        let with_value = user(json!({}), json!(["value"]));
        let without_value = user(json!({}), json!([]));

        // Old data {"value": ...} is an unknown field under the new version.
        let result = check_evolution(&with_value, &without_value).unwrap();
        assert!(!result.is_compatible);
        assert_eq!(result.reasons, vec!["Property 'value' was removed"]);
        assert_eq!(result.changes[0].change_type, ChangeType::FieldRemoved);
        assert_eq!(result.changes[0].old_value.as_deref(), Some("unconstrained"));

        let result = check_evolution(&without_value, &with_value).unwrap();
        assert!(!result.is_compatible);
        assert_eq!(result.reasons, vec!["Required property 'value' was added"]);
    }

    #[test]
    fn test_required_only_field_gaining_a_type() {
        let loose = user(json!({}), json!(["value"]));
        let typed = user(json!({ "value": { "type": "string" } }), json!(["value"]));

        let result = check_evolution(&loose, &typed).unwrap();
        assert!(!result.is_compatible);
        assert_eq!(result.reasons, vec!["Property 'value' type changed from unconstrained to string"]);

        let lenient = CompatibilityChecker::new().with_type_narrowing(false);
        assert!(lenient.check(&loose, &typed).unwrap().is_compatible);

        // Dropping the type entry only widens what is accepted.
        let result = check_evolution(&typed, &loose).unwrap();
        assert!(result.is_compatible);
        assert_eq!(result.changes.len(), 1);
    }

    #[test]
    fn test_invalid_document_is_rejected() {
        let valid = SchemaDocument::new("com.example.user", TypeNode::string());
        let invalid = SchemaDocument::new("user", TypeNode::string());

        let err = check_evolution(&valid, &invalid).unwrap_err();
        assert_eq!(err.rule(), Some(StructuralRule::Identifier));
    }
}
