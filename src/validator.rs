//! Data validation against lexicon documents
//!
//! Walks a [`TypeNode`] tree and a data value in lock-step and collects
//! every violation rather than stopping at the first. Objects are closed:
//! a data field that the schema does not declare is a violation.
//!
//! Violation order is deterministic: declared fields in declaration order,
//! then undeclared data fields in data order; array elements by ascending
//! index; union variants in declaration order.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{trace, warn};

use crate::registry::RefResolver;
use crate::schema::{SchemaDocument, TypeNode};

/// Default recursion bound for [`Validator`]
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Default bound on schema nodes visited in one [`Validator::validate`] call
pub const DEFAULT_MAX_STEPS: usize = 1_000_000;

/// One step from the data root to a value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => f.write_str(name),
            PathSegment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self {
        PathSegment::Field(name.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Why a value failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationReason {
    TypeMismatch,
    MissingRequiredField,
    UnknownField,
    NoUnionVariantMatched,
    UnresolvedReference,
    DepthLimitExceeded,
}

impl ViolationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationReason::TypeMismatch => "TYPE_MISMATCH",
            ViolationReason::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ViolationReason::UnknownField => "UNKNOWN_FIELD",
            ViolationReason::NoUnionVariantMatched => "NO_UNION_VARIANT_MATCHED",
            ViolationReason::UnresolvedReference => "UNRESOLVED_REFERENCE",
            ViolationReason::DepthLimitExceeded => "DEPTH_LIMIT_EXCEEDED",
        }
    }
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single data validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub path: Vec<PathSegment>,
    pub reason: ViolationReason,
}

impl ValidationViolation {
    /// Path rendered as `a.b[2].c`, or `$` for the data root
    pub fn path_string(&self) -> String {
        if self.path.is_empty() {
            return "$".to_string();
        }
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                PathSegment::Index(index) => out.push_str(&format!("[{}]", index)),
            }
        }
        out
    }
}

impl fmt::Display for ValidationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.reason, self.path_string())
    }
}

/// Validates data values against lexicon documents
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    max_depth: usize,
    max_steps: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Bound nesting (including chains of refs) at this depth
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Bound the total number of schema nodes visited, union attempts included
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Validate `data` against `document`, resolving refs through `registry`
    ///
    /// An empty result means the data is valid.
    pub fn validate<R: RefResolver + ?Sized>(
        &self,
        document: &SchemaDocument,
        data: &Value,
        registry: &R,
    ) -> Vec<ValidationViolation> {
        let mut walk = Walk {
            registry,
            max_depth: self.max_depth,
            steps_left: self.max_steps,
            exhausted: false,
            active: Vec::new(),
            path: Vec::new(),
            violations: Vec::new(),
        };
        walk.node(document.root_type(), data, 0);
        if walk.exhausted {
            warn!(id = document.id(), max_steps = self.max_steps, "validation step budget exhausted");
            walk.violations.push(ValidationViolation {
                path: Vec::new(),
                reason: ViolationReason::DepthLimitExceeded,
            });
        }
        trace!(id = document.id(), violations = walk.violations.len(), "validated data");
        walk.violations
    }
}

/// Validate with default settings
pub fn validate<R: RefResolver + ?Sized>(
    document: &SchemaDocument,
    data: &Value,
    registry: &R,
) -> Vec<ValidationViolation> {
    Validator::new().validate(document, data, registry)
}

struct Walk<'r, R: ?Sized> {
    registry: &'r R,
    max_depth: usize,
    steps_left: usize,
    exhausted: bool,
    /// Refs being followed, keyed by target and the data value they apply to
    active: Vec<(String, *const Value)>,
    path: Vec<PathSegment>,
    violations: Vec<ValidationViolation>,
}

impl<R: RefResolver + ?Sized> Walk<'_, R> {
    fn report(&mut self, reason: ViolationReason) {
        self.violations.push(ValidationViolation {
            path: self.path.clone(),
            reason,
        });
    }

    fn report_at(&mut self, segment: PathSegment, reason: ViolationReason) {
        self.path.push(segment);
        self.report(reason);
        self.path.pop();
    }

    fn node(&mut self, node: &TypeNode, data: &Value, depth: usize) {
        if self.exhausted {
            return;
        }
        if self.steps_left == 0 {
            self.exhausted = true;
            return;
        }
        self.steps_left -= 1;

        if depth > self.max_depth {
            self.report(ViolationReason::DepthLimitExceeded);
            return;
        }

        match node {
            TypeNode::Primitive(kind) => {
                if !kind.matches(data) {
                    self.report(ViolationReason::TypeMismatch);
                }
            }
            TypeNode::Object { properties, required } => {
                let Some(fields) = data.as_object() else {
                    self.report(ViolationReason::TypeMismatch);
                    return;
                };

                for (name, child) in properties {
                    match fields.get(name) {
                        Some(value) => {
                            self.path.push(PathSegment::Field(name.clone()));
                            self.node(child, value, depth + 1);
                            self.path.pop();
                        }
                        None if required.contains(name) => {
                            self.report_at(PathSegment::Field(name.clone()), ViolationReason::MissingRequiredField);
                        }
                        None => {}
                    }
                }

                // Required names without a property entry are declared with
                // an unconstrained type.
                for name in required {
                    if node.property(name).is_none() && !fields.contains_key(name) {
                        self.report_at(PathSegment::Field(name.clone()), ViolationReason::MissingRequiredField);
                    }
                }

                for name in fields.keys() {
                    if node.property(name).is_none() && !required.contains(name) {
                        self.report_at(PathSegment::Field(name.clone()), ViolationReason::UnknownField);
                    }
                }
            }
            TypeNode::Array { items } => {
                let Some(elements) = data.as_array() else {
                    self.report(ViolationReason::TypeMismatch);
                    return;
                };
                for (index, element) in elements.iter().enumerate() {
                    self.path.push(PathSegment::Index(index));
                    self.node(items, element, depth + 1);
                    self.path.pop();
                }
            }
            TypeNode::Union { variants } => {
                // Variants are tried in place; their violations are discarded.
                let mark = self.violations.len();
                let mut matched = false;
                for variant in variants {
                    self.node(variant, data, depth + 1);
                    let clean = self.violations.len() == mark && !self.exhausted;
                    self.violations.truncate(mark);
                    if clean {
                        matched = true;
                        break;
                    }
                }
                if !matched && !self.exhausted {
                    self.report(ViolationReason::NoUnionVariantMatched);
                }
            }
            TypeNode::Ref { target } => {
                // Re-entering a ref on the same value can only recurse until
                // the depth bound, so stop at once.
                let key = (target.clone(), data as *const Value);
                if self.active.contains(&key) {
                    self.report(ViolationReason::DepthLimitExceeded);
                    return;
                }
                let registry = self.registry;
                match registry.lookup(target) {
                    Some(resolved) => {
                        self.active.push(key);
                        self.node(resolved.root_type(), data, depth + 1);
                        self.active.pop();
                    }
                    None => self.report(ViolationReason::UnresolvedReference),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{LexiconRegistry, NoRefs};
    use serde_json::json;

    fn profile() -> SchemaDocument {
        SchemaDocument::new(
            "com.example.profile",
            TypeNode::object(
                [
                    ("handle", TypeNode::string()),
                    ("age", TypeNode::number()),
                    ("tags", TypeNode::array(TypeNode::string())),
                ],
                ["handle"],
            ),
        )
    }

    fn reasons(violations: &[ValidationViolation]) -> Vec<ViolationReason> {
        violations.iter().map(|v| v.reason).collect()
    }

    #[test]
    fn test_valid_data() {
        let data = json!({ "handle": "example.com", "age": 30, "tags": ["a", "b"] });
        assert!(validate(&profile(), &data, &NoRefs).is_empty());
    }

    #[test]
    fn test_primitive_mismatch() {
        let doc = SchemaDocument::new("com.example.flag", TypeNode::boolean());
        let violations = validate(&doc, &json!("true"), &NoRefs);
        assert_eq!(violations, vec![ValidationViolation { path: vec![], reason: ViolationReason::TypeMismatch }]);
        assert!(validate(&doc, &json!(false), &NoRefs).is_empty());
    }

    #[test]
    fn test_collects_all_violations_in_order() {
        let data = json!({ "zzz": 1, "age": "old", "tags": ["ok", 7, "ok", false] });
        let violations = validate(&profile(), &data, &NoRefs);

        let rendered: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "MISSING_REQUIRED_FIELD at handle",
                "TYPE_MISMATCH at age",
                "TYPE_MISMATCH at tags[1]",
                "TYPE_MISMATCH at tags[3]",
                "UNKNOWN_FIELD at zzz",
            ]
        );
    }

    #[test]
    fn test_validation_is_deterministic() {
        let data = json!({ "b": 1, "a": 2, "tags": [1, 2], "age": null });
        let first = validate(&profile(), &data, &NoRefs);
        for _ in 0..5 {
            assert_eq!(validate(&profile(), &data, &NoRefs), first);
        }
    }

    #[test]
    fn test_object_expected() {
        let violations = validate(&profile(), &json!(["handle"]), &NoRefs);
        assert_eq!(reasons(&violations), vec![ViolationReason::TypeMismatch]);
    }

    #[test]
    fn test_union_reports_single_violation() {
        let doc = SchemaDocument::new(
            "com.example.value",
            TypeNode::object(
                [("value", TypeNode::union([TypeNode::string(), TypeNode::number()]))],
                ["value"],
            ),
        );
        assert!(validate(&doc, &json!({ "value": "x" }), &NoRefs).is_empty());
        assert!(validate(&doc, &json!({ "value": 3 }), &NoRefs).is_empty());

        let violations = validate(&doc, &json!({ "value": true }), &NoRefs);
        assert_eq!(
            violations,
            vec![ValidationViolation {
                path: vec!["value".into()],
                reason: ViolationReason::NoUnionVariantMatched,
            }]
        );
    }

    #[test]
    fn test_ref_resolution() {
        let mut registry = LexiconRegistry::new();
        registry
            .register(SchemaDocument::new(
                "com.example.actor",
                TypeNode::object([("did", TypeNode::string())], ["did"]),
            ))
            .unwrap();

        let post = SchemaDocument::new(
            "com.example.post",
            TypeNode::object(
                [
                    ("author", TypeNode::reference("com.example.actor")),
                    ("embed", TypeNode::reference("com.example.embed")),
                ],
                ["author"],
            ),
        );

        assert!(validate(&post, &json!({ "author": { "did": "did:plc:1" } }), &registry).is_empty());

        let violations = validate(&post, &json!({ "author": { "did": 1 }, "embed": {} }), &registry);
        assert_eq!(
            violations,
            vec![
                ValidationViolation {
                    path: vec!["author".into(), "did".into()],
                    reason: ViolationReason::TypeMismatch,
                },
                ValidationViolation {
                    path: vec!["embed".into()],
                    reason: ViolationReason::UnresolvedReference,
                },
            ]
        );
    }

    #[test]
    fn test_recursive_ref_terminates() {
        let mut registry = LexiconRegistry::new();
        registry
            .register(SchemaDocument::new("com.example.loop", TypeNode::reference("com.example.loop")))
            .unwrap();
        let doc = registry.get("com.example.loop").unwrap().clone();

        let violations = Validator::new().with_max_depth(16).validate(&doc, &json!("x"), &registry);
        assert_eq!(reasons(&violations), vec![ViolationReason::DepthLimitExceeded]);
    }

    #[test]
    fn test_union_of_self_refs_terminates_at_default_depth() {
        let mut registry = LexiconRegistry::new();
        registry
            .register(SchemaDocument::new(
                "com.example.loop",
                TypeNode::union([
                    TypeNode::reference("com.example.loop"),
                    TypeNode::reference("com.example.loop"),
                ]),
            ))
            .unwrap();
        let doc = registry.get("com.example.loop").unwrap().clone();

        let validator = Validator::new();
        assert_eq!(validator.max_depth(), DEFAULT_MAX_DEPTH);
        let violations = validator.validate(&doc, &json!("x"), &registry);
        assert_eq!(
            violations,
            vec![ValidationViolation { path: vec![], reason: ViolationReason::NoUnionVariantMatched }]
        );
    }

    #[test]
    fn test_step_budget_bounds_union_backtracking() {
        // Both variants descend the same data, so every level doubles the work.
        let mut registry = LexiconRegistry::new();
        let step = TypeNode::object([("next", TypeNode::reference("com.example.chain"))], ["next"]);
        registry
            .register(SchemaDocument::new("com.example.chain", TypeNode::union([step.clone(), step])))
            .unwrap();
        let doc = registry.get("com.example.chain").unwrap().clone();

        let mut data = json!(1);
        for _ in 0..64 {
            data = json!({ "next": data });
        }

        let violations = Validator::new().with_max_steps(10_000).validate(&doc, &data, &registry);
        assert_eq!(
            violations,
            vec![ValidationViolation { path: vec![], reason: ViolationReason::DepthLimitExceeded }]
        );
    }

    #[test]
    fn test_step_budget_allows_ordinary_data() {
        let data = json!({ "handle": "example.com", "age": 30, "tags": ["a", "b"] });
        let validator = Validator::new().with_max_steps(6);
        assert_eq!(validator.max_steps(), 6);
        assert!(validator.validate(&profile(), &data, &NoRefs).is_empty());

        let starved = Validator::new().with_max_steps(2).validate(&profile(), &data, &NoRefs);
        assert_eq!(reasons(&starved), vec![ViolationReason::DepthLimitExceeded]);
    }

    #[test]
    fn test_recursive_tree_data() {
        let mut registry = LexiconRegistry::new();
        registry
            .register(SchemaDocument::new(
                "com.example.tree",
                TypeNode::object(
                    [
                        ("label", TypeNode::string()),
                        ("children", TypeNode::array(TypeNode::reference("com.example.tree"))),
                    ],
                    ["label"],
                ),
            ))
            .unwrap();
        let doc = registry.get("com.example.tree").unwrap().clone();

        let data = json!({
            "label": "root",
            "children": [
                { "label": "a", "children": [] },
                { "label": "b", "children": [{ "label": 3 }] }
            ]
        });
        let violations = validate(&doc, &data, &registry);
        assert_eq!(
            violations,
            vec![ValidationViolation {
                path: vec![
                    "children".into(),
                    PathSegment::Index(1),
                    "children".into(),
                    PathSegment::Index(0),
                    "label".into(),
                ],
                reason: ViolationReason::TypeMismatch,
            }]
        );
    }

    #[test]
    fn test_path_string() {
        let violation = ValidationViolation {
            path: vec!["a".into(), PathSegment::Index(2), "b".into()],
            reason: ViolationReason::UnknownField,
        };
        assert_eq!(violation.path_string(), "a[2].b");
        assert_eq!(
            serde_json::to_value(&violation).unwrap(),
            json!({ "path": ["a", 2, "b"], "reason": "UNKNOWN_FIELD" })
        );
    }
}
