//! Structural validation of lexicon documents
//!
//! Decides whether a structured tree is itself a legal lexicon, before any
//! data is validated against it. Rules are applied in order and the first
//! failure wins:
//!
//! 1. `required-fields`: `$schema`, `lexicon`, `id` and `type` are declared
//! 2. `lexicon-version`: `lexicon` is exactly the integer `1`
//! 3. `identifier`: `id` is a dotted namespace identifier
//! 4. `known-type`: the root `type` is a recognized tag
//! 5. `nesting`: every nested type node is a mapping with a recognized tag
//!    and the attributes its tag requires
//!
//! Nested nodes are walked with an explicit work-list, so arbitrarily deep
//! documents cannot exhaust the stack.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{SchemaDocument, TypeTag, LEXICON_VERSION};

/// Top-level fields every lexicon must declare
pub const REQUIRED_FIELDS: [&str; 4] = ["$schema", "lexicon", "id", "type"];

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9-]*(\.[A-Za-z][A-Za-z0-9-]*)+$").expect("invalid identifier regex")
});

/// The structural rule a document violated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructuralRule {
    RequiredFields,
    LexiconVersion,
    Identifier,
    KnownType,
    Nesting,
}

impl StructuralRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            StructuralRule::RequiredFields => "required-fields",
            StructuralRule::LexiconVersion => "lexicon-version",
            StructuralRule::Identifier => "identifier",
            StructuralRule::KnownType => "known-type",
            StructuralRule::Nesting => "nesting",
        }
    }
}

impl fmt::Display for StructuralRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First rule a tree failed, with the offending field or tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralFailure {
    pub rule: StructuralRule,
    pub detail: String,
}

impl StructuralFailure {
    fn new(rule: StructuralRule, detail: impl Into<String>) -> Self {
        Self { rule, detail: detail.into() }
    }
}

impl fmt::Display for StructuralFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.rule, self.detail)
    }
}

/// Whether a tag names one of the recognized lexicon types
pub fn is_known_type(tag: &str) -> bool {
    tag.parse::<TypeTag>().is_ok()
}

/// Whether a dotted namespace identifier is well formed
pub fn is_valid_identifier(id: &str) -> bool {
    IDENTIFIER_RE.is_match(id)
}

/// Re-check a document against its source tree
pub fn is_structurally_valid(document: &SchemaDocument) -> bool {
    is_tree_structurally_valid(document.source())
}

/// Predicate form of [`check`]
pub fn is_tree_structurally_valid(tree: &Value) -> bool {
    check(tree).is_ok()
}

/// Check a document tree, returning the first failed rule
pub fn check(tree: &Value) -> Result<(), StructuralFailure> {
    let Some(root) = tree.as_object() else {
        return Err(StructuralFailure::new(
            StructuralRule::RequiredFields,
            "document is not a mapping",
        ));
    };

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !root.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        return Err(StructuralFailure::new(
            StructuralRule::RequiredFields,
            format!("missing {}", missing.join(", ")),
        ));
    }

    // No coercion: "1", 1.0 and 2 are all rejected.
    if root.get("lexicon").and_then(Value::as_u64) != Some(LEXICON_VERSION) {
        return Err(StructuralFailure::new(
            StructuralRule::LexiconVersion,
            format!("expected lexicon {}, got {}", LEXICON_VERSION, root["lexicon"]),
        ));
    }

    match root.get("id").and_then(Value::as_str) {
        Some(id) if is_valid_identifier(id) => {}
        Some(id) => {
            return Err(StructuralFailure::new(
                StructuralRule::Identifier,
                format!(
                    "'{}' is not a dotted namespace identifier; ids need at least two dot-separated \
                     segments, each a letter followed by letters, digits or '-' (stricter than a non-empty id)",
                    id
                ),
            ));
        }
        None => {
            return Err(StructuralFailure::new(StructuralRule::Identifier, "id is not a string"));
        }
    }

    let root_tag = match root.get("type").and_then(Value::as_str) {
        Some(tag) => tag.parse::<TypeTag>().map_err(|e| StructuralFailure::new(StructuralRule::KnownType, e))?,
        None => {
            return Err(StructuralFailure::new(StructuralRule::KnownType, "type is not a string"));
        }
    };

    let mut pending: Vec<(String, TypeTag, &Map<String, Value>)> = vec![(String::new(), root_tag, root)];
    while let Some((path, tag, node)) = pending.pop() {
        check_node_shape(&path, tag, node, &mut pending)?;
    }

    Ok(())
}

/// Validate the attributes of one node and queue its children
fn check_node_shape<'a>(
    path: &str,
    tag: TypeTag,
    node: &'a Map<String, Value>,
    pending: &mut Vec<(String, TypeTag, &'a Map<String, Value>)>,
) -> Result<(), StructuralFailure> {
    if tag != TypeTag::Object && node.contains_key("properties") {
        return Err(nesting(path, format!("'{}' type cannot declare properties", tag)));
    }

    match tag {
        TypeTag::String | TypeTag::Number | TypeTag::Boolean => {}
        TypeTag::Object => {
            if let Some(properties) = node.get("properties") {
                let properties = properties
                    .as_object()
                    .ok_or_else(|| nesting(path, "properties is not a mapping"))?;
                // Reversed so the work-list pops in declaration order.
                for (name, child) in properties.iter().rev() {
                    let child_path = join(path, &format!("properties.{}", name));
                    let (child_tag, child) = child_node(&child_path, child)?;
                    pending.push((child_path, child_tag, child));
                }
            }
            if let Some(required) = node.get("required") {
                let names = required
                    .as_array()
                    .ok_or_else(|| nesting(path, "required is not a sequence"))?;
                if names.iter().any(|n| !n.is_string()) {
                    return Err(nesting(path, "required contains a non-string entry"));
                }
            }
        }
        TypeTag::Array => {
            let items = node.get("items").ok_or_else(|| nesting(path, "array declares no items"))?;
            let child_path = join(path, "items");
            let (child_tag, child) = child_node(&child_path, items)?;
            pending.push((child_path, child_tag, child));
        }
        TypeTag::Union => {
            let variants = node
                .get("variants")
                .and_then(Value::as_array)
                .ok_or_else(|| nesting(path, "union declares no variants sequence"))?;
            if variants.is_empty() {
                return Err(nesting(path, "union declares no variants"));
            }
            for (index, variant) in variants.iter().enumerate().rev() {
                let child_path = format!("{}[{}]", join(path, "variants"), index);
                let (child_tag, child) = child_node(&child_path, variant)?;
                pending.push((child_path, child_tag, child));
            }
        }
        TypeTag::Ref => match node.get("ref").and_then(Value::as_str) {
            Some(target) if !target.is_empty() => {}
            _ => return Err(nesting(path, "ref declares no target")),
        },
    }

    Ok(())
}

fn child_node<'a>(path: &str, child: &'a Value) -> Result<(TypeTag, &'a Map<String, Value>), StructuralFailure> {
    let map = child
        .as_object()
        .ok_or_else(|| nesting(path, "type node is not a mapping"))?;
    let tag = map
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| nesting(path, "type node declares no type"))?;
    let tag = tag.parse::<TypeTag>().map_err(|e| nesting(path, e))?;
    Ok((tag, map))
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}

fn nesting(path: &str, message: impl Into<String>) -> StructuralFailure {
    let message = message.into();
    let detail = if path.is_empty() {
        message
    } else {
        format!("{}: {}", path, message)
    };
    StructuralFailure::new(StructuralRule::Nesting, detail)
}
