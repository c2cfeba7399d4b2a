//! Lexicon document parsing
//!
//! Raw text is decoded with `serde_json`, checked by the structural
//! validator, then lowered into a [`TypeNode`] tree. A document that fails
//! structural validation is never returned.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{LexiconError, Result};
use crate::schema::{SchemaDocument, TypeNode, TypeTag};
use crate::structural::{self, StructuralRule};

/// Deepest type tree the parser will lower
pub const MAX_NESTING_DEPTH: usize = 1024;

/// Parse a lexicon from raw text
pub fn parse(raw_text: &str) -> Result<SchemaDocument> {
    let tree: Value = serde_json::from_str(raw_text).map_err(LexiconError::MalformedInput)?;
    parse_value(tree)
}

/// Parse a lexicon file from disk
pub fn parse_file(path: impl AsRef<Path>) -> Result<SchemaDocument> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let document = parse(&content)?;
    debug!(path = %path.display(), id = document.id(), "loaded lexicon file");
    Ok(document)
}

/// Build a document from an already-decoded tree
pub fn parse_value(tree: Value) -> Result<SchemaDocument> {
    if let Err(failure) = structural::check(&tree) {
        warn!(rule = %failure.rule, detail = %failure.detail, "rejected lexicon");
        return Err(LexiconError::SchemaValidation {
            rule: failure.rule,
            detail: failure.detail,
        });
    }

    let root = tree
        .as_object()
        .ok_or_else(|| invalid(StructuralRule::RequiredFields, "document is not a mapping"))?;

    let id = root
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(StructuralRule::Identifier, "id is not a string"))?
        .to_string();

    let schema_marker = match root.get("$schema") {
        Some(Value::String(marker)) => marker.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };

    let description = root.get("description").and_then(Value::as_str).map(String::from);
    let root_type = lower_node(root, "", 0)?;

    debug!(id = %id, root = %root_type.tag(), "parsed lexicon");
    Ok(SchemaDocument::from_parts(id, schema_marker, root_type, description, tree))
}

fn lower_node(node: &Map<String, Value>, path: &str, depth: usize) -> Result<TypeNode> {
    if depth > MAX_NESTING_DEPTH {
        return Err(invalid(
            StructuralRule::Nesting,
            format!("{}: nesting deeper than {}", path, MAX_NESTING_DEPTH),
        ));
    }

    let tag = node
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(StructuralRule::KnownType, format!("{}: type is not a string", path)))?
        .parse::<TypeTag>()
        .map_err(|e| invalid(StructuralRule::KnownType, e))?;

    let node = match tag {
        TypeTag::String => TypeNode::string(),
        TypeTag::Number => TypeNode::number(),
        TypeTag::Boolean => TypeNode::boolean(),
        TypeTag::Object => {
            let mut properties = Vec::new();
            if let Some(declared) = node.get("properties").and_then(Value::as_object) {
                for (name, child) in declared {
                    let child_path = format!("{}.properties.{}", path, name);
                    properties.push((name.clone(), lower_child(child, &child_path, depth)?));
                }
            }
            let required: Vec<&str> = node
                .get("required")
                .and_then(Value::as_array)
                .map(|names| names.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            TypeNode::object(properties, required)
        }
        TypeTag::Array => {
            let items = node
                .get("items")
                .ok_or_else(|| invalid(StructuralRule::Nesting, format!("{}: array declares no items", path)))?;
            TypeNode::array(lower_child(items, &format!("{}.items", path), depth)?)
        }
        TypeTag::Union => {
            let declared = node
                .get("variants")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid(StructuralRule::Nesting, format!("{}: union declares no variants", path)))?;
            let variants = declared
                .iter()
                .enumerate()
                .map(|(i, v)| lower_child(v, &format!("{}.variants[{}]", path, i), depth))
                .collect::<Result<Vec<_>>>()?;
            TypeNode::union(variants)
        }
        TypeTag::Ref => {
            let target = node
                .get("ref")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid(StructuralRule::Nesting, format!("{}: ref declares no target", path)))?;
            TypeNode::reference(target)
        }
    };

    Ok(node)
}

fn lower_child(child: &Value, path: &str, depth: usize) -> Result<TypeNode> {
    let map = child
        .as_object()
        .ok_or_else(|| invalid(StructuralRule::Nesting, format!("{}: type node is not a mapping", path)))?;
    lower_node(map, path, depth + 1)
}

fn invalid(rule: StructuralRule, detail: impl Into<String>) -> LexiconError {
    LexiconError::SchemaValidation { rule, detail: detail.into() }
}
