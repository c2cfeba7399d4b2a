//! Structural schema generation
//!
//! Projects a lexicon into a JSON Schema document for generic tooling.

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::OutputFormat;
use crate::error::{LexiconError, Result};
use crate::schema::SchemaDocument;
use crate::structural;

/// Dialect marker written into every generated schema
pub const SCHEMA_DIALECT: &str = "http://json-schema.org/draft-07/schema#";

/// Generate the structural schema for a document
///
/// The document is re-checked first; no schema is emitted for a document
/// that is not structurally valid, however it was constructed.
pub fn generate_structural_schema(document: &SchemaDocument) -> Result<Value> {
    generate_from_tree(document.source())
}

/// Generate the structural schema for a raw lexicon tree
pub fn generate_from_tree(tree: &Value) -> Result<Value> {
    structural::check(tree).map_err(|failure| LexiconError::SchemaValidation {
        rule: failure.rule,
        detail: failure.detail,
    })?;

    let mut out = Map::new();
    out.insert("$schema".to_string(), json!(SCHEMA_DIALECT));
    out.insert("title".to_string(), tree["id"].clone());
    out.insert("type".to_string(), tree["type"].clone());

    // Property values pass through unchanged.
    if tree["type"] == "object" {
        if let Some(properties) = tree.get("properties") {
            out.insert("properties".to_string(), properties.clone());
        }
    }

    debug!(title = tree["id"].as_str().unwrap_or_default(), "generated structural schema");
    Ok(Value::Object(out))
}

/// Serialize a generated schema as text
pub fn render(schema: &Value, format: OutputFormat) -> Result<String> {
    let text = match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(schema)?,
        OutputFormat::Compact => serde_json::to_string(schema)?,
    };
    Ok(text)
}
