//! Lexicon document model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Only lexicon language version this engine accepts
pub const LEXICON_VERSION: u64 = 1;

/// `$schema` marker written into documents built in code
pub const DEFAULT_SCHEMA_MARKER: &str = "lexicon/v1";

/// Recognized type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Union,
    Ref,
}

impl TypeTag {
    pub const ALL: [TypeTag; 7] = [
        TypeTag::String,
        TypeTag::Number,
        TypeTag::Boolean,
        TypeTag::Object,
        TypeTag::Array,
        TypeTag::Union,
        TypeTag::Ref,
    ];

    /// Tag as written in lexicon documents
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Number => "number",
            TypeTag::Boolean => "boolean",
            TypeTag::Object => "object",
            TypeTag::Array => "array",
            TypeTag::Union => "union",
            TypeTag::Ref => "ref",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| format!("unknown type tag '{}'", s))
    }
}

/// Kind of a primitive type node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    Number,
    Boolean,
}

impl PrimitiveKind {
    pub fn tag(&self) -> TypeTag {
        match self {
            PrimitiveKind::String => TypeTag::String,
            PrimitiveKind::Number => TypeTag::Number,
            PrimitiveKind::Boolean => TypeTag::Boolean,
        }
    }

    /// Whether a data value has this runtime type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            PrimitiveKind::String => value.is_string(),
            PrimitiveKind::Number => value.is_number(),
            PrimitiveKind::Boolean => value.is_boolean(),
        }
    }
}

/// One schema type
///
/// `Ref` is a symbolic pointer resolved through a [`crate::registry::RefResolver`];
/// the tree itself never contains cycles.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNode {
    Primitive(PrimitiveKind),
    Object {
        /// Declared properties in document order
        properties: Vec<(String, TypeNode)>,
        /// Required field names in document order, without duplicates
        required: Vec<String>,
    },
    Array {
        items: Box<TypeNode>,
    },
    Union {
        variants: Vec<TypeNode>,
    },
    Ref {
        target: String,
    },
}

impl TypeNode {
    pub fn string() -> Self {
        TypeNode::Primitive(PrimitiveKind::String)
    }

    pub fn number() -> Self {
        TypeNode::Primitive(PrimitiveKind::Number)
    }

    pub fn boolean() -> Self {
        TypeNode::Primitive(PrimitiveKind::Boolean)
    }

    pub fn object<N, R>(properties: impl IntoIterator<Item = (N, TypeNode)>, required: impl IntoIterator<Item = R>) -> Self
    where
        N: Into<String>,
        R: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        for name in required {
            let name = name.into();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        TypeNode::Object {
            properties: properties.into_iter().map(|(n, t)| (n.into(), t)).collect(),
            required: names,
        }
    }

    pub fn array(items: TypeNode) -> Self {
        TypeNode::Array { items: Box::new(items) }
    }

    pub fn union(variants: impl IntoIterator<Item = TypeNode>) -> Self {
        TypeNode::Union { variants: variants.into_iter().collect() }
    }

    pub fn reference(target: impl Into<String>) -> Self {
        TypeNode::Ref { target: target.into() }
    }

    /// The type tag of this node
    pub fn tag(&self) -> TypeTag {
        match self {
            TypeNode::Primitive(kind) => kind.tag(),
            TypeNode::Object { .. } => TypeTag::Object,
            TypeNode::Array { .. } => TypeTag::Array,
            TypeNode::Union { .. } => TypeTag::Union,
            TypeNode::Ref { .. } => TypeTag::Ref,
        }
    }

    /// Look up a declared property of an object node
    pub fn property(&self, name: &str) -> Option<&TypeNode> {
        match self {
            TypeNode::Object { properties, .. } => {
                properties.iter().find(|(n, _)| n == name).map(|(_, t)| t)
            }
            _ => None,
        }
    }

    /// Serialize this node back into lexicon form
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        self.write_fields(&mut map);
        Value::Object(map)
    }

    fn write_fields(&self, map: &mut Map<String, Value>) {
        map.insert("type".to_string(), json!(self.tag().as_str()));
        match self {
            TypeNode::Primitive(_) => {}
            TypeNode::Object { properties, required } => {
                if !properties.is_empty() {
                    let props: Map<String, Value> = properties
                        .iter()
                        .map(|(name, node)| (name.clone(), node.to_value()))
                        .collect();
                    map.insert("properties".to_string(), Value::Object(props));
                }
                if !required.is_empty() {
                    map.insert("required".to_string(), json!(required));
                }
            }
            TypeNode::Array { items } => {
                map.insert("items".to_string(), items.to_value());
            }
            TypeNode::Union { variants } => {
                let variants: Vec<Value> = variants.iter().map(TypeNode::to_value).collect();
                map.insert("variants".to_string(), Value::Array(variants));
            }
            TypeNode::Ref { target } => {
                map.insert("ref".to_string(), json!(target));
            }
        }
    }

    /// Identifiers of every `Ref` reachable inside this tree, in traversal order
    pub fn ref_targets(&self) -> Vec<&str> {
        let mut targets = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                TypeNode::Primitive(_) => {}
                TypeNode::Object { properties, .. } => {
                    stack.extend(properties.iter().rev().map(|(_, t)| t));
                }
                TypeNode::Array { items } => stack.push(items.as_ref()),
                TypeNode::Union { variants } => stack.extend(variants.iter().rev()),
                TypeNode::Ref { target } => targets.push(target.as_str()),
            }
        }
        targets
    }
}

/// A parsed lexicon
///
/// Immutable once built. Documents returned by [`crate::parser::parse`] have
/// passed structural validation; documents built with [`SchemaDocument::new`]
/// have not, which is why the generator and evolution checker re-check.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    id: String,
    schema_marker: String,
    schema_version: u64,
    root_type: TypeNode,
    description: Option<String>,
    source: Value,
}

impl SchemaDocument {
    /// Build a document in code
    pub fn new(id: impl Into<String>, root_type: TypeNode) -> Self {
        let id = id.into();
        let source = Self::synthesize_source(&id, DEFAULT_SCHEMA_MARKER, &root_type, None);
        Self {
            id,
            schema_marker: DEFAULT_SCHEMA_MARKER.to_string(),
            schema_version: LEXICON_VERSION,
            root_type,
            description: None,
            source,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        if let Value::Object(map) = &mut self.source {
            map.insert("description".to_string(), json!(description));
        }
        self.description = Some(description);
        self
    }

    pub(crate) fn from_parts(
        id: String,
        schema_marker: String,
        root_type: TypeNode,
        description: Option<String>,
        source: Value,
    ) -> Self {
        Self {
            id,
            schema_marker,
            schema_version: LEXICON_VERSION,
            root_type,
            description,
            source,
        }
    }

    fn synthesize_source(id: &str, marker: &str, root: &TypeNode, description: Option<&str>) -> Value {
        let mut map = Map::new();
        map.insert("$schema".to_string(), json!(marker));
        map.insert("lexicon".to_string(), json!(LEXICON_VERSION));
        map.insert("id".to_string(), json!(id));
        if let Some(description) = description {
            map.insert("description".to_string(), json!(description));
        }
        root.write_fields(&mut map);
        Value::Object(map)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn schema_marker(&self) -> &str {
        &self.schema_marker
    }

    pub fn schema_version(&self) -> u64 {
        self.schema_version
    }

    pub fn root_type(&self) -> &TypeNode {
        &self.root_type
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The structured tree this document was built from
    pub fn source(&self) -> &Value {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for tag in TypeTag::ALL {
            assert_eq!(tag.as_str().parse::<TypeTag>().unwrap(), tag);
        }
        assert!("integer".parse::<TypeTag>().is_err());
    }

    #[test]
    fn test_object_required_deduplicated() {
        let node = TypeNode::object([("a", TypeNode::string())], ["a", "b", "a"]);
        match node {
            TypeNode::Object { required, .. } => assert_eq!(required, vec!["a", "b"]),
            other => panic!("Expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_new_document_source() {
        let doc = SchemaDocument::new(
            "com.example.profile",
            TypeNode::object([("handle", TypeNode::string())], ["handle"]),
        )
        .with_description("A profile");

        let source = doc.source();
        assert_eq!(source["lexicon"], json!(1));
        assert_eq!(source["id"], json!("com.example.profile"));
        assert_eq!(source["type"], json!("object"));
        assert_eq!(source["properties"]["handle"]["type"], json!("string"));
        assert_eq!(source["required"], json!(["handle"]));
        assert_eq!(source["description"], json!("A profile"));
        assert_eq!(doc.description(), Some("A profile"));
    }

    #[test]
    fn test_ref_targets_in_order() {
        let node = TypeNode::object(
            [
                ("author", TypeNode::reference("com.example.actor")),
                (
                    "tags",
                    TypeNode::array(TypeNode::union([
                        TypeNode::reference("com.example.tag"),
                        TypeNode::string(),
                    ])),
                ),
            ],
            Vec::<String>::new(),
        );
        assert_eq!(node.ref_targets(), vec!["com.example.actor", "com.example.tag"]);
    }
}
