//! Error types for the lexicon engine

use thiserror::Error;

use crate::structural::StructuralRule;

/// Result type for lexicon operations
pub type Result<T> = std::result::Result<T, LexiconError>;

/// Lexicon engine errors
///
/// Data that fails validation against a schema is not an error; see
/// [`crate::validator::ValidationViolation`].
#[derive(Error, Debug)]
pub enum LexiconError {
    #[error("Malformed input: {0}")]
    MalformedInput(#[source] serde_json::Error),

    #[error("Schema validation failed ({rule}): {detail}")]
    SchemaValidation { rule: StructuralRule, detail: String },

    #[error("Lexicon already registered with different content: {id}")]
    AlreadyRegistered { id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LexiconError {
    /// The structural rule that failed, if this is a schema validation error
    pub fn rule(&self) -> Option<StructuralRule> {
        match self {
            LexiconError::SchemaValidation { rule, .. } => Some(*rule),
            _ => None,
        }
    }
}
