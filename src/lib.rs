//! Lexicon Schema Engine
//!
//! Parsing, validation and evolution checking for lexicon documents, the
//! interface-description format used to describe RPC methods and record
//! shapes exchanged between networked peers.
//!
//! ## Features
//!
//! - **Parsing**: Raw JSON text becomes an immutable [`SchemaDocument`]
//! - **Structural Validation**: Documents are checked against the lexicon rules before use
//! - **Data Validation**: Values are checked against a document, collecting every violation
//! - **Schema Generation**: Documents project into JSON Schema for generic tooling
//! - **Evolution Checking**: Detects breaking changes between versions of a lexicon
//!
//! ## Architecture
//!
//! ```text
//! raw text ──► parser ──► SchemaDocument ──┬──► structural
//!                                          ├──► validator ◄── registry (refs)
//!                                          ├──► generator
//!                                          └──► compatibility
//! ```
//!
//! All consumers take `&SchemaDocument` and share no mutable state, so they
//! may run concurrently over the same document.

pub mod compatibility;
pub mod config;
pub mod error;
pub mod generator;
pub mod parser;
pub mod registry;
pub mod schema;
pub mod structural;
pub mod validator;

pub use compatibility::{check_evolution, ChangeType, CompatibilityChecker, EvolutionVerdict, SchemaChange};
pub use config::{LexiconConfig, OutputFormat};
pub use error::{LexiconError, Result};
pub use generator::generate_structural_schema;
pub use parser::{parse, parse_file, parse_value};
pub use registry::{LexiconRegistry, NoRefs, RefResolver};
pub use schema::{PrimitiveKind, SchemaDocument, TypeNode, TypeTag};
pub use structural::{is_known_type, is_structurally_valid, StructuralRule};
pub use validator::{validate, PathSegment, ValidationViolation, Validator, ViolationReason};
