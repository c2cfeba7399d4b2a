//! Lexicon registry
//!
//! Holds the sibling documents that `ref` types resolve against. The
//! registry is append-only: a lexicon id, once registered, always maps to
//! the same document.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use petgraph::algo::kosaraju_scc;
use petgraph::graph::DiGraph;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{LexiconError, Result};
use crate::parser;
use crate::schema::SchemaDocument;

/// Resolves `ref` targets during data validation
pub trait RefResolver {
    fn lookup(&self, id: &str) -> Option<&SchemaDocument>;
}

/// A resolver that knows no documents
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRefs;

impl RefResolver for NoRefs {
    fn lookup(&self, _id: &str) -> Option<&SchemaDocument> {
        None
    }
}

impl RefResolver for HashMap<String, SchemaDocument> {
    fn lookup(&self, id: &str) -> Option<&SchemaDocument> {
        self.get(id)
    }
}

impl<R: RefResolver + ?Sized> RefResolver for &R {
    fn lookup(&self, id: &str) -> Option<&SchemaDocument> {
        (**self).lookup(id)
    }
}

/// A `ref` whose target is not registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingRef {
    /// Lexicon containing the ref
    pub from: String,
    /// Identifier the ref points at
    pub target: String,
}

/// In-memory collection of lexicons keyed by id
#[derive(Debug, Clone, Default)]
pub struct LexiconRegistry {
    documents: BTreeMap<String, SchemaDocument>,
}

impl LexiconRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document
    ///
    /// Registering an identical document again is a no-op; registering a
    /// different document under an existing id fails.
    pub fn register(&mut self, document: SchemaDocument) -> Result<()> {
        if let Some(existing) = self.documents.get(document.id()) {
            if existing.source() == document.source() {
                return Ok(());
            }
            return Err(LexiconError::AlreadyRegistered {
                id: document.id().to_string(),
            });
        }

        debug!(id = document.id(), "registered lexicon");
        self.documents.insert(document.id().to_string(), document);
        Ok(())
    }

    /// Parse and register every `*.json` file below a directory
    ///
    /// Returns the number of documents loaded.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let mut loaded = 0;

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| match e.into_io_error() {
                Some(io) => LexiconError::Io(io),
                None => LexiconError::Io(std::io::Error::other("directory walk failed")),
            })?;
            let path = entry.path();
            if !path.is_file() || path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }

            let document = parser::parse_file(path)?;
            self.register(document)?;
            loaded += 1;
        }

        debug!(dir = %dir.display(), loaded, "loaded lexicon directory");
        Ok(loaded)
    }

    pub fn get(&self, id: &str) -> Option<&SchemaDocument> {
        self.documents.get(id)
    }

    /// Registered ids in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Every `ref` that points outside the registry
    pub fn unresolved_refs(&self) -> Vec<DanglingRef> {
        let mut dangling = Vec::new();
        for document in self.documents.values() {
            for target in document.root_type().ref_targets() {
                if !self.documents.contains_key(target) {
                    warn!(from = document.id(), missing = target, "unresolved lexicon reference");
                    dangling.push(DanglingRef {
                        from: document.id().to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
        dangling
    }

    /// Groups of lexicons that reference each other in a cycle
    ///
    /// Cycles are legal at the identifier level; this is a report, not an
    /// error. Each group and the list of groups are sorted.
    pub fn reference_cycles(&self) -> Vec<Vec<String>> {
        let mut graph = DiGraph::<&str, ()>::with_capacity(self.documents.len(), self.documents.len() * 2);
        let indices: HashMap<&str, _> = self
            .documents
            .keys()
            .map(|id| (id.as_str(), graph.add_node(id.as_str())))
            .collect();

        for document in self.documents.values() {
            let from = indices[document.id()];
            for target in document.root_type().ref_targets() {
                if let Some(&to) = indices.get(target) {
                    graph.update_edge(from, to, ());
                }
            }
        }

        let mut cycles: Vec<Vec<String>> = kosaraju_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut ids: Vec<String> = scc
                    .into_iter()
                    .filter_map(|idx| graph.node_weight(idx).map(|id| id.to_string()))
                    .collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }
}

impl RefResolver for LexiconRegistry {
    fn lookup(&self, id: &str) -> Option<&SchemaDocument> {
        self.get(id)
    }
}
