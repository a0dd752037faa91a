//! OKG Graph - In-memory knowledge graph
//!
//! [`GraphStore`] owns the set of validated triples built during a run and
//! serializes it to Turtle, JSON-LD and RDF/XML. Every mutation goes through
//! the insertion operations, which run stage-2 validation on raw lines.
//!
//! Author: hephaex@gmail.com

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use okg_core::Triple;
use okg_extractor::{canonicalize, LineError};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod format;
mod jsonld;

pub use format::RdfFormat;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("IO error writing {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{format} serialization failed: {message}")]
    Serialize { format: RdfFormat, message: String },

    #[error("{format} parsing failed: {message}")]
    Parse { format: RdfFormat, message: String },

    #[error("Unknown RDF format: {0}")]
    UnknownFormat(String),
}

// ============================================================================
// Reports
// ============================================================================

/// A line refused by stage-2 validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub line: String,
    pub error: LineError,
}

/// Result of one batch insertion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertReport {
    /// Lines that added a new triple
    pub accepted: usize,
    /// Valid lines whose triple was already present
    pub duplicates: usize,
    /// Lines that failed validation
    pub rejected: Vec<Rejection>,
}

impl InsertReport {
    pub fn absorb(&mut self, other: InsertReport) {
        self.accepted += other.accepted;
        self.duplicates += other.duplicates;
        self.rejected.extend(other.rejected);
    }
}

/// What [`GraphStore::save`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Written { path: PathBuf, triples: usize },
    /// The graph was empty; no file was produced
    SkippedEmpty,
}

// ============================================================================
// Graph Store
// ============================================================================

/// Deduplicating triple set bound to one namespace prefix
#[derive(Debug, Clone)]
pub struct GraphStore {
    prefix: String,
    namespace: String,
    triples: BTreeSet<Triple>,
}

impl GraphStore {
    pub fn new(prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            namespace: namespace.into(),
            triples: BTreeSet::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Validate raw candidate lines and add the resulting triples
    pub fn insert<I, S>(&mut self, lines: I) -> InsertReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = InsertReport::default();

        for line in lines {
            let line = line.as_ref();
            match canonicalize(line) {
                Ok(triple) => {
                    if self.triples.insert(triple) {
                        report.accepted += 1;
                    } else {
                        report.duplicates += 1;
                    }
                }
                Err(error) => {
                    warn!(line, %error, "Rejected triple line");
                    report.rejected.push(Rejection {
                        line: line.to_string(),
                        error,
                    });
                }
            }
        }

        debug!(
            accepted = report.accepted,
            duplicates = report.duplicates,
            rejected = report.rejected.len(),
            "Lines inserted"
        );
        report
    }

    /// Add an already canonical triple; false when it was present
    pub fn insert_triple(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    /// Set union with another graph; returns the number of new triples
    pub fn merge(&mut self, other: &GraphStore) -> usize {
        let before = self.triples.len();
        self.triples.extend(other.triples.iter().cloned());
        self.triples.len() - before
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn count(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Triples in canonical order
    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Serialize the whole graph
    pub fn serialize(&self, format: RdfFormat) -> Result<Vec<u8>, GraphError> {
        match format {
            RdfFormat::Turtle => format::write_turtle(self.iter(), &self.prefix, &self.namespace),
            RdfFormat::JsonLd => jsonld::write_json_ld(self.iter(), &self.prefix, &self.namespace),
            RdfFormat::RdfXml => format::write_rdf_xml(self.iter()),
        }
    }

    /// Read a serialized graph back into a store
    pub fn parse(
        bytes: &[u8],
        format: RdfFormat,
        prefix: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Result<Self, GraphError> {
        let triples = match format {
            RdfFormat::Turtle => format::read_turtle(bytes)?,
            RdfFormat::JsonLd => jsonld::read_json_ld(bytes)?,
            RdfFormat::RdfXml => format::read_rdf_xml(bytes)?,
        };

        let mut graph = Self::new(prefix, namespace);
        graph.triples.extend(triples);
        Ok(graph)
    }

    /// Write the graph to `path`, creating parent directories.
    ///
    /// An empty graph is not written.
    pub fn save(&self, path: impl AsRef<Path>, format: RdfFormat) -> Result<SaveOutcome, GraphError> {
        let path = path.as_ref();

        if self.is_empty() {
            warn!(path = %path.display(), %format, "Graph is empty, nothing saved");
            return Ok(SaveOutcome::SkippedEmpty);
        }

        let bytes = self.serialize(format)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| GraphError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, bytes).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = %path.display(), %format, triples = self.count(), "Graph saved");
        Ok(SaveOutcome::Written {
            path: path.to_path_buf(),
            triples: self.count(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
