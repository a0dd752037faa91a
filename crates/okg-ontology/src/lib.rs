//! OKG Ontology - vocabulary harvest from an OWL ontology
//!
//! Loads a Turtle ontology and extracts the class and property names that
//! are offered to the extraction oracle. Two read-only selections run over
//! the parsed statements:
//! - classes: IRIs typed `owl:Class`
//! - properties: IRIs typed `owl:ObjectProperty` or `owl:DatatypeProperty`,
//!   with their `rdfs:domain` and `rdfs:range`
//!
//! Both keep only `rdfs:label` values that are untagged or French.
//!
//! Author: hephaex@gmail.com

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use oxrdf::vocab::{rdf, rdfs};
use oxttl::TurtleParser;
use thiserror::Error;
use tracing::{debug, info};

use okg_core::{EntryKind, Iri, OkgError, OntologyEntry};

pub const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
pub const OWL_OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";
pub const OWL_DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";

/// Language accepted for labels besides untagged ones
const LABEL_LANGUAGE: &str = "fr";

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while loading an ontology. Always fatal for a run.
#[derive(Error, Debug)]
pub enum OntologyError {
    #[error("Cannot read ontology {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse ontology {source_name} as Turtle: {message}")]
    Parse {
        source_name: String,
        message: String,
    },
}

impl From<OntologyError> for OkgError {
    fn from(err: OntologyError) -> Self {
        OkgError::OntologyLoad(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OntologyError>;

// ============================================================================
// Statement index
// ============================================================================

/// Statements of interest, keyed by IRI subject. Blank-node subjects and
/// non-IRI objects are dropped while indexing.
#[derive(Default)]
struct Statements {
    types: BTreeMap<Iri, BTreeSet<String>>,
    labels: BTreeMap<Iri, BTreeSet<String>>,
    domains: BTreeMap<Iri, BTreeSet<Iri>>,
    ranges: BTreeMap<Iri, BTreeSet<Iri>>,
    total: usize,
}

impl Statements {
    fn collect<E: Display>(
        source_name: &str,
        triples: impl Iterator<Item = std::result::Result<oxrdf::Triple, E>>,
    ) -> Result<Self> {
        let mut statements = Self::default();

        for triple in triples {
            let triple = triple.map_err(|e| OntologyError::Parse {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;
            statements.total += 1;
            statements.index(triple);
        }

        Ok(statements)
    }

    fn index(&mut self, triple: oxrdf::Triple) {
        let oxrdf::Term::NamedNode(subject) = oxrdf::Term::from(triple.subject) else {
            return;
        };
        let subject = Iri::from(subject);
        let predicate = triple.predicate.as_str();

        match triple.object {
            oxrdf::Term::NamedNode(object) if predicate == rdf::TYPE.as_str() => {
                self.types
                    .entry(subject)
                    .or_default()
                    .insert(object.into_string());
            }
            oxrdf::Term::NamedNode(object) if predicate == rdfs::DOMAIN.as_str() => {
                self.domains.entry(subject).or_default().insert(Iri::from(object));
            }
            oxrdf::Term::NamedNode(object) if predicate == rdfs::RANGE.as_str() => {
                self.ranges.entry(subject).or_default().insert(Iri::from(object));
            }
            oxrdf::Term::Literal(label) if predicate == rdfs::LABEL.as_str() => {
                if accepts_label_language(label.language()) {
                    self.labels
                        .entry(subject)
                        .or_default()
                        .insert(label.value().to_string());
                } else {
                    debug!(subject = %subject, label = %label, "Label language filtered out");
                }
            }
            _ => {}
        }
    }

    fn entry(&self, iri: &Iri, kind: EntryKind) -> OntologyEntry {
        let mut entry = OntologyEntry::new(iri.clone(), kind);
        if let Some(labels) = self.labels.get(iri) {
            entry.labels = labels.iter().cloned().collect();
        }
        if kind.is_property() {
            if let Some(domains) = self.domains.get(iri) {
                entry.domains = domains.iter().cloned().collect();
            }
            if let Some(ranges) = self.ranges.get(iri) {
                entry.ranges = ranges.iter().cloned().collect();
            }
        }
        entry
    }

    /// Resources typed `owl:Class`
    fn select_classes(&self) -> BTreeMap<Iri, OntologyEntry> {
        self.types
            .iter()
            .filter(|(_, types)| types.contains(OWL_CLASS))
            .map(|(iri, _)| (iri.clone(), self.entry(iri, EntryKind::Class)))
            .collect()
    }

    /// Resources typed `owl:ObjectProperty` or `owl:DatatypeProperty`
    fn select_properties(&self) -> BTreeMap<Iri, OntologyEntry> {
        self.types
            .iter()
            .filter_map(|(iri, types)| {
                let kind = if types.contains(OWL_OBJECT_PROPERTY) {
                    EntryKind::ObjectProperty
                } else if types.contains(OWL_DATATYPE_PROPERTY) {
                    EntryKind::DatatypeProperty
                } else {
                    return None;
                };
                Some((iri.clone(), self.entry(iri, kind)))
            })
            .collect()
    }
}

/// Untagged labels and `fr`/`fr-*` tags pass (SPARQL `langMatches` semantics)
fn accepts_label_language(language: Option<&str>) -> bool {
    match language {
        None => true,
        Some(tag) => {
            let tag = tag.to_ascii_lowercase();
            tag == LABEL_LANGUAGE || tag.starts_with(&format!("{LABEL_LANGUAGE}-"))
        }
    }
}

fn sorted_names<'a>(entries: impl Iterator<Item = &'a OntologyEntry>) -> Vec<String> {
    entries
        .flat_map(OntologyEntry::display_names)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ============================================================================
// Registry
// ============================================================================

/// Class and property vocabulary of one ontology, immutable once loaded
#[derive(Debug, Clone)]
pub struct OntologyRegistry {
    source: String,
    classes: BTreeMap<Iri, OntologyEntry>,
    properties: BTreeMap<Iri, OntologyEntry>,
    class_names: Vec<String>,
    property_names: Vec<String>,
    triple_count: usize,
}

impl OntologyRegistry {
    /// Load a Turtle ontology from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| OntologyError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let source = path.display().to_string();
        let statements = Statements::collect(
            &source,
            TurtleParser::new().for_reader(BufReader::new(file)),
        )?;

        Ok(Self::from_statements(source, statements))
    }

    /// Parse an in-memory Turtle ontology
    pub fn from_turtle(turtle: &str) -> Result<Self> {
        let source = "<inline>".to_string();
        let statements =
            Statements::collect(&source, TurtleParser::new().for_reader(turtle.as_bytes()))?;

        Ok(Self::from_statements(source, statements))
    }

    fn from_statements(source: String, statements: Statements) -> Self {
        let classes = statements.select_classes();
        let properties = statements.select_properties();
        let class_names = sorted_names(classes.values());
        let property_names = sorted_names(properties.values());

        info!(
            source = %source,
            triples = statements.total,
            classes = class_names.len(),
            properties = property_names.len(),
            "Ontology loaded"
        );

        Self {
            source,
            classes,
            properties,
            class_names,
            property_names,
            triple_count: statements.total,
        }
    }

    /// Sorted, deduplicated class display names
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Sorted, deduplicated property display names
    pub fn property_names(&self) -> &[String] {
        &self.property_names
    }

    /// Class entries ordered by IRI
    pub fn classes(&self) -> impl Iterator<Item = &OntologyEntry> {
        self.classes.values()
    }

    /// Property entries ordered by IRI
    pub fn properties(&self) -> impl Iterator<Item = &OntologyEntry> {
        self.properties.values()
    }

    /// Look up a class or property by IRI
    pub fn entry(&self, iri: &Iri) -> Option<&OntologyEntry> {
        self.classes.get(iri).or_else(|| self.properties.get(iri))
    }

    /// Number of statements in the parsed ontology
    pub fn triple_count(&self) -> usize {
        self.triple_count
    }

    /// Where the ontology was loaded from
    pub fn source(&self) -> &str {
        &self.source
    }
}

// ============================================================================
// Tests
// ============================================================================
