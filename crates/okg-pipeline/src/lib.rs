//! OKG Pipeline - Document to knowledge graph orchestration
//!
//! Documents are taken in discovery order and their chunks in source order.
//! Each chunk goes through the extraction client; once every chunk of a
//! document has been extracted, its candidate lines are validated into the
//! graph. The graph is saved once per output format at the end of the run.
//!
//! Author: hephaex@gmail.com

use std::path::{Path, PathBuf};

use okg_extractor::{CandidateLine, ExtractionClient};
use okg_graph::{GraphStore, RdfFormat, SaveOutcome};
use okg_ontology::OntologyRegistry;
use okg_parser::ParserError;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

pub mod report;
pub mod source;

pub use report::{FormatFailure, RunReport, WrittenFile};
pub use source::{DirectorySource, DocumentRef, DocumentSource, InMemorySource};

/// Default output file stem
pub const DEFAULT_FILE_STEM: &str = "knowledge_graph";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Cannot list documents in {path}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read document {document}")]
    Document {
        document: String,
        #[source]
        source: ParserError,
    },

    #[error("Unknown document: {0}")]
    UnknownDocument(String),
}

/// Orchestrates one extraction run
pub struct Pipeline {
    registry: OntologyRegistry,
    extractor: ExtractionClient,
    graph: GraphStore,
    file_stem: String,
}

impl Pipeline {
    pub fn new(registry: OntologyRegistry, extractor: ExtractionClient, graph: GraphStore) -> Self {
        Self {
            registry,
            extractor,
            graph,
            file_stem: DEFAULT_FILE_STEM.to_string(),
        }
    }

    pub fn with_file_stem(mut self, file_stem: impl Into<String>) -> Self {
        self.file_stem = file_stem.into();
        self
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn into_graph(self) -> GraphStore {
        self.graph
    }

    /// Process every document of `source`, then save the graph to `output_dir`
    pub async fn run(
        &mut self,
        source: &dyn DocumentSource,
        output_dir: &Path,
    ) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::new();
        let documents = source.discover()?;

        if documents.is_empty() {
            warn!("No documents found");
        } else {
            info!(documents = documents.len(), "Processing documents");
        }

        for document in &documents {
            self.process_document(source, document, &mut report).await;
        }

        info!(triples = self.graph.count(), "Extraction finished");
        self.save_all(output_dir, &mut report);
        report.finish(self.graph.count());
        Ok(report)
    }

    /// Extract and insert one document. Failures are counted, never raised.
    ///
    /// Everything logged while the document is processed carries its id.
    pub async fn process_document(
        &mut self,
        source: &dyn DocumentSource,
        document: &DocumentRef,
        report: &mut RunReport,
    ) {
        let span = info_span!("document", document = %document.id);
        self.process_document_inner(source, document, report)
            .instrument(span)
            .await
    }

    async fn process_document_inner(
        &mut self,
        source: &dyn DocumentSource,
        document: &DocumentRef,
        report: &mut RunReport,
    ) {
        let chunks = match source.chunks(document) {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable document");
                report.documents_failed += 1;
                return;
            }
        };

        if chunks.is_empty() {
            warn!("Document produced no text chunks");
            report.documents_skipped += 1;
            return;
        }

        let lines = self.process_chunks(&document.id, &chunks, report).await;

        if !lines.is_empty() {
            info!(lines = lines.len(), "Adding candidate lines to graph");
            let inserted = self.graph.insert(&lines);
            report.lines_accepted += inserted.accepted;
            report.lines_duplicate += inserted.duplicates;
            report.lines_rejected += inserted.rejected.len();
        }
        report.documents_processed += 1;
    }

    /// Extract every chunk in order; exhausted chunks contribute nothing
    pub async fn process_chunks(
        &self,
        document_id: &str,
        chunks: &[String],
        report: &mut RunReport,
    ) -> Vec<CandidateLine> {
        let mut lines = Vec::new();

        for (index, chunk) in chunks.iter().enumerate() {
            match self
                .extractor
                .try_extract(chunk, self.registry.class_names(), self.registry.property_names())
                .instrument(info_span!("chunk", chunk = index))
                .await
            {
                Ok(extraction) => {
                    report.lines_discarded += extraction.discarded;
                    lines.extend(extraction.lines);
                }
                Err(e) => {
                    warn!(document = document_id, chunk = index, error = %e, "Chunk extraction failed");
                    report.chunks_failed += 1;
                }
            }
            report.chunks_processed += 1;
        }

        lines
    }

    /// Save the graph once per format; a failing format does not stop the others
    ///
    /// `output_dir` is created first, even when nothing will be written.
    pub fn save_all(&self, output_dir: &Path, report: &mut RunReport) {
        match std::fs::create_dir_all(output_dir) {
            Ok(()) => debug!(path = %output_dir.display(), "Output directory ready"),
            Err(e) => warn!(path = %output_dir.display(), error = %e, "Cannot create output directory"),
        }

        for format in RdfFormat::ALL {
            let path = output_dir.join(format!("{}.{}", self.file_stem, format.extension()));

            match self.graph.save(&path, format) {
                Ok(SaveOutcome::Written { path, triples }) => report.written.push(WrittenFile {
                    format: format.to_string(),
                    path,
                    triples,
                }),
                Ok(SaveOutcome::SkippedEmpty) => {}
                Err(e) => {
                    warn!(%format, error = %e, "Failed to save graph");
                    report.format_failures.push(FormatFailure {
                        format: format.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}
