//! Document sources: where text chunks come from

use std::path::{Path, PathBuf};

use okg_parser::{ParserRegistry, SegmentConfig, SentenceSegmenter};
use tracing::debug;

use crate::PipelineError;

/// Identifies one document of a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// Display identifier used in logs and reports
    pub id: String,
    /// Backing file, when the document lives on disk
    pub path: Option<PathBuf>,
}

impl DocumentRef {
    pub fn named(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: None,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            id,
            path: Some(path),
        }
    }
}

/// Yields documents, then the ordered text chunks of each document
pub trait DocumentSource: Send + Sync {
    /// Documents in processing order
    fn discover(&self) -> Result<Vec<DocumentRef>, PipelineError>;

    /// Chunks of one document, in source order
    fn chunks(&self, document: &DocumentRef) -> Result<Vec<String>, PipelineError>;
}

// ============================================================================
// Directory source
// ============================================================================

/// Every supported file of one directory, sorted by file name
pub struct DirectorySource {
    dir: PathBuf,
    parsers: ParserRegistry,
    segmenter: SentenceSegmenter,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            parsers: ParserRegistry::with_defaults(),
            segmenter: SentenceSegmenter::default(),
        }
    }

    pub fn with_min_chunk_chars(mut self, min_chars: usize) -> Self {
        self.segmenter = SentenceSegmenter::new(SegmentConfig { min_chars });
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DocumentSource for DirectorySource {
    fn discover(&self) -> Result<Vec<DocumentRef>, PipelineError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| PipelineError::Discovery {
            path: self.dir.clone(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| PipelineError::Discovery {
                    path: self.dir.clone(),
                    source,
                })?
                .path();
            if path.is_file() && self.parsers.supports(&path) {
                paths.push(path);
            } else {
                debug!(path = %path.display(), "Skipping unsupported entry");
            }
        }

        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(paths.into_iter().map(DocumentRef::file).collect())
    }

    fn chunks(&self, document: &DocumentRef) -> Result<Vec<String>, PipelineError> {
        let path = document
            .path
            .clone()
            .unwrap_or_else(|| self.dir.join(&document.id));

        let parsed = self
            .parsers
            .parse(&path)
            .map_err(|source| PipelineError::Document {
                document: document.id.clone(),
                source,
            })?;

        if parsed.is_blank() {
            debug!(document = %document.id, "Document has no text");
            return Ok(Vec::new());
        }
        debug!(document = %document.id, words = parsed.word_count(), "Document parsed");

        Ok(self.segmenter.segment(&parsed.content))
    }
}

// ============================================================================
// In-memory source
// ============================================================================

/// Documents held in memory as pre-cut chunks
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    documents: Vec<(String, Vec<String>)>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document<I, S>(mut self, id: impl Into<String>, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.documents
            .push((id.into(), chunks.into_iter().map(Into::into).collect()));
        self
    }
}

impl DocumentSource for InMemorySource {
    fn discover(&self) -> Result<Vec<DocumentRef>, PipelineError> {
        Ok(self
            .documents
            .iter()
            .map(|(id, _)| DocumentRef::named(id.as_str()))
            .collect())
    }

    fn chunks(&self, document: &DocumentRef) -> Result<Vec<String>, PipelineError> {
        self.documents
            .iter()
            .find(|(id, _)| *id == document.id)
            .map(|(_, chunks)| chunks.clone())
            .ok_or_else(|| PipelineError::UnknownDocument(document.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_discovery_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_rapport.txt"), "Deux.").unwrap();
        std::fs::write(dir.path().join("a_notes.md"), "Un.").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8; 4]).unwrap();
        std::fs::create_dir(dir.path().join("sub.txt")).unwrap();

        let source = DirectorySource::new(dir.path());
        let ids: Vec<_> = source
            .discover()
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["a_notes.md", "b_rapport.txt"]);
    }

    #[test]
    fn test_directory_chunks_are_sentences() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rapport.txt"),
            "L'avion a décollé.\nLe pilote a signalé une panne.",
        )
        .unwrap();

        let source = DirectorySource::new(dir.path());
        let documents = source.discover().unwrap();
        let chunks = source.chunks(&documents[0]).unwrap();
        assert_eq!(
            chunks,
            vec!["L'avion a décollé.", "Le pilote a signalé une panne."]
        );
    }

    #[test]
    fn test_blank_document_has_no_chunks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vide.md"), " \n\t\n").unwrap();

        let source = DirectorySource::new(dir.path());
        let documents = source.discover().unwrap();
        assert_eq!(documents.len(), 1);
        assert!(source.chunks(&documents[0]).unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory_is_discovery_error() {
        let source = DirectorySource::new("/nonexistent/okg-input");
        assert!(matches!(
            source.discover(),
            Err(PipelineError::Discovery { .. })
        ));
    }

    #[test]
    fn test_in_memory_source() {
        let source = InMemorySource::new()
            .with_document("a", ["un", "deux"])
            .with_document("b", Vec::<String>::new());

        let documents = source.discover().unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(source.chunks(&documents[0]).unwrap(), vec!["un", "deux"]);
        assert!(source.chunks(&documents[1]).unwrap().is_empty());
        assert!(source.chunks(&DocumentRef::named("c")).is_err());
    }
}
