//! Run report

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A file produced by the final save
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub format: String,
    pub path: PathBuf,
    pub triples: usize,
}

/// A format whose save failed; other formats were still attempted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatFailure {
    pub format: String,
    pub error: String,
}

/// Counters and outcomes of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub documents_processed: usize,
    /// Documents that produced no chunk
    pub documents_skipped: usize,
    /// Documents whose text could not be read
    pub documents_failed: usize,
    pub chunks_processed: usize,
    /// Chunks whose extraction exhausted its retries
    pub chunks_failed: usize,
    /// Response lines dropped by the shape check
    pub lines_discarded: usize,
    pub lines_accepted: usize,
    pub lines_duplicate: usize,
    pub lines_rejected: usize,
    /// Final graph size
    pub triples: usize,
    pub written: Vec<WrittenFile>,
    pub format_failures: Vec<FormatFailure>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            documents_processed: 0,
            documents_skipped: 0,
            documents_failed: 0,
            chunks_processed: 0,
            chunks_failed: 0,
            lines_discarded: 0,
            lines_accepted: 0,
            lines_duplicate: 0,
            lines_rejected: 0,
            triples: 0,
            written: Vec::new(),
            format_failures: Vec::new(),
        }
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether some document, chunk or format failed
    pub fn has_partial_failures(&self) -> bool {
        self.documents_failed > 0 || self.chunks_failed > 0 || !self.format_failures.is_empty()
    }

    pub fn finish(&mut self, triples: usize) {
        self.triples = triples;
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration in milliseconds, once finished
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}
