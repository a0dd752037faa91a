//! PDF document parser using pdf-extract
//!
//! Extracts the text layer of a PDF. Layout is discarded: the segmenter
//! normalizes whitespace anyway.
//!
//! Author: hephaex@gmail.com

use std::path::Path;

use tracing::debug;

use crate::{DocumentParser, FileType, ParsedDocument, ParserError, Result};

/// PDF document parser
pub struct PdfParser {
    /// Drop lines that only hold a page number
    pub strip_page_numbers: bool,
}

impl PdfParser {
    /// Create a new PDF parser with default settings
    pub fn new() -> Self {
        Self {
            strip_page_numbers: true,
        }
    }

    /// Keep or drop bare page-number lines
    pub fn with_page_number_stripping(mut self, enabled: bool) -> Self {
        self.strip_page_numbers = enabled;
        self
    }

    /// Extract text from a PDF file
    fn extract_text(&self, path: &Path) -> Result<(String, Option<u32>)> {
        let bytes = std::fs::read(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        let text = pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| ParserError::PdfError(e.to_string()))?;

        // Page breaks survive as form feeds
        let page_count = text.matches('\x0C').count() as u32;
        let page_count = if page_count > 0 {
            Some(page_count + 1)
        } else {
            None
        };

        Ok((text, page_count))
    }

    fn clean(&self, text: &str) -> String {
        text.lines()
            .map(|line| line.trim_matches('\x0C'))
            .filter(|line| !(self.strip_page_numbers && is_page_number(line)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn is_page_number(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.len() <= 4 && trimmed.chars().all(|c| c.is_ascii_digit())
}

impl Default for PdfParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for PdfParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let (text, page_count) = self.extract_text(path)?;
        let content = self.clean(&text);

        debug!(path = %path.display(), pages = ?page_count, chars = content.len(), "PDF text extracted");

        let mut doc = ParsedDocument::new(path.display().to_string(), FileType::Pdf)
            .with_content(content);
        doc.page_count = page_count;
        Ok(doc)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Pdf]
    }
}
