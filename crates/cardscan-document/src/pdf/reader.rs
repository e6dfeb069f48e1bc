// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF preflight: open and inspect the input document with `lopdf` before any
// page is rendered.

use std::path::Path;

use cardscan_core::error::{CardscanError, Result};
use lopdf::Document;
use tracing::{debug, info, instrument};

/// A parsed PDF, used to validate the input document up front.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    /// Open a PDF from the filesystem.
    ///
    /// A missing file is [`CardscanError::MissingFile`]; a file that does not
    /// parse is [`CardscanError::PdfError`]. Both abort the run.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CardscanError::MissingFile {
                what: "input document",
                path: path.to_path_buf(),
            });
        }
        info!("Opening PDF: {}", path.display());

        let document = Document::load(path).map_err(|err| {
            CardscanError::PdfError(format!("failed to open {}: {}", path.display(), err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded");

        Ok(Self { document })
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_pdf;

    #[test]
    fn counts_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.pdf");
        write_pdf(&path, 2);

        let reader = PdfReader::open(&path).unwrap();
        assert_eq!(reader.page_count(), 2);
    }

    #[test]
    fn missing_document_is_fatal() {
        let err = PdfReader::open("/no/such/cards.pdf").err().unwrap();
        assert!(matches!(err, CardscanError::MissingFile { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn corrupt_document_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 this is not a pdf").unwrap();

        let err = PdfReader::open(&path).err().unwrap();
        assert!(matches!(err, CardscanError::PdfError(_)));
        assert!(err.is_fatal());
    }
}
