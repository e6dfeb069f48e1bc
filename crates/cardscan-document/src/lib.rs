// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cardscan-document: Page rasterization, anchor alignment and field
// extraction.
//
// Provides page sources (PDF via PDFium, image files), an FFT-backed
// normalized cross-correlation matcher with best-of-N candidate selection,
// translation-only page alignment, label-relative field cropping with Otsu
// binarization, and the per-run pipeline that ties them together.

pub mod align;
pub mod extract;
pub mod image;
pub mod layout;
pub mod matching;
pub mod pdf;
pub mod pipeline;
pub mod report;
pub mod scan;
pub mod source;

#[cfg(test)]
mod test_support;

// Re-export the primary structs so callers can use `cardscan_document::Pipeline` etc.
pub use crate::align::{AnchorAligner, Alignment};
pub use crate::extract::{FieldExtractor, LabelLibrary};
pub use crate::image::processor::ImageProcessor;
pub use crate::layout::OutputLayout;
pub use crate::matching::{BestOfN, Candidate, MatchOutcome, PreparedImage};
pub use crate::pdf::rasterizer::PdfRasterizer;
pub use crate::pipeline::Pipeline;
pub use crate::source::{ImagePages, PageSource, open_source};
