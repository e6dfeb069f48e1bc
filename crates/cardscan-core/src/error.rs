// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for cardscan.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ErrorClass;

/// Top-level error type for all cardscan operations.
#[derive(Debug, Error)]
pub enum CardscanError {
    // -- Configuration (fatal at startup) --
    #[error("{what} not found at {}", path.display())]
    MissingFile { what: &'static str, path: PathBuf },

    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("none of the {0} anchor candidate images could be decoded")]
    NoUsableAnchors(usize),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    // -- Read / write failures (scoped to one page, candidate or field) --
    #[error("cannot read image {}: {detail}", path.display())]
    ImageRead { path: PathBuf, detail: String },

    #[error("cannot write image {}: {detail}", path.display())]
    ImageWrite { path: PathBuf, detail: String },

    #[error("page rendering failed: {0}")]
    Render(String),

    // -- Matching --
    #[error("{subject}: best match score {score:.3} is below threshold {threshold:.3}")]
    LowConfidence {
        subject: String,
        score: f32,
        threshold: f32,
    },

    #[error("no usable candidate images for {0}")]
    NoCandidates(String),

    #[error("template match for {candidate} exceeded {limit_ms} ms")]
    MatchTimedOut { candidate: String, limit_ms: u64 },

    // -- Geometry --
    #[error("geometry error: {0}")]
    Geometry(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CardscanError {
    /// Which bucket of the error taxonomy this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingFile { .. }
            | Self::InvalidTemplate(_)
            | Self::InvalidConfig(_)
            | Self::NoUsableAnchors(_)
            | Self::PdfError(_) => ErrorClass::Configuration,

            Self::ImageRead { .. }
            | Self::ImageWrite { .. }
            | Self::Render(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorClass::ReadFailure,

            Self::LowConfidence { .. } | Self::NoCandidates(_) => ErrorClass::LowConfidence,

            Self::MatchTimedOut { .. } => ErrorClass::Timeout,

            Self::Geometry(_) => ErrorClass::Geometry,
        }
    }

    /// Only configuration problems abort a run; everything else is a skip.
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Configuration
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CardscanError>;
