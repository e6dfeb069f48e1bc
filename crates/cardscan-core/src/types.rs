// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: geometry, match results, and the per-run report.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pixel position. Signed so that offsets and shifts share the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// A rectangle in pixel space, possibly extending past the image edges.
///
/// Used both for absolute field coordinates and for label-relative data
/// offsets, where `x`/`y` are added to the detected label position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// A rectangle guaranteed to lie inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The region `offset` placed relative to `origin`: position is
    /// `origin + (offset.x, offset.y)`, size is the offset's size.
    /// Coordinates saturate at the `i64` range.
    pub fn relative_to(origin: Point, offset: &Region) -> Self {
        Self {
            x: origin.x.saturating_add(offset.x),
            y: origin.y.saturating_add(offset.y),
            width: offset.width,
            height: offset.height,
        }
    }

    /// Intersect with an image of `image_width` x `image_height`.
    ///
    /// Returns `None` when nothing of the region is left inside the image.
    /// The flag is true when the region had to be shrunk.
    pub fn clip_to(&self, image_width: u32, image_height: u32) -> Option<(PixelRect, bool)> {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = self
            .x
            .saturating_add(i64::from(self.width))
            .min(i64::from(image_width));
        let y1 = self
            .y
            .saturating_add(i64::from(self.height))
            .min(i64::from(image_height));

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        let rect = PixelRect {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        };
        let clipped = rect.width != self.width
            || rect.height != self.height
            || i64::from(rect.x) != self.x
            || i64::from(rect.y) != self.y;
        Some((rect, clipped))
    }
}

/// Outcome of locating one reference image inside a search image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Zero-mean normalized cross-correlation in [-1, 1].
    pub score: f32,
    /// Top-left corner of the best match.
    pub x: u32,
    pub y: u32,
    /// Size of the matched reference image.
    pub width: u32,
    pub height: u32,
}

impl MatchResult {
    pub fn location(&self) -> Point {
        Point::new(i64::from(self.x), i64::from(self.y))
    }
}

/// Classification of errors for skip/abort decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Missing or malformed template, config, or anchor file. Aborts the run.
    Configuration,
    /// An image, page or document could not be decoded or written.
    ReadFailure,
    /// Best score below the acceptance threshold. An expected outcome.
    LowConfidence,
    /// A rectangle fell outside the image.
    Geometry,
    /// A template match ran past its time limit.
    Timeout,
}

/// What happened to one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageStatus {
    /// Aligned and handed to the extractor.
    Aligned,
    /// The page could not be rasterized or read.
    Unreadable { detail: String },
    /// No anchor candidate reached the alignment threshold.
    AlignmentRejected { best_score: Option<f32>, threshold: f32 },
    /// Alignment or extraction failed for another reason.
    Failed { detail: String },
}

/// Per-page entry of the run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    /// 0-based page index in document order.
    pub index: usize,
    pub raw_image: Option<PathBuf>,
    pub aligned_image: Option<PathBuf>,
    pub debug_image: Option<PathBuf>,
    pub anchor: Option<MatchResult>,
    /// Index into the configured anchor candidates of the winning anchor.
    pub anchor_candidate: Option<usize>,
    pub shift: Option<Point>,
    #[serde(flatten)]
    pub status: PageStatus,
    pub fields: Vec<FieldReport>,
}

impl PageReport {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            raw_image: None,
            aligned_image: None,
            debug_image: None,
            anchor: None,
            anchor_candidate: None,
            shift: None,
            status: PageStatus::Failed {
                detail: "not processed".into(),
            },
            fields: Vec::new(),
        }
    }

    pub fn extracted_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| matches!(f.status, FieldStatus::Extracted { .. }))
            .count()
    }
}

/// What happened to one declared field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FieldStatus {
    /// A crop was written. `score` is absent for fixed-coordinate fields.
    Extracted {
        score: Option<f32>,
        clipped: bool,
        sha256: String,
    },
    /// The label search did not reach the field threshold.
    LowConfidence { best_score: Option<f32>, threshold: f32 },
    /// None of the field's label images could be used.
    NoLabelTemplates,
    /// The crop rectangle lies entirely outside the image.
    OutOfBounds { region: Region },
    /// The crop could not be written.
    WriteFailed { detail: String },
}

/// Per-field entry of the run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReport {
    pub name: String,
    pub output: Option<PathBuf>,
    #[serde(flatten)]
    pub status: FieldStatus,
}

/// Summary of a complete run, written as `report.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages: Vec<PageReport>,
}

impl RunReport {
    pub fn aligned_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.status == PageStatus::Aligned)
            .count()
    }

    pub fn extracted_fields(&self) -> usize {
        self.pages.iter().map(PageReport::extracted_count).sum()
    }
}
