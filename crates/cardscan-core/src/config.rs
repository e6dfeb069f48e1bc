// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration. One immutable value is built per run and passed by
// reference into every stage.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{CardscanError, Result};
use crate::types::Point;

/// Acceptance thresholds for template matching scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchThresholds {
    /// Minimum anchor score for a page to be aligned.
    pub alignment: f32,
    /// Minimum label score for a field to be extracted.
    pub field: f32,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            alignment: 0.6,
            field: 0.7,
        }
    }
}

/// The anchor mark used to register each page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Reference images of the same physical mark, in priority order.
    pub candidates: Vec<PathBuf>,
    /// Where the anchor's top-left corner must land after alignment.
    pub target_offset: Point,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            target_offset: Point::new(60, 150),
        }
    }
}

/// Settings for one extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rasterization resolution. Crop coordinates are in pixels at this DPI.
    pub dpi: u32,
    pub thresholds: MatchThresholds,
    pub anchor: AnchorConfig,
    /// Root of every file the run writes.
    pub output_root: PathBuf,
    /// Write `page_<n>_debug_match.png` next to each aligned page.
    pub debug: bool,
    /// TrueType font used to print the score on debug images, replacing the
    /// built-in one.
    pub debug_font: Option<PathBuf>,
    /// Upper bound for a single template match, in milliseconds.
    pub match_timeout_ms: Option<u64>,
    /// Align and extract pages concurrently once rasterized.
    pub parallel_pages: bool,
    /// Write `report.json` at the end of the run.
    pub write_report: bool,
    /// Directory containing the PDFium shared library.
    pub pdfium_library: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            thresholds: MatchThresholds::default(),
            anchor: AnchorConfig::default(),
            output_root: PathBuf::from("output_images"),
            debug: false,
            debug_font: None,
            match_timeout_ms: None,
            parallel_pages: false,
            write_report: true,
            pdfium_library: None,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file.
    ///
    /// Relative paths inside the file are resolved against the file's
    /// directory. The result is not validated; call [`Self::validate`] after
    /// applying any overrides.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CardscanError::MissingFile {
                what: "configuration file",
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&text).map_err(|err| {
            CardscanError::InvalidConfig(format!("{}: {}", path.display(), err))
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_paths(base);
        debug!(
            anchors = config.anchor.candidates.len(),
            dpi = config.dpi,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Rebase every relative path onto `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for candidate in &mut self.anchor.candidates {
            *candidate = resolve(base, candidate);
        }
        self.output_root = resolve(base, &self.output_root);
        if let Some(font) = self.debug_font.as_mut() {
            *font = resolve(base, font);
        }
        if let Some(lib) = self.pdfium_library.as_mut() {
            *lib = resolve(base, lib);
        }
    }

    /// Check the invariants every stage relies on.
    pub fn validate(&self) -> Result<()> {
        if self.dpi == 0 {
            return Err(CardscanError::InvalidConfig("dpi must be positive".into()));
        }
        for (name, value) in [
            ("alignment", self.thresholds.alignment),
            ("field", self.thresholds.field),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CardscanError::InvalidConfig(format!(
                    "{name} threshold {value} is outside [0, 1]"
                )));
            }
        }
        if self.anchor.candidates.is_empty() {
            return Err(CardscanError::InvalidConfig(
                "at least one anchor candidate image is required".into(),
            ));
        }
        if self.match_timeout_ms == Some(0) {
            return Err(CardscanError::InvalidConfig(
                "match timeout must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The per-match timeout as a `Duration`.
    pub fn match_timeout(&self) -> Option<std::time::Duration> {
        self.match_timeout_ms.map(std::time::Duration::from_millis)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
