// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Field extraction: locate each declared field on an aligned page, crop it,
// and write an OCR-ready bitmap per field.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cardscan_core::config::PipelineConfig;
use cardscan_core::error::{CardscanError, Result};
use cardscan_core::template::{FieldSpec, Template};
use cardscan_core::types::{FieldReport, FieldStatus, Region};
use image::DynamicImage;
use tracing::{info, instrument, warn};

use crate::image::processor::ImageProcessor;
use crate::matching::{BestOfN, Candidate, MatchOutcome, PreparedImage};
use crate::report::fingerprint;
use crate::scan::binarize_for_ocr;

/// Decoded label images, keyed by the path the template names them by.
#[derive(Debug, Default)]
pub struct LabelLibrary {
    labels: HashMap<PathBuf, Candidate>,
}

impl LabelLibrary {
    /// Decode every label image the template refers to.
    ///
    /// Images that cannot be decoded are logged and left out; the fields
    /// that use them fall back to their remaining labels.
    #[instrument(skip_all, fields(labels = template.label_paths().len()))]
    pub fn load(template: &Template) -> Self {
        let mut labels = HashMap::new();
        for path in template.label_paths() {
            match Candidate::open(path) {
                Ok(candidate) => {
                    labels.insert(path.to_path_buf(), candidate);
                }
                Err(err) => {
                    warn!(label = %path.display(), error = %err, "Label image excluded");
                }
            }
        }
        info!(loaded = labels.len(), "Label images loaded");
        Self { labels }
    }

    pub fn from_candidates(candidates: impl IntoIterator<Item = (PathBuf, Candidate)>) -> Self {
        Self {
            labels: candidates.into_iter().collect(),
        }
    }

    /// The usable labels among `paths`, in the given order.
    pub fn candidates_for<'a>(&'a self, paths: &[PathBuf]) -> Vec<&'a Candidate> {
        paths.iter().filter_map(|p| self.labels.get(p)).collect()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Crops every template field from aligned pages.
pub struct FieldExtractor {
    matcher: BestOfN,
    template: Template,
    labels: LabelLibrary,
}

impl FieldExtractor {
    pub fn new(config: &PipelineConfig, template: Template, labels: LabelLibrary) -> Self {
        Self {
            matcher: BestOfN::new(config.thresholds.field, config.match_timeout()),
            template,
            labels,
        }
    }

    /// Extract every field of an aligned page stored on disk.
    ///
    /// Fails only when the page itself cannot be read; crops are named after
    /// the file's stem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn extract_file(&self, path: impl AsRef<Path>, fields_dir: &Path) -> Result<Vec<FieldReport>> {
        let path = path.as_ref();
        let page = ImageProcessor::open(path)?.into_dynamic();
        let base = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "page".to_owned());
        Ok(self.extract(&page, &base, fields_dir))
    }

    /// Extract every field of `aligned` into `fields_dir`.
    ///
    /// Returns one report per declared field, in declaration order. No
    /// field's failure affects another.
    pub fn extract(&self, aligned: &DynamicImage, base: &str, fields_dir: &Path) -> Vec<FieldReport> {
        // Luminance and its spectrum are computed once per page.
        let prepared = self
            .template
            .has_label_fields()
            .then(|| PreparedImage::new(&aligned.to_luma8()));

        self.template
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| {
                let output = fields_dir.join(format!("{base}_{}.png", field.file_stem(index)));
                let status = match field {
                    FieldSpec::Fixed { coordinates, .. } => {
                        self.crop_fixed(aligned, coordinates, &output)
                    }
                    FieldSpec::LabelRelative {
                        name,
                        label_templates,
                        offset,
                    } => match prepared.as_ref() {
                        Some(prepared) => self.crop_labelled(
                            aligned,
                            prepared,
                            name,
                            label_templates,
                            offset,
                            &output,
                        ),
                        None => FieldStatus::NoLabelTemplates,
                    },
                };
                log_field(field.name(), &status);

                let written = matches!(status, FieldStatus::Extracted { .. });
                FieldReport {
                    name: field.name().to_owned(),
                    output: written.then_some(output),
                    status,
                }
            })
            .collect()
    }

    // -- Per-variant extraction ------------------------------------------------

    /// Fixed rectangles are cropped as they are, without binarization.
    fn crop_fixed(&self, aligned: &DynamicImage, region: &Region, output: &Path) -> FieldStatus {
        match ImageProcessor::crop_from(aligned, region) {
            Ok((crop, clipped)) => write_crop(&crop, output, None, clipped),
            Err(_) => FieldStatus::OutOfBounds { region: *region },
        }
    }

    fn crop_labelled(
        &self,
        aligned: &DynamicImage,
        prepared: &PreparedImage,
        name: &str,
        label_templates: &[PathBuf],
        offset: &Region,
        output: &Path,
    ) -> FieldStatus {
        let candidates = self.labels.candidates_for(label_templates);
        if candidates.is_empty() {
            return FieldStatus::NoLabelTemplates;
        }

        let label = match self.matcher.search(prepared, candidates) {
            MatchOutcome::Accepted(best) => best,
            MatchOutcome::BelowThreshold(best) => {
                return FieldStatus::LowConfidence {
                    best_score: Some(best.result.score),
                    threshold: self.matcher.threshold(),
                };
            }
            MatchOutcome::NoCandidates => {
                return FieldStatus::LowConfidence {
                    best_score: None,
                    threshold: self.matcher.threshold(),
                };
            }
        };

        let region = Region::relative_to(label.result.location(), offset);
        match ImageProcessor::crop_from(aligned, &region) {
            Ok((crop, clipped)) => {
                let binary = binarize_for_ocr(crop.as_dynamic());
                let crop = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(binary));
                write_crop(&crop, output, Some(label.result.score), clipped)
            }
            Err(err) => {
                warn!(field = name, error = %err, "Field region outside page");
                FieldStatus::OutOfBounds { region }
            }
        }
    }
}

/// Encode, fingerprint and write one crop.
fn write_crop(crop: &ImageProcessor, output: &Path, score: Option<f32>, clipped: bool) -> FieldStatus {
    let written = crop.to_png_bytes().and_then(|bytes| {
        std::fs::write(output, &bytes).map_err(|err| CardscanError::ImageWrite {
            path: output.to_path_buf(),
            detail: err.to_string(),
        })?;
        Ok(fingerprint(&bytes))
    });
    match written {
        Ok(sha256) => FieldStatus::Extracted {
            score,
            clipped,
            sha256,
        },
        Err(err) => FieldStatus::WriteFailed {
            detail: err.to_string(),
        },
    }
}

fn log_field(name: &str, status: &FieldStatus) {
    match status {
        FieldStatus::Extracted { score, clipped, .. } => {
            info!(field = name, score = ?score, clipped, "Field extracted");
        }
        FieldStatus::LowConfidence {
            best_score,
            threshold,
        } => {
            info!(field = name, best_score = ?best_score, threshold, "Field label not found; skipped");
        }
        FieldStatus::NoLabelTemplates => {
            warn!(field = name, "No usable label images; skipped");
        }
        FieldStatus::OutOfBounds { region } => {
            warn!(field = name, x = region.x, y = region.y, "Field region outside page; skipped");
        }
        FieldStatus::WriteFailed { detail } => {
            warn!(field = name, detail = %detail, "Field crop not written");
        }
    }
}
