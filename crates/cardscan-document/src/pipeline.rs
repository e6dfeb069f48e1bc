// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Run driver: rasterize every page, align it, extract its fields, and record
// the outcome of each unit of work in a run report.

use ab_glyph::FontVec;
use cardscan_core::config::PipelineConfig;
use cardscan_core::error::{CardscanError, Result};
use cardscan_core::human_errors::{Severity, humanize_error};
use cardscan_core::template::Template;
use cardscan_core::types::{PageReport, PageStatus, RunId, RunReport};
use chrono::Utc;
use image::DynamicImage;
use rayon::prelude::*;
use tracing::{info, instrument, warn};

use crate::align::{AnchorAligner, annotate_match, load_debug_font};
use crate::extract::{FieldExtractor, LabelLibrary};
use crate::image::processor::ImageProcessor;
use crate::layout::OutputLayout;
use crate::matching::Candidate;
use crate::report::write_report;
use crate::source::PageSource;

/// Everything a run needs, checked and loaded up front.
pub struct Pipeline {
    config: PipelineConfig,
    layout: OutputLayout,
    aligner: AnchorAligner,
    /// Configured index of each decoded anchor candidate.
    anchor_origin: Vec<usize>,
    extractor: FieldExtractor,
    /// Score overlay font, loaded only in debug mode.
    font: Option<FontVec>,
}

impl Pipeline {
    /// Perform every fatal startup check and load shared resources.
    ///
    /// Fails when the configuration is invalid, an anchor file is missing,
    /// no anchor decodes, the debug font is unusable, or the output
    /// directories cannot be created.
    #[instrument(skip_all, fields(anchors = config.anchor.candidates.len(), field_count = template.fields.len()))]
    pub fn prepare(config: &PipelineConfig, template: &Template) -> Result<Self> {
        config.validate()?;
        template.validate()?;

        for path in &config.anchor.candidates {
            if !path.is_file() {
                return Err(CardscanError::MissingFile {
                    what: "anchor image",
                    path: path.clone(),
                });
            }
        }

        let mut anchors = Vec::new();
        let mut anchor_origin = Vec::new();
        for (index, path) in config.anchor.candidates.iter().enumerate() {
            match Candidate::open(path) {
                Ok(candidate) => {
                    anchors.push(candidate);
                    anchor_origin.push(index);
                }
                Err(err) => warn!(anchor = %path.display(), error = %err, "Anchor candidate excluded"),
            }
        }
        if anchors.is_empty() {
            return Err(CardscanError::NoUsableAnchors(config.anchor.candidates.len()));
        }

        let labels = LabelLibrary::load(template);
        if template.has_label_fields() && labels.is_empty() {
            warn!("No label image could be decoded; label-relative fields will be skipped");
        }
        let font = config
            .debug
            .then(|| load_debug_font(config.debug_font.as_deref()))
            .transpose()?;

        let layout = OutputLayout::new(&config.output_root);
        layout.create().map_err(|err| {
            CardscanError::InvalidConfig(format!(
                "cannot create output directory {}: {err}",
                layout.root().display()
            ))
        })?;

        info!(
            anchors = anchors.len(),
            labels = labels.len(),
            output = %layout.root().display(),
            "Pipeline ready"
        );

        Ok(Self {
            aligner: AnchorAligner::new(config, anchors),
            anchor_origin,
            extractor: FieldExtractor::new(config, template.clone(), labels),
            layout,
            font,
            config: config.clone(),
        })
    }

    /// Process every page of `source` in document order.
    ///
    /// Per-page and per-field failures are recorded in the report and never
    /// stop the run. The report lists pages by index whether or not pages
    /// were processed in parallel.
    #[instrument(skip_all, fields(source = %source.describe()))]
    pub fn run(&self, source: &dyn PageSource) -> Result<RunReport> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let count = source.page_count();
        info!(%run_id, pages = count, parallel = self.config.parallel_pages, "Run started");

        let pages: Vec<PageReport> = if self.config.parallel_pages {
            // Rendering stays on this thread; the source need not be shared.
            // One batch per pool width bounds the pages held in memory.
            let batch = rayon::current_num_threads().max(1);
            let indices: Vec<usize> = (0..count).collect();
            let mut pages = Vec::with_capacity(count);
            for chunk in indices.chunks(batch) {
                let rasterized: Vec<_> = chunk.iter().map(|&i| self.rasterize(source, i)).collect();
                let processed: Vec<PageReport> = rasterized
                    .into_par_iter()
                    .map(|(report, raw)| self.process_page(report, raw))
                    .collect();
                pages.extend(processed);
            }
            pages
        } else {
            (0..count)
                .map(|i| {
                    let (report, raw) = self.rasterize(source, i);
                    self.process_page(report, raw)
                })
                .collect()
        };

        let report = RunReport {
            run_id,
            source: source.describe(),
            started_at,
            finished_at: Utc::now(),
            pages,
        };

        if self.config.write_report
            && let Err(err) = write_report(&report, &self.layout.report_path())
        {
            warn!(error = %err, "Run report not written");
        }

        info!(
            %run_id,
            pages = report.pages.len(),
            aligned = report.aligned_pages(),
            fields = report.extracted_fields(),
            "Run finished"
        );
        Ok(report)
    }

    // -- Per-page stages ------------------------------------------------------

    /// Render page `index` and write it as `page_<n>.png`.
    fn rasterize(&self, source: &dyn PageSource, index: usize) -> (PageReport, Option<DynamicImage>) {
        let mut report = PageReport::new(index);
        let raw = match source.render_page(index, self.config.dpi) {
            Ok(raw) => raw,
            Err(err) => {
                skip_page(index, &err);
                report.status = PageStatus::Unreadable {
                    detail: err.to_string(),
                };
                return (report, None);
            }
        };

        let path = self.layout.raw_page(index);
        let processor = ImageProcessor::from_dynamic(raw);
        match processor.save(&path) {
            Ok(()) => report.raw_image = Some(path),
            Err(err) => warn!(page = index, error = %err, "Raw page not written"),
        }
        (report, Some(processor.into_dynamic()))
    }

    /// Align one rendered page and extract its fields.
    #[instrument(skip_all, fields(page = report.index))]
    fn process_page(&self, mut report: PageReport, raw: Option<DynamicImage>) -> PageReport {
        let Some(raw) = raw else {
            return report;
        };
        let index = report.index;

        let alignment = match self.aligner.align(&raw) {
            Ok(alignment) => alignment,
            Err(CardscanError::LowConfidence {
                score, threshold, ..
            }) => {
                info!(page = index, score, threshold, "Page rejected: anchor not found");
                report.status = PageStatus::AlignmentRejected {
                    best_score: Some(score),
                    threshold,
                };
                return report;
            }
            Err(err @ CardscanError::NoCandidates(_)) => {
                skip_page(index, &err);
                report.status = PageStatus::AlignmentRejected {
                    best_score: None,
                    threshold: self.config.thresholds.alignment,
                };
                return report;
            }
            Err(err) => {
                skip_page(index, &err);
                report.status = PageStatus::Failed {
                    detail: err.to_string(),
                };
                return report;
            }
        };

        report.anchor = Some(alignment.anchor.result);
        report.anchor_candidate = self.anchor_origin.get(alignment.anchor.candidate).copied();
        report.shift = Some(alignment.shift);

        if let Some(font) = &self.font {
            let annotated = annotate_match(&raw, &alignment.anchor.result, font);
            let path = self.layout.debug_page(index);
            match ImageProcessor::from_dynamic(DynamicImage::ImageRgb8(annotated)).save(&path) {
                Ok(()) => report.debug_image = Some(path),
                Err(err) => warn!(page = index, error = %err, "Debug image not written"),
            }
        }

        let aligned_path = self.layout.aligned_page(index);
        let aligned = ImageProcessor::from_dynamic(DynamicImage::ImageRgb8(alignment.image));
        if let Err(err) = aligned.save(&aligned_path) {
            skip_page(index, &err);
            report.status = PageStatus::Failed {
                detail: err.to_string(),
            };
            return report;
        }
        report.aligned_image = Some(aligned_path);

        let base = format!("page_{index}_aligned");
        report.fields = self
            .extractor
            .extract(aligned.as_dynamic(), &base, &self.layout.fields_dir());
        report.status = PageStatus::Aligned;

        info!(
            page = index,
            extracted = report.extracted_count(),
            declared = report.fields.len(),
            "Page done"
        );
        report
    }
}

fn skip_page(index: usize, err: &CardscanError) {
    let human = humanize_error(err);
    match human.severity {
        Severity::Notice => info!(
            page = index,
            error = %err,
            suggestion = %human.suggestion,
            "{}",
            human.message
        ),
        Severity::Fatal | Severity::Skipped => warn!(
            page = index,
            error = %err,
            suggestion = %human.suggestion,
            "{}",
            human.message
        ),
    }
}
