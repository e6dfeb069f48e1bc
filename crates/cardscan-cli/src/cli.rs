// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments and how they override the configuration file.

use std::path::PathBuf;

use cardscan_core::config::PipelineConfig;
use cardscan_core::error::Result;
use cardscan_core::types::Point;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "cardscan", version)]
#[command(about = "Align scanned card forms and cut out OCR-ready field images", long_about = None)]
pub struct Cli {
    #[arg(
        value_name = "INPUT",
        help = "PDF document, page image, or directory of page images"
    )]
    pub input: PathBuf,

    #[arg(short, long, value_name = "FILE", help = "Field template (JSON)")]
    pub template: PathBuf,

    #[arg(short, long, value_name = "FILE", help = "Pipeline configuration (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(short, long, value_name = "DIR", help = "Output root directory")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Rasterization resolution")]
    pub dpi: Option<u32>,

    #[arg(long, value_name = "T", help = "Minimum anchor score, 0 to 1")]
    pub alignment_threshold: Option<f32>,

    #[arg(long, value_name = "T", help = "Minimum field label score, 0 to 1")]
    pub field_threshold: Option<f32>,

    #[arg(
        long = "anchor",
        value_name = "FILE",
        help = "Anchor candidate image; repeat in priority order (replaces configured anchors)"
    )]
    pub anchors: Vec<PathBuf>,

    #[arg(long, requires = "target_y", allow_negative_numbers = true, help = "Target anchor x position")]
    pub target_x: Option<i64>,

    #[arg(long, requires = "target_x", allow_negative_numbers = true, help = "Target anchor y position")]
    pub target_y: Option<i64>,

    #[arg(long, help = "Write annotated anchor match images")]
    pub debug: bool,

    #[arg(long, value_name = "FILE", help = "TrueType font for debug score labels")]
    pub debug_font: Option<PathBuf>,

    #[arg(long, help = "Align and extract pages in parallel")]
    pub parallel: bool,

    #[arg(long, value_name = "MS", help = "Time limit for a single template match")]
    pub match_timeout_ms: Option<u64>,

    #[arg(long, value_name = "DIR", help = "Directory containing the PDFium library")]
    pub pdfium_library: Option<PathBuf>,

    #[arg(long, help = "Do not write report.json")]
    pub no_report: bool,

    #[arg(short, long, help = "Debug-level logging")]
    pub verbose: bool,
}

impl Cli {
    /// Build the run configuration: file (or defaults), then flags, then
    /// validation.
    pub fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Flags win over the configuration file.
    pub fn apply_overrides(&self, config: &mut PipelineConfig) {
        if let Some(output) = &self.output {
            config.output_root = output.clone();
        }
        if let Some(dpi) = self.dpi {
            config.dpi = dpi;
        }
        if let Some(t) = self.alignment_threshold {
            config.thresholds.alignment = t;
        }
        if let Some(t) = self.field_threshold {
            config.thresholds.field = t;
        }
        if !self.anchors.is_empty() {
            config.anchor.candidates = self.anchors.clone();
        }
        if let (Some(x), Some(y)) = (self.target_x, self.target_y) {
            config.anchor.target_offset = Point::new(x, y);
        }
        if self.debug {
            config.debug = true;
        }
        if let Some(font) = &self.debug_font {
            config.debug_font = Some(font.clone());
        }
        if self.parallel {
            config.parallel_pages = true;
        }
        if let Some(ms) = self.match_timeout_ms {
            config.match_timeout_ms = Some(ms);
        }
        if let Some(lib) = &self.pdfium_library {
            config.pdfium_library = Some(lib.clone());
        }
        if self.no_report {
            config.write_report = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "cardscan",
            "cards.pdf",
            "--template",
            "template.json",
            "--anchor",
            "a.png",
            "--anchor",
            "b.png",
            "--dpi",
            "200",
            "--field-threshold",
            "0.8",
            "--target-x",
            "-5",
            "--target-y",
            "40",
            "--parallel",
            "--no-report",
        ])
        .unwrap();

        let config = cli.load_config().unwrap();
        assert_eq!(config.dpi, 200);
        assert_eq!(config.thresholds.field, 0.8);
        assert_eq!(config.thresholds.alignment, 0.6);
        assert_eq!(config.anchor.candidates, [PathBuf::from("a.png"), PathBuf::from("b.png")]);
        assert_eq!(config.anchor.target_offset, Point::new(-5, 40));
        assert!(config.parallel_pages);
        assert!(!config.write_report);
    }

    #[test]
    fn target_needs_both_coordinates() {
        let parsed = Cli::try_parse_from([
            "cardscan",
            "cards.pdf",
            "--template",
            "t.json",
            "--target-x",
            "10",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn config_file_is_overridden_by_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cardscan.json");
        std::fs::write(
            &path,
            r#"{ "dpi": 150, "anchor": { "candidates": ["anchor.png"] } }"#,
        )
        .unwrap();

        let config_arg = path.to_string_lossy().into_owned();
        let cli = Cli::try_parse_from([
            "cardscan",
            "scans",
            "--template",
            "t.json",
            "--config",
            config_arg.as_str(),
            "--alignment-threshold",
            "0.5",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.dpi, 150);
        assert_eq!(config.thresholds.alignment, 0.5);
        assert_eq!(config.anchor.candidates, [dir.path().join("anchor.png")]);
    }

    #[test]
    fn invalid_override_is_a_configuration_error() {
        let cli = Cli::try_parse_from([
            "cardscan",
            "cards.pdf",
            "--template",
            "t.json",
            "--anchor",
            "a.png",
            "--alignment-threshold",
            "1.5",
        ])
        .unwrap();
        let err = cli.load_config().unwrap_err();
        assert!(err.is_fatal());
    }
}
