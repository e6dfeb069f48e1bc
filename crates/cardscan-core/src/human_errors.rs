// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for operators.
//
// Every technical error is mapped to a plain message with a concrete next
// step, so whoever runs a batch can re-tune templates or thresholds without
// reading the source.

use crate::error::CardscanError;

/// How an error affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The run cannot start.
    Fatal,
    /// One page, candidate or field was skipped; the run continues.
    Skipped,
    /// A normal outcome worth reporting (for example a weak match).
    Notice,
}

/// An operator-facing description of an error.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// One-line summary.
    pub message: String,
    /// What to try next.
    pub suggestion: String,
    pub severity: Severity,
}

/// Convert a `CardscanError` into a `HumanError`.
pub fn humanize_error(err: &CardscanError) -> HumanError {
    match err {
        // -- Configuration --
        CardscanError::MissingFile { what, path } => HumanError {
            message: format!("The {what} could not be found."),
            suggestion: format!("Check that {} exists and is readable.", path.display()),
            severity: Severity::Fatal,
        },

        CardscanError::InvalidTemplate(detail) => HumanError {
            message: "The field template is not valid.".into(),
            suggestion: format!(
                "Every field needs a \"kind\" of \"fixed\" or \"label_relative\", a name, and a non-empty rectangle. ({detail})"
            ),
            severity: Severity::Fatal,
        },

        CardscanError::InvalidConfig(detail) => HumanError {
            message: "The configuration is not valid.".into(),
            suggestion: format!("Fix the configuration file or command-line flags. ({detail})"),
            severity: Severity::Fatal,
        },

        CardscanError::NoUsableAnchors(count) => HumanError {
            message: "None of the anchor images could be opened.".into(),
            suggestion: format!(
                "All {count} anchor candidates failed to decode. Re-export them as PNG files."
            ),
            severity: Severity::Fatal,
        },

        // -- Read / write --
        CardscanError::ImageRead { path, .. } => HumanError {
            message: format!("The image {} could not be read.", path.display()),
            suggestion: "The file may be damaged or in an unsupported format. This item was skipped.".into(),
            severity: Severity::Skipped,
        },

        CardscanError::ImageWrite { path, .. } => HumanError {
            message: format!("The image {} could not be written.", path.display()),
            suggestion: "Check free disk space and permissions on the output directory.".into(),
            severity: Severity::Skipped,
        },

        CardscanError::PdfError(_) => HumanError {
            message: "There's a problem with the PDF document.".into(),
            suggestion: "Open the file in a PDF viewer to check it is intact, or rasterize it to images and pass the directory instead.".into(),
            severity: Severity::Fatal,
        },

        CardscanError::Render(_) => HumanError {
            message: "A page could not be rendered.".into(),
            suggestion: "Check that the PDFium library is installed (see --pdfium-library). This page was skipped.".into(),
            severity: Severity::Skipped,
        },

        // -- Matching --
        CardscanError::LowConfidence {
            subject,
            score,
            threshold,
        } => HumanError {
            message: format!("{subject} did not match well enough ({score:.3} < {threshold:.3})."),
            suggestion: "Add a better reference image for this mark, or lower the threshold if the scans are noisy.".into(),
            severity: Severity::Notice,
        },

        CardscanError::NoCandidates(subject) => HumanError {
            message: format!("There were no usable reference images for {subject}."),
            suggestion: "Check the reference image paths in the template or configuration.".into(),
            severity: Severity::Skipped,
        },

        CardscanError::MatchTimedOut {
            candidate,
            limit_ms,
        } => HumanError {
            message: format!("Matching {candidate} took longer than {limit_ms} ms."),
            suggestion: "Crop the reference image more tightly, lower the DPI, or raise the match timeout.".into(),
            severity: Severity::Skipped,
        },

        // -- Geometry --
        CardscanError::Geometry(detail) => HumanError {
            message: "A crop rectangle fell outside the page.".into(),
            suggestion: format!("Check the field offsets against the page size at the configured DPI. ({detail})"),
            severity: Severity::Skipped,
        },

        // -- Storage --
        CardscanError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "Permission was denied while reading or writing a file.".into(),
                    suggestion: "Check the permissions on the input files and the output directory.".into(),
                    severity: Severity::Skipped,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: format!("Try again. If this keeps happening, check the disk. ({io_err})"),
                    severity: Severity::Skipped,
                }
            }
        }

        CardscanError::Serialization(_) => HumanError {
            message: "A JSON file could not be read or written.".into(),
            suggestion: "Validate the JSON syntax of the template and configuration files.".into(),
            severity: Severity::Skipped,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_template_is_fatal_and_names_path() {
        let err = CardscanError::MissingFile {
            what: "template file",
            path: PathBuf::from("cards/template.json"),
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Fatal);
        assert!(human.suggestion.contains("cards/template.json"));
    }

    #[test]
    fn low_confidence_is_a_notice() {
        let err = CardscanError::LowConfidence {
            subject: "anchor on page 2".into(),
            score: 0.42,
            threshold: 0.6,
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Notice);
        assert!(human.message.contains("0.420"));
    }

    #[test]
    fn severity_agrees_with_error_class() {
        let errors = [
            CardscanError::NoUsableAnchors(1),
            CardscanError::PdfError("x".into()),
            CardscanError::Render("x".into()),
            CardscanError::Io(std::io::Error::other("x")),
            CardscanError::NoCandidates("x".into()),
        ];
        for err in &errors {
            let fatal = humanize_error(err).severity == Severity::Fatal;
            assert_eq!(fatal, err.is_fatal(), "{err}");
        }
    }

    #[test]
    fn geometry_is_skipped() {
        let human = humanize_error(&CardscanError::Geometry("x".into()));
        assert_eq!(human.severity, Severity::Skipped);
    }
}
