// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Anchor alignment: locate the reference mark on a raw page and translate the
// page so the mark lands on the canonical target position.

use std::path::Path;

use ab_glyph::{Font, FontVec, PxScale};
use cardscan_core::config::PipelineConfig;
use cardscan_core::error::{CardscanError, Result};
use cardscan_core::types::{MatchResult, Point};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::rect::Rect;
use tracing::{debug, info, instrument};

use crate::matching::{BestMatch, BestOfN, Candidate, MatchOutcome, PreparedImage};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const MARK_COLOUR: Rgb<u8> = Rgb([0, 170, 0]);

// Embedded font for the score overlay
const DEFAULT_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSansMono.ttf");

/// A page whose anchor now sits at the target offset.
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Translated page, same size as the raw page.
    pub image: RgbImage,
    /// Translation applied: target minus detected anchor position.
    pub shift: Point,
    /// The winning anchor candidate and where it was found on the raw page.
    pub anchor: BestMatch,
}

/// Registers pages against a fixed set of anchor candidates.
pub struct AnchorAligner {
    matcher: BestOfN,
    target: Point,
    candidates: Vec<Candidate>,
}

impl AnchorAligner {
    /// Build an aligner from decoded anchor candidates, kept in priority order.
    pub fn new(config: &PipelineConfig, candidates: Vec<Candidate>) -> Self {
        Self {
            matcher: BestOfN::new(config.thresholds.alignment, config.match_timeout()),
            target: config.anchor.target_offset,
            candidates,
        }
    }

    /// Align one raw page.
    ///
    /// A best score under the alignment threshold is reported as
    /// [`CardscanError::LowConfidence`]; no aligned image is produced.
    #[instrument(skip_all, fields(width = raw.width(), height = raw.height()))]
    pub fn align(&self, raw: &DynamicImage) -> Result<Alignment> {
        let prepared = PreparedImage::new(&raw.to_luma8());

        let anchor = match self.matcher.search(&prepared, &self.candidates) {
            MatchOutcome::Accepted(best) => best,
            MatchOutcome::BelowThreshold(best) => {
                return Err(CardscanError::LowConfidence {
                    subject: "anchor".into(),
                    score: best.result.score,
                    threshold: self.matcher.threshold(),
                });
            }
            MatchOutcome::NoCandidates => {
                return Err(CardscanError::NoCandidates("anchor".into()));
            }
        };

        let shift = shift_to_target(anchor.result.location(), self.target);
        info!(
            score = anchor.result.score,
            anchor_x = anchor.result.x,
            anchor_y = anchor.result.y,
            shift_x = shift.x,
            shift_y = shift.y,
            "Anchor located"
        );

        Ok(Alignment {
            image: translate(raw, shift),
            shift,
            anchor,
        })
    }
}

/// The translation that moves `detected` onto `target`.
pub fn shift_to_target(detected: Point, target: Point) -> Point {
    Point::new(
        target.x.saturating_sub(detected.x),
        target.y.saturating_sub(detected.y),
    )
}

/// Translate `raw` by `shift`, keeping its size and filling exposed borders
/// with white. Integer shifts are sampled nearest-neighbour, so pixels are
/// moved without resampling.
pub fn translate(raw: &DynamicImage, shift: Point) -> RgbImage {
    let rgb = raw.to_rgb8();
    if shift == Point::default() {
        return rgb;
    }

    let projection = Projection::translate(shift.x as f32, shift.y as f32);
    let mut out = RgbImage::new(rgb.width(), rgb.height());
    warp_into(&rgb, &projection, Interpolation::Nearest, WHITE, &mut out);
    debug!(shift_x = shift.x, shift_y = shift.y, "Page translated");
    out
}

/// Copy of `raw` with the matched anchor outlined and its score printed
/// above the rectangle (below it when the match touches the top edge).
pub fn annotate_match(raw: &DynamicImage, found: &MatchResult, font: &impl Font) -> RgbImage {
    let mut canvas = raw.to_rgb8();
    let (x, y) = (found.x as i32, found.y as i32);

    draw_hollow_rect_mut(
        &mut canvas,
        Rect::at(x, y).of_size(found.width, found.height),
        MARK_COLOUR,
    );
    if found.width > 2 && found.height > 2 {
        draw_hollow_rect_mut(
            &mut canvas,
            Rect::at(x + 1, y + 1).of_size(found.width - 2, found.height - 2),
            MARK_COLOUR,
        );
    }

    let scale = PxScale::from(24.0);
    let text_y = if y >= 28 { y - 28 } else { y + found.height as i32 + 4 };
    let text = format!("{:.3}", found.score);
    draw_text_mut(&mut canvas, MARK_COLOUR, x, text_y, scale, font, &text);

    canvas
}

/// Font for debug annotations: the TrueType file at `path`, or the embedded
/// DejaVu Sans Mono when none is configured.
pub fn load_debug_font(path: Option<&Path>) -> Result<FontVec> {
    let Some(path) = path else {
        return FontVec::try_from_vec(DEFAULT_FONT.to_vec()).map_err(|err| {
            CardscanError::InvalidConfig(format!("embedded debug font: {err}"))
        });
    };
    if !path.is_file() {
        return Err(CardscanError::MissingFile {
            what: "debug font",
            path: path.to_path_buf(),
        });
    }
    let bytes = std::fs::read(path)?;
    FontVec::try_from_vec(bytes).map_err(|err| {
        CardscanError::InvalidConfig(format!("debug font {}: {err}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{noise, stamp, white_page};
    use cardscan_core::config::AnchorConfig;

    fn config(target: Point) -> PipelineConfig {
        PipelineConfig {
            anchor: AnchorConfig {
                candidates: Vec::new(),
                target_offset: target,
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn anchor_at_target_gives_zero_shift_and_identical_page() {
        let anchor = noise(48, 32, 21);
        let mut page = white_page(1000, 1500);
        stamp(&mut page, &anchor, 60, 150);
        let raw = DynamicImage::ImageRgb8(page.clone());

        let aligner = AnchorAligner::new(
            &config(Point::new(60, 150)),
            vec![Candidate::from_image("anchor", anchor)],
        );
        let aligned = aligner.align(&raw).unwrap();

        assert!(aligned.anchor.result.score > 0.99);
        assert_eq!(aligned.shift, Point::new(0, 0));
        assert_eq!(aligned.image, page);
    }

    #[test]
    fn displaced_anchor_is_moved_to_target() {
        let anchor = noise(40, 30, 22);
        let mut page = white_page(400, 500);
        stamp(&mut page, &anchor, 100, 200);
        let raw = DynamicImage::ImageRgb8(page.clone());

        let aligner = AnchorAligner::new(
            &config(Point::new(60, 150)),
            vec![Candidate::from_image("anchor", anchor.clone())],
        );
        let aligned = aligner.align(&raw).unwrap();

        assert_eq!(aligned.shift, Point::new(-40, -50));
        assert_eq!(aligned.image.dimensions(), (400, 500));
        for (x, y, p) in anchor.enumerate_pixels() {
            let v = p.0[0];
            assert_eq!(*aligned.image.get_pixel(60 + x, 150 + y), Rgb([v, v, v]));
        }
        // Exposed right and bottom borders are white.
        assert_eq!(*aligned.image.get_pixel(399, 250), WHITE);
        assert_eq!(*aligned.image.get_pixel(200, 499), WHITE);
    }

    #[test]
    fn weak_anchor_is_rejected() {
        let mut page = white_page(300, 300);
        stamp(&mut page, &noise(40, 40, 23), 50, 50);
        let raw = DynamicImage::ImageRgb8(page);

        let aligner = AnchorAligner::new(
            &config(Point::new(60, 150)),
            vec![Candidate::from_image("foreign", noise(30, 30, 24))],
        );
        match aligner.align(&raw) {
            Err(CardscanError::LowConfidence { score, threshold, .. }) => {
                assert!(score < threshold);
                assert_eq!(threshold, 0.6);
            }
            other => panic!("expected low confidence, got {other:?}"),
        }
    }

    #[test]
    fn no_usable_candidate_is_reported() {
        let raw = DynamicImage::ImageRgb8(white_page(50, 50));
        let aligner = AnchorAligner::new(
            &config(Point::new(0, 0)),
            vec![Candidate::from_image("huge", noise(80, 80, 1))],
        );
        assert!(matches!(
            aligner.align(&raw),
            Err(CardscanError::NoCandidates(_))
        ));
    }

    #[test]
    fn shift_is_target_minus_detected() {
        assert_eq!(
            shift_to_target(Point::new(100, 200), Point::new(60, 150)),
            Point::new(-40, -50)
        );
    }

    #[test]
    fn annotation_outlines_match_and_prints_score() {
        let raw = DynamicImage::ImageRgb8(white_page(200, 100));
        let found = MatchResult {
            score: 0.9,
            x: 10,
            y: 40,
            width: 30,
            height: 15,
        };
        let font = load_debug_font(None).unwrap();
        let annotated = annotate_match(&raw, &found, &font);
        assert_eq!(*annotated.get_pixel(10, 40), MARK_COLOUR);
        assert_eq!(*annotated.get_pixel(11, 41), MARK_COLOUR);
        assert_eq!(*annotated.get_pixel(25, 47), WHITE);

        // Score text sits in the band above the rectangle.
        let inked = (12..40)
            .flat_map(|y| (10..100).map(move |x| (x, y)))
            .filter(|&(x, y)| *annotated.get_pixel(x, y) != WHITE)
            .count();
        assert!(inked > 20, "expected score text above the match, found {inked} pixels");
    }

    #[test]
    fn missing_font_is_a_configuration_error() {
        let err = load_debug_font(Some(Path::new("/no/such/font.ttf"))).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn unparseable_font_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("font.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        let err = load_debug_font(Some(&path)).unwrap_err();
        assert!(matches!(err, CardscanError::InvalidConfig(_)));
    }
}
