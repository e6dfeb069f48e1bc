// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Best-of-N matching: try several reference images of the same mark and keep
// the strongest placement.

use std::path::Path;
use std::time::Duration;

use cardscan_core::error::Result;
use cardscan_core::types::MatchResult;
use image::GrayImage;
use tracing::{debug, instrument, warn};

use super::ncc::{MatchBudget, PreparedImage, match_template};
use crate::image::processor::ImageProcessor;

/// One decoded reference image.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Where the image came from; used in logs and reports.
    pub label: String,
    pub image: GrayImage,
}

impl Candidate {
    /// Decode a reference image from disk into luminance.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = ImageProcessor::open(path)?.luma();
        Ok(Self {
            label: path.display().to_string(),
            image,
        })
    }

    pub fn from_image(label: impl Into<String>, image: GrayImage) -> Self {
        Self {
            label: label.into(),
            image,
        }
    }
}

/// The winning candidate of a search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestMatch {
    /// Position of the winner in the candidate list.
    pub candidate: usize,
    pub result: MatchResult,
}

/// Result of a best-of-N search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchOutcome {
    /// The best score reached the threshold.
    Accepted(BestMatch),
    /// Candidates were evaluated but none reached the threshold.
    BelowThreshold(BestMatch),
    /// No candidate could be evaluated at all.
    NoCandidates,
}

impl MatchOutcome {
    pub fn best(&self) -> Option<&BestMatch> {
        match self {
            Self::Accepted(best) | Self::BelowThreshold(best) => Some(best),
            Self::NoCandidates => None,
        }
    }

    pub fn best_score(&self) -> Option<f32> {
        self.best().map(|b| b.result.score)
    }

    pub fn accepted(&self) -> Option<&BestMatch> {
        match self {
            Self::Accepted(best) => Some(best),
            _ => None,
        }
    }
}

/// Evaluates candidates in order and applies an acceptance threshold.
#[derive(Debug, Clone, Copy)]
pub struct BestOfN {
    threshold: f32,
    timeout: Option<Duration>,
}

impl BestOfN {
    pub fn new(threshold: f32, timeout: Option<Duration>) -> Self {
        Self { threshold, timeout }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Match every candidate against `image` and keep the highest score.
    ///
    /// Ties go to the earlier candidate. A candidate that cannot be matched
    /// (too large, timed out) is logged and left out; the search only yields
    /// `NoCandidates` when every one of them fails.
    #[instrument(skip_all, fields(threshold = self.threshold))]
    pub fn search<'a>(
        &self,
        image: &PreparedImage,
        candidates: impl IntoIterator<Item = &'a Candidate>,
    ) -> MatchOutcome {
        self.select(candidates, |candidate| {
            let budget = self.timeout.map(MatchBudget::start);
            match_template(image, &candidate.image, budget)
        })
    }

    /// Candidate loop shared by every search: `score` locates one candidate.
    fn select<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a Candidate>,
        mut score: impl FnMut(&Candidate) -> Result<MatchResult>,
    ) -> MatchOutcome {
        let mut best: Option<BestMatch> = None;

        for (index, candidate) in candidates.into_iter().enumerate() {
            match score(candidate) {
                Ok(result) => {
                    debug!(candidate = %candidate.label, score = result.score, "Candidate scored");
                    if best.is_none_or(|b| result.score > b.result.score) {
                        best = Some(BestMatch {
                            candidate: index,
                            result,
                        });
                    }
                }
                Err(err) => {
                    warn!(candidate = %candidate.label, error = %err, "Candidate skipped");
                }
            }
        }

        match best {
            None => MatchOutcome::NoCandidates,
            Some(best) if best.result.score >= self.threshold => MatchOutcome::Accepted(best),
            Some(best) => MatchOutcome::BelowThreshold(best),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::noise;
    use cardscan_core::error::CardscanError;

    fn crop(image: &GrayImage, x: u32, y: u32, w: u32, h: u32) -> GrayImage {
        image::imageops::crop_imm(image, x, y, w, h).to_image()
    }

    #[test]
    fn strongest_candidate_wins() {
        let page = noise(100, 80, 1);
        let prepared = PreparedImage::new(&page);
        let candidates = [
            Candidate::from_image("unrelated", noise(12, 12, 99)),
            Candidate::from_image("exact", crop(&page, 40, 30, 12, 12)),
        ];

        let outcome = BestOfN::new(0.6, None).search(&prepared, &candidates);
        let best = outcome.accepted().unwrap();
        assert_eq!(best.candidate, 1);
        assert_eq!((best.result.x, best.result.y), (40, 30));
    }

    #[test]
    fn ties_go_to_the_first_candidate() {
        let page = noise(60, 60, 2);
        let patch = crop(&page, 10, 10, 8, 8);
        let prepared = PreparedImage::new(&page);
        let candidates = [
            Candidate::from_image("a", patch.clone()),
            Candidate::from_image("b", patch),
        ];

        let outcome = BestOfN::new(0.5, None).search(&prepared, &candidates);
        assert_eq!(outcome.best().unwrap().candidate, 0);
    }

    #[test]
    fn acceptance_is_score_at_least_threshold() {
        let page = noise(60, 60, 3);
        let prepared = PreparedImage::new(&page);
        let candidates = [Candidate::from_image("foreign", noise(10, 10, 77))];

        let outcome = BestOfN::new(0.0, None).search(&prepared, &candidates);
        let score = outcome.best_score().unwrap();

        let strict = BestOfN::new(score, None).search(&prepared, &candidates);
        assert!(matches!(strict, MatchOutcome::Accepted(_)));

        let stricter = BestOfN::new((score + 0.01).min(1.0), None).search(&prepared, &candidates);
        if score < 0.99 {
            assert!(matches!(stricter, MatchOutcome::BelowThreshold(_)));
        }
    }

    #[test]
    fn failing_candidates_are_excluded() {
        let page = noise(40, 40, 4);
        let prepared = PreparedImage::new(&page);
        let candidates = [
            Candidate::from_image("too big", noise(50, 50, 5)),
            Candidate::from_image("fits", crop(&page, 5, 6, 10, 10)),
        ];

        let outcome = BestOfN::new(0.9, None).search(&prepared, &candidates);
        assert_eq!(outcome.accepted().unwrap().candidate, 1);

        let only_bad = [Candidate::from_image("too big", noise(50, 50, 5))];
        assert_eq!(
            BestOfN::new(0.9, None).search(&prepared, &only_bad),
            MatchOutcome::NoCandidates
        );
    }

    #[test]
    fn timed_out_candidate_is_excluded_and_later_one_wins() {
        let page = noise(80, 60, 7);
        let prepared = PreparedImage::new(&page);
        let candidates = [
            Candidate::from_image("slow", crop(&page, 0, 0, 10, 10)),
            Candidate::from_image("weak", noise(10, 10, 70)),
            Candidate::from_image("exact", crop(&page, 30, 20, 10, 10)),
        ];

        let matcher = BestOfN::new(0.9, Some(Duration::from_millis(5)));
        let outcome = matcher.select(&candidates, |candidate| {
            if candidate.label == "slow" {
                Err(CardscanError::MatchTimedOut {
                    candidate: candidate.label.clone(),
                    limit_ms: 5,
                })
            } else {
                match_template(&prepared, &candidate.image, None)
            }
        });

        let best = outcome.accepted().unwrap();
        assert_eq!(best.candidate, 2);
        assert_eq!((best.result.x, best.result.y), (30, 20));
    }

    #[test]
    fn exhausted_budget_leaves_no_candidates() {
        let page = noise(64, 64, 8);
        let prepared = PreparedImage::new(&page);
        let candidates = [Candidate::from_image("exact", crop(&page, 4, 4, 12, 12))];

        let outcome = BestOfN::new(0.5, Some(Duration::ZERO)).search(&prepared, &candidates);
        assert_eq!(outcome, MatchOutcome::NoCandidates);
    }

    #[test]
    fn empty_candidate_list_has_no_best() {
        let prepared = PreparedImage::new(&noise(20, 20, 6));
        let none: Vec<Candidate> = Vec::new();
        let outcome = BestOfN::new(0.5, None).search(&prepared, &none);
        assert_eq!(outcome, MatchOutcome::NoCandidates);
        assert_eq!(outcome.best_score(), None);
    }
}
