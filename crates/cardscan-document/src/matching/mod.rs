// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Template matching: zero-mean normalized cross-correlation and the shared
// "try every candidate, keep the best" selection used by alignment and
// field location.

pub mod best;
pub mod ncc;

pub use best::{BestMatch, BestOfN, Candidate, MatchOutcome};
pub use ncc::{MatchBudget, PreparedImage, locate, match_template};
