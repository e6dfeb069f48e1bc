// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan clean-up: Otsu binarization of field crops for OCR.

pub mod binarize;

pub use binarize::{binarize_for_ocr, otsu_threshold};
