// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: document preflight and page rasterization.

pub mod rasterizer;
pub mod reader;

pub use rasterizer::PdfRasterizer;
pub use reader::PdfReader;
