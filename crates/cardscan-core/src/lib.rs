// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cardscan-core: core types, template model, configuration and error definitions
// shared across all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod template;
pub mod types;

pub use config::PipelineConfig;
pub use error::{CardscanError, Result};
pub use template::{FieldSpec, Template};
pub use types::*;
