// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Declarative field template: which regions of an aligned card to cut out.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{CardscanError, Result};
use crate::types::Region;

/// One named region of interest on the card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldSpec {
    /// Absolute rectangle on the aligned page. Cropped as-is, no binarization.
    Fixed { name: String, coordinates: Region },
    /// Located by searching for a printed label, then offset from it.
    LabelRelative {
        name: String,
        /// Reference images of the label, in priority order.
        label_templates: Vec<PathBuf>,
        /// Data rectangle relative to the label's top-left corner.
        offset: Region,
    },
}

impl FieldSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Fixed { name, .. } | Self::LabelRelative { name, .. } => name,
        }
    }

    /// The field name with every non-alphanumeric character removed.
    pub fn safe_name(&self) -> String {
        self.name().chars().filter(|c| c.is_alphanumeric()).collect()
    }

    /// Stem used in output file names. Falls back to `field<index>` when the
    /// name has no alphanumeric characters at all.
    pub fn file_stem(&self, index: usize) -> String {
        let safe = self.safe_name();
        if safe.is_empty() {
            format!("field{index}")
        } else {
            safe
        }
    }

    fn region(&self) -> &Region {
        match self {
            Self::Fixed { coordinates, .. } => coordinates,
            Self::LabelRelative { offset, .. } => offset,
        }
    }
}

/// Ordered field declarations, loaded once per run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Template {
    pub fields: Vec<FieldSpec>,
}

impl Template {
    /// Load and validate a template from a JSON file.
    ///
    /// Relative label image paths are resolved against the template file's
    /// directory. A missing file is reported as [`CardscanError::MissingFile`].
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CardscanError::MissingFile {
                what: "template file",
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        let mut template = Self::from_json(&text)
            .map_err(|err| CardscanError::InvalidTemplate(format!("{}: {}", path.display(), err)))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        template.resolve_paths(base);

        info!(fields = template.fields.len(), "Template loaded");
        Ok(template)
    }

    /// Parse and validate a template from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let template: Self = serde_json::from_str(text)
            .map_err(|err| CardscanError::InvalidTemplate(err.to_string()))?;
        template.validate()?;
        Ok(template)
    }

    /// Rebase relative label image paths onto `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for field in &mut self.fields {
            if let FieldSpec::LabelRelative {
                label_templates, ..
            } = field
            {
                for label in label_templates.iter_mut() {
                    if label.is_relative() {
                        *label = base.join(&*label);
                    }
                }
            }
        }
    }

    /// Reject templates the extractor cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(CardscanError::InvalidTemplate(
                "template declares no fields".into(),
            ));
        }

        let mut stems: HashMap<String, &str> = HashMap::new();
        for (index, field) in self.fields.iter().enumerate() {
            let name = field.name();
            if name.trim().is_empty() {
                return Err(CardscanError::InvalidTemplate(format!(
                    "field #{index} has an empty name"
                )));
            }
            let region = field.region();
            if region.width == 0 || region.height == 0 {
                return Err(CardscanError::InvalidTemplate(format!(
                    "field '{name}' has a zero-sized rectangle"
                )));
            }
            if let FieldSpec::LabelRelative {
                label_templates, ..
            } = field
                && label_templates.is_empty()
            {
                return Err(CardscanError::InvalidTemplate(format!(
                    "field '{name}' declares no label templates"
                )));
            }

            if let Some(previous) = stems.insert(field.file_stem(index), name) {
                warn!(
                    field = name,
                    other = previous,
                    "Fields share an output name; the later crop overwrites the earlier"
                );
            }
        }
        Ok(())
    }

    /// Whether any field needs a label search.
    pub fn has_label_fields(&self) -> bool {
        self.fields
            .iter()
            .any(|f| matches!(f, FieldSpec::LabelRelative { .. }))
    }

    /// Every label image path named by the template, first occurrence order.
    pub fn label_paths(&self) -> Vec<&Path> {
        let mut seen = Vec::new();
        for field in &self.fields {
            if let FieldSpec::LabelRelative {
                label_templates, ..
            } = field
            {
                for path in label_templates {
                    if !seen.contains(&path.as_path()) {
                        seen.push(path.as_path());
                    }
                }
            }
        }
        seen
    }
}
