// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output directory layout for one run.

use std::path::{Path, PathBuf};

use cardscan_core::error::Result;

/// Names every file a run writes under the output root.
///
/// Page numbers are 0-based document indices, so file names do not depend on
/// the order in which pages finish.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root and `fields/` directories if missing.
    pub fn create(&self) -> Result<()> {
        std::fs::create_dir_all(self.fields_dir())?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `page_<n>.png`
    pub fn raw_page(&self, page: usize) -> PathBuf {
        self.root.join(format!("page_{page}.png"))
    }

    /// `page_<n>_aligned.png`
    pub fn aligned_page(&self, page: usize) -> PathBuf {
        self.root.join(format!("page_{page}_aligned.png"))
    }

    /// `page_<n>_debug_match.png`
    pub fn debug_page(&self, page: usize) -> PathBuf {
        self.root.join(format!("page_{page}_debug_match.png"))
    }

    pub fn fields_dir(&self) -> PathBuf {
        self.root.join("fields")
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join("report.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_follow_page_index() {
        let layout = OutputLayout::new("out");
        assert_eq!(layout.raw_page(0), Path::new("out/page_0.png"));
        assert_eq!(layout.aligned_page(3), Path::new("out/page_3_aligned.png"));
        assert_eq!(layout.debug_page(1), Path::new("out/page_1_debug_match.png"));
        assert_eq!(layout.fields_dir(), Path::new("out/fields"));
    }

    #[test]
    fn create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("run"));
        layout.create().unwrap();
        layout.create().unwrap();
        assert!(layout.fields_dir().is_dir());
    }
}
