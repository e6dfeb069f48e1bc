// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page sources: where the raw page images of a run come from.

use std::path::{Path, PathBuf};

use cardscan_core::config::PipelineConfig;
use cardscan_core::error::{CardscanError, Result};
use image::DynamicImage;
use tracing::{info, instrument};

use crate::image::processor::ImageProcessor;
use crate::pdf::rasterizer::PdfRasterizer;

/// File extensions accepted as page images.
const PAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

/// A paginated input that can produce a raster image per page.
pub trait PageSource {
    /// Number of pages, fixed for the lifetime of the source.
    fn page_count(&self) -> usize;

    /// Human-readable origin, recorded in the run report.
    fn describe(&self) -> String;

    /// Rasterize page `index` (0-based) at `dpi`.
    fn render_page(&self, index: usize, dpi: u32) -> Result<DynamicImage>;
}

/// Pages that are already raster images: one file, or every image in a
/// directory sorted by file name. The DPI argument is ignored.
#[derive(Debug, Clone)]
pub struct ImagePages {
    origin: PathBuf,
    pages: Vec<PathBuf>,
}

impl ImagePages {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pages = if path.is_dir() {
            let mut pages: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_page_image(p))
                .collect();
            pages.sort();
            if pages.is_empty() {
                return Err(CardscanError::InvalidConfig(format!(
                    "{} contains no page images",
                    path.display()
                )));
            }
            pages
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(CardscanError::MissingFile {
                what: "input document",
                path: path.to_path_buf(),
            });
        };

        info!(pages = pages.len(), "Image pages found");
        Ok(Self {
            origin: path.to_path_buf(),
            pages,
        })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.pages
    }
}

impl PageSource for ImagePages {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn describe(&self) -> String {
        self.origin.display().to_string()
    }

    fn render_page(&self, index: usize, _dpi: u32) -> Result<DynamicImage> {
        let path = self.pages.get(index).ok_or_else(|| {
            CardscanError::Render(format!("page {index} out of range ({} pages)", self.pages.len()))
        })?;
        Ok(ImageProcessor::open(path)?.into_dynamic())
    }
}

fn is_page_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| PAGE_EXTENSIONS.iter().any(|ok| e.eq_ignore_ascii_case(ok)))
}

/// Open the right source for `input`: PDFs are rasterized, anything else is
/// read as page images.
pub fn open_source(input: &Path, config: &PipelineConfig) -> Result<Box<dyn PageSource>> {
    let is_pdf = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        let rasterizer = PdfRasterizer::open(input, config.pdfium_library.as_deref())?;
        Ok(Box::new(rasterizer))
    } else {
        Ok(Box::new(ImagePages::open(input)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::white_page;

    #[test]
    fn directory_pages_are_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "c.jpg"] {
            white_page(8, 8).save(dir.path().join(name)).unwrap();
        }
        std::fs::rename(dir.path().join("a.png"), dir.path().join("a.PNG")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let pages = ImagePages::open(dir.path()).unwrap();
        let names: Vec<_> = pages
            .paths()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.PNG", "b.png", "c.jpg"]);
        assert_eq!(pages.page_count(), 3);
    }

    #[test]
    fn single_file_is_one_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        white_page(20, 10).save(&path).unwrap();

        let pages = ImagePages::open(&path).unwrap();
        assert_eq!(pages.page_count(), 1);
        let page = pages.render_page(0, 300).unwrap();
        assert_eq!((page.width(), page.height()), (20, 10));
        assert!(pages.render_page(1, 300).is_err());
    }

    #[test]
    fn missing_input_is_fatal() {
        let config = PipelineConfig::default();
        let err = open_source(Path::new("/no/such/cards.pdf"), &config).err().unwrap();
        assert!(err.is_fatal());
        let err = open_source(Path::new("/no/such/scans"), &config).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn empty_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImagePages::open(dir.path()),
            Err(CardscanError::InvalidConfig(_))
        ));
    }
}
