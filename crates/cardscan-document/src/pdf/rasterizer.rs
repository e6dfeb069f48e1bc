// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF page rasterizer backed by the PDFium library.

use std::path::{Path, PathBuf};

use cardscan_core::error::{CardscanError, Result};
use image::{DynamicImage, Rgb, RgbImage};
use pdfium_render::prelude::*;
use tracing::{debug, info, instrument, warn};

use super::reader::PdfReader;
use crate::source::PageSource;

/// Points per inch in PDF user space.
const POINTS_PER_INCH: f32 = 72.0;

/// Renders the pages of one PDF document to RGB images.
///
/// The document is checked with [`PdfReader`] first, so a corrupt input is
/// reported before PDFium is involved. PDFium then opens it once and every
/// page is rendered from that handle.
pub struct PdfRasterizer {
    path: PathBuf,
    page_count: usize,
    pdfium: &'static Pdfium,
    document: PdfDocument<'static>,
}

impl PdfRasterizer {
    /// Preflight `path`, bind PDFium and open the document for rendering.
    ///
    /// `library_dir` is searched for the platform's PDFium shared library
    /// (a path to the library file itself is accepted too); without it the
    /// system library is used.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, library_dir: Option<&Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = PdfReader::open(path)?;
        let page_count = reader.page_count();
        if page_count == 0 {
            return Err(CardscanError::PdfError(format!(
                "{} has no pages",
                path.display()
            )));
        }

        // Documents borrow the bindings, which live until the process exits.
        let pdfium: &'static Pdfium = Box::leak(Box::new(Pdfium::new(bind_pdfium(library_dir)?)));
        let document = pdfium.load_pdf_from_file(path, None).map_err(|err| {
            CardscanError::PdfError(format!("PDFium cannot open {}: {err}", path.display()))
        })?;
        info!(pages = page_count, "PDF ready for rasterization");

        Ok(Self {
            path: path.to_path_buf(),
            page_count,
            pdfium,
            document,
        })
    }
}

fn bind_pdfium(library_dir: Option<&Path>) -> Result<Box<dyn PdfiumLibraryBindings>> {
    match library_dir {
        Some(location) => {
            let library = if location.is_file() {
                location.to_path_buf()
            } else {
                location.join(Pdfium::pdfium_platform_library_name())
            };
            Pdfium::bind_to_library(library.clone()).map_err(|err| {
                CardscanError::InvalidConfig(format!(
                    "failed to bind to PDFium library at {}: {}",
                    library.display(),
                    err
                ))
            })
        }
        None => Pdfium::bind_to_system_library().map_err(|err| {
            CardscanError::InvalidConfig(format!(
                "PDFium library not found on the system library path ({err}); pass --pdfium-library"
            ))
        }),
    }
}

impl PageSource for PdfRasterizer {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    #[instrument(skip(self), fields(page = index))]
    fn render_page(&self, index: usize, dpi: u32) -> Result<DynamicImage> {
        let page_index = u16::try_from(index)
            .map_err(|_| CardscanError::Render(format!("page index {index} out of range")))?;
        let page = self
            .document
            .pages()
            .get(page_index)
            .map_err(|e| CardscanError::Render(format!("failed to get page {index}: {e}")))?;

        let scale = dpi as f32 / POINTS_PER_INCH;
        let width = (page.width().value * scale).round().max(1.0) as u32;
        let height = (page.height().value * scale).round().max(1.0) as u32;
        debug!(width, height, dpi, "Rendering page");

        let mut bitmap = PdfBitmap::empty(
            width as i32,
            height as i32,
            PdfBitmapFormat::BGRx,
            self.pdfium.bindings(),
        )
        .map_err(|e| CardscanError::Render(format!("failed to create bitmap: {e:?}")))?;

        page.render_into_bitmap(&mut bitmap, width as i32, height as i32, None)
            .map_err(|e| CardscanError::Render(format!("failed to render page {index}: {e:?}")))?;

        let pixels = bitmap.as_raw_bytes();
        let expected = (width * height) as usize;
        if pixels.len() < expected * 4 {
            warn!(bytes = pixels.len(), expected = expected * 4, "Short bitmap from PDFium");
        }

        // BGRx, four bytes per pixel.
        let mut rgb = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        for (i, chunk) in pixels.chunks_exact(4).take(expected).enumerate() {
            let x = i as u32 % width;
            let y = i as u32 / width;
            rgb.put_pixel(x, y, Rgb([chunk[2], chunk[1], chunk[0]]));
        }

        Ok(DynamicImage::ImageRgb8(rgb))
    }
}
