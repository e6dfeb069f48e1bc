// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decode, grayscale, region crop and PNG output for scanned
// pages. Operates on in-memory images using the `image` crate.

use std::path::Path;

use cardscan_core::error::{CardscanError, Result};
use cardscan_core::types::Region;
use image::{DynamicImage, GrayImage, ImageFormat};
use tracing::{debug, info, instrument, warn};

/// Image processing pipeline operating on a single in-memory image.
///
/// Crops borrow the source and return a new `ImageProcessor`:
///
/// ```ignore
/// let page = ImageProcessor::open("page_0_aligned.png")?;
/// let (crop, _) = ImageProcessor::crop_from(page.as_dynamic(), &Region::new(310, 405, 200, 40))?;
/// crop.save("fields/page_0_aligned_Name.png")?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|err| CardscanError::ImageRead {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })?;
        debug!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Single-channel luminance copy, the representation every matcher uses.
    pub fn luma(&self) -> GrayImage {
        self.image.to_luma8()
    }

    // -- Crops (borrow the source, copy only the region) ------------------------

    /// Crop `region` out of a borrowed image, clipped to its bounds. Only
    /// the clipped rectangle is copied.
    ///
    /// Returns the crop and whether the region had to be shrunk to fit. A
    /// region entirely outside the image is a geometry error.
    #[instrument(skip(image), fields(x = region.x, y = region.y, width = region.width, height = region.height))]
    pub fn crop_from(image: &DynamicImage, region: &Region) -> Result<(Self, bool)> {
        let (img_w, img_h) = (image.width(), image.height());
        let Some((rect, clipped)) = region.clip_to(img_w, img_h) else {
            return Err(CardscanError::Geometry(format!(
                "region {}x{} at ({}, {}) lies outside the {}x{} image",
                region.width, region.height, region.x, region.y, img_w, img_h
            )));
        };

        if clipped {
            warn!(
                x = rect.x,
                y = rect.y,
                width = rect.width,
                height = rect.height,
                "Crop region clipped to image bounds"
            );
        }

        let cropped = image.crop_imm(rect.x, rect.y, rect.width, rect.height);
        Ok((Self { image: cropped }, clipped))
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_to_format(&self.image, ImageFormat::Png)
    }

    /// Write the image as PNG, regardless of the path's extension.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|err| CardscanError::ImageWrite {
                path: path.to_path_buf(),
                detail: err.to_string(),
            })?;
        info!(width = self.width(), height = self.height(), "Image written");
        Ok(())
    }
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| CardscanError::Render(format!("image encoding failed: {err}")))?;
    Ok(buffer)
}
