// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Global Otsu binarization of field crops, producing dark text on a white
// background ready for OCR.

use image::{DynamicImage, GrayImage, Luma};
use tracing::{debug, instrument};

/// Binarize `image` into pure black (0) and white (255).
///
/// The Otsu threshold splits the luminance histogram; an inverted mask is
/// built and then inverted back so ink ends up black. If black then covers
/// more than half the crop (light text on a dark band) the result is flipped
/// once more, so the output always has the white majority.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn binarize_for_ocr(image: &DynamicImage) -> GrayImage {
    let gray = image.to_luma8();
    let threshold = otsu_threshold(&gray);
    debug!(threshold, "Otsu threshold computed");

    // Ink becomes 255 in the mask.
    let mut output = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y).0[0];
        Luma([if value > threshold { 0u8 } else { 255u8 }])
    });
    image::imageops::invert(&mut output);

    let black = output.pixels().filter(|p| p.0[0] == 0).count() as u64;
    let total = u64::from(output.width()) * u64::from(output.height());
    if black * 2 > total {
        debug!(black, total, "Dark background; flipping polarity");
        image::imageops::invert(&mut output);
    }

    output
}

/// Grey level separating ink from paper in a field crop.
///
/// Levels at or below the result are ink; [`binarize_for_ocr`] turns them
/// black. The level maximises the between-class variance of the two groups
/// (Otsu). A crop with a single grey level yields 0, an empty one 128.
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    gray.pixels()
        .for_each(|p| histogram[usize::from(p.0[0])] += 1);

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 128;
    }
    let level_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &n)| level as f64 * n as f64)
        .sum();

    let mut ink_count = 0u64;
    let mut ink_sum = 0.0f64;
    let mut best = (0.0f64, 0u8);
    for (level, &n) in histogram.iter().enumerate() {
        ink_count += n;
        ink_sum += level as f64 * n as f64;
        let paper_count = total - ink_count;
        if ink_count == 0 {
            continue;
        }
        if paper_count == 0 {
            break;
        }

        let ink_mean = ink_sum / ink_count as f64;
        let paper_mean = (level_sum - ink_sum) / paper_count as f64;
        let separation = ink_count as f64 * paper_count as f64 * (ink_mean - paper_mean).powi(2);
        if separation > best.0 {
            best = (separation, level as u8);
        }
    }

    best.1
}
