// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic pages and marks shared by the unit tests.

use std::path::Path;

use image::{GrayImage, Luma, Rgb, RgbImage};
use lopdf::{Document, Object, Stream, dictionary};

/// Deterministic high-contrast noise. Distinct seeds give uncorrelated
/// images, so any patch of it has exactly one good match.
pub fn noise(width: u32, height: u32, seed: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let mut h = x
            .wrapping_mul(0x9E37_79B1)
            ^ y.wrapping_mul(0x85EB_CA77)
            ^ seed.wrapping_mul(0xC2B2_AE3D);
        h ^= h >> 15;
        h = h.wrapping_mul(0x2C1B_3C6D);
        h ^= h >> 12;
        Luma([(h & 0xFF) as u8])
    })
}

/// A blank white page.
pub fn white_page(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
}

/// Copy `patch` onto `page` with its top-left corner at `(x, y)`.
pub fn stamp(page: &mut RgbImage, patch: &GrayImage, x: u32, y: u32) {
    for (px, py, p) in patch.enumerate_pixels() {
        let v = p.0[0];
        page.put_pixel(x + px, y + py, Rgb([v, v, v]));
    }
}

/// Fill a rectangle of `page` with one grey level.
pub fn fill(page: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, level: u8) {
    for py in y..y + height {
        for px in x..x + width {
            page.put_pixel(px, py, Rgb([level, level, level]));
        }
    }
}

/// Write a PDF of `pages` blank business-card sized pages.
pub fn write_pdf(path: &Path, pages: usize) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for _ in 0..pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(243),
                Object::Integer(153),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}
