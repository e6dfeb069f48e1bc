// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the template matcher in the cardscan-document
// crate: preparing a card-sized page and locating an anchor on it.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{GrayImage, Luma};

use cardscan_document::matching::{PreparedImage, match_template};

/// Pseudo-random grey levels; deterministic across runs.
fn noise(width: u32, height: u32, seed: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77) ^ seed;
        h ^= h >> 15;
        h = h.wrapping_mul(0x2C1B_3C6D);
        h ^= h >> 12;
        Luma([(h & 0xFF) as u8])
    })
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// A credit-card sized page at 150 DPI (roughly 500x320) with a 60x40 anchor
/// cut from it.
fn bench_match_template(c: &mut Criterion) {
    let page = noise(506, 319, 1);
    let anchor = image::imageops::crop_imm(&page, 200, 120, 60, 40).to_image();
    let prepared = PreparedImage::new(&page);

    c.bench_function("prepare_search_image (506x319)", |b| {
        b.iter(|| black_box(PreparedImage::new(black_box(&page))));
    });

    c.bench_function("match_template (60x40 in 506x319)", |b| {
        b.iter(|| {
            let result = match_template(&prepared, black_box(&anchor), None);
            black_box(result.ok());
        });
    });
}

criterion_group!(benches, bench_match_template);
criterion_main!(benches);
