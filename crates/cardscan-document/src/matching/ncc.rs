// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Zero-mean normalized cross-correlation (correlation coefficient) template
// matching.
//
// The numerator is computed for every offset at once in the frequency domain;
// the per-window energy in the denominator comes from summed-area tables.
// See J.P. Lewis, "Fast Normalized Cross-Correlation" (1995).

use std::sync::Arc;
use std::time::{Duration, Instant};

use cardscan_core::error::{CardscanError, Result};
use cardscan_core::types::MatchResult;
use image::GrayImage;
use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use tracing::{debug, instrument, warn};

/// Window energy below this (sum of squared deviations) counts as flat.
const FLAT_WINDOW_ENERGY: f64 = 0.5;

/// Wall-clock budget for a single template match.
#[derive(Debug, Clone, Copy)]
pub struct MatchBudget {
    started: Instant,
    limit: Duration,
}

impl MatchBudget {
    /// Start the clock now.
    pub fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    fn check(&self, template: &GrayImage) -> Result<()> {
        if self.started.elapsed() > self.limit {
            return Err(CardscanError::MatchTimedOut {
                candidate: format!("{}x{} template", template.width(), template.height()),
                limit_ms: self.limit.as_millis() as u64,
            });
        }
        Ok(())
    }

    fn exceeded(&self) -> bool {
        self.started.elapsed() > self.limit
    }
}

/// A search image prepared once and matched against any number of templates.
///
/// Holds the spectrum of the mean-subtracted luminance and the summed-area
/// tables of pixel values and squared pixel values.
pub struct PreparedImage {
    width: usize,
    height: usize,
    spectrum: Vec<Complex<f32>>,
    integral: IntegralImage,
}

impl PreparedImage {
    #[instrument(skip_all, fields(width = gray.width(), height = gray.height()))]
    pub fn new(gray: &GrayImage) -> Self {
        let width = gray.width() as usize;
        let height = gray.height() as usize;
        let integral = IntegralImage::new(gray);

        let spectrum = if width == 0 || height == 0 {
            Vec::new()
        } else {
            let (total, _) = integral.window(0, 0, width, height);
            let mean = (total / (width * height) as f64) as f32;
            let mut buffer: Vec<Complex<f32>> = gray
                .as_raw()
                .iter()
                .map(|&v| Complex::new(f32::from(v) - mean, 0.0))
                .collect();
            fft_2d(&mut buffer, width, height, FftDirection::Forward);
            buffer
        };

        debug!("Search image prepared");
        Self {
            width,
            height,
            spectrum,
            integral,
        }
    }

    pub fn width(&self) -> u32 {
        self.width as u32
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }
}

/// Find the best placement of `template` inside a prepared image.
///
/// Returns the highest correlation coefficient and the top-left corner where
/// it occurs; among equal maxima the first in row-major order wins. Windows
/// with no intensity variation score 0, as does a flat template.
#[instrument(skip_all, fields(template_w = template.width(), template_h = template.height()))]
pub fn match_template(
    image: &PreparedImage,
    template: &GrayImage,
    budget: Option<MatchBudget>,
) -> Result<MatchResult> {
    let (tw, th) = (template.width() as usize, template.height() as usize);
    if tw == 0 || th == 0 {
        return Err(CardscanError::Geometry("template image is empty".into()));
    }
    if tw > image.width || th > image.height {
        return Err(CardscanError::Geometry(format!(
            "template {}x{} is larger than search image {}x{}",
            tw, th, image.width, image.height
        )));
    }

    let n = (tw * th) as f64;
    let template_mean = template.pixels().map(|p| f64::from(p.0[0])).sum::<f64>() / n;
    let template_energy: f64 = template
        .pixels()
        .map(|p| (f64::from(p.0[0]) - template_mean).powi(2))
        .sum();

    if template_energy < FLAT_WINDOW_ENERGY {
        warn!("Template has no intensity variation; it cannot be located");
        return Ok(MatchResult {
            score: 0.0,
            x: 0,
            y: 0,
            width: tw as u32,
            height: th as u32,
        });
    }

    // Zero-mean template, zero-padded to the search image size. Padding to
    // the image size is enough: valid offsets never wrap around.
    let (w, h) = (image.width, image.height);
    let mut kernel = vec![Complex::new(0.0f32, 0.0); w * h];
    for (x, y, pixel) in template.enumerate_pixels() {
        kernel[y as usize * w + x as usize] =
            Complex::new((f64::from(pixel.0[0]) - template_mean) as f32, 0.0);
    }
    fft_2d(&mut kernel, w, h, FftDirection::Forward);
    if let Some(budget) = &budget {
        budget.check(template)?;
    }

    // Cross-correlation: IFFT(I * conj(T)).
    kernel
        .par_iter_mut()
        .zip(image.spectrum.par_iter())
        .for_each(|(t, i)| *t = *i * t.conj());
    fft_2d(&mut kernel, w, h, FftDirection::Inverse);
    if let Some(budget) = &budget {
        budget.check(template)?;
    }

    let scale = 1.0 / (w * h) as f64;
    let (out_w, out_h) = (w - tw + 1, h - th + 1);

    let rows: Option<Vec<(f64, usize)>> = (0..out_h)
        .into_par_iter()
        .map(|y| {
            if budget.as_ref().is_some_and(MatchBudget::exceeded) {
                return None;
            }
            let mut best = (f64::NEG_INFINITY, 0usize);
            for x in 0..out_w {
                let numerator = f64::from(kernel[y * w + x].re) * scale;
                let (sum, sum_sq) = image.integral.window(x, y, tw, th);
                let window_energy = sum_sq - sum * sum / n;
                let score = if window_energy < FLAT_WINDOW_ENERGY {
                    0.0
                } else {
                    (numerator / (template_energy * window_energy).sqrt()).clamp(-1.0, 1.0)
                };
                if score > best.0 {
                    best = (score, x);
                }
            }
            Some(best)
        })
        .collect();

    let Some(rows) = rows else {
        // Only reachable through the budget.
        return Err(CardscanError::MatchTimedOut {
            candidate: format!("{tw}x{th} template"),
            limit_ms: budget.map_or(0, |b| b.limit.as_millis() as u64),
        });
    };

    let mut best = (f64::NEG_INFINITY, 0usize, 0usize);
    for (y, (score, x)) in rows.into_iter().enumerate() {
        if score > best.0 {
            best = (score, x, y);
        }
    }

    debug!(score = best.0, x = best.1, y = best.2, "Best placement found");
    Ok(MatchResult {
        score: best.0 as f32,
        x: best.1 as u32,
        y: best.2 as u32,
        width: tw as u32,
        height: th as u32,
    })
}

/// Prepare `image` and match a single template against it.
pub fn locate(image: &GrayImage, template: &GrayImage) -> Result<MatchResult> {
    match_template(&PreparedImage::new(image), template, None)
}

// -- Integral image helpers ---------------------------------------------------

/// Summed-area tables of pixel values and of squared pixel values.
///
/// Entry `[y * (width+1) + x]` holds the sum over the rectangle `[0, x) x
/// [0, y)`. Both tables have a zero-padded first row and column.
struct IntegralImage {
    stride: usize,
    sum: Vec<u64>,
    sum_sq: Vec<u64>,
}

impl IntegralImage {
    fn new(gray: &GrayImage) -> Self {
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sum_sq = vec![0u64; stride * (h + 1)];

        for (y, row) in gray.as_raw().chunks_exact(w.max(1)).enumerate().take(h) {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for (x, &value) in row.iter().enumerate() {
                let v = u64::from(value);
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                let above = y * stride + x + 1;
                sum[idx] = row_sum + sum[above];
                sum_sq[idx] = row_sq + sum_sq[above];
            }
        }

        Self {
            stride,
            sum,
            sum_sq,
        }
    }

    /// Sum and sum of squares over the `w` x `h` window at `(x, y)`.
    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let s = self.stride;
        let (x2, y2) = (x + w, y + h);
        let lookup = |t: &[u64]| {
            ((t[y2 * s + x2] + t[y * s + x]) - (t[y * s + x2] + t[y2 * s + x])) as f64
        };
        (lookup(&self.sum), lookup(&self.sum_sq))
    }
}

// -- FFT helpers --------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum FftDirection {
    Forward,
    Inverse,
}

/// Unnormalized in-place 2-D FFT of a row-major `width` x `height` buffer.
fn fft_2d(data: &mut Vec<Complex<f32>>, width: usize, height: usize, direction: FftDirection) {
    let mut planner = FftPlanner::<f32>::new();
    let (row_fft, col_fft): (Arc<dyn Fft<f32>>, Arc<dyn Fft<f32>>) = match direction {
        FftDirection::Forward => (
            planner.plan_fft_forward(width),
            planner.plan_fft_forward(height),
        ),
        FftDirection::Inverse => (
            planner.plan_fft_inverse(width),
            planner.plan_fft_inverse(height),
        ),
    };

    data.par_chunks_mut(width).for_each(|row| row_fft.process(row));

    let mut columns = transpose(data, width, height);
    columns
        .par_chunks_mut(height)
        .for_each(|column| col_fft.process(column));
    *data = transpose(&columns, height, width);
}

/// Transpose a row-major `width` x `height` buffer.
fn transpose(data: &[Complex<f32>], width: usize, height: usize) -> Vec<Complex<f32>> {
    let mut out = vec![Complex::new(0.0, 0.0); data.len()];
    for y in 0..height {
        for x in 0..width {
            out[x * height + y] = data[y * width + x];
        }
    }
    out
}
