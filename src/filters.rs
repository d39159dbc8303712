//! Spatial Filter Engine
//!
//! Linear convolution (generic kernel, mean, sharpen, separable Gaussian)
//! and the two non-linear neighborhood filters (median, Sobel magnitude).
//!
//! Border policy everywhere is edge replication: a sample coordinate outside
//! the image is clamped to the nearest valid row/column. Output rows are
//! independent, so every pass fills rows in parallel.

use ndarray::Array2;
use rayon::prelude::*;
use log::debug;
use crate::buffer::PixelBuffer;
use crate::error::{PixelsError, Result};

// ============================================================================
// KERNEL
// ============================================================================

/// Square, odd-sized convolution kernel
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    weights: Array2<f64>,
}

impl Kernel {
    pub fn new(weights: Array2<f64>) -> Result<Self> {
        let (rows, cols) = weights.dim();
        if rows == 0 || rows != cols || rows % 2 == 0 {
            return Err(PixelsError::DimensionMismatch(format!(
                "kernel must be a square matrix with odd side (got {}x{})",
                rows, cols
            )));
        }
        Ok(Self { weights })
    }

    /// Build from row vectors
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let size = rows.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != size) {
            return Err(PixelsError::DimensionMismatch(format!(
                "kernel row has {} values, expected {}",
                bad.len(),
                size
            )));
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let weights = Array2::from_shape_vec((size, size), flat)
            .map_err(|e| PixelsError::DimensionMismatch(e.to_string()))?;
        Self::new(weights)
    }

    /// All-ones kernel
    pub fn uniform(size: usize) -> Result<Self> {
        Self::new(Array2::from_elem((size, size), 1.0))
    }

    /// Parse a kernel from text: one row per line, values separated by whitespace
    pub fn parse(text: &str) -> Result<Self> {
        let rows = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                line.split_whitespace()
                    .map(|tok| {
                        tok.parse::<f64>().map_err(|_| {
                            PixelsError::ValueRange(format!("invalid kernel value {:?}", tok))
                        })
                    })
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_rows(&rows)
    }

    pub fn size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn radius(&self) -> usize {
        self.size() / 2
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn weight_sum(&self) -> f64 {
        self.weights.sum()
    }

    /// Explicit nonzero divisor, else the weight sum, else 1
    pub fn effective_divisor(&self, explicit: Option<f64>) -> f64 {
        match explicit {
            Some(d) if d != 0.0 => d,
            _ => {
                let sum = self.weight_sum();
                if sum == 0.0 {
                    1.0
                } else {
                    sum
                }
            }
        }
    }
}

pub const SHARPEN: [[f64; 3]; 3] = [[0.0, -1.0, 0.0], [-1.0, 5.0, -1.0], [0.0, -1.0, 0.0]];

pub const SOBEL_X: [[f64; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];

pub const SOBEL_Y: [[f64; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

// ============================================================================
// HELPERS
// ============================================================================

/// Replicate-border index lookup
#[inline]
fn clamp_index(v: isize, len: usize) -> usize {
    v.clamp(0, len as isize - 1) as usize
}

/// Fill output rows in parallel; `fill_row(y, row)` writes one RGB row
fn map_rows<F>(img: &PixelBuffer, fill_row: F) -> PixelBuffer
where
    F: Fn(usize, &mut [u8]) + Sync,
{
    let row_len = img.width() * 3;
    let mut out = vec![0u8; img.as_bytes().len()];
    out.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| fill_row(y, row));
    img.with_data(out)
}

// ============================================================================
// LINEAR FILTERS
// ============================================================================

/// Generic convolution: `clamp(sum(k * neighbor) / divisor + offset)` per channel
pub fn convolve(img: &PixelBuffer, kernel: &Kernel, divisor: Option<f64>, offset: f64) -> PixelBuffer {
    let divisor = kernel.effective_divisor(divisor);
    let size = kernel.size();
    let radius = kernel.radius() as isize;
    let (width, height) = img.dimensions();
    let src = img.as_bytes();
    let weights = kernel.weights();
    debug!("convolve {}x{} divisor={} offset={}", size, size, divisor, offset);

    map_rows(img, |y, row| {
        for x in 0..width {
            let mut acc = [0.0f64; 3];
            for ky in 0..size {
                let ny = clamp_index(y as isize + ky as isize - radius, height);
                for kx in 0..size {
                    let nx = clamp_index(x as isize + kx as isize - radius, width);
                    let w = weights[[ky, kx]];
                    let base = (ny * width + nx) * 3;
                    acc[0] += w * src[base] as f64;
                    acc[1] += w * src[base + 1] as f64;
                    acc[2] += w * src[base + 2] as f64;
                }
            }
            for c in 0..3 {
                row[x * 3 + c] = img.clamp(acc[c] / divisor + offset);
            }
        }
    })
}

/// Box blur with a `size x size` window
pub fn mean_filter(img: &PixelBuffer, size: usize) -> Result<PixelBuffer> {
    let kernel = Kernel::uniform(size)?;
    Ok(convolve(img, &kernel, Some((size * size) as f64), 0.0))
}

/// Laplacian-style sharpening
pub fn high_pass_sharpen(img: &PixelBuffer) -> PixelBuffer {
    let kernel = Kernel {
        weights: Array2::from_shape_fn((3, 3), |(r, c)| SHARPEN[r][c]),
    };
    convolve(img, &kernel, None, 0.0)
}

/// User-supplied kernel rows
pub fn custom_convolution(
    img: &PixelBuffer,
    rows: &[Vec<f64>],
    divisor: Option<f64>,
    offset: f64,
) -> Result<PixelBuffer> {
    let kernel = Kernel::from_rows(rows)?;
    Ok(convolve(img, &kernel, divisor, offset))
}

// ============================================================================
// GAUSSIAN (SEPARABLE)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

/// Largest separable tap radius `gaussian_taps` will build
pub const MAX_GAUSSIAN_RADIUS: usize = 1 << 16;

/// Normalized 1-D Gaussian taps for `[-radius, radius]`, `radius = max(1, floor(3 sigma))`
pub fn gaussian_taps(sigma: f64) -> Result<Vec<f64>> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(PixelsError::ValueRange(format!(
            "sigma must be positive (got {})",
            sigma
        )));
    }
    let reach = (3.0 * sigma).floor();
    if reach > MAX_GAUSSIAN_RADIUS as f64 {
        return Err(PixelsError::ValueRange(format!(
            "sigma {} needs a radius above {}",
            sigma, MAX_GAUSSIAN_RADIUS
        )));
    }
    let radius = (reach as isize).max(1);
    let taps: Vec<f64> = (-radius..=radius)
        .map(|i| {
            let d = i as f64;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = taps.iter().sum();
    Ok(taps.into_iter().map(|w| w / total).collect())
}

pub fn gaussian_blur(img: &PixelBuffer, sigma: f64) -> Result<PixelBuffer> {
    let taps = gaussian_taps(sigma)?;
    debug!("gaussian blur sigma={} taps={}", sigma, taps.len());
    let temp = apply_separable(img, &taps, Axis::Horizontal);
    Ok(apply_separable(&temp, &taps, Axis::Vertical))
}

fn apply_separable(img: &PixelBuffer, taps: &[f64], axis: Axis) -> PixelBuffer {
    let radius = (taps.len() / 2) as isize;
    let (width, height) = img.dimensions();
    let src = img.as_bytes();

    map_rows(img, |y, row| {
        for x in 0..width {
            let mut acc = [0.0f64; 3];
            for (k, &w) in taps.iter().enumerate() {
                let shift = k as isize - radius;
                let (nx, ny) = match axis {
                    Axis::Horizontal => (clamp_index(x as isize + shift, width), y),
                    Axis::Vertical => (x, clamp_index(y as isize + shift, height)),
                };
                let base = (ny * width + nx) * 3;
                acc[0] += w * src[base] as f64;
                acc[1] += w * src[base + 1] as f64;
                acc[2] += w * src[base + 2] as f64;
            }
            for c in 0..3 {
                row[x * 3 + c] = img.clamp(acc[c]);
            }
        }
    })
}

// ============================================================================
// NON-LINEAR FILTERS
// ============================================================================

/// Per-channel median of the `size x size` neighborhood
pub fn median_filter(img: &PixelBuffer, size: usize) -> Result<PixelBuffer> {
    if size == 0 || size % 2 == 0 {
        return Err(PixelsError::DimensionMismatch(format!(
            "median window must be odd (got {})",
            size
        )));
    }
    let radius = (size / 2) as isize;
    let (width, height) = img.dimensions();
    let src = img.as_bytes();
    let mid = size * size / 2;
    debug!("median filter {}x{}", size, size);

    Ok(map_rows(img, |y, row| {
        let mut samples: [Vec<u8>; 3] = [
            Vec::with_capacity(size * size),
            Vec::with_capacity(size * size),
            Vec::with_capacity(size * size),
        ];
        for x in 0..width {
            samples.iter_mut().for_each(Vec::clear);
            for ky in -radius..=radius {
                let ny = clamp_index(y as isize + ky, height);
                for kx in -radius..=radius {
                    let nx = clamp_index(x as isize + kx, width);
                    let base = (ny * width + nx) * 3;
                    for (c, channel) in samples.iter_mut().enumerate() {
                        channel.push(src[base + c]);
                    }
                }
            }
            for (c, channel) in samples.iter_mut().enumerate() {
                channel.sort_unstable();
                row[x * 3 + c] = channel[mid];
            }
        }
    }))
}

/// Sobel gradient magnitude per channel
pub fn sobel_edge(img: &PixelBuffer) -> PixelBuffer {
    let (width, height) = img.dimensions();
    let src = img.as_bytes();

    map_rows(img, |y, row| {
        for x in 0..width {
            let mut gx = [0.0f64; 3];
            let mut gy = [0.0f64; 3];
            for ky in 0..3 {
                let ny = clamp_index(y as isize + ky as isize - 1, height);
                for kx in 0..3 {
                    let nx = clamp_index(x as isize + kx as isize - 1, width);
                    let base = (ny * width + nx) * 3;
                    for c in 0..3 {
                        let v = src[base + c] as f64;
                        gx[c] += SOBEL_X[ky][kx] * v;
                        gy[c] += SOBEL_Y[ky][kx] * v;
                    }
                }
            }
            for c in 0..3 {
                row[x * 3 + c] = img.clamp((gx[c] * gx[c] + gy[c] * gy[c]).sqrt());
            }
        }
    })
}

// ============================================================================
// TESTS
// ============================================================================
