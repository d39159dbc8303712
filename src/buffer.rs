//! RGB Pixel Buffer
//!
//! Flat, row-major, 3-bytes-per-pixel image container that every engine in
//! the crate reads from and produces. Transforms never mutate their input:
//! they build a fresh buffer. The only in-place mutation is `set_pixel`.
//!
//! Layout matches what display shells expect (R, G, B interleaved, no
//! padding, no channel reordering), so conversion to a native bitmap is a
//! plain byte copy.

use rayon::prelude::*;
use crate::error::{PixelsError, Result};

/// A single pixel as (R, G, B)
pub type Rgb = (u8, u8, u8);

// ============================================================================
// LUMINANCE
// ============================================================================

/// Luminance weights (Rec. 709)
pub const LUMA_R: f64 = 0.2126;
pub const LUMA_G: f64 = 0.7152;
pub const LUMA_B: f64 = 0.0722;

/// Perceptual brightness of a pixel, truncated to an integer level
///
/// Evaluated left to right in f64, so `(10, 10, 10)` lands on level 9.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let y = LUMA_R * r as f64 + LUMA_G * g as f64 + LUMA_B * b as f64;
    y as u8
}

// ============================================================================
// PIXEL BUFFER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    max_value: u8,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Create a black 8-bit image
    pub fn new(width: usize, height: usize) -> Result<Self> {
        Self::from_dimensions(width, height, (0, 0, 0), 255)
    }

    /// Create an image filled with a single color
    pub fn from_dimensions(width: usize, height: usize, color: Rgb, max_value: u8) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PixelsError::InvalidDimensions { width, height });
        }
        let data = [color.0, color.1, color.2].repeat(width * height);
        Ok(Self { width, height, max_value, data })
    }

    /// Create an image from a row-major sequence of pixels
    pub fn from_pixels<I>(width: usize, height: usize, pixels: I, max_value: u8) -> Result<Self>
    where
        I: IntoIterator<Item = Rgb>,
    {
        let data: Vec<u8> = pixels
            .into_iter()
            .flat_map(|(r, g, b)| [r, g, b])
            .collect();
        Self::from_raw(width, height, max_value, data)
    }

    /// Wrap an already interleaved RGB byte vector
    pub fn from_raw(width: usize, height: usize, max_value: u8, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PixelsError::InvalidDimensions { width, height });
        }
        if data.len() != width * height * 3 {
            return Err(PixelsError::DimensionMismatch(format!(
                "{} bytes of pixel data for a {}x{} image (expected {})",
                data.len(),
                width,
                height,
                width * height * 3
            )));
        }
        Ok(Self { width, height, max_value, data })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Declared channel depth
    pub fn max_value(&self) -> u8 {
        self.max_value
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Raw interleaved RGB bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Round then clamp a computed channel value into `[0, max_value]`
    #[inline]
    pub fn clamp(&self, value: f64) -> u8 {
        clamp_channel(value, self.max_value)
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> Result<Rgb> {
        let idx = self.offset(x, y)?;
        Ok((self.data[idx], self.data[idx + 1], self.data[idx + 2]))
    }

    /// Write a pixel in place, rounding and clamping each channel
    pub fn set_pixel(&mut self, x: usize, y: usize, color: (f64, f64, f64)) -> Result<()> {
        let idx = self.offset(x, y)?;
        self.data[idx] = self.clamp(color.0);
        self.data[idx + 1] = self.clamp(color.1);
        self.data[idx + 2] = self.clamp(color.2);
        Ok(())
    }

    pub fn iter_pixels(&self) -> impl Iterator<Item = Rgb> + '_ {
        self.data.chunks_exact(3).map(|p| (p[0], p[1], p[2]))
    }

    /// Map every pixel independently into a new buffer
    pub fn apply_point_operation<F>(&self, func: F) -> PixelBuffer
    where
        F: Fn(u8, u8, u8) -> (f64, f64, f64) + Sync,
    {
        let max_value = self.max_value;
        let mut out = vec![0u8; self.data.len()];
        out.par_chunks_exact_mut(3)
            .zip(self.data.par_chunks_exact(3))
            .for_each(|(dst, src)| {
                let (r, g, b) = func(src[0], src[1], src[2]);
                dst[0] = clamp_channel(r, max_value);
                dst[1] = clamp_channel(g, max_value);
                dst[2] = clamp_channel(b, max_value);
            });
        self.with_data(out)
    }

    /// Same geometry and depth, different bytes
    pub(crate) fn with_data(&self, data: Vec<u8>) -> PixelBuffer {
        debug_assert_eq!(data.len(), self.data.len());
        PixelBuffer {
            width: self.width,
            height: self.height,
            max_value: self.max_value,
            data,
        }
    }

    fn offset(&self, x: usize, y: usize) -> Result<usize> {
        if x >= self.width || y >= self.height {
            return Err(PixelsError::IndexOutOfRange {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok((y * self.width + x) * 3)
    }
}

#[inline]
pub(crate) fn clamp_channel(value: f64, max_value: u8) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, max_value as f64) as u8
}

// ============================================================================
// TESTS
// ============================================================================
