//! Point Operations
//!
//! Per-sample arithmetic and per-pixel color transforms. Every operation is
//! a pure function of one sample (or one pixel), so the whole image is mapped
//! in parallel and then rounded/clamped into the buffer's channel range.

use rayon::prelude::*;
use log::debug;
use crate::buffer::{luminance, PixelBuffer};
use crate::error::{PixelsError, Result};

/// Apply `func` to every byte independently, then clamp
fn scalar_point_op<F>(img: &PixelBuffer, func: F) -> PixelBuffer
where
    F: Fn(f64) -> f64 + Sync,
{
    let data: Vec<u8> = img
        .as_bytes()
        .par_iter()
        .map(|&v| img.clamp(func(v as f64)))
        .collect();
    img.with_data(data)
}

pub fn add(img: &PixelBuffer, value: f64) -> PixelBuffer {
    debug!("add {}", value);
    scalar_point_op(img, |v| v + value)
}

pub fn subtract(img: &PixelBuffer, value: f64) -> PixelBuffer {
    debug!("subtract {}", value);
    scalar_point_op(img, |v| v - value)
}

pub fn multiply(img: &PixelBuffer, factor: f64) -> PixelBuffer {
    debug!("multiply {}", factor);
    scalar_point_op(img, |v| v * factor)
}

pub fn divide(img: &PixelBuffer, divisor: f64) -> Result<PixelBuffer> {
    if divisor == 0.0 {
        return Err(PixelsError::DivisionByZero);
    }
    debug!("divide {}", divisor);
    Ok(scalar_point_op(img, |v| v / divisor))
}

/// Shift every channel by `delta` (negative darkens)
pub fn change_brightness(img: &PixelBuffer, delta: f64) -> PixelBuffer {
    add(img, delta)
}

/// Scale each channel by its own factor
pub fn linear_color_scale(img: &PixelBuffer, scale_r: f64, scale_g: f64, scale_b: f64) -> PixelBuffer {
    debug!("linear color scale ({}, {}, {})", scale_r, scale_g, scale_b);
    img.apply_point_operation(|r, g, b| {
        (r as f64 * scale_r, g as f64 * scale_g, b as f64 * scale_b)
    })
}

/// Replace all channels with `floor((r + g + b) / 3)`
pub fn grayscale_average(img: &PixelBuffer) -> PixelBuffer {
    img.apply_point_operation(|r, g, b| {
        let v = ((r as u32 + g as u32 + b as u32) / 3) as f64;
        (v, v, v)
    })
}

/// Replace all channels with the truncated luminance
pub fn grayscale_luminance(img: &PixelBuffer) -> PixelBuffer {
    img.apply_point_operation(|r, g, b| {
        let v = luminance(r, g, b) as f64;
        (v, v, v)
    })
}
