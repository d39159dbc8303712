//! Image I/O
//!
//! File boundary for the engines: PPM goes through the in-crate codec, JPEG
//! through the `image` crate. Conversions to and from `image::RgbImage` copy
//! the flat RGB bytes unchanged.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor};
use std::path::Path;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use log::info;
use crate::buffer::PixelBuffer;
use crate::error::{PixelsError, Result};
use crate::ppm;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;
pub const MAX_JPEG_QUALITY: u8 = 95;

/// File formats chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Ppm,
    Jpeg,
}

impl FileKind {
    /// Case-insensitive extension lookup
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "ppm" => Ok(FileKind::Ppm),
            "jpg" | "jpeg" => Ok(FileKind::Jpeg),
            _ => Err(PixelsError::UnsupportedFormat(format!(
                "unsupported file extension '{}' ({})",
                ext,
                path.display()
            ))),
        }
    }
}

// ============================================================================
// CONVERSION
// ============================================================================

pub fn to_rgb_image(buffer: &PixelBuffer) -> Result<RgbImage> {
    RgbImage::from_raw(
        buffer.width() as u32,
        buffer.height() as u32,
        buffer.as_bytes().to_vec(),
    )
    .ok_or_else(|| {
        PixelsError::DimensionMismatch(format!(
            "{} bytes do not fit {}x{}",
            buffer.as_bytes().len(),
            buffer.width(),
            buffer.height()
        ))
    })
}

pub fn from_rgb_image(img: RgbImage) -> Result<PixelBuffer> {
    let (w, h) = img.dimensions();
    PixelBuffer::from_raw(w as usize, h as usize, 255, img.into_raw())
}

// ============================================================================
// JPEG
// ============================================================================

fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(1, MAX_JPEG_QUALITY)
}

/// Encode as JPEG bytes (quality clamped to 1..=95)
pub fn encode_jpeg(buffer: &PixelBuffer, quality: u8) -> Result<Vec<u8>> {
    let img = to_rgb_image(buffer)?;
    let mut out = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut out, clamp_quality(quality));
    encoder.encode_image(&img)?;
    Ok(out.into_inner())
}

pub fn decode_jpeg(bytes: &[u8]) -> Result<PixelBuffer> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?;
    from_rgb_image(img.to_rgb8())
}

// ============================================================================
// FILES
// ============================================================================

/// Load a `.ppm`, `.jpg` or `.jpeg` file
pub fn load_image(path: &Path) -> Result<PixelBuffer> {
    if !path.exists() {
        return Err(PixelsError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        )));
    }
    match FileKind::from_path(path)? {
        FileKind::Ppm => ppm::load_ppm(path),
        FileKind::Jpeg => {
            let file = File::open(path)?;
            let img = image::load(BufReader::new(file), ImageFormat::Jpeg)?;
            let buffer = from_rgb_image(img.to_rgb8())?;
            info!(
                "Loaded {} ({}x{})",
                path.display(),
                buffer.width(),
                buffer.height()
            );
            Ok(buffer)
        }
    }
}

pub fn save_as_ppm(buffer: &PixelBuffer, path: &Path, binary: bool) -> Result<()> {
    ppm::save_ppm(buffer, path, binary)
}

pub fn save_as_jpeg(buffer: &PixelBuffer, path: &Path, quality: u8) -> Result<()> {
    // Ensure output directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let img = to_rgb_image(buffer)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, clamp_quality(quality)).encode_image(&img)?;
    info!("Saved {} (JPEG q{})", path.display(), clamp_quality(quality));
    Ok(())
}

/// Save by extension; PPM output honors `binary`
pub fn save_image(buffer: &PixelBuffer, path: &Path, binary: bool) -> Result<()> {
    match FileKind::from_path(path)? {
        FileKind::Ppm => save_as_ppm(buffer, path, binary),
        FileKind::Jpeg => save_as_jpeg(buffer, path, DEFAULT_JPEG_QUALITY),
    }
}

// ============================================================================
// TESTS
// ============================================================================
