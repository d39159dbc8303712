//! PPM Codec (P3 / P6)
//!
//! Reader is a small state machine over a byte stream:
//! 1. Two-byte magic (`P3` ASCII, `P6` binary)
//! 2. Header tokenizer - whitespace separates, `#` starts a comment that runs
//!    to end-of-line, everything else accumulates into a token - until
//!    width, height and max value are collected
//! 3. Pixel body - raw bytes for P6, re-tokenized decimal samples for P3
//!
//! Samples are rescaled once to 0-255 when the header max value is not 255.
//! The buffer's declared max value is capped separately at 255.

use std::fs::File;
use std::io::{BufReader, BufWriter, Bytes, Read, Write};
use std::path::Path;

use log::{debug, info};
use crate::buffer::PixelBuffer;
use crate::error::{PixelsError, Result};

/// PPM flavour selected by the magic number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpmKind {
    /// `P3`
    Ascii,
    /// `P6`
    Binary,
}

impl PpmKind {
    pub fn magic(self) -> &'static str {
        match self {
            PpmKind::Ascii => "P3",
            PpmKind::Binary => "P6",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PpmHeader {
    pub kind: PpmKind,
    pub width: usize,
    pub height: usize,
    pub max_value: u32,
}

// ============================================================================
// TOKENIZER
// ============================================================================

/// Splits a PPM byte stream into whitespace/comment-delimited tokens
struct Tokenizer<R: Read> {
    bytes: Bytes<R>,
}

impl<R: Read> Tokenizer<R> {
    fn new(reader: R) -> Self {
        Self { bytes: reader.bytes() }
    }

    /// Next token, or `None` at end of stream
    fn next_token(&mut self) -> Result<Option<String>> {
        let mut token = Vec::new();
        let mut in_comment = false;

        while let Some(byte) = self.bytes.next() {
            let ch = byte?;
            if in_comment {
                if ch == b'\n' || ch == b'\r' {
                    in_comment = false;
                    // A comment glued to a token acts as its separator
                    if !token.is_empty() {
                        break;
                    }
                }
                continue;
            }
            match ch {
                b'#' => in_comment = true,
                b' ' | b'\t' | b'\r' | b'\n' | 0x0b | 0x0c => {
                    if !token.is_empty() {
                        break;
                    }
                }
                _ => token.push(ch),
            }
        }

        if token.is_empty() {
            return Ok(None);
        }
        String::from_utf8(token)
            .map(Some)
            .map_err(|_| PixelsError::Format("non-ASCII token in PPM stream".to_string()))
    }

    fn into_inner(self) -> Bytes<R> {
        self.bytes
    }
}

fn parse_number(token: &str, what: &str) -> Result<u32> {
    token
        .parse::<u32>()
        .map_err(|_| PixelsError::Format(format!("invalid {}: {:?}", what, token)))
}

// ============================================================================
// READ
// ============================================================================

/// Decode a PPM stream into a pixel buffer
pub fn read_ppm<R: Read>(reader: R) -> Result<PixelBuffer> {
    let mut reader = reader;
    let mut magic = [0u8; 2];
    reader
        .read_exact(&mut magic)
        .map_err(|_| PixelsError::Format("stream too short for PPM magic number".to_string()))?;
    let kind = match &magic {
        b"P3" => PpmKind::Ascii,
        b"P6" => PpmKind::Binary,
        other => {
            return Err(PixelsError::Format(format!(
                "unsupported magic number {:?} (expected P3 or P6)",
                String::from_utf8_lossy(other)
            )))
        }
    };

    let mut tokens = Tokenizer::new(reader);
    let mut fields = [0u32; 3];
    for (i, name) in ["width", "height", "max value"].iter().enumerate() {
        let token = tokens
            .next_token()?
            .ok_or_else(|| PixelsError::Format("PPM header is incomplete".to_string()))?;
        fields[i] = parse_number(&token, name)?;
    }
    let header = PpmHeader {
        kind,
        width: fields[0] as usize,
        height: fields[1] as usize,
        max_value: fields[2],
    };
    if header.width == 0 || header.height == 0 {
        return Err(PixelsError::Format(format!(
            "image dimensions must be positive (got {}x{})",
            header.width, header.height
        )));
    }
    if header.max_value == 0 {
        return Err(PixelsError::Format("max value must be positive".to_string()));
    }
    debug!(
        "PPM header: {} {}x{} max={}",
        kind.magic(),
        header.width,
        header.height,
        header.max_value
    );

    let total = header
        .width
        .checked_mul(header.height)
        .and_then(|n| n.checked_mul(3))
        .ok_or_else(|| PixelsError::Format("image dimensions overflow".to_string()))?;
    let data = match kind {
        PpmKind::Binary => read_binary_body(tokens.into_inner(), total, header.max_value)?,
        PpmKind::Ascii => read_ascii_body(&mut tokens, total, header.max_value)?,
    };

    let declared = header.max_value.min(255) as u8;
    PixelBuffer::from_raw(header.width, header.height, declared, data)
}

/// Initial body allocation; larger bodies grow with the bytes actually read
const MAX_PREALLOC: usize = 1 << 20;

fn read_binary_body<R: Read>(bytes: Bytes<R>, total: usize, max_value: u32) -> Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(total.min(MAX_PREALLOC));
    for byte in bytes.take(total) {
        raw.push(byte?);
    }
    if raw.len() != total {
        return Err(PixelsError::Format(format!(
            "binary pixel data shorter than expected ({} of {} bytes)",
            raw.len(),
            total
        )));
    }
    if max_value != 255 {
        for v in raw.iter_mut() {
            *v = normalize_sample(*v as u32, max_value);
        }
    }
    Ok(raw)
}

fn read_ascii_body<R: Read>(tokens: &mut Tokenizer<R>, total: usize, max_value: u32) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(total.min(MAX_PREALLOC));
    while data.len() < total {
        let token = tokens.next_token()?.ok_or_else(|| {
            PixelsError::Format(format!(
                "unexpected end of ASCII pixel data ({} of {} samples)",
                data.len(),
                total
            ))
        })?;
        let value = parse_number(&token, "sample")?;
        data.push(normalize_sample(value, max_value));
    }
    Ok(data)
}

/// Rescale a raw sample from `[0, max_value]` to `[0, 255]`
fn normalize_sample(value: u32, max_value: u32) -> u8 {
    if max_value == 255 {
        return value.min(255) as u8;
    }
    let scaled = (value as f64 / max_value as f64 * 255.0).round();
    scaled.clamp(0.0, 255.0) as u8
}

// ============================================================================
// WRITE
// ============================================================================

/// Encode a pixel buffer as PPM
pub fn write_ppm<W: Write>(buffer: &PixelBuffer, writer: W, binary: bool) -> Result<()> {
    let mut writer = writer;
    let kind = if binary { PpmKind::Binary } else { PpmKind::Ascii };
    write!(
        writer,
        "{}\n{} {}\n{}\n",
        kind.magic(),
        buffer.width(),
        buffer.height(),
        buffer.max_value()
    )?;

    match kind {
        PpmKind::Binary => writer.write_all(buffer.as_bytes())?,
        PpmKind::Ascii => {
            for row in buffer.as_bytes().chunks_exact(buffer.width() * 3) {
                let line = row
                    .chunks_exact(3)
                    .map(|p| format!("{} {} {}", p[0], p[1], p[2]))
                    .collect::<Vec<_>>()
                    .join(" ");
                writeln!(writer, "{}", line)?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

/// Encode to an in-memory byte vector
pub fn encode_ppm(buffer: &PixelBuffer, binary: bool) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(buffer.as_bytes().len() + 32);
    write_ppm(buffer, &mut out, binary)?;
    Ok(out)
}

// ============================================================================
// FILES
// ============================================================================

/// Read a PPM file from disk
pub fn load_ppm(path: &Path) -> Result<PixelBuffer> {
    let file = File::open(path)?;
    let buffer = read_ppm(BufReader::new(file))?;
    info!(
        "Loaded {} ({}x{})",
        path.display(),
        buffer.width(),
        buffer.height()
    );
    Ok(buffer)
}

/// Write a PPM file to disk
pub fn save_ppm(buffer: &PixelBuffer, path: &Path, binary: bool) -> Result<()> {
    // Ensure output directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    write_ppm(buffer, BufWriter::new(file), binary)?;
    info!("Saved {} ({})", path.display(), if binary { "P6" } else { "P3" });
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PixelBuffer {
        PixelBuffer::from_pixels(
            2,
            2,
            vec![(255, 0, 0), (0, 255, 0), (0, 0, 255), (10, 20, 30)],
            255,
        )
        .unwrap()
    }

    #[test]
    fn test_binary_roundtrip() {
        let img = sample();
        let bytes = encode_ppm(&img, true).unwrap();
        let back = read_ppm(bytes.as_slice()).unwrap();
        assert_eq!(back, img);
    }

    #[test]
    fn test_ascii_layout() {
        let bytes = encode_ppm(&sample(), false).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "P3\n2 2\n255\n255 0 0 0 255 0\n0 0 255 10 20 30\n");
    }

    #[test]
    fn test_header_comments_anywhere() {
        let data = b"P3 # magic\n# full line comment\n2#width\n1 # height\n255\n1 2 3 # first\n4 5 6\n";
        let img = read_ppm(&data[..]).unwrap();
        assert_eq!(img.dimensions(), (2, 1));
        assert_eq!(img.as_bytes(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_bad_magic() {
        let err = read_ppm(&b"P5\n1 1\n255\n\0"[..]).unwrap_err();
        assert!(matches!(err, PixelsError::Format(_)));
    }

    #[test]
    fn test_incomplete_header() {
        let err = read_ppm(&b"P6\n4 4\n"[..]).unwrap_err();
        assert!(matches!(err, PixelsError::Format(_)));
    }

    #[test]
    fn test_short_binary_body() {
        let mut data = b"P6\n2 1\n255\n".to_vec();
        data.extend_from_slice(&[1, 2, 3, 4]);
        assert!(matches!(read_ppm(data.as_slice()), Err(PixelsError::Format(_))));
    }

    #[test]
    fn test_dimension_overflow() {
        let err = read_ppm(&b"P6 4294967295 4294967295 255\n\0"[..]).unwrap_err();
        assert!(matches!(err, PixelsError::Format(_)));
    }

    #[test]
    fn test_huge_header_short_body() {
        // Declares 120 GB of samples; must fail on the missing data, not allocate it
        let err = read_ppm(&b"P6 200000 200000 255\n\x01\x02\x03"[..]).unwrap_err();
        assert!(matches!(err, PixelsError::Format(_)));
        let err = read_ppm(&b"P3 200000 200000 255\n1 2 3"[..]).unwrap_err();
        assert!(matches!(err, PixelsError::Format(_)));
    }

    #[test]
    fn test_short_ascii_body() {
        let data = b"P3\n1 2\n255\n1 2 3 4 5";
        assert!(matches!(read_ppm(&data[..]), Err(PixelsError::Format(_))));
    }

    #[test]
    fn test_rescale_low_depth() {
        let data = b"P3\n1 1\n15\n0 15 7\n";
        let img = read_ppm(&data[..]).unwrap();
        // 7 / 15 * 255 = 119
        assert_eq!(img.get_pixel(0, 0).unwrap(), (0, 255, 119));
        assert_eq!(img.max_value(), 15);
    }

    #[test]
    fn test_rescale_high_depth_caps_metadata() {
        let data = b"P3\n1 1\n1023\n1023 0 512\n";
        let img = read_ppm(&data[..]).unwrap();
        assert_eq!(img.get_pixel(0, 0).unwrap(), (255, 0, 128));
        assert_eq!(img.max_value(), 255);
    }

    #[test]
    fn test_binary_body_after_single_whitespace() {
        // 10 is '\n' - must be read as a sample, not swallowed as a separator
        let mut data = b"P6 1 1 255\n".to_vec();
        data.extend_from_slice(&[10, 32, 35]);
        let img = read_ppm(data.as_slice()).unwrap();
        assert_eq!(img.get_pixel(0, 0).unwrap(), (10, 32, 35));
    }
}
