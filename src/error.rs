use thiserror::Error;

#[derive(Error, Debug)]
pub enum PixelsError {
    #[error("Value out of range: {0}")]
    ValueRange(String),

    #[error("PPM format error: {0}")]
    Format(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Image dimensions must be positive (got {width}x{height})")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Pixel ({x}, {y}) out of bounds for {width}x{height} image")]
    IndexOutOfRange {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("No image loaded")]
    NoImage,

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PixelsError>;

// Shells forward errors as plain strings
impl serde::Serialize for PixelsError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serializes_as_message() {
        let err = PixelsError::ValueRange("sigma must be positive".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Value out of range: sigma must be positive\"");
    }

    #[test]
    fn test_index_error_message() {
        let err = PixelsError::IndexOutOfRange { x: 5, y: 0, width: 2, height: 2 };
        assert_eq!(err.to_string(), "Pixel (5, 0) out of bounds for 2x2 image");
    }
}
