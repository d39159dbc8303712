//! Processing Pipeline
//!
//! Every image transform as a serializable [`Operation`], a JSON-loadable
//! list of them ([`PipelineSettings`]), and [`Session`], the explicit
//! "current image" a shell threads through its calls.
//!
//! Operations never mutate their input. A failed step leaves the session's
//! previous image in place.

use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use log::{info, warn};
use crate::binarization::{binarize, ThresholdMethod};
use crate::buffer::PixelBuffer;
use crate::error::{PixelsError, Result};
use crate::filters;
use crate::histogram::{self, ChannelSelection};
use crate::point_ops;

// ============================================================================
// OPERATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Add { value: f64 },
    Subtract { value: f64 },
    Multiply { factor: f64 },
    Divide { divisor: f64 },
    Brightness { delta: f64 },
    ColorScale { r: f64, g: f64, b: f64 },
    GrayscaleAverage,
    GrayscaleLuminance,
    Stretch {
        #[serde(default)]
        channels: ChannelSelection,
    },
    Equalize {
        #[serde(default)]
        channels: ChannelSelection,
    },
    MeanFilter {
        #[serde(default = "default_window")]
        size: usize,
    },
    Sharpen,
    /// Kernel rows; `divisor` of `None` or `0` falls back to the weight sum
    Convolve {
        kernel: Vec<Vec<f64>>,
        #[serde(default)]
        divisor: Option<f64>,
        #[serde(default)]
        offset: f64,
    },
    GaussianBlur {
        #[serde(default = "default_sigma")]
        sigma: f64,
    },
    Median {
        #[serde(default = "default_window")]
        size: usize,
    },
    Sobel,
    Binarize(ThresholdMethod),
}

fn default_window() -> usize {
    3
}

fn default_sigma() -> f64 {
    1.0
}

impl Operation {
    pub fn apply(&self, img: &PixelBuffer) -> Result<PixelBuffer> {
        match self {
            Operation::Add { value } => Ok(point_ops::add(img, *value)),
            Operation::Subtract { value } => Ok(point_ops::subtract(img, *value)),
            Operation::Multiply { factor } => Ok(point_ops::multiply(img, *factor)),
            Operation::Divide { divisor } => point_ops::divide(img, *divisor),
            Operation::Brightness { delta } => Ok(point_ops::change_brightness(img, *delta)),
            Operation::ColorScale { r, g, b } => Ok(point_ops::linear_color_scale(img, *r, *g, *b)),
            Operation::GrayscaleAverage => Ok(point_ops::grayscale_average(img)),
            Operation::GrayscaleLuminance => Ok(point_ops::grayscale_luminance(img)),
            Operation::Stretch { channels } => Ok(histogram::stretch(img, *channels)),
            Operation::Equalize { channels } => Ok(histogram::equalize(img, *channels)),
            Operation::MeanFilter { size } => filters::mean_filter(img, *size),
            Operation::Sharpen => Ok(filters::high_pass_sharpen(img)),
            Operation::Convolve { kernel, divisor, offset } => {
                filters::custom_convolution(img, kernel, *divisor, *offset)
            }
            Operation::GaussianBlur { sigma } => filters::gaussian_blur(img, *sigma),
            Operation::Median { size } => filters::median_filter(img, *size),
            Operation::Sobel => Ok(filters::sobel_edge(img)),
            Operation::Binarize(method) => binarize(img, method),
        }
    }

    /// Short human-readable description for status lines
    pub fn label(&self) -> String {
        match self {
            Operation::Add { value } => format!("add {}", value),
            Operation::Subtract { value } => format!("subtract {}", value),
            Operation::Multiply { factor } => format!("multiply by {}", factor),
            Operation::Divide { divisor } => format!("divide by {}", divisor),
            Operation::Brightness { delta } => format!("brightness {:+}", delta),
            Operation::ColorScale { r, g, b } => format!("color scale ({}, {}, {})", r, g, b),
            Operation::GrayscaleAverage => "grayscale (average)".to_string(),
            Operation::GrayscaleLuminance => "grayscale (luminance)".to_string(),
            Operation::Stretch { channels } => format!("stretch {:?}", channels).to_lowercase(),
            Operation::Equalize { channels } => format!("equalize {:?}", channels).to_lowercase(),
            Operation::MeanFilter { size } => format!("mean filter {}x{}", size, size),
            Operation::Sharpen => "sharpen".to_string(),
            Operation::Convolve { kernel, .. } => {
                format!("convolve {}x{}", kernel.len(), kernel.first().map_or(0, |r| r.len()))
            }
            Operation::GaussianBlur { sigma } => format!("gaussian blur sigma={}", sigma),
            Operation::Median { size } => format!("median {}x{}", size, size),
            Operation::Sobel => "sobel".to_string(),
            Operation::Binarize(method) => format!("binarize {}", method.name()),
        }
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Ordered list of operations, usually loaded from JSON:
///
/// ```json
/// { "operations": [ {"op": "gaussian_blur", "sigma": 1.5},
///                   {"op": "binarize", "method": "entropy"} ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl PipelineSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings: PipelineSettings = serde_json::from_str(&content)?;
        info!("Loaded pipeline {} ({} operations)", path.display(), settings.operations.len());
        Ok(settings)
    }

    /// Apply every operation in order, stopping at the first failure
    pub fn run(&self, img: &PixelBuffer) -> Result<PixelBuffer> {
        let mut current = img.clone();
        for (i, op) in self.operations.iter().enumerate() {
            info!("[{}/{}] {}", i + 1, self.operations.len(), op.label());
            current = op.apply(&current)?;
        }
        Ok(current)
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// Explicit application state: the current image and a status label
#[derive(Debug, Clone, Default)]
pub struct Session {
    image: Option<PixelBuffer>,
    status: String,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(image: PixelBuffer) -> Self {
        let mut session = Self::new();
        session.load(image);
        session
    }

    /// Replace the current image
    pub fn load(&mut self, image: PixelBuffer) {
        self.status = format!("loaded {}x{}", image.width(), image.height());
        self.image = Some(image);
    }

    pub fn image(&self) -> Option<&PixelBuffer> {
        self.image.as_ref()
    }

    pub fn take_image(&mut self) -> Option<PixelBuffer> {
        self.image.take()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Run `op` on the current image, keeping it unchanged on failure
    pub fn apply(&mut self, op: &Operation) -> Result<&PixelBuffer> {
        let current = self.image.as_ref().ok_or(PixelsError::NoImage)?;
        match op.apply(current) {
            Ok(next) => {
                self.status = op.label();
                Ok(&*self.image.insert(next))
            }
            Err(e) => {
                warn!("{} failed: {}", op.label(), e);
                self.status = format!("{} failed: {}", op.label(), e);
                Err(e)
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_ramp() -> PixelBuffer {
        let pixels = (0..9u8).map(|i| {
            let v = 20 + i * 25;
            (v, v, v)
        });
        PixelBuffer::from_pixels(3, 3, pixels, 255).unwrap()
    }

    #[test]
    fn test_operation_json_shape() {
        let op: Operation = serde_json::from_str(r#"{"op": "gaussian_blur", "sigma": 2.0}"#).unwrap();
        assert_eq!(op, Operation::GaussianBlur { sigma: 2.0 });

        let op: Operation = serde_json::from_str(r#"{"op": "median"}"#).unwrap();
        assert_eq!(op, Operation::Median { size: 3 });
        let op: Operation = serde_json::from_str(r#"{"op": "gaussian_blur"}"#).unwrap();
        assert_eq!(op, Operation::GaussianBlur { sigma: 1.0 });

        let op: Operation = serde_json::from_str(r#"{"op": "stretch"}"#).unwrap();
        assert_eq!(op, Operation::Stretch { channels: ChannelSelection::All });

        let op: Operation =
            serde_json::from_str(r#"{"op": "binarize", "method": "percent_black", "percent": 30}"#)
                .unwrap();
        assert_eq!(op, Operation::Binarize(ThresholdMethod::PercentBlack { percent: 30.0 }));

        let op: Operation = serde_json::from_str(r#"{"op": "binarize", "method": "entropy"}"#).unwrap();
        assert_eq!(op, Operation::Binarize(ThresholdMethod::Entropy));

        let op: Operation =
            serde_json::from_str(r#"{"op": "convolve", "kernel": [[0,0,0],[0,1,0],[0,0,0]]}"#).unwrap();
        assert!(matches!(op, Operation::Convolve { divisor: None, offset, .. } if offset == 0.0));
    }

    #[test]
    fn test_operation_roundtrips_through_json() {
        let op = Operation::ColorScale { r: 1.5, g: 1.0, b: 0.5 };
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains(r#""op":"color_scale""#));
        assert_eq!(serde_json::from_str::<Operation>(&json).unwrap(), op);
    }

    #[test]
    fn test_apply_matches_engine() {
        let img = gray_ramp();
        let out = Operation::Add { value: 10.0 }.apply(&img).unwrap();
        assert_eq!(out, point_ops::add(&img, 10.0));
        let out = Operation::Sobel.apply(&img).unwrap();
        assert_eq!(out, filters::sobel_edge(&img));
    }

    #[test]
    fn test_apply_propagates_errors() {
        let img = gray_ramp();
        assert!(matches!(
            Operation::Divide { divisor: 0.0 }.apply(&img),
            Err(PixelsError::DivisionByZero)
        ));
        assert!(matches!(
            Operation::GaussianBlur { sigma: 0.0 }.apply(&img),
            Err(PixelsError::ValueRange(_))
        ));
    }

    #[test]
    fn test_labels() {
        assert_eq!(Operation::MeanFilter { size: 3 }.label(), "mean filter 3x3");
        assert_eq!(Operation::Brightness { delta: -20.0 }.label(), "brightness -20");
        assert_eq!(
            Operation::Stretch { channels: ChannelSelection::Red }.label(),
            "stretch red"
        );
        assert_eq!(Operation::Binarize(ThresholdMethod::Entropy).label(), "binarize entropy");
    }

    #[test]
    fn test_pipeline_runs_in_order() {
        let settings = PipelineSettings {
            operations: vec![
                Operation::Multiply { factor: 2.0 },
                Operation::Subtract { value: 10.0 },
            ],
        };
        let img = gray_ramp();
        let expected = point_ops::subtract(&point_ops::multiply(&img, 2.0), 10.0);
        assert_eq!(settings.run(&img).unwrap(), expected);
        // Input untouched
        assert_eq!(img, gray_ramp());
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let img = gray_ramp();
        assert_eq!(PipelineSettings::default().run(&img).unwrap(), img);
    }

    #[test]
    fn test_session_requires_image() {
        let mut session = Session::new();
        assert!(matches!(session.apply(&Operation::Sharpen), Err(PixelsError::NoImage)));
    }

    #[test]
    fn test_session_keeps_image_on_failure() {
        let mut session = Session::with_image(gray_ramp());
        session.apply(&Operation::Add { value: 5.0 }).unwrap();
        assert_eq!(session.status(), "add 5");
        let before = session.image().cloned();

        assert!(session.apply(&Operation::Divide { divisor: 0.0 }).is_err());
        assert_eq!(session.image().cloned(), before);
        assert!(session.status().contains("failed"));

        assert!(session.take_image().is_some());
        assert!(session.image().is_none());
    }
}
