//! Image processing engine
//!
//! A flat RGB [`PixelBuffer`] and the engines that transform it (point
//! operations, histograms, spatial filters, binarization), a PPM codec,
//! plus two independent math libraries for vector scenes: homogeneous 2D
//! geometry and Bézier curves.
//!
//! Every image operation takes `&PixelBuffer` and returns a new buffer.

pub mod error;
pub mod buffer;
pub mod ppm;
pub mod point_ops;
pub mod histogram;
pub mod filters;
pub mod binarization;
pub mod geometry;
pub mod scene;
pub mod bezier;
pub mod image_io;
pub mod pipeline;

pub use buffer::{luminance, PixelBuffer, Rgb};
pub use error::{PixelsError, Result};
pub use binarization::ThresholdMethod;
pub use filters::Kernel;
pub use geometry::{Mat3, Point, Polygon};
pub use histogram::{Channel, ChannelSelection, Histogram};
pub use pipeline::{Operation, PipelineSettings, Session};
pub use scene::SceneState;
pub use bezier::{BezierEditor, CurveKind};
