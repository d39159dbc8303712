//! Bézier Curves
//!
//! Bernstein-basis evaluation of polynomial and rational (NURBS-style)
//! Bézier curves, plus [`BezierEditor`], the control-point model behind an
//! interactive curve editor.

use serde::{Deserialize, Serialize};
use log::warn;
use crate::error::{PixelsError, Result};
use crate::geometry::Point;

/// Rational denominators smaller than this collapse to the origin
pub const RATIONAL_EPSILON: f64 = 1e-10;

/// `C(n, k)` by the multiplicative formula, 0 outside `0..=n`
///
/// Exact in `u128` while the running product fits, then continued in `f64`.
pub fn binomial_coefficient(n: i64, k: i64) -> f64 {
    if k < 0 || k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    let mut exact: u128 = 1;
    for i in 0..k {
        // C(n, i) * (n - i) is divisible by (i + 1)
        match exact.checked_mul((n - i) as u128) {
            Some(product) => exact = product / (i + 1) as u128,
            None => {
                let mut approx = exact as f64;
                for j in i..k {
                    approx = approx * (n - j) as f64 / (j + 1) as f64;
                }
                return approx;
            }
        }
    }
    exact as f64
}

/// `B_{i,n}(t) = C(n, i) t^i (1-t)^(n-i)`, 0 for `t` outside `[0, 1]` or `i > n`
pub fn bernstein(n: usize, i: usize, t: f64) -> f64 {
    if i > n || !(0.0..=1.0).contains(&t) {
        return 0.0;
    }
    let c = binomial_coefficient(n as i64, i as i64);
    if c.is_finite() {
        return c * t.powi(i as i32) * (1.0 - t).powi((n - i) as i32);
    }
    // C(n, i) beyond f64 range: evaluate in log space
    if t == 0.0 {
        return if i == 0 { 1.0 } else { 0.0 };
    }
    if t == 1.0 {
        return if i == n { 1.0 } else { 0.0 };
    }
    let k = i.min(n - i);
    let ln_c: f64 = (0..k).map(|j| ((n - j) as f64 / (j + 1) as f64).ln()).sum();
    (ln_c + i as f64 * t.ln() + (n - i) as f64 * (1.0 - t).ln()).exp()
}

/// Point at `t` on the polynomial curve; origin for no controls
pub fn curve_point(controls: &[Point], t: f64) -> Point {
    if controls.is_empty() {
        return Point::default();
    }
    let n = controls.len() - 1;
    controls
        .iter()
        .enumerate()
        .fold(Point::default(), |acc, (i, p)| {
            let b = bernstein(n, i, t);
            Point::new(acc.x + b * p.x, acc.y + b * p.y)
        })
}

/// Point at `t` on the rational curve
///
/// Mismatched weights or a near-zero denominator give the origin rather
/// than an error.
pub fn rational_curve_point(controls: &[Point], weights: &[f64], t: f64) -> Point {
    if controls.is_empty() || controls.len() != weights.len() {
        return Point::default();
    }
    let n = controls.len() - 1;
    let (mut nx, mut ny, mut den) = (0.0, 0.0, 0.0);
    for (i, (p, &w)) in controls.iter().zip(weights).enumerate() {
        let wb = w * bernstein(n, i, t);
        nx += wb * p.x;
        ny += wb * p.y;
        den += wb;
    }
    if den.abs() < RATIONAL_EPSILON {
        return Point::default();
    }
    Point::new(nx / den, ny / den)
}

/// How control points are blended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "weights", rename_all = "snake_case")]
pub enum CurveKind {
    #[default]
    Polynomial,
    /// One weight per control point
    Rational(Vec<f64>),
}

/// Sample `samples + 1` points at `t = i / samples`
///
/// Fewer than two controls are returned as-is. Rational weights that do not
/// match the control count fall back to polynomial evaluation.
pub fn generate_curve(controls: &[Point], samples: usize, kind: &CurveKind) -> Vec<Point> {
    if controls.len() < 2 {
        return controls.to_vec();
    }
    let samples = samples.max(1);
    let weights = match kind {
        CurveKind::Rational(w) if w.len() == controls.len() => Some(w.as_slice()),
        CurveKind::Rational(w) => {
            warn!(
                "{} weights for {} controls, using polynomial curve",
                w.len(),
                controls.len()
            );
            None
        }
        CurveKind::Polynomial => None,
    };
    (0..=samples)
        .map(|i| {
            let t = i as f64 / samples as f64;
            match weights {
                Some(w) => rational_curve_point(controls, w, t),
                None => curve_point(controls, t),
            }
        })
        .collect()
}

// ============================================================================
// EDITOR MODEL
// ============================================================================

pub const EDITOR_SAMPLES: usize = 200;
pub const POINT_RADIUS: f64 = 6.0;
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Control points with parallel weights
///
/// Weights are always kept the same length as the points; `rational`
/// decides whether they take part in [`BezierEditor::curve`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BezierEditor {
    points: Vec<Point>,
    weights: Vec<f64>,
    pub rational: bool,
}

impl BezierEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Replace all points; weights reset to the default
    pub fn set_control_points(&mut self, points: Vec<Point>) {
        self.weights = vec![DEFAULT_WEIGHT; points.len()];
        self.points = points;
    }

    pub fn add_point(&mut self, p: Point) {
        self.points.push(p);
        self.weights.push(DEFAULT_WEIGHT);
    }

    /// Remove a point with its weight; out-of-range is ignored
    pub fn remove_point(&mut self, index: usize) -> Option<Point> {
        if index >= self.points.len() {
            return None;
        }
        self.weights.remove(index);
        Some(self.points.remove(index))
    }

    /// Set one weight; out-of-range is ignored
    pub fn set_weight(&mut self, index: usize, weight: f64) -> Result<()> {
        if !(weight.is_finite() && weight > 0.0) {
            return Err(PixelsError::ValueRange(format!(
                "weight must be positive and finite, got {}",
                weight
            )));
        }
        if let Some(w) = self.weights.get_mut(index) {
            *w = weight;
        }
        Ok(())
    }

    pub fn move_point(&mut self, index: usize, p: Point) {
        if let Some(slot) = self.points.get_mut(index) {
            *slot = p;
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.weights.clear();
    }

    /// First point within [`POINT_RADIUS`] of `(x, y)`
    pub fn find_point_at(&self, x: f64, y: f64) -> Option<usize> {
        let target = Point::new(x, y);
        let r2 = POINT_RADIUS * POINT_RADIUS;
        self.points
            .iter()
            .position(|&p| p.distance_squared(target) <= r2)
    }

    pub fn kind(&self) -> CurveKind {
        if self.rational {
            CurveKind::Rational(self.weights.clone())
        } else {
            CurveKind::Polynomial
        }
    }

    /// Current curve at editor resolution
    pub fn curve(&self) -> Vec<Point> {
        generate_curve(&self.points, EDITOR_SAMPLES, &self.kind())
    }
}

// ============================================================================
// TESTS
// ============================================================================
