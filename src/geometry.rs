//! 2D Geometry
//!
//! Homogeneous 3x3 transforms and named polygons. Independent of the pixel
//! engines; shells use it for vector scenes.
//!
//! Matrices act on column vectors, so `a * b` applies `b` first:
//!
//! ```text
//!   | m00 m01 m02 |   | x |
//!   | m10 m11 m12 | * | y |
//!   | m20 m21 m22 |   | 1 |
//! ```

use std::ops::Mul;
use serde::{Deserialize, Serialize};

/// Below this, the homogeneous divide is skipped
pub const HOMOGENEOUS_EPSILON: f64 = 1e-12;

/// Added to edge-slope denominators in the crossing test
const RAY_EPSILON: f64 = 1e-12;

// ============================================================================
// POINT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

// ============================================================================
// MATRIX
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3(pub [[f64; 3]; 3]);

impl Default for Mat3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mat3 {
    pub const fn identity() -> Self {
        Mat3([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    pub const fn translate(dx: f64, dy: f64) -> Self {
        Mat3([[1.0, 0.0, dx], [0.0, 1.0, dy], [0.0, 0.0, 1.0]])
    }

    /// Counter-clockwise rotation in a y-up frame (clockwise on screen)
    pub fn rotate(degrees: f64) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        Mat3([[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]])
    }

    pub const fn scale(sx: f64, sy: f64) -> Self {
        Mat3([[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, 1.0]])
    }

    /// `translate(p) * m * translate(-p)`: apply `m` with `pivot` as origin
    pub fn around_point(pivot: Point, m: Mat3) -> Self {
        Mat3::translate(pivot.x, pivot.y) * m * Mat3::translate(-pivot.x, -pivot.y)
    }

    pub fn multiply(&self, other: &Mat3) -> Mat3 {
        let a = &self.0;
        let b = &other.0;
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
        }
        Mat3(out)
    }

    /// Transform a point, dividing by `w` unless it is (nearly) zero
    pub fn apply_to_point(&self, p: Point) -> Point {
        let m = &self.0;
        let hx = m[0][0] * p.x + m[0][1] * p.y + m[0][2];
        let hy = m[1][0] * p.x + m[1][1] * p.y + m[1][2];
        let hw = m[2][0] * p.x + m[2][1] * p.y + m[2][2];
        if hw.abs() < HOMOGENEOUS_EPSILON {
            return Point::new(hx, hy);
        }
        Point::new(hx / hw, hy / hw)
    }
}

impl Mul for Mat3 {
    type Output = Mat3;

    fn mul(self, rhs: Mat3) -> Mat3 {
        self.multiply(&rhs)
    }
}

// ============================================================================
// POLYGON
// ============================================================================

/// Even-odd ray casting; fewer than three vertices is never inside
pub fn point_in_polygon(p: Point, vertices: &[Point]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (vi, vj) = (vertices[i], vertices[j]);
        if (vi.y > p.y) != (vj.y > p.y)
            && p.x < (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y + RAY_EPSILON) + vi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

pub const DEFAULT_POLYGON_NAME: &str = "Polygon";

#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub name: String,
    pub points: Vec<Point>,
}

impl Default for Polygon {
    fn default() -> Self {
        Self {
            name: DEFAULT_POLYGON_NAME.to_string(),
            points: Vec::new(),
        }
    }
}

impl Polygon {
    pub fn new(name: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    /// Copy with every vertex transformed
    pub fn transformed(&self, m: &Mat3) -> Polygon {
        Polygon {
            name: self.name.clone(),
            points: self.points.iter().map(|&p| m.apply_to_point(p)).collect(),
        }
    }

    /// Transform every vertex in place
    pub fn apply(&mut self, m: &Mat3) {
        for p in self.points.iter_mut() {
            *p = m.apply_to_point(*p);
        }
    }

    /// Vertex average, origin when empty
    pub fn centroid(&self) -> Point {
        if self.points.is_empty() {
            return Point::default();
        }
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / n, sy / n)
    }

    pub fn contains(&self, p: Point) -> bool {
        point_in_polygon(p, &self.points)
    }

    /// Inside the polygon, or within `radius` of a vertex
    pub fn hit_test(&self, p: Point, radius: f64) -> bool {
        if self.contains(p) {
            return true;
        }
        let r2 = radius * radius;
        self.points.iter().any(|&v| p.distance_squared(v) <= r2)
    }

    /// Index of the closest vertex strictly within `radius`
    pub fn nearest_vertex(&self, p: Point, radius: f64) -> Option<usize> {
        let r2 = radius * radius;
        self.points
            .iter()
            .enumerate()
            .map(|(i, &v)| (i, p.distance_squared(v)))
            .filter(|&(_, d2)| d2 < r2)
            .fold(None, |best: Option<(usize, f64)>, (i, d2)| match best {
                Some((_, best_d2)) if best_d2 <= d2 => best,
                _ => Some((i, d2)),
            })
            .map(|(i, _)| i)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    fn square() -> Polygon {
        Polygon::new(
            "square",
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ],
        )
    }

    #[test]
    fn test_identity_and_multiply() {
        let m = Mat3::translate(3.0, -2.0) * Mat3::scale(2.0, 4.0);
        assert_eq!(Mat3::identity() * m, m);
        assert_eq!(m * Mat3::identity(), m);
        // Scale first, then translate
        assert!(close(m.apply_to_point(Point::new(1.0, 1.0)), Point::new(5.0, 2.0)));
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let p = Mat3::rotate(90.0).apply_to_point(Point::new(1.0, 0.0));
        assert!(close(p, Point::new(0.0, 1.0)));
    }

    #[test]
    fn test_around_point_fixes_pivot() {
        let pivot = Point::new(37.5, -12.25);
        for angle in [0.0, 15.0, 90.0, 180.0, 271.3, -45.0] {
            let m = Mat3::around_point(pivot, Mat3::rotate(angle));
            assert!(close(m.apply_to_point(pivot), pivot), "angle {}", angle);
        }
        let m = Mat3::around_point(pivot, Mat3::scale(3.0, 0.5));
        assert!(close(m.apply_to_point(pivot), pivot));
    }

    #[test]
    fn test_homogeneous_divide_guard() {
        let m = Mat3([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]]);
        assert_eq!(m.apply_to_point(Point::new(4.0, 5.0)), Point::new(4.0, 5.0));
        let m = Mat3([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 2.0]]);
        assert_eq!(m.apply_to_point(Point::new(4.0, 5.0)), Point::new(2.0, 2.5));
    }

    #[test]
    fn test_point_in_polygon() {
        let sq = square();
        assert!(sq.contains(Point::new(5.0, 5.0)));
        assert!(!sq.contains(Point::new(15.0, 5.0)));
        assert!(!sq.contains(Point::new(5.0, -1.0)));
        let segment = vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)];
        assert!(!point_in_polygon(Point::new(5.0, 5.0), &segment));
    }

    #[test]
    fn test_point_in_concave_polygon() {
        // U shape, notch between x=4..6 above y=4
        let u = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(6.0, 10.0),
            Point::new(6.0, 4.0),
            Point::new(4.0, 4.0),
            Point::new(4.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(point_in_polygon(Point::new(2.0, 8.0), &u));
        assert!(!point_in_polygon(Point::new(5.0, 8.0), &u));
        assert!(point_in_polygon(Point::new(5.0, 2.0), &u));
    }

    #[test]
    fn test_transformed_vs_apply() {
        let sq = square();
        let m = Mat3::translate(5.0, 5.0);
        let moved = sq.transformed(&m);
        assert_eq!(sq.points[0], Point::new(0.0, 0.0));
        assert_eq!(moved.points[0], Point::new(5.0, 5.0));
        assert_eq!(moved.name, "square");

        let mut in_place = sq.clone();
        in_place.apply(&m);
        assert_eq!(in_place, moved);
    }

    #[test]
    fn test_centroid() {
        assert_eq!(square().centroid(), Point::new(5.0, 5.0));
        assert_eq!(Polygon::default().centroid(), Point::new(0.0, 0.0));
    }

    #[test]
    fn test_hit_test() {
        let sq = square();
        assert!(sq.hit_test(Point::new(5.0, 5.0), 0.0));
        assert!(sq.hit_test(Point::new(-3.0, 0.0), 8.0));
        assert!(!sq.hit_test(Point::new(-30.0, 0.0), 8.0));
    }

    #[test]
    fn test_nearest_vertex() {
        let sq = square();
        assert_eq!(sq.nearest_vertex(Point::new(9.0, 9.5), 10.0), Some(2));
        assert_eq!(sq.nearest_vertex(Point::new(50.0, 50.0), 10.0), None);
        // Exactly on the radius does not qualify
        assert_eq!(sq.nearest_vertex(Point::new(-10.0, 0.0), 10.0), None);
        assert_eq!(Polygon::default().nearest_vertex(Point::new(0.0, 0.0), 10.0), None);
    }
}
