//! Polygon Scene
//!
//! Editable collection of polygons with a selection and two pivots (rotate,
//! scale), persisted as versioned JSON:
//!
//! ```text
//! { "version": 1,
//!   "rotate_pivot": {"x": .., "y": ..},
//!   "scale_pivot":  {"x": .., "y": ..},
//!   "selected_index": <int|null>,
//!   "polygons": [ {"type": "polygon", "name": .., "points": [{"x": .., "y": ..}]} ] }
//! ```

use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use log::{debug, info, warn};
use crate::error::Result;
use crate::geometry::{Mat3, Point, Polygon, DEFAULT_POLYGON_NAME};

pub const SCENE_VERSION: u32 = 1;

/// Pivot used when none is stored
pub const DEFAULT_PIVOT: Point = Point::new(200.0, 200.0);

/// Pick radius around vertices when selecting
pub const SELECT_RADIUS: f64 = 8.0;

// ============================================================================
// PERSISTED FORM
// ============================================================================

fn default_pivot_coord() -> f64 {
    200.0
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct PivotRecord {
    #[serde(default = "default_pivot_coord")]
    x: f64,
    #[serde(default = "default_pivot_coord")]
    y: f64,
}

impl Default for PivotRecord {
    fn default() -> Self {
        DEFAULT_PIVOT.into()
    }
}

impl From<Point> for PivotRecord {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

fn default_polygon_tag() -> String {
    "polygon".to_string()
}

fn default_polygon_name() -> String {
    DEFAULT_POLYGON_NAME.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PolygonRecord {
    #[serde(rename = "type", default = "default_polygon_tag")]
    kind: String,
    #[serde(default = "default_polygon_name")]
    name: String,
    #[serde(default)]
    points: Vec<Point>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SceneRecord {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    rotate_pivot: PivotRecord,
    #[serde(default)]
    scale_pivot: PivotRecord,
    /// Anything but a non-negative integer loads as no selection
    #[serde(default)]
    selected_index: Value,
    #[serde(default)]
    polygons: Vec<PolygonRecord>,
}

// ============================================================================
// SCENE STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SceneState {
    pub polygons: Vec<Polygon>,
    pub selected_index: Option<usize>,
    pub rotate_pivot: Point,
    pub scale_pivot: Point,
}

impl Default for SceneState {
    fn default() -> Self {
        Self {
            polygons: Vec::new(),
            selected_index: None,
            rotate_pivot: DEFAULT_PIVOT,
            scale_pivot: DEFAULT_PIVOT,
        }
    }
}

impl SceneState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a polygon and select it
    pub fn add_polygon(&mut self, polygon: Polygon) {
        self.polygons.push(polygon);
        self.selected_index = Some(self.polygons.len() - 1);
    }

    /// Remove all polygons and the selection; pivots are kept
    pub fn clear(&mut self) {
        self.polygons.clear();
        self.selected_index = None;
    }

    /// Select the topmost polygon hit at `p`, or clear the selection
    pub fn select_at(&mut self, p: Point) -> Option<usize> {
        self.selected_index = self
            .polygons
            .iter()
            .rposition(|poly| poly.hit_test(p, SELECT_RADIUS));
        self.selected_index
    }

    pub fn selected_polygon(&self) -> Option<&Polygon> {
        self.selected_index.and_then(|i| self.polygons.get(i))
    }

    pub fn selected_polygon_mut(&mut self) -> Option<&mut Polygon> {
        match self.selected_index {
            Some(i) => self.polygons.get_mut(i),
            None => None,
        }
    }

    /// Apply `m` to the selection; false when nothing is selected
    pub fn transform_selected(&mut self, m: &Mat3) -> bool {
        match self.selected_polygon_mut() {
            Some(poly) => {
                poly.apply(m);
                true
            }
            None => false,
        }
    }

    pub fn translate_selected(&mut self, dx: f64, dy: f64) -> bool {
        self.transform_selected(&Mat3::translate(dx, dy))
    }

    /// Rotate the selection about the rotate pivot
    pub fn rotate_selected(&mut self, degrees: f64) -> bool {
        let m = Mat3::around_point(self.rotate_pivot, Mat3::rotate(degrees));
        self.transform_selected(&m)
    }

    /// Uniform scale of the selection about the scale pivot
    pub fn scale_selected(&mut self, factor: f64) -> bool {
        let m = Mat3::around_point(self.scale_pivot, Mat3::scale(factor, factor));
        self.transform_selected(&m)
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    fn to_record(&self) -> SceneRecord {
        SceneRecord {
            version: SCENE_VERSION,
            rotate_pivot: self.rotate_pivot.into(),
            scale_pivot: self.scale_pivot.into(),
            selected_index: match self.selected_index {
                Some(i) => Value::from(i),
                None => Value::Null,
            },
            polygons: self
                .polygons
                .iter()
                .map(|poly| PolygonRecord {
                    kind: default_polygon_tag(),
                    name: poly.name.clone(),
                    points: poly.points.clone(),
                })
                .collect(),
        }
    }

    fn from_record(record: SceneRecord) -> Self {
        if record.version != SCENE_VERSION {
            debug!("scene version {} (expected {})", record.version, SCENE_VERSION);
        }
        Self {
            polygons: record
                .polygons
                .into_iter()
                .map(|r| Polygon::new(r.name, r.points))
                .collect(),
            selected_index: record.selected_index.as_u64().map(|i| i as usize),
            rotate_pivot: Point::new(record.rotate_pivot.x, record.rotate_pivot.y),
            scale_pivot: Point::new(record.scale_pivot.x, record.scale_pivot.y),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_record())?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let record: SceneRecord = serde_json::from_str(text)?;
        Ok(Self::from_record(record))
    }

    /// Write the scene, creating the parent directory if needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_json()?)?;
        info!("Saved scene {} ({} polygons)", path.display(), self.polygons.len());
        Ok(())
    }

    /// Replace this scene with the file's contents; a missing file is a no-op
    pub fn load(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            warn!("no scene at {}, keeping current scene", path.display());
            return Ok(());
        }
        let content = fs::read_to_string(path)?;
        *self = Self::from_json(&content)?;
        info!("Loaded scene {} ({} polygons)", path.display(), self.polygons.len());
        Ok(())
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

    fn square(name: &str, x0: f64, y0: f64, side: f64) -> Polygon {
        Polygon::new(
            name,
            vec![
                Point::new(x0, y0),
                Point::new(x0 + side, y0),
                Point::new(x0 + side, y0 + side),
                Point::new(x0, y0 + side),
            ],
        )
    }

    fn overlapping_scene() -> SceneState {
        let mut scene = SceneState::new();
        scene.add_polygon(square("bottom", 0.0, 0.0, 20.0));
        scene.add_polygon(square("top", 10.0, 10.0, 20.0));
        scene.selected_index = None;
        scene
    }

    #[test]
    fn test_defaults() {
        let scene = SceneState::default();
        assert!(scene.polygons.is_empty());
        assert_eq!(scene.selected_index, None);
        assert_eq!(scene.rotate_pivot, Point::new(200.0, 200.0));
        assert_eq!(scene.scale_pivot, Point::new(200.0, 200.0));
    }

    #[test]
    fn test_select_topmost() {
        let mut scene = overlapping_scene();
        assert_eq!(scene.select_at(Point::new(15.0, 15.0)), Some(1));
        assert_eq!(scene.select_at(Point::new(2.0, 2.0)), Some(0));
        assert_eq!(scene.select_at(Point::new(100.0, 100.0)), None);
        assert_eq!(scene.selected_index, None);
    }

    #[test]
    fn test_selected_out_of_range_ignored() {
        let mut scene = overlapping_scene();
        scene.selected_index = Some(7);
        assert!(scene.selected_polygon().is_none());
        assert!(!scene.translate_selected(1.0, 1.0));
    }

    #[test]
    fn test_transforms_without_selection_are_noops() {
        let mut scene = overlapping_scene();
        let before = scene.clone();
        assert!(!scene.rotate_selected(45.0));
        assert!(!scene.scale_selected(2.0));
        assert_eq!(scene, before);
    }

    #[test]
    fn test_rotate_about_pivot() {
        let mut scene = SceneState::new();
        scene.rotate_pivot = Point::new(10.0, 10.0);
        scene.add_polygon(square("sq", 10.0, 10.0, 10.0));
        assert!(scene.rotate_selected(90.0));
        let poly = scene.selected_polygon().unwrap();
        // Vertex on the pivot stays put
        assert!(close(poly.points[0], Point::new(10.0, 10.0)));
        assert!(close(poly.points[1], Point::new(10.0, 20.0)));
    }

    #[test]
    fn test_scale_about_pivot() {
        let mut scene = SceneState::new();
        scene.scale_pivot = Point::new(0.0, 0.0);
        scene.add_polygon(square("sq", 1.0, 1.0, 1.0));
        scene.scale_selected(3.0);
        let poly = scene.selected_polygon().unwrap();
        assert!(close(poly.points[2], Point::new(6.0, 6.0)));
    }

    #[test]
    fn test_clear_keeps_pivots() {
        let mut scene = overlapping_scene();
        scene.rotate_pivot = Point::new(1.0, 2.0);
        scene.select_at(Point::new(5.0, 5.0));
        scene.clear();
        assert!(scene.polygons.is_empty());
        assert_eq!(scene.selected_index, None);
        assert_eq!(scene.rotate_pivot, Point::new(1.0, 2.0));
    }

    #[test]
    fn test_json_layout() {
        let mut scene = overlapping_scene();
        scene.selected_index = Some(1);
        let json: Value = serde_json::from_str(&scene.to_json().unwrap()).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["selected_index"], 1);
        assert_eq!(json["rotate_pivot"]["x"], 200.0);
        assert_eq!(json["polygons"][0]["type"], "polygon");
        assert_eq!(json["polygons"][1]["name"], "top");
        assert_eq!(json["polygons"][1]["points"][0]["x"], 10.0);

        scene.selected_index = None;
        let json: Value = serde_json::from_str(&scene.to_json().unwrap()).unwrap();
        assert!(json["selected_index"].is_null());
    }

    #[test]
    fn test_from_json_defaults() {
        let text = r#"{
            "rotate_pivot": {"x": 5},
            "selected_index": "first",
            "polygons": [ {"points": [{"x": 1, "y": 2}]} ]
        }"#;
        let scene = SceneState::from_json(text).unwrap();
        assert_eq!(scene.rotate_pivot, Point::new(5.0, 200.0));
        assert_eq!(scene.scale_pivot, DEFAULT_PIVOT);
        assert_eq!(scene.selected_index, None);
        assert_eq!(scene.polygons[0].name, "Polygon");
        assert_eq!(scene.polygons[0].points, vec![Point::new(1.0, 2.0)]);

        let scene = SceneState::from_json(r#"{"selected_index": 1.5}"#).unwrap();
        assert_eq!(scene.selected_index, None);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let path = std::env::temp_dir()
            .join("pixels_engine_scene_test")
            .join("scene.json");
        let mut scene = overlapping_scene();
        scene.scale_pivot = Point::new(-3.5, 8.25);
        scene.selected_index = Some(0);
        scene.save(&path).unwrap();

        let mut loaded = SceneState::new();
        loaded.load(&path).unwrap();
        assert_eq!(loaded, scene);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file_keeps_scene() {
        let path = std::env::temp_dir().join("pixels_engine_no_such_scene.json");
        let mut scene = overlapping_scene();
        let before = scene.clone();
        scene.load(&path).unwrap();
        assert_eq!(scene, before);
    }

    #[test]
    fn test_load_malformed_json() {
        assert!(SceneState::from_json("{ not json").is_err());
    }
}
