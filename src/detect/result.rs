use serde::{Deserialize, Serialize};

/// Integer pixel coordinate (frame space).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in pixels.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = (self.x as i64 - other.x as i64) as f64;
        let dy = (self.y as i64 - other.y as i64) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned box in `[x1, y1, x2, y2]` pixel form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Center point, floor-divided like the detector's integer boxes.
    pub fn center(&self) -> Point {
        Point {
            x: ((self.x1 as i64 + self.x2 as i64).div_euclid(2)) as i32,
            y: ((self.y1 as i64 + self.y2 as i64).div_euclid(2)) as i32,
        }
    }
}

impl From<[i32; 4]> for BoundingBox {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One detector output for one frame. Not retained past the frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_name: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

impl Detection {
    pub fn new(class_name: impl Into<String>, bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            class_name: class_name.into(),
            bbox,
            confidence,
        }
    }

    /// Detection whose box is centered on `(x, y)`. Handy for sources that only know centers.
    pub fn at(class_name: impl Into<String>, x: i32, y: i32, confidence: f32) -> Self {
        Self::new(class_name, BoundingBox::new(x, y, x, y), confidence)
    }

    pub fn center(&self) -> Point {
        self.bbox.center()
    }
}

/// All detections the detector produced for one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    #[serde(default)]
    pub detections: Vec<Detection>,
}

impl FrameDetections {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_uses_floor_division() {
        let b = BoundingBox::new(10, 10, 21, 31);
        assert_eq!(b.center(), Point::new(15, 20));

        let neg = BoundingBox::new(-3, -3, 0, 0);
        assert_eq!(neg.center(), Point::new(-2, -2));
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Point::new(100, 100);
        let b = Point::new(600, 600);
        assert!((a.distance_to(&b) - 707.106).abs() < 0.01);
        assert_eq!(a.distance_to(&a), 0.0);
    }

    #[test]
    fn detection_deserializes_from_array_bbox() {
        let json = r#"{"class": "bottle", "bbox": [90, 80, 110, 120], "confidence": 0.91}"#;
        let det: Detection = serde_json::from_str(json).unwrap();
        assert_eq!(det.class_name, "bottle");
        assert_eq!(det.center(), Point::new(100, 100));
        assert!((det.confidence - 0.91).abs() < 1e-6);
    }
}
