//! Per-object detection records and the box geometry they carry.

use serde::{Deserialize, Serialize};

/// Tracker-assigned identity. Opaque: only equality is meaningful.
pub type TrackId = u64;

/// A point in pixel space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box in TLBR form (`x1 <= x2`, `y1 <= y2`).
///
/// Conversions cover the formats models and the Kalman filter use:
/// - TLBR: Top-Left X, Top-Left Y, Bottom-Right X, Bottom-Right Y
/// - CXCYWH: Center X, Center Y, Width, Height
/// - XYAH: Center X, Center Y, Aspect Ratio (w/h), Height
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Create a box from two corners. Swapped corners are normalized.
    #[inline]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    #[inline]
    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    #[inline]
    pub fn from_xyah(cx: f32, cy: f32, aspect_ratio: f32, height: f32) -> Self {
        Self::from_cxcywh(cx, cy, aspect_ratio * height, height)
    }

    /// Smallest box enclosing all points, `None` for an empty slice.
    pub fn enclosing(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let init = Self::new(first.x, first.y, first.x, first.y);
        Some(points.iter().fold(init, |b, p| Self {
            x1: b.x1.min(p.x),
            y1: b.y1.min(p.y),
            x2: b.x2.max(p.x),
            y2: b.y2.max(p.y),
        }))
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Center point `((x1 + x2) / 2, (y1 + y2) / 2)`.
    #[inline]
    pub fn centroid(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    #[inline]
    pub fn to_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    #[inline]
    pub fn to_xyah(&self) -> [f32; 4] {
        let c = self.centroid();
        let h = self.height();
        let aspect_ratio = if h > 0.0 { self.width() / h } else { 0.0 };
        [c.x, c.y, aspect_ratio, h]
    }

    /// Intersection over Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter_w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let inter_h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = inter_w * inter_h;
        let union = self.area() + other.area() - inter;
        if union > 0.0 { inter / union } else { 0.0 }
    }
}

/// One detected object in one frame.
///
/// `class_id` and `confidence` are `None` when the model does not produce
/// them (landmark-only models), never defaulted to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub bbox: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keypoints: Option<Vec<Point>>,
    #[serde(default)]
    pub class_id: Option<u32>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub track_id: Option<TrackId>,
}

impl DetectionRecord {
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            ..Default::default()
        }
    }

    pub fn centroid(&self) -> Point {
        self.bbox.centroid()
    }
}

/// Builder for `DetectionRecord` from the box formats models emit.
#[derive(Debug, Clone, Default)]
pub struct DetectionBuilder {
    record: DetectionRecord,
}

impl DetectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.record.bbox = BoundingBox::new(x1, y1, x2, y2);
        self
    }

    /// Set bounding box in CXCYWH format (center_x, center_y, width, height).
    pub fn cxcywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.record.bbox = BoundingBox::from_cxcywh(cx, cy, w, h);
        self
    }

    /// Set bounding box in TLWH format (left, top, width, height).
    pub fn tlwh(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.record.bbox = BoundingBox::new(x, y, x + w, y + h);
        self
    }

    pub fn confidence(mut self, confidence: f32) -> Self {
        self.record.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    pub fn class_id(mut self, class_id: u32) -> Self {
        self.record.class_id = Some(class_id);
        self
    }

    pub fn track_id(mut self, track_id: TrackId) -> Self {
        self.record.track_id = Some(track_id);
        self
    }

    pub fn keypoints(mut self, keypoints: Vec<Point>) -> Self {
        self.record.keypoints = Some(keypoints);
        self
    }

    pub fn polygon(mut self, polygon: Vec<Point>) -> Self {
        self.record.polygon = Some(polygon);
        self
    }

    pub fn build(self) -> DetectionRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_conversions() {
        let bbox = BoundingBox::new(10.0, 20.0, 40.0, 60.0);
        assert_eq!(bbox.width(), 30.0);
        assert_eq!(bbox.height(), 40.0);
        assert_eq!(bbox.centroid(), Point::new(25.0, 40.0));

        let xyah = bbox.to_xyah();
        assert_eq!(xyah[0], 25.0);
        assert_eq!(xyah[1], 40.0);
        assert!((xyah[2] - 0.75).abs() < 1e-6);
        assert_eq!(xyah[3], 40.0);

        let back = BoundingBox::from_xyah(xyah[0], xyah[1], xyah[2], xyah[3]);
        assert!((back.x1 - 10.0).abs() < 1e-5);
        assert!((back.y2 - 60.0).abs() < 1e-5);
    }

    #[test]
    fn test_swapped_corners_are_normalized() {
        let bbox = BoundingBox::new(40.0, 60.0, 10.0, 20.0);
        assert_eq!(bbox.to_array(), [10.0, 20.0, 40.0, 60.0]);
    }

    #[test]
    fn test_enclosing() {
        let pts = [Point::new(3.0, 9.0), Point::new(1.0, 4.0), Point::new(7.0, 5.0)];
        let bbox = BoundingBox::enclosing(&pts).unwrap();
        assert_eq!(bbox.to_array(), [1.0, 4.0, 7.0, 9.0]);
        assert!(BoundingBox::enclosing(&[]).is_none());
    }

    #[test]
    fn test_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        // 25 / (100 + 100 - 25)
        assert!((a.iou(&b) - 25.0 / 175.0).abs() < 1e-6);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);

        let far = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&far), 0.0);
    }

    #[test]
    fn test_detection_builder() {
        let det = DetectionBuilder::new()
            .cxcywh(30.0, 50.0, 40.0, 60.0)
            .confidence(0.95)
            .class_id(2)
            .build();

        assert_eq!(det.bbox.to_array(), [10.0, 20.0, 50.0, 80.0]);
        assert_eq!(det.confidence, Some(0.95));
        assert_eq!(det.class_id, Some(2));
        assert_eq!(det.track_id, None);
    }
}
