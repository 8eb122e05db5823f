use serde::{Deserialize, Serialize};

/// Axis-aligned box in `(x1, y1, x2, y2)` form with its score and class.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize, PartialOrd)]
pub struct YoloBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,

    pub conf: f32,
    pub class_id: usize,
}

impl YoloBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, conf: f32, class_id: usize) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            conf,
            class_id,
        }
    }

    /// Sets the box from a center point and size.
    pub fn with_cxcy_wh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.x1 = cx - w / 2.;
        self.y1 = cy - h / 2.;
        self.x2 = cx + w / 2.;
        self.y2 = cy + h / 2.;
        self
    }

    pub fn with_confidence(mut self, x: f32) -> Self {
        self.conf = x;
        self
    }

    pub fn with_class_id(mut self, x: usize) -> Self {
        self.class_id = x;
        self
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.) * self.height().max(0.)
    }

    /// Computes the intersection area between this bounding box and another.
    pub fn intersect(&self, other: &YoloBox) -> f32 {
        let left = self.x1.max(other.x1);
        let right = self.x2.min(other.x2);
        let top = self.y1.max(other.y1);
        let bottom = self.y2.min(other.y2);
        (right - left).max(0.) * (bottom - top).max(0.)
    }

    /// Computes the union area between this bounding box and another.
    pub fn union(&self, other: &YoloBox) -> f32 {
        self.area() + other.area() - self.intersect(other)
    }

    /// Returns `[x1, y1, x2, y2, conf, class_id]`, the row layout of a detection result.
    pub fn to_row(&self) -> [f32; 6] {
        [self.x1, self.y1, self.x2, self.y2, self.conf, self.class_id as f32]
    }
}
