use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel space, `(x1, y1)` top-left, `(x2, y2)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Horizontal extent; an inverted box counts as zero wide.
    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    /// Vertical extent; an inverted box counts as zero tall.
    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Vertical center, the key used for line clustering.
    pub fn center_y(&self) -> f64 {
        // `+ 0.0` folds -0.0 into 0.0 so equal centers compare equal bit-for-bit.
        (self.y1 + self.y2) / 2.0 + 0.0
    }
}

/// One recognized unit of text with its location and recognizer confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    pub bbox: BBox,
    /// Recognizer confidence (0.0 to 1.0).
    pub confidence: f32,
}

impl Fragment {
    pub fn new(text: impl Into<String>, bbox: BBox, confidence: f32) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}
