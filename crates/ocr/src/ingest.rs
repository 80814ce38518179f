use crate::fragment::{BBox, Fragment};

/// One raw recognizer result: a polygon (usually four corners), its text and confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub points: Vec<(f64, f64)>,
    pub text: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(points: Vec<(f64, f64)>, text: impl Into<String>, confidence: f32) -> Self {
        Self { points, text: text.into(), confidence }
    }

    /// Detection from an axis-aligned rectangle.
    pub fn rect(x1: f64, y1: f64, x2: f64, y2: f64, text: impl Into<String>, confidence: f32) -> Self {
        Self::new(vec![(x1, y1), (x2, y1), (x2, y2), (x1, y2)], text, confidence)
    }

    /// Enclosing rectangle, truncated to whole pixels.
    fn bounding_box(&self) -> Option<BBox> {
        let (first, rest) = self.points.split_first()?;
        let init = (first.0, first.1, first.0, first.1);
        let (x1, y1, x2, y2) = rest.iter().fold(init, |(x1, y1, x2, y2), &(x, y)| {
            (x1.min(x), y1.min(y), x2.max(x), y2.max(y))
        });
        Some(BBox::new(x1.trunc(), y1.trunc(), x2.trunc(), y2.trunc()))
    }
}

/// Turn recognizer output into fragments.
///
/// Keeps detections strictly above `min_confidence` with non-blank text and
/// at least one point.
pub fn ingest(detections: impl IntoIterator<Item = Detection>, min_confidence: f32) -> Vec<Fragment> {
    detections
        .into_iter()
        .filter(|d| d.confidence > min_confidence)
        .filter(|d| !d.text.trim().is_empty())
        .filter_map(|d| {
            let bbox = d.bounding_box()?;
            Some(Fragment::new(d.text, bbox, d.confidence))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_confidence_is_dropped() {
        let frags = ingest(
            vec![
                Detection::rect(0.0, 0.0, 10.0, 10.0, "keep", 0.51),
                Detection::rect(0.0, 0.0, 10.0, 10.0, "edge", 0.5),
                Detection::rect(0.0, 0.0, 10.0, 10.0, "drop", 0.2),
            ],
            0.5,
        );
        let texts: Vec<_> = frags.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["keep"]);
    }

    #[test]
    fn blank_text_is_dropped() {
        let frags = ingest(vec![Detection::rect(0.0, 0.0, 10.0, 10.0, "  \t", 0.99)], 0.5);
        assert!(frags.is_empty());
    }

    #[test]
    fn quadrilateral_becomes_enclosing_rectangle() {
        // slightly rotated quad
        let d = Detection::new(
            vec![(10.7, 5.2), (90.4, 7.9), (89.6, 25.8), (9.9, 23.1)],
            "Relevé",
            0.9,
        );
        let frags = ingest(vec![d], 0.5);
        assert_eq!(frags[0].bbox, BBox::new(9.0, 5.0, 90.0, 25.0));
    }

    #[test]
    fn detection_without_points_is_dropped() {
        let frags = ingest(vec![Detection::new(vec![], "ghost", 0.9)], 0.5);
        assert!(frags.is_empty());
    }

    #[test]
    fn text_is_kept_verbatim() {
        let frags = ingest(vec![Detection::rect(0.0, 0.0, 10.0, 10.0, " 12,50 ", 0.9)], 0.5);
        assert_eq!(frags[0].text, " 12,50 ");
    }
}
