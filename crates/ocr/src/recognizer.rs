use thiserror::Error;

use crate::ingest::Detection;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available; build with the `tesseract` feature")]
    NotAvailable,
}

/// Abstraction over an OCR backend.
/// Implementations accept PNG/JPEG image bytes and return positioned text detections.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<Detection>, OcrError>;
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a fixed set of detections regardless of the image.
pub struct MockRecognizer {
    pub detections: Vec<Detection>,
}

impl MockRecognizer {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    /// One full-confidence detection per line of `text`, 20 px tall, stacked.
    pub fn from_lines(text: &str) -> Self {
        let detections = text
            .lines()
            .enumerate()
            .map(|(i, line)| {
                let top = i as f64 * 30.0;
                let width = line.chars().count() as f64 * 10.0;
                Detection::rect(0.0, top, width, top + 20.0, line, 1.0)
            })
            .collect();
        Self { detections }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<Vec<Detection>, OcrError> {
        Ok(self.detections.clone())
    }
}

/// Stand-in when no OCR engine is compiled in; every image fails with
/// [`OcrError::NotAvailable`] while PDF text layers still work.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unavailable;

impl OcrBackend for Unavailable {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<Vec<Detection>, OcrError> {
        Err(OcrError::NotAvailable)
    }
}

/// Parse Tesseract TSV output into word-level detections.
///
/// Columns: level, page, block, par, line, word, left, top, width, height, conf, text.
/// Confidence is rescaled from 0-100 to 0-1; rows with negative confidence are
/// layout rows, not words, and are skipped.
pub fn parse_tesseract_tsv(tsv: &str) -> Vec<Detection> {
    tsv.lines()
        .filter_map(|row| {
            let cols: Vec<&str> = row.splitn(12, '\t').collect();
            if cols.len() < 12 || cols[0] != "5" {
                return None;
            }
            let left: f64 = cols[6].parse().ok()?;
            let top: f64 = cols[7].parse().ok()?;
            let width: f64 = cols[8].parse().ok()?;
            let height: f64 = cols[9].parse().ok()?;
            let conf: f32 = cols[10].parse().ok()?;
            if conf < 0.0 {
                return None;
            }
            Some(Detection::rect(left, top, left + width, top + height, cols[11], conf / 100.0))
        })
        .collect()
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{parse_tesseract_tsv, Detection, OcrBackend, OcrError};
    use leptess::LepTess;

    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<Detection>, OcrError> {
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            let tsv = lt.get_tsv_text(0).map_err(|e| OcrError::Engine(e.to_string()))?;
            Ok(parse_tesseract_tsv(&tsv))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_preset_detections() {
        let d = Detection::rect(0.0, 0.0, 50.0, 20.0, "Paris", 0.9);
        let r = MockRecognizer::new(vec![d.clone()]);
        assert_eq!(r.recognize(b"fake image data").unwrap(), vec![d]);
    }

    #[test]
    fn mock_from_lines_stacks_rows() {
        let r = MockRecognizer::from_lines("SOLDE\n12,50");
        let out = r.recognize(b"").unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].text, "12,50");
        assert_eq!(out[1].points[0], (0.0, 30.0));
    }

    #[test]
    fn unavailable_backend_errors() {
        assert!(matches!(Unavailable.recognize(b"png"), Err(OcrError::NotAvailable)));
    }

    #[test]
    fn tsv_words_become_detections() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                   1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t\n\
                   5\t1\t1\t1\t1\t1\t12\t30\t60\t18\t91.5\tCrédit\n\
                   5\t1\t1\t1\t1\t2\t80\t31\t40\t17\t42\tAgricole\n";
        let out = parse_tesseract_tsv(tsv);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "Crédit");
        assert!((out[0].confidence - 0.915).abs() < 1e-6);
        assert_eq!(out[1].points[2], (120.0, 48.0));
    }
}
