use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Tuning for transcript reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Insert runs of spaces proportional to horizontal gaps.
    pub reconstruct_spacing: bool,
    /// The smallest fragment height is divided by this to get the line tolerance.
    pub tolerance_divisor: f64,
    /// Horizontal unit used when the fragments carry no characters at all.
    pub fallback_unit: f64,
    /// Detections at or below this confidence are discarded during ingestion.
    pub min_confidence: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            reconstruct_spacing: true,
            tolerance_divisor: 2.0,
            fallback_unit: 10.0,
            min_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskewOptions {
    pub enabled: bool,
    /// Largest absolute angle searched, in degrees.
    pub limit_degrees: f32,
    /// Search step, in degrees.
    pub step_degrees: f32,
}

impl Default for DeskewOptions {
    fn default() -> Self {
        Self { enabled: true, limit_degrees: 15.0, step_degrees: 0.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfOptions {
    /// Only the first `max_pages` pages of a PDF are read.
    pub max_pages: usize,
    /// OCR rendered pages when the text layer is empty.
    pub ocr_fallback: bool,
    /// Resolution pages are rendered at for OCR.
    pub render_dpi: f32,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self { max_pages: 3, ocr_fallback: true, render_dpi: 300.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetOptions {
    pub max_tokens: usize,
    /// Model whose tokenizer measures the budget. `None` uses `cl100k_base`.
    pub model: Option<String>,
    /// Model id → path of a `tokenizer.json`.
    pub tokenizers: HashMap<String, PathBuf>,
}

impl Default for BudgetOptions {
    fn default() -> Self {
        Self { max_tokens: 16_000, model: None, tokenizers: HashMap::new() }
    }
}

/// Everything the statement pipeline needs besides its backends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    pub layout: LayoutOptions,
    pub deskew: DeskewOptions,
    pub pdf: PdfOptions,
    pub budget: BudgetOptions,
}
