use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::budget::Budget;
use crate::config::PipelineOptions;
use crate::ingest::ingest;
use crate::pdf::{join_pages, LopdfBackend, PageRenderer, PdfError, PdfTextBackend};
use crate::preprocess::{self, Prepared};
use crate::recognizer::{OcrBackend, OcrError};
use crate::tokens::{counter_for_model, TokenCounter};
use crate::transcript::assemble_with;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] crate::preprocess::PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("PDF extraction failed: {0}")]
    Pdf(#[from] PdfError),
    #[error("Unsupported file type: '{0}'")]
    UnsupportedFormat(String),
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Image,
    Pdf,
}

impl InputKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" | "png" => Some(InputKind::Image),
            "pdf" => Some(InputKind::Pdf),
            _ => None,
        }
    }
}

/// The result of transcribing one statement file.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    pub kind: InputKind,
    /// Fragments that survived ingestion (0 for PDF text layers).
    pub fragment_count: usize,
    /// Deskew rotation applied to an image, in degrees.
    pub skew_degrees: Option<f32>,
    /// The deskewed page handed to the recognizer, as PNG.
    pub corrected_png: Option<Vec<u8>>,
    /// Deskewed pages of a scanned PDF, as PNG, in page order.
    pub corrected_pages: Vec<Vec<u8>>,
    /// Whether the token budget cut the text.
    pub truncated: bool,
}

/// Orchestrates: read → (preprocess → OCR → ingest → layout) or PDF text → budget.
///
/// Scanned PDFs fall back to rendering their pages and taking the image path
/// when a [`PageRenderer`] is attached.
///
/// The recognizer handle is owned here; build the pipeline once and reuse it.
pub struct StatementPipeline<R: OcrBackend, P: PdfTextBackend = LopdfBackend> {
    recognizer: R,
    pdf: P,
    renderer: Option<Arc<dyn PageRenderer>>,
    options: PipelineOptions,
    budget: Budget,
}

impl<R: OcrBackend> StatementPipeline<R, LopdfBackend> {
    pub fn new(recognizer: R, options: PipelineOptions) -> Self {
        Self::with_pdf_backend(recognizer, LopdfBackend, options)
    }
}

impl<R: OcrBackend, P: PdfTextBackend> StatementPipeline<R, P> {
    pub fn with_pdf_backend(recognizer: R, pdf: P, options: PipelineOptions) -> Self {
        let counter = counter_for_model(options.budget.model.as_deref(), &options.budget.tokenizers);
        let budget = Budget::new(options.budget.max_tokens, counter);
        Self { recognizer, pdf, renderer: None, options, budget }
    }

    /// Replace the budget's token counter.
    pub fn with_counter(mut self, counter: Box<dyn TokenCounter>) -> Self {
        self.budget = Budget::new(self.options.budget.max_tokens, counter);
        self
    }

    /// Enable OCR of scanned PDFs through `renderer`.
    pub fn with_page_renderer(mut self, renderer: impl PageRenderer + 'static) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Transcribe a file on disk, dispatching on its extension.
    ///
    /// Deskewing and page rendering run on the blocking pool; recognition
    /// runs on the calling task.
    pub async fn transcribe_file(&self, path: &Path) -> Result<Transcript, PipelineError> {
        let kind = InputKind::from_path(path).ok_or_else(|| {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            PipelineError::UnsupportedFormat(ext.to_string())
        })?;
        let bytes = tokio::fs::read(path).await?;
        tracing::debug!("read {} bytes from {}", bytes.len(), path.display());
        match kind {
            InputKind::Image => {
                let deskew = self.options.deskew.clone();
                let prepared = tokio::task::spawn_blocking(move || {
                    preprocess::prepare_for_ocr_from_bytes(&bytes, &deskew)
                })
                .await??;
                self.transcribe_prepared(prepared)
            }
            InputKind::Pdf => {
                let text = self.text_layer(&bytes)?;
                match self.ocr_renderer(&text) {
                    Some(renderer) => {
                        let options = self.options.clone();
                        let pages = tokio::task::spawn_blocking(move || {
                            prepare_pdf_pages(renderer.as_ref(), &bytes, &options)
                        })
                        .await??;
                        Ok(self.transcribe_pages(pages))
                    }
                    None => Ok(self.finish_text_layer(text)),
                }
            }
        }
    }

    /// Image bytes → deskewed page → detections → laid-out text.
    pub fn transcribe_image(&self, data: &[u8]) -> Result<Transcript, PipelineError> {
        let prepared = preprocess::prepare_for_ocr_from_bytes(data, &self.options.deskew)?;
        self.transcribe_prepared(prepared)
    }

    /// PDF bytes → text layer of the first pages, or OCR of the rendered
    /// pages when the layer is empty.
    pub fn transcribe_pdf(&self, data: &[u8]) -> Result<Transcript, PipelineError> {
        let text = self.text_layer(data)?;
        match self.ocr_renderer(&text) {
            Some(renderer) => {
                let pages = prepare_pdf_pages(renderer.as_ref(), data, &self.options)?;
                Ok(self.transcribe_pages(pages))
            }
            None => Ok(self.finish_text_layer(text)),
        }
    }

    fn transcribe_prepared(&self, prepared: Prepared) -> Result<Transcript, PipelineError> {
        tracing::info!("skew corrected by {:.2}°", prepared.skew_degrees);
        let (text, fragment_count) = self.recognize_page(&prepared.png)?;
        let (text, truncated) = self.budget.enforce(text);

        Ok(Transcript {
            text,
            kind: InputKind::Image,
            fragment_count,
            skew_degrees: Some(prepared.skew_degrees),
            corrected_png: Some(prepared.png),
            corrected_pages: Vec::new(),
            truncated,
        })
    }

    fn recognize_page(&self, png: &[u8]) -> Result<(String, usize), PipelineError> {
        let detections = self.recognizer.recognize(png)?;
        let total = detections.len();
        let fragments = ingest(detections, self.options.layout.min_confidence);
        tracing::debug!("kept {} of {total} detections", fragments.len());
        Ok((assemble_with(&fragments, &self.options.layout), fragments.len()))
    }

    fn text_layer(&self, data: &[u8]) -> Result<String, PipelineError> {
        let pages = self.pdf.page_texts(data, self.options.pdf.max_pages)?;
        Ok(join_pages(&pages))
    }

    /// The renderer to OCR with, if `text` is an empty layer and fallback is on.
    fn ocr_renderer(&self, text: &str) -> Option<Arc<dyn PageRenderer>> {
        if !text.is_empty() {
            return None;
        }
        match &self.renderer {
            Some(renderer) if self.options.pdf.ocr_fallback => {
                tracing::info!("no text layer found in PDF; running OCR on rendered pages");
                Some(Arc::clone(renderer))
            }
            _ => {
                tracing::warn!("no text layer found in PDF; it is probably a scanned document");
                None
            }
        }
    }

    fn finish_text_layer(&self, text: String) -> Transcript {
        let (text, truncated) = self.budget.enforce(text);
        Transcript {
            text,
            kind: InputKind::Pdf,
            fragment_count: 0,
            skew_degrees: None,
            corrected_png: None,
            corrected_pages: Vec::new(),
            truncated,
        }
    }

    /// Recognize each page; a page that fails is logged and left out.
    fn transcribe_pages(&self, pages: Vec<Prepared>) -> Transcript {
        let count = pages.len();
        let mut texts = Vec::with_capacity(count);
        let mut fragment_count = 0;
        let mut corrected_pages = Vec::with_capacity(count);

        for (i, page) in pages.into_iter().enumerate() {
            tracing::info!("page {}/{count}: skew corrected by {:.2}°", i + 1, page.skew_degrees);
            match self.recognize_page(&page.png) {
                Ok((text, fragments)) => {
                    texts.push(text);
                    fragment_count += fragments;
                }
                Err(e) => tracing::warn!("OCR failed for page {}/{count}: {e}", i + 1),
            }
            corrected_pages.push(page.png);
        }

        let (text, truncated) = self.budget.enforce(join_pages(&texts));
        Transcript {
            text,
            kind: InputKind::Pdf,
            fragment_count,
            skew_degrees: None,
            corrected_png: None,
            corrected_pages,
            truncated,
        }
    }
}

/// Render the first pages and deskew each; pages that fail to decode are skipped.
fn prepare_pdf_pages(
    renderer: &dyn PageRenderer,
    data: &[u8],
    options: &PipelineOptions,
) -> Result<Vec<Prepared>, PipelineError> {
    let rendered = renderer.render_pages(data, options.pdf.max_pages)?;
    let count = rendered.len();
    let mut pages = Vec::with_capacity(count);
    for (i, png) in rendered.iter().enumerate() {
        match preprocess::prepare_for_ocr_from_bytes(png, &options.deskew) {
            Ok(prepared) => pages.push(prepared),
            Err(e) => tracing::warn!("skipping page {}/{count}: {e}", i + 1),
        }
    }
    Ok(pages)
}

// ── Watch-folder integration ──────────────────────────────────────────────────

/// Spawn a notify watcher on `watch_dir` that sends newly created statement
/// files (images and PDFs) to `tx`.
/// Returns the watcher; it must be kept alive for watching to continue.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{EventKind, RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        match event {
            Ok(ev) if matches!(ev.kind, EventKind::Create(_)) => {
                for path in ev.paths.into_iter().filter(|p| InputKind::from_path(p).is_some()) {
                    if tx.try_send(path).is_err() {
                        tracing::warn!("intake queue full or closed; dropping event");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("watch error: {e}"),
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
