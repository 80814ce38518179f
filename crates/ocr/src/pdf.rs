use lopdf::Document;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to read PDF: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("Failed to render PDF pages: {0}")]
    Render(String),
}

/// Reads the embedded text layer of a PDF.
pub trait PdfTextBackend: Send + Sync {
    /// Text of the first `max_pages` pages, one entry per page.
    fn page_texts(&self, pdf_bytes: &[u8], max_pages: usize) -> Result<Vec<String>, PdfError>;
}

/// Text-layer extraction with `lopdf`. Scanned PDFs without a text layer yield
/// empty pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfBackend;

impl PdfTextBackend for LopdfBackend {
    fn page_texts(&self, pdf_bytes: &[u8], max_pages: usize) -> Result<Vec<String>, PdfError> {
        let doc = Document::load_mem(pdf_bytes)?;
        let mut pages = Vec::new();
        for &number in doc.get_pages().keys().take(max_pages) {
            match doc.extract_text(&[number]) {
                Ok(text) => pages.push(text),
                Err(e) => {
                    tracing::warn!("no text extracted from PDF page {number}: {e}");
                    pages.push(String::new());
                }
            }
        }
        Ok(pages)
    }
}

/// Rasterizes PDF pages so scanned statements can go through OCR.
pub trait PageRenderer: Send + Sync {
    /// PNG images of the first `max_pages` pages.
    fn render_pages(&self, pdf_bytes: &[u8], max_pages: usize) -> Result<Vec<Vec<u8>>, PdfError>;
}

// ── pdfium renderer (optional, gated behind `pdfium` feature) ─────────────────

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::{PageRenderer, PdfError};
    use image::{DynamicImage, RgbaImage};
    use pdfium_render::prelude::*;
    use std::io::Cursor;

    /// Renders pages with a pdfium library found next to the binary or on the system.
    pub struct PdfiumRenderer {
        dpi: f32,
    }

    impl PdfiumRenderer {
        pub fn new(dpi: f32) -> Self {
            Self { dpi }
        }
    }

    fn render_err(e: impl std::fmt::Display) -> PdfError {
        PdfError::Render(e.to_string())
    }

    impl PageRenderer for PdfiumRenderer {
        fn render_pages(&self, pdf_bytes: &[u8], max_pages: usize) -> Result<Vec<Vec<u8>>, PdfError> {
            let pdfium = Pdfium::new(
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                    .or_else(|_| Pdfium::bind_to_system_library())
                    .map_err(render_err)?,
            );
            let document = pdfium.load_pdf_from_byte_slice(pdf_bytes, None).map_err(render_err)?;
            // PDF points are 72 per inch
            let scale = self.dpi / 72.0;

            let mut pages = Vec::new();
            for page in document.pages().iter().take(max_pages) {
                let config = PdfRenderConfig::new()
                    .set_target_width((page.width().value * scale) as i32)
                    .set_target_height((page.height().value * scale) as i32)
                    .render_form_data(true);
                let bitmap = page.render_with_config(&config).map_err(render_err)?;
                let rgba = RgbaImage::from_raw(
                    bitmap.width() as u32,
                    bitmap.height() as u32,
                    bitmap.as_rgba_bytes(),
                )
                .ok_or_else(|| PdfError::Render("bitmap size mismatch".to_string()))?;

                let mut png = Vec::new();
                DynamicImage::ImageRgba8(rgba)
                    .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                    .map_err(render_err)?;
                pages.push(png);
            }
            tracing::debug!("rendered {} page(s) at {} dpi", pages.len(), self.dpi);
            Ok(pages)
        }
    }
}

/// Join page texts the way statements are handed downstream: one newline
/// after each page, outer whitespace trimmed.
pub fn join_pages(pages: &[String]) -> String {
    let mut text = String::new();
    for page in pages {
        text.push_str(page);
        text.push('\n');
    }
    text.trim().to_string()
}
