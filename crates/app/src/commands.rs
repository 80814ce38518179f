use std::path::{Path, PathBuf};

use anyhow::Context;
use releve_core::{postprocess, ParsedStatement};
use releve_extract::{
    slugify_filename, write_json, write_table_csv, write_table_xlsx, OpenAiExtractor,
    StructuredExtractor,
};
use releve_ocr::{OcrBackend, PdfTextBackend, StatementPipeline};
use tokio::sync::mpsc;

use crate::config::AppConfig;

const PREVIEW_CHARS: usize = 500;

/// Files written for one processed statement.
#[derive(Debug, Default)]
pub struct ProcessOutcome {
    pub corrected_image: Option<PathBuf>,
    pub corrected_pages: Vec<PathBuf>,
    pub debug_text: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    pub xlsx: Option<PathBuf>,
    pub statement: Option<ParsedStatement>,
}

#[cfg(feature = "tesseract")]
fn recognizer(config: &AppConfig) -> impl OcrBackend {
    releve_ocr::recognizer::tesseract_backend::TesseractRecognizer::new(
        config.ocr.data_path.clone(),
        &config.ocr.lang,
    )
}

#[cfg(not(feature = "tesseract"))]
fn recognizer(_config: &AppConfig) -> impl OcrBackend {
    tracing::debug!("built without the `tesseract` feature; images cannot be recognized");
    releve_ocr::Unavailable
}

#[cfg(feature = "pdfium")]
fn pipeline(config: &AppConfig) -> StatementPipeline<impl OcrBackend> {
    use releve_ocr::pdf::pdfium_backend::PdfiumRenderer;
    StatementPipeline::new(recognizer(config), config.pipeline_options())
        .with_page_renderer(PdfiumRenderer::new(config.pdf.render_dpi))
}

#[cfg(not(feature = "pdfium"))]
fn pipeline(config: &AppConfig) -> StatementPipeline<impl OcrBackend> {
    StatementPipeline::new(recognizer(config), config.pipeline_options())
}

pub async fn transcribe(config: &AppConfig, input: &Path) -> anyhow::Result<String> {
    let transcript = pipeline(config)
        .transcribe_file(input)
        .await
        .with_context(|| format!("transcribing {}", input.display()))?;
    Ok(transcript.text)
}

pub async fn process(config: &AppConfig, input: &Path, out: &Path) -> anyhow::Result<()> {
    let extractor = OpenAiExtractor::from_env(config.llm.clone())?;
    let outcome = process_file(&pipeline(config), &extractor, input, out).await?;
    if let Some(json) = outcome.json {
        println!("{}", json.display());
    }
    Ok(())
}

/// Transcribe one statement, extract it, and write every artefact under `out`.
///
/// An empty transcript stops before the extractor is called.
pub async fn process_file<R, P, E>(
    pipeline: &StatementPipeline<R, P>,
    extractor: &E,
    input: &Path,
    out: &Path,
) -> anyhow::Result<ProcessOutcome>
where
    R: OcrBackend,
    P: PdfTextBackend,
    E: StructuredExtractor,
{
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("statement");
    let slug = match slugify_filename(stem) {
        s if s.is_empty() => "statement".to_string(),
        s => s,
    };
    let mut outcome = ProcessOutcome::default();

    tracing::info!("processing {}", input.display());
    let transcript = pipeline
        .transcribe_file(input)
        .await
        .with_context(|| format!("transcribing {}", input.display()))?;

    if let Some(png) = &transcript.corrected_png {
        let path = out.join("corrected_images").join(format!("corrected_{slug}.png"));
        write_bytes(&path, png).await?;
        outcome.corrected_image = Some(path);
    }
    for (i, png) in transcript.corrected_pages.iter().enumerate() {
        let path = out
            .join("corrected_pdf_images")
            .join(&slug)
            .join(format!("corrected_page_{}.png", i + 1));
        write_bytes(&path, png).await?;
        outcome.corrected_pages.push(path);
    }

    if transcript.text.trim().is_empty() {
        tracing::warn!("no text extracted from {}; skipping", input.display());
        return Ok(outcome);
    }

    let debug_path = out.join(format!("{slug}_ocr_debug.txt"));
    write_bytes(&debug_path, transcript.text.as_bytes()).await?;
    outcome.debug_text = Some(debug_path);

    let preview: String = transcript.text.chars().take(PREVIEW_CHARS).collect();
    tracing::info!(
        fragments = transcript.fragment_count,
        truncated = transcript.truncated,
        "transcript preview:\n{preview}"
    );

    let statement = postprocess(extractor.extract(&transcript.text).await?);
    let invalid = statement
        .transactions
        .iter()
        .filter(|t| !t.date_valid || !t.amount_valid)
        .count();
    if invalid > 0 {
        tracing::warn!("{invalid} transaction(s) with an unreadable date or amount");
    }
    if let Some(net) = statement.amount_total() {
        tracing::info!(
            debit = %statement.summary.total_debit,
            credit = %statement.summary.total_credit,
            "net of parsed transactions: {net}"
        );
    }

    let json_path = out.join("json").join(format!("{slug}_parsed.json"));
    write_json(&statement, &json_path)?;
    tracing::info!("wrote {}", json_path.display());
    outcome.json = Some(json_path);

    let csv_path = out.join("csv").join(format!("{slug}_parsed.csv"));
    match write_table_csv(&statement, &csv_path) {
        Ok(rows) => {
            tracing::info!("wrote {rows} row(s) to {}", csv_path.display());
            outcome.csv = Some(csv_path);
        }
        Err(e) => tracing::warn!("could not write table for {}: {e}", input.display()),
    }

    let xlsx_path = out.join("excel").join(format!("{slug}_parsed.xlsx"));
    match write_table_xlsx(&statement, &xlsx_path) {
        Ok(_) => {
            tracing::info!("wrote {}", xlsx_path.display());
            outcome.xlsx = Some(xlsx_path);
        }
        Err(e) => tracing::warn!("could not write workbook for {}: {e}", input.display()),
    }

    outcome.statement = Some(statement);
    Ok(outcome)
}

async fn write_bytes(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

pub async fn watch(config: &AppConfig, dir: &Path, out: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let extractor = OpenAiExtractor::from_env(config.llm.clone())?;
    let pipeline = pipeline(config);

    // The channel bridges the notify watcher thread and the async processor.
    let (tx, mut rx) = mpsc::channel::<PathBuf>(64);
    let _watcher = releve_ocr::spawn_intake_watcher(dir, tx)?;
    tracing::info!("watching {} for statements", dir.display());

    loop {
        tokio::select! {
            Some(path) = rx.recv() => {
                if let Err(e) = process_file(&pipeline, &extractor, &path, out).await {
                    tracing::error!("failed to process {}: {e:#}", path.display());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("stopping watcher");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use releve_core::StatementTransaction;
    use releve_extract::ExtractError;
    use releve_ocr::{MockRecognizer, PipelineOptions};
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned {
        statement: ParsedStatement,
        calls: AtomicUsize,
    }

    impl StructuredExtractor for Canned {
        fn extract(&self, _transcript: &str) -> impl Future<Output = Result<ParsedStatement, ExtractError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let statement = self.statement.clone();
            async move { Ok(statement) }
        }
    }

    fn canned() -> Canned {
        Canned {
            statement: ParsedStatement {
                transactions: vec![StatementTransaction {
                    date: "O5/1l/2019".into(),
                    description: "PRLV | EDF".into(),
                    amount: "-54,2O".into(),
                    balance: "1204,33".into(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            calls: AtomicUsize::new(0),
        }
    }

    fn white_png() -> Vec<u8> {
        let img = image::GrayImage::from_pixel(8, 8, image::Luma([255u8]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn image_statement_writes_all_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("releve oct(2019).png");
        std::fs::write(&input, white_png()).unwrap();
        let out = dir.path().join("output");

        let pipeline = StatementPipeline::new(
            MockRecognizer::from_lines("05/11/2019 PRLV EDF -54,20\nSOLDE 1204,33"),
            PipelineOptions::default(),
        );
        let extractor = canned();

        let outcome = process_file(&pipeline, &extractor, &input, &out).await.unwrap();

        assert_eq!(
            outcome.corrected_image.as_deref(),
            Some(out.join("corrected_images/corrected_releve oct_2019_.png").as_path())
        );
        let debug = std::fs::read_to_string(out.join("releve oct_2019__ocr_debug.txt")).unwrap();
        assert_eq!(debug, "05/11/2019 PRLV EDF -54,20\nSOLDE 1204,33");

        let statement = outcome.statement.unwrap();
        assert_eq!(statement.transactions[0].date, "05/11/2019");
        assert_eq!(statement.transactions[0].description, "PRLV EDF");
        assert!(statement.transactions[0].amount_valid);

        assert!(out.join("json/releve oct_2019__parsed.json").exists());
        let csv = std::fs::read_to_string(out.join("csv/releve oct_2019__parsed.csv")).unwrap();
        assert!(csv.starts_with("Date,Description,Amount,Balance"));
        assert_eq!(
            outcome.xlsx.as_deref(),
            Some(out.join("excel/releve oct_2019__parsed.xlsx").as_path())
        );
        assert!(out.join("excel/releve oct_2019__parsed.xlsx").exists());
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_transcript_skips_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("blank.png");
        std::fs::write(&input, white_png()).unwrap();
        let out = dir.path().join("output");

        let pipeline = StatementPipeline::new(MockRecognizer::new(vec![]), PipelineOptions::default());
        let extractor = canned();

        let outcome = process_file(&pipeline, &extractor, &input, &out).await.unwrap();

        assert!(outcome.corrected_image.is_some());
        assert!(outcome.json.is_none());
        assert!(!out.join("blank_ocr_debug.txt").exists());
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn accented_names_keep_their_letters() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Relevé n°10.png");
        std::fs::write(&input, white_png()).unwrap();
        let out = dir.path().join("output");

        let pipeline = StatementPipeline::new(
            MockRecognizer::from_lines("SOLDE 1204,33"),
            PipelineOptions::default(),
        );
        let outcome = process_file(&pipeline, &canned(), &input, &out).await.unwrap();

        assert_eq!(
            outcome.json.as_deref(),
            Some(out.join("json/Releve n10_parsed.json").as_path())
        );
    }

    #[tokio::test]
    async fn unsupported_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = StatementPipeline::new(MockRecognizer::new(vec![]), PipelineOptions::default());
        let err = process_file(&pipeline, &canned(), Path::new("notes.txt"), dir.path())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("Unsupported file type"));
    }
}
