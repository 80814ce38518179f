pub mod budget;
pub mod cluster;
pub mod collate;
pub mod config;
pub mod fragment;
pub mod ingest;
pub mod metrics;
pub mod pdf;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod tokens;
pub mod transcript;

pub use budget::{limit, Budget, CharPrefix, TokenFit, TruncationStrategy};
pub use cluster::{cluster, LineCluster};
pub use collate::collate;
pub use config::{BudgetOptions, DeskewOptions, LayoutOptions, PdfOptions, PipelineOptions};
pub use fragment::{BBox, Fragment};
pub use ingest::{ingest, Detection};
pub use metrics::Metrics;
pub use pdf::{LopdfBackend, PageRenderer, PdfError, PdfTextBackend};
pub use pipeline::{spawn_intake_watcher, InputKind, PipelineError, StatementPipeline, Transcript};
pub use preprocess::{prepare_for_ocr, prepare_for_ocr_from_bytes, PreprocessError, Prepared};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError, Unavailable};
pub use tokens::{counter_for_model, ApproxCounter, TokenCounter};
pub use transcript::{assemble, assemble_with};
