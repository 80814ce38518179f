pub mod export;
pub mod llm;

pub use export::{
    slugify_filename, write_json, write_table_csv, write_table_xlsx, ExportError, SHEET_NAME,
};
pub use llm::{
    build_prompt, json_object_span, parse_reply, ExtractError, LlmOptions, OpenAiExtractor,
    StructuredExtractor,
};
