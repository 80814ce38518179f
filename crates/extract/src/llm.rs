use std::future::Future;
use std::time::Duration;

use releve_core::ParsedStatement;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("LLM response had no content")]
    EmptyResponse,
    #[error("LLM response is not a statement: {0}")]
    Json(#[from] serde_json::Error),
}

const SYSTEM_PROMPT: &str = "You are a financial statement parser.";

const INSTRUCTIONS: &str = "\
You are an intelligent bank statement parser. Given the OCR text below from a scanned \
bank statement, extract ONLY the following fields in JSON format:
- header: {account_holder, bank, date_range}
- transactions: array of {date, description, amount, balance}
- summary: {final_balance, total_debit, total_credit}

Notes:
- Only include transactions that look valid with dates like DD/MM/YYYY or similar.
- Use empty strings for missing fields, don't return 'Unavailable'.
- Make your best guess even if some information is unclear or approximate.
- Respond with a clean JSON, no extra commentary.

OCR Text:
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmOptions {
    pub model: String,
    /// Base URL of an OpenAI-compatible API.
    pub endpoint: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            endpoint: "https://api.openai.com/v1".to_string(),
            temperature: 0.0,
            timeout_secs: 120,
        }
    }
}

/// Turns a statement transcript into structured data.
pub trait StructuredExtractor: Send + Sync {
    fn extract(&self, transcript: &str) -> impl Future<Output = Result<ParsedStatement, ExtractError>> + Send;
}

pub fn build_prompt(transcript: &str) -> String {
    format!("{INSTRUCTIONS}{transcript}")
}

/// The outermost `{ … }` span of a reply, or the whole reply when there is none.
pub fn json_object_span(reply: &str) -> &str {
    match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply,
    }
}

/// Parse a model reply that may wrap the JSON in prose or code fences.
pub fn parse_reply(reply: &str) -> Result<ParsedStatement, ExtractError> {
    Ok(serde_json::from_str(json_object_span(reply))?)
}

// ── OpenAI-compatible chat completions ────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

pub struct OpenAiExtractor {
    client: reqwest::Client,
    api_key: String,
    options: LlmOptions,
}

impl OpenAiExtractor {
    pub fn new(api_key: impl Into<String>, options: LlmOptions) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()?;
        Ok(Self { client, api_key: api_key.into(), options })
    }

    /// Reads the key from `OPENAI_API_KEY`.
    pub fn from_env(options: LlmOptions) -> Result<Self, ExtractError> {
        let key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ExtractError::MissingApiKey)?;
        Self::new(key, options)
    }

    async fn complete(&self, transcript: &str) -> Result<String, ExtractError> {
        let request = ChatRequest {
            model: &self.options.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT.to_string() },
                ChatMessage { role: "user", content: build_prompt(transcript) },
            ],
            temperature: self.options.temperature,
        };

        let url = format!("{}/chat/completions", self.options.endpoint.trim_end_matches('/'));
        tracing::info!("requesting structured extraction from {} ({})", url, self.options.model);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ExtractError::Status { status: status.as_u16(), body });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ExtractError::EmptyResponse)
    }
}

impl StructuredExtractor for OpenAiExtractor {
    fn extract(&self, transcript: &str) -> impl Future<Output = Result<ParsedStatement, ExtractError>> + Send {
        async move {
            let reply = self.complete(transcript).await?;
            tracing::debug!("LLM reply: {} chars", reply.len());
            parse_reply(&reply)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_strips_code_fences() {
        let reply = "```json\n{\"header\": {\"bank\": \"LCL\"}}\n```";
        assert_eq!(json_object_span(reply), "{\"header\": {\"bank\": \"LCL\"}}");
    }

    #[test]
    fn span_without_braces_is_whole_reply() {
        assert_eq!(json_object_span("sorry"), "sorry");
        assert_eq!(json_object_span("} {"), "} {");
    }

    #[test]
    fn parse_reply_reads_statement() {
        let reply = r#"Here you go:
{
  "header": {"account_holder": "M. DUPONT", "bank": "Banque Populaire", "date_range": "01/10/2019 - 31/10/2019"},
  "transactions": [
    {"date": "05/10/2019", "description": "PRLV EDF", "amount": "-54,20", "balance": "1 204,33"}
  ],
  "summary": {"final_balance": "1 204,33", "total_debit": "54,20", "total_credit": ""}
}"#;
        let s = parse_reply(reply).unwrap();
        assert_eq!(s.header.bank, "Banque Populaire");
        assert_eq!(s.transactions.len(), 1);
        assert_eq!(s.transactions[0].amount, "-54,20");
    }

    #[test]
    fn parse_reply_rejects_prose() {
        assert!(matches!(parse_reply("no statement here"), Err(ExtractError::Json(_))));
    }

    #[test]
    fn prompt_ends_with_transcript() {
        let prompt = build_prompt("SOLDE 12,50");
        assert!(prompt.starts_with("You are an intelligent bank statement parser."));
        assert!(prompt.ends_with("OCR Text:\nSOLDE 12,50"));
    }

    #[test]
    fn request_serializes_as_chat_completion() {
        let req = ChatRequest {
            model: "gpt-4o",
            messages: vec![ChatMessage { role: "user", content: "hi".into() }],
            temperature: 0.0,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn response_without_content_is_empty() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
