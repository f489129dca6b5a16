//! AI row extractor (Gemini)
//!
//! Sends one page image plus a fixed instruction to the Generative Language
//! `generateContent` endpoint and parses the reply into raw rows.
//!
//! # Response handling
//! - Replies wrapped in markdown code fences are unwrapped first
//! - A JSON array of objects or a single object is accepted
//! - Any other shape is [`ExtractError::MalformedResponse`], scoped to that page
//!
//! # API Reference
//! - Endpoint: `{base_url}/models/{model}:generateContent?key={api_key}`

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use flagdesk_common::RawExtractedRow;

use crate::config::ExtractorSettings;
use crate::services::page_images::PageImage;

/// Instruction sent with every page
pub const EXTRACTION_INSTRUCTION: &str = "Extract the table in this image to JSON. \
Return only a JSON array with one object per table row, using the keys \
'FullOrder', 'FlagNumber', 'TruckID' and 'Color'.";

const USER_AGENT: &str = concat!("flagdesk/", env!("CARGO_PKG_VERSION"));

/// Per-page extraction failure
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Extractor API returned {0}: {1}")]
    Api(u16, String),

    #[error("Malformed extractor response: {0}")]
    MalformedResponse(String),

    #[error("Extractor not configured (no API key)")]
    NotConfigured,
}

/// Turns one page image into raw rows
#[async_trait]
pub trait RowExtractor: Send + Sync {
    /// Name for logs and reports
    fn name(&self) -> &str;

    async fn extract(
        &self,
        page: &PageImage,
        instruction: &str,
    ) -> Result<Vec<RawExtractedRow>, ExtractError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    #[serde(rename = "mimeType")]
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Gemini vision extractor
pub struct GeminiExtractor {
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiExtractor {
    pub fn new(api_key: String, settings: &ExtractorSettings) -> Result<Self, ExtractError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ExtractError::Network(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            model: settings.model.clone(),
            base_url: settings.base_url.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }
}

#[async_trait]
impl RowExtractor for GeminiExtractor {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn extract(
        &self,
        page: &PageImage,
        instruction: &str,
    ) -> Result<Vec<RawExtractedRow>, ExtractError> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text { text: instruction },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: page.mime,
                            data: base64::engine::general_purpose::STANDARD.encode(&page.bytes),
                        },
                    },
                ],
            }],
        };

        debug!(model = %self.model, bytes = page.bytes.len(), "Calling extractor");

        let response = self
            .http_client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Api(status.as_u16(), body));
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::MalformedResponse(format!("unreadable reply body: {}", e)))?;

        let text = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| ExtractError::MalformedResponse("no candidates returned".to_string()))?;

        parse_rows(&text)
    }
}

/// Stand-in used when no API key is configured
///
/// Spreadsheet ingestion keeps working; every image or PDF page fails with
/// [`ExtractError::NotConfigured`].
pub struct DisabledExtractor;

#[async_trait]
impl RowExtractor for DisabledExtractor {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn extract(
        &self,
        _page: &PageImage,
        _instruction: &str,
    ) -> Result<Vec<RawExtractedRow>, ExtractError> {
        Err(ExtractError::NotConfigured)
    }
}

/// Remove a surrounding markdown code fence (```` ```json ... ``` ````)
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string ("json") on the opening fence line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse an extractor reply into raw rows
///
/// Scalar values are rendered as text; `null` becomes an empty cell.
pub fn parse_rows(text: &str) -> Result<Vec<RawExtractedRow>, ExtractError> {
    let json: Value = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| ExtractError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let objects = match json {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(ExtractError::MalformedResponse(format!(
                "expected array or object, got {}",
                json_kind(&other)
            )))
        }
    };

    objects
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map
                .into_iter()
                .map(|(key, value)| (key, value_text(&value)))
                .collect::<RawExtractedRow>()),
            other => Err(ExtractError::MalformedResponse(format!(
                "expected row object, got {}",
                json_kind(&other)
            ))),
        })
        .collect()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
