//! Vision analyzer: extract text from images with a vision LLM.
//!
//! Reads and base64-encodes the image, posts it as a data URL together with
//! the prompt, and turns the response into an [`Extraction`]. Every failure
//! comes back as an [`AnalysisError`].
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value;
use tracing::{debug, info};

use imgscribe_core::{AnalysisError, Extraction, ImageAnalyzer, TokenUsage};

use crate::mime::detect_image_mime;
use crate::sanitize::{decode_lossy, sanitize_text, DEFAULT_PLACEHOLDER};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-nano-2025-04-14";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Supported vision providers.
#[derive(Clone)]
pub enum VisionProvider {
    OpenAI { api_key: String, model: String },
    Gemini { api_key: String, model: String },
}

impl VisionProvider {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::OpenAI { api_key: api_key.into(), model: DEFAULT_OPENAI_MODEL.to_string() }
    }
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self::Gemini { api_key: api_key.into(), model: DEFAULT_GEMINI_MODEL.to_string() }
    }

    pub fn with_model(self, model: impl Into<String>) -> Self {
        match self {
            Self::OpenAI { api_key, .. } => Self::OpenAI { api_key, model: model.into() },
            Self::Gemini { api_key, .. } => Self::Gemini { api_key, model: model.into() },
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::OpenAI { model, .. } => format!("openai:{model}"),
            Self::Gemini { model, .. } => format!("gemini:{model}"),
        }
    }
}

impl std::fmt::Debug for VisionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("VisionProvider").field(&self.label()).finish()
    }
}

/// [`ImageAnalyzer`] backed by a remote vision model.
pub struct VisionAnalyzer {
    provider: VisionProvider,
    http: reqwest::Client,
    name: String,
    max_tokens: Option<u32>,
    placeholder: char,
}

impl VisionAnalyzer {
    pub fn new(provider: VisionProvider) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client for vision analyzer")?;
        Ok(Self {
            name: provider.label(),
            provider,
            http,
            max_tokens: None,
            placeholder: DEFAULT_PLACEHOLDER,
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_placeholder(mut self, placeholder: char) -> Self {
        self.placeholder = placeholder;
        self
    }

    async fn post(&self, request: reqwest::RequestBuilder) -> Result<String, AnalysisError> {
        let resp = request
            .send()
            .await
            .map_err(|e| AnalysisError::Remote(e.to_string()))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AnalysisError::Remote(format!("failed to read response body: {e}")))?;
        let body = decode_lossy(&bytes).into_owned();
        if !status.is_success() {
            return Err(AnalysisError::Remote(format!("{status}: {body}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl ImageAnalyzer for VisionAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, image_path: &Path, prompt: &str) -> Result<Extraction, AnalysisError> {
        let b64 = encode_image(image_path).await?;
        let mime_type = detect_image_mime(image_path);
        debug!(path = %image_path.display(), mime_type, bytes = b64.len(), "[Vision] Encoded image");

        let extraction = match &self.provider {
            VisionProvider::OpenAI { api_key, model } => {
                info!(path = %image_path.display(), "[Vision] Extracting text via OpenAI {}", model);
                let body = openai_request_body(model, &b64, mime_type, prompt, self.max_tokens);
                let text = self
                    .post(self.http.post(OPENAI_URL).bearer_auth(api_key).json(&body))
                    .await?;
                parse_openai_response(&text)?
            }
            VisionProvider::Gemini { api_key, model } => {
                info!(path = %image_path.display(), "[Vision] Extracting text via Gemini {}", model);
                let url = format!("{GEMINI_BASE_URL}/{model}:generateContent");
                let body = gemini_request_body(&b64, mime_type, prompt, self.max_tokens);
                let text = self
                    .post(self.http.post(&url).header("x-goog-api-key", api_key).json(&body))
                    .await?;
                parse_gemini_response(&text)?
            }
        };

        Ok(Extraction {
            text: sanitize_text(&extraction.text, self.placeholder),
            usage: extraction.usage,
        })
    }
}

/// Read the image and return its base64 encoding.
pub async fn encode_image(image_path: &Path) -> Result<String, AnalysisError> {
    let bytes = tokio::fs::read(image_path)
        .await
        .map_err(|e| AnalysisError::Encode(format!("{}: {e}", image_path.display())))?;
    if bytes.is_empty() {
        return Err(AnalysisError::Encode(format!("{} is empty", image_path.display())));
    }
    Ok(STANDARD.encode(bytes))
}

fn openai_request_body(
    model: &str, b64: &str, mime_type: &str, prompt: &str, max_tokens: Option<u32>,
) -> Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": prompt },
                { "type": "image_url",
                  "image_url": { "url": format!("data:{};base64,{}", mime_type, b64) } }
            ]
        }]
    });
    if let Some(max) = max_tokens {
        body["max_tokens"] = max.into();
    }
    body
}

fn gemini_request_body(b64: &str, mime_type: &str, prompt: &str, max_tokens: Option<u32>) -> Value {
    let mut body = serde_json::json!({
        "contents": [{ "parts": [
            { "text": prompt },
            { "inlineData": { "mimeType": mime_type, "data": b64 } }
        ]}]
    });
    if let Some(max) = max_tokens {
        body["generationConfig"] = serde_json::json!({ "maxOutputTokens": max });
    }
    body
}

fn parse_json(body: &str) -> Result<Value, AnalysisError> {
    serde_json::from_str(body).map_err(|e| AnalysisError::MalformedResponse(e.to_string()))
}

fn parse_openai_response(body: &str) -> Result<Extraction, AnalysisError> {
    let json = parse_json(body)?;
    let message = &json["choices"][0]["message"];
    if let Some(refusal) = message["refusal"].as_str() {
        return Err(AnalysisError::Remote(format!("model refused: {refusal}")));
    }
    let text = message["content"]
        .as_str()
        .ok_or_else(|| AnalysisError::MalformedResponse("missing choices[0].message.content".into()))?;

    let usage = json.get("usage").filter(|u| u.is_object()).map(|u| TokenUsage {
        prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
        completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
        total_tokens: u["total_tokens"].as_u64().unwrap_or(0),
    });
    Ok(Extraction { text: text.to_string(), usage })
}

fn parse_gemini_response(body: &str) -> Result<Extraction, AnalysisError> {
    let json = parse_json(body)?;
    if let Some(reason) = json["promptFeedback"]["blockReason"].as_str() {
        return Err(AnalysisError::Remote(format!("prompt blocked: {reason}")));
    }
    let parts = json["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| AnalysisError::MalformedResponse("missing candidates[0].content.parts".into()))?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();

    let usage = json.get("usageMetadata").filter(|u| u.is_object()).map(|u| TokenUsage {
        prompt_tokens: u["promptTokenCount"].as_u64().unwrap_or(0),
        completion_tokens: u["candidatesTokenCount"].as_u64().unwrap_or(0),
        total_tokens: u["totalTokenCount"].as_u64().unwrap_or(0),
    });
    Ok(Extraction { text, usage })
}
