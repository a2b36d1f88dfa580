//! Gemini vision client over `generateContent`.
//!
//! - POST {endpoint}/v1beta/models/{model}:generateContent?key=...
//! - images travel as `inline_data` (base64); remote URLs are downloaded
//!   first because the API does not fetch arbitrary URLs
//! - the reply text is the concatenation of the first candidate's parts

use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    config::{vision_model_config::VisionModelConfig, vision_provider::VisionProvider},
    error_handler::{ConfigError, Result, VisionCallError, make_snippet},
    image_input::{ImageInput, sniff_mime},
    vision_request::VisionRequest,
};

const PROVIDER: VisionProvider = VisionProvider::Gemini;

/// Extra guidance appended for Gemini, which tends to split bubbles into lines.
const BUBBLE_HINT: &str = "CRITICAL: Focus on detecting complete MESSAGE BUBBLES, not individual text lines. \
Each bubble is one message even when it wraps over several lines. \
Sender bubbles are typically on the right side and colored; receiver bubbles are on the left, gray or white.";

#[derive(Debug)]
pub struct GeminiVisionService {
    client: reqwest::Client,
    cfg: VisionModelConfig,
    api_key: String,
    url_generate: String,
    timeout: Duration,
}

impl GeminiVisionService {
    /// Validates `cfg` and builds the HTTP client.
    ///
    /// # Errors
    /// Same contract as the OpenAI service: wrong provider, missing key,
    /// bad endpoint or client build failure.
    pub fn new(cfg: VisionModelConfig) -> Result<Self> {
        if cfg.provider != PROVIDER {
            return Err(ConfigError::InvalidProvider {
                expected: PROVIDER,
                found: cfg.provider,
            }
            .into());
        }
        let api_key = cfg
            .api_key
            .clone()
            .ok_or(ConfigError::MissingApiKey(PROVIDER))?;

        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(ConfigError::InvalidEndpoint(cfg.endpoint.clone()).into());
        }

        let timeout = cfg.timeout();
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let url_generate = format!(
            "{}/v1beta/models/{}:generateContent",
            endpoint.trim_end_matches('/'),
            cfg.model
        );

        info!(
            provider = %PROVIDER,
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            timeout_secs = timeout.as_secs(),
            "GeminiVisionService initialized"
        );

        Ok(Self {
            client,
            cfg,
            api_key,
            url_generate,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    pub async fn analyze(&self, req: &VisionRequest) -> std::result::Result<String, VisionCallError> {
        let started = Instant::now();

        let mut parts = Vec::with_capacity(req.images.len() + 1);
        parts.push(Part::Text {
            text: format!("{}\n\n{}\n\n{}", req.system, req.prompt, BUBBLE_HINT),
        });
        for (index, img) in req.images.iter().enumerate() {
            let (mime_type, bytes) = self.image_bytes(index, img).await?;
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type,
                    data: STANDARD.encode(bytes),
                },
            });
        }

        let body = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: self.cfg.temperature,
                top_k: self.cfg.top_k,
                top_p: self.cfg.top_p,
                max_output_tokens: self.cfg.max_tokens,
            },
        };

        debug!(
            model = %self.cfg.model,
            images = req.images.len(),
            "POST {}", self.url_generate
        );

        let resp = self
            .client
            .post(&self.url_generate)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| VisionCallError::from_reqwest(PROVIDER, self.timeout, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let url = self.url_generate.clone();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);

            error!(
                %status,
                %url,
                %snippet,
                model = %self.cfg.model,
                latency_ms = started.elapsed().as_millis() as u64,
                "Gemini generateContent returned non-success status"
            );

            return Err(VisionCallError::HttpStatus {
                provider: PROVIDER,
                status,
                url,
                snippet,
            });
        }

        let out: GenerateResponse = resp.json().await.map_err(|e| {
            error!(error = %e, model = %self.cfg.model, "failed to decode generateContent");
            VisionCallError::Decode {
                provider: PROVIDER,
                reason: format!("serde error: {e}; expected `candidates[0].content.parts`"),
            }
        })?;

        let text = out
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|s| !s.trim().is_empty())
            .ok_or(VisionCallError::EmptyResponse(PROVIDER))?;

        info!(
            model = %self.cfg.model,
            latency_ms = started.elapsed().as_millis() as u64,
            reply_len = text.len(),
            "vision completion completed"
        );

        Ok(text)
    }

    async fn image_bytes(
        &self,
        index: usize,
        img: &ImageInput,
    ) -> std::result::Result<(String, Vec<u8>), VisionCallError> {
        match img {
            ImageInput::Inline { mime, data } => Ok((mime.clone(), data.clone())),
            ImageInput::Url(url) => {
                let image_err = |reason: String| VisionCallError::Image { index, reason };
                let resp = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| image_err(e.to_string()))?;
                if !resp.status().is_success() {
                    return Err(image_err(format!("HTTP {} fetching {url}", resp.status())));
                }
                let declared = resp
                    .headers()
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .filter(|v| v.starts_with("image/"))
                    .map(str::to_string);
                let bytes = resp.bytes().await.map_err(|e| image_err(e.to_string()))?;
                let mime = declared.unwrap_or_else(|| sniff_mime(&bytes).to_string());
                Ok((mime, bytes.to_vec()))
            }
        }
    }
}

/* ------------------------------------------------------------------------- */
/* HTTP payloads                                                             */
/* ------------------------------------------------------------------------- */

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
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
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}
