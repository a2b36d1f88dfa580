//! OpenAI vision client over the chat completions API.
//!
//! - POST {endpoint}/v1/chat/completions with `response_format = json_object`
//! - images are sent as `image_url` content parts (remote URL or data URL)
//!
//! Constructor validation:
//! - `cfg.provider` must be `VisionProvider::OpenAI`
//! - `cfg.api_key` must be present
//! - `cfg.endpoint` must start with http:// or https://

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    config::{vision_model_config::VisionModelConfig, vision_provider::VisionProvider},
    error_handler::{ConfigError, Result, VisionCallError, make_snippet},
    vision_request::VisionRequest,
};

const PROVIDER: VisionProvider = VisionProvider::OpenAI;

/// Thin client for OpenAI vision chat completions.
#[derive(Debug)]
pub struct OpenAiVisionService {
    client: reqwest::Client,
    cfg: VisionModelConfig,
    url_chat: String,
    timeout: Duration,
}

impl OpenAiVisionService {
    /// Validates `cfg` and builds an HTTP client with the bearer header and
    /// the configured timeout.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidProvider`] if `cfg.provider` is not OpenAI
    /// - [`ConfigError::MissingApiKey`] if `cfg.api_key` is `None`
    /// - [`ConfigError::InvalidEndpoint`] if `cfg.endpoint` is not http(s)
    /// - [`ConfigError::HttpClient`] if the client cannot be built
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
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| ConfigError::HttpClient(format!("invalid API key header: {e}")))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let url_chat = format!("{}/v1/chat/completions", endpoint.trim_end_matches('/'));

        info!(
            provider = %PROVIDER,
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            timeout_secs = timeout.as_secs(),
            "OpenAiVisionService initialized"
        );

        Ok(Self {
            client,
            cfg,
            url_chat,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    /// Sends one non-streaming multimodal completion and returns the
    /// message content verbatim.
    pub async fn analyze(&self, req: &VisionRequest) -> std::result::Result<String, VisionCallError> {
        let started = Instant::now();
        let body = ChatCompletionRequest::from_request(&self.cfg, req);

        debug!(
            model = %self.cfg.model,
            images = req.images.len(),
            prompt_len = req.prompt.len(),
            "POST {}", self.url_chat
        );

        let resp = self
            .client
            .post(&self.url_chat)
            .json(&body)
            .send()
            .await
            .map_err(|e| VisionCallError::from_reqwest(PROVIDER, self.timeout, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let url = self.url_chat.clone();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);

            error!(
                %status,
                %url,
                %snippet,
                model = %self.cfg.model,
                latency_ms = started.elapsed().as_millis() as u64,
                "OpenAI /v1/chat/completions returned non-success status"
            );

            return Err(VisionCallError::HttpStatus {
                provider: PROVIDER,
                status,
                url,
                snippet,
            });
        }

        let out: ChatCompletionResponse = resp.json().await.map_err(|e| {
            error!(error = %e, model = %self.cfg.model, "failed to decode chat completion");
            VisionCallError::Decode {
                provider: PROVIDER,
                reason: format!("serde error: {e}; expected `choices[0].message.content`"),
            }
        })?;

        let content = out
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .filter(|s| !s.trim().is_empty())
            .ok_or(VisionCallError::EmptyResponse(PROVIDER))?;

        info!(
            model = %self.cfg.model,
            latency_ms = started.elapsed().as_millis() as u64,
            reply_len = content.len(),
            "vision completion completed"
        );

        Ok(content)
    }
}

/* ------------------------------------------------------------------------- */
/* HTTP payloads                                                             */
/* ------------------------------------------------------------------------- */

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    response_format: ResponseFormat,
}

impl<'a> ChatCompletionRequest<'a> {
    fn from_request(cfg: &'a VisionModelConfig, req: &'a VisionRequest) -> Self {
        let mut parts = Vec::with_capacity(req.images.len() + 1);
        parts.push(ContentPart::Text { text: &req.prompt });
        parts.extend(req.images.iter().map(|img| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: img.to_url_string(),
            },
        }));

        Self {
            model: &cfg.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(&req.system),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(parts),
                },
            ],
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            max_tokens: cfg.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_input::ImageInput;

    fn cfg() -> VisionModelConfig {
        VisionModelConfig {
            provider: VisionProvider::OpenAI,
            model: "gpt-4o-mini".into(),
            endpoint: "http://localhost:9".into(),
            api_key: Some("sk-test".into()),
            max_tokens: Some(1500),
            temperature: Some(0.2),
            top_p: None,
            top_k: None,
            timeout_secs: Some(5),
        }
    }

    #[test]
    fn request_body_carries_images_as_parts() {
        let cfg = cfg();
        let req = VisionRequest {
            system: "sys".into(),
            prompt: "look".into(),
            images: vec![
                ImageInput::Url("https://example.com/a.png".into()),
                ImageInput::inline("image/png", vec![0, 1]),
            ],
        };
        let body = serde_json::to_value(ChatCompletionRequest::from_request(&cfg, &req)).unwrap();

        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["content"], "sys");
        let parts = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["image_url"]["url"], "https://example.com/a.png");
        assert!(
            parts[2]["image_url"]["url"]
                .as_str()
                .unwrap()
                .starts_with("data:image/png;base64,")
        );
        assert!(body.get("top_p").is_none());
    }

    #[test]
    fn rejects_foreign_provider_config() {
        let mut c = cfg();
        c.provider = VisionProvider::Gemini;
        assert!(OpenAiVisionService::new(c).is_err());
    }

    #[test]
    fn requires_api_key() {
        let mut c = cfg();
        c.api_key = None;
        assert!(OpenAiVisionService::new(c).is_err());
    }
}
