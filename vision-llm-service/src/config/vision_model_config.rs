use crate::config::vision_provider::VisionProvider;

/// Configuration for one vision model endpoint.
///
/// # Fields
///
/// - `provider`: which backend serves the model.
/// - `model`: model identifier (e.g. `"gpt-4o-mini"`, `"gemini-1.5-flash"`).
/// - `endpoint`: base URL without the API path.
/// - `api_key`: credential for the provider.
/// - `max_tokens`: output token cap.
/// - `temperature` / `top_p` / `top_k`: sampling controls, sent when set.
/// - `timeout_secs`: whole-request timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionModelConfig {
    pub provider: VisionProvider,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub timeout_secs: Option<u64>,
}

impl VisionModelConfig {
    /// Default request timeout when the config leaves it unset.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs.unwrap_or(Self::DEFAULT_TIMEOUT_SECS))
    }
}
