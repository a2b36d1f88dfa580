//! Default vision configs loaded from environment variables.
//!
//! A provider is "configured" when its API key is present; everything else
//! has a default.
//!
//! # Environment variables
//!
//! Common:
//! - `VISION_MAX_TOKENS`   = optional output token cap (u32)
//! - `VISION_TIMEOUT_SECS` = request timeout, default 30
//!
//! OpenAI:
//! - `OPENAI_API_KEY`      = enables the provider
//! - `OPENAI_URL`          = default `https://api.openai.com`
//! - `OPENAI_VISION_MODEL` = default `gpt-4o-mini`
//!
//! Gemini:
//! - `GOOGLE_API_KEY`      = enables the provider
//! - `GEMINI_URL`          = default `https://generativelanguage.googleapis.com`
//! - `GEMINI_VISION_MODEL` = default `gemini-1.5-flash`

use crate::{
    config::{vision_model_config::VisionModelConfig, vision_provider::VisionProvider},
    error_handler::{Result, env_opt, env_opt_u32, env_opt_u64, validate_http_endpoint},
};

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const GEMINI_DEFAULT_URL: &str = "https://generativelanguage.googleapis.com";
const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-flash";

fn timeout_secs() -> Result<u64> {
    Ok(env_opt_u64("VISION_TIMEOUT_SECS")?.unwrap_or(VisionModelConfig::DEFAULT_TIMEOUT_SECS))
}

/// OpenAI vision config, or `Ok(None)` when `OPENAI_API_KEY` is unset.
///
/// # Defaults
/// - `temperature = Some(0.2)`
/// - `max_tokens = Some(1500)` unless `VISION_MAX_TOKENS` is set
pub fn config_openai_vision() -> Result<Option<VisionModelConfig>> {
    let Some(api_key) = env_opt("OPENAI_API_KEY") else {
        return Ok(None);
    };
    let endpoint = env_opt("OPENAI_URL").unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string());
    validate_http_endpoint("OPENAI_URL", &endpoint)?;

    Ok(Some(VisionModelConfig {
        provider: VisionProvider::OpenAI,
        model: env_opt("OPENAI_VISION_MODEL").unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
        endpoint,
        api_key: Some(api_key),
        max_tokens: Some(env_opt_u32("VISION_MAX_TOKENS")?.unwrap_or(1500)),
        temperature: Some(0.2),
        top_p: None,
        top_k: None,
        timeout_secs: Some(timeout_secs()?),
    }))
}

/// Gemini vision config, or `Ok(None)` when `GOOGLE_API_KEY` is unset.
///
/// # Defaults
/// - `temperature = Some(0.1)`, `top_k = Some(1)`, `top_p = Some(0.8)`
/// - `max_tokens = Some(2048)` unless `VISION_MAX_TOKENS` is set
pub fn config_gemini_vision() -> Result<Option<VisionModelConfig>> {
    let Some(api_key) = env_opt("GOOGLE_API_KEY") else {
        return Ok(None);
    };
    let endpoint = env_opt("GEMINI_URL").unwrap_or_else(|| GEMINI_DEFAULT_URL.to_string());
    validate_http_endpoint("GEMINI_URL", &endpoint)?;

    Ok(Some(VisionModelConfig {
        provider: VisionProvider::Gemini,
        model: env_opt("GEMINI_VISION_MODEL").unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
        endpoint,
        api_key: Some(api_key),
        max_tokens: Some(env_opt_u32("VISION_MAX_TOKENS")?.unwrap_or(2048)),
        temperature: Some(0.1),
        top_p: Some(0.8),
        top_k: Some(1),
        timeout_secs: Some(timeout_secs()?),
    }))
}
