//! Tiered vision providers: a preferred one and an optional fallback.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Each tier is retried with [`RetryPolicy`]; the next tier is tried only
//!   after the previous one has failed for good.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use vision_llm_service::{VisionProviders, VisionRequest};
//!
//! # async fn run() -> vision_llm_service::error_handler::Result<()> {
//! let providers = Arc::new(VisionProviders::from_env()?);
//! let reply = providers
//!     .analyze(&VisionRequest { system: "Return JSON.".into(), prompt: "Describe.".into(), images: vec![] })
//!     .await?;
//! println!("{} answered: {}", reply.provider, reply.text);
//! # Ok(())
//! # }
//! ```

use std::time::Instant;

use tracing::{info, warn};

use crate::{
    config::{
        default_config::{config_gemini_vision, config_openai_vision},
        vision_model_config::VisionModelConfig,
        vision_provider::VisionProvider,
    },
    error_handler::{ConfigError, Result, VisionCallError, env_flag},
    retry::{RetryPolicy, with_backoff},
    services::{gemini_service::GeminiVisionService, open_ai_service::OpenAiVisionService},
    vision_request::{VisionReply, VisionRequest},
};

/// A constructed provider client.
#[derive(Debug)]
pub enum VisionClient {
    OpenAI(OpenAiVisionService),
    Gemini(GeminiVisionService),
}

impl VisionClient {
    pub fn new(cfg: VisionModelConfig) -> Result<Self> {
        Ok(match cfg.provider {
            VisionProvider::OpenAI => VisionClient::OpenAI(OpenAiVisionService::new(cfg)?),
            VisionProvider::Gemini => VisionClient::Gemini(GeminiVisionService::new(cfg)?),
        })
    }

    pub fn provider(&self) -> VisionProvider {
        match self {
            VisionClient::OpenAI(_) => VisionProvider::OpenAI,
            VisionClient::Gemini(_) => VisionProvider::Gemini,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            VisionClient::OpenAI(s) => s.model(),
            VisionClient::Gemini(s) => s.model(),
        }
    }

    pub async fn analyze(&self, req: &VisionRequest) -> std::result::Result<String, VisionCallError> {
        match self {
            VisionClient::OpenAI(s) => s.analyze(req).await,
            VisionClient::Gemini(s) => s.analyze(req).await,
        }
    }
}

/// Ordered provider tiers plus the retry policy applied to each.
#[derive(Debug)]
pub struct VisionProviders {
    tiers: Vec<VisionClient>,
    retry: RetryPolicy,
}

impl VisionProviders {
    /// Builds tiers from configs in the given order.
    ///
    /// # Errors
    /// [`ConfigError::NoCredentials`] when `configs` is empty; any client
    /// construction error otherwise.
    pub fn new(configs: Vec<VisionModelConfig>, retry: RetryPolicy) -> Result<Self> {
        if configs.is_empty() {
            return Err(ConfigError::NoCredentials.into());
        }
        let tiers = configs
            .into_iter()
            .map(VisionClient::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { tiers, retry })
    }

    /// Reads both provider configs and orders them by `PREFER_GEMINI`
    /// (default `true`).
    pub fn from_env() -> Result<Self> {
        let gemini = config_gemini_vision()?;
        let openai = config_openai_vision()?;
        let prefer_gemini = env_flag("PREFER_GEMINI", true);

        let ordered = if prefer_gemini {
            [gemini, openai]
        } else {
            [openai, gemini]
        };
        let configs: Vec<_> = ordered.into_iter().flatten().collect();

        let this = Self::new(configs, RetryPolicy::from_env()?)?;
        info!(
            tiers = ?this.providers(),
            retries = this.retry.retries,
            base_delay_ms = this.retry.base_delay.as_millis() as u64,
            "vision providers ready"
        );
        Ok(this)
    }

    /// Providers in the order they are tried.
    pub fn providers(&self) -> Vec<VisionProvider> {
        self.tiers.iter().map(VisionClient::provider).collect()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Runs `req` against each tier in order until one answers.
    ///
    /// # Errors
    /// [`VisionCallError::Exhausted`] with every tier's final error.
    pub async fn analyze(&self, req: &VisionRequest) -> std::result::Result<VisionReply, VisionCallError> {
        let mut failures = Vec::with_capacity(self.tiers.len());

        for client in &self.tiers {
            let provider = client.provider();
            let started = Instant::now();
            match with_backoff(self.retry, provider.as_str(), || client.analyze(req)).await {
                Ok(text) => {
                    info!(
                        %provider,
                        model = %client.model(),
                        latency_ms = started.elapsed().as_millis() as u64,
                        "vision analysis answered"
                    );
                    return Ok(VisionReply { text, provider });
                }
                Err(e) => {
                    warn!(%provider, error = %e, "vision provider failed, trying next tier");
                    failures.push(e);
                }
            }
        }

        Err(VisionCallError::Exhausted(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(provider: VisionProvider) -> VisionModelConfig {
        VisionModelConfig {
            provider,
            model: "m".into(),
            endpoint: "http://127.0.0.1:9".into(),
            api_key: Some("k".into()),
            max_tokens: None,
            temperature: None,
            top_p: None,
            top_k: None,
            timeout_secs: Some(1),
        }
    }

    #[test]
    fn empty_config_list_is_a_configuration_error() {
        let err = VisionProviders::new(vec![], RetryPolicy::default()).unwrap_err();
        assert!(matches!(
            err,
            crate::error_handler::VisionError::Config(ConfigError::NoCredentials)
        ));
    }

    #[test]
    fn tiers_keep_given_order() {
        let p = VisionProviders::new(
            vec![cfg(VisionProvider::Gemini), cfg(VisionProvider::OpenAI)],
            RetryPolicy::default(),
        )
        .unwrap();
        assert_eq!(
            p.providers(),
            vec![VisionProvider::Gemini, VisionProvider::OpenAI]
        );
    }
}
