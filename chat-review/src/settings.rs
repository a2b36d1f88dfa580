//! Reviewer settings loaded from the environment.
//!
//! # Environment variables
//! - `DISABLE_OCR_FALLBACK` = skip the OCR tier, default `false`
//! - `OCR_URL`              = OCR endpoint; unset means OCR is unavailable
//! - `OCR_TIMEOUT_SECS`     = OCR request timeout, default 30
//! - `PAGE_FETCH_TIMEOUT_SECS` = timeout for remote page downloads, default 20
//! - `BADGE_FONT_PATH`      = optional TTF/OTF for badge glyphs

use std::path::PathBuf;
use std::time::Duration;

use vision_llm_service::error_handler::{env_flag, env_opt, env_opt_u64, validate_http_endpoint};

use crate::errors::ConfigurationError;

const DEFAULT_OCR_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSettings {
    pub ocr_fallback: bool,
    pub ocr_url: Option<String>,
    pub ocr_timeout: Duration,
    pub fetch_timeout: Duration,
    pub badge_font_path: Option<PathBuf>,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            ocr_fallback: true,
            ocr_url: None,
            ocr_timeout: Duration::from_secs(DEFAULT_OCR_TIMEOUT_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            badge_font_path: None,
        }
    }
}

impl ReviewSettings {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let ocr_url = env_opt("OCR_URL");
        if let Some(url) = &ocr_url {
            validate_http_endpoint("OCR_URL", url)?;
        }
        Ok(Self {
            ocr_fallback: !env_flag("DISABLE_OCR_FALLBACK", false),
            ocr_url,
            ocr_timeout: Duration::from_secs(env_opt_u64("OCR_TIMEOUT_SECS")?.unwrap_or(DEFAULT_OCR_TIMEOUT_SECS)),
            fetch_timeout: Duration::from_secs(
                env_opt_u64("PAGE_FETCH_TIMEOUT_SECS")?.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
            ),
            badge_font_path: env_opt("BADGE_FONT_PATH").map(PathBuf::from),
        })
    }

    /// OCR is used only when enabled and an endpoint is configured.
    pub fn ocr_endpoint(&self) -> Option<&str> {
        self.ocr_url.as_deref().filter(|_| self.ocr_fallback)
    }
}
