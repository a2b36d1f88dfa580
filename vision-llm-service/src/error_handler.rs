//! Unified error handling for `vision-llm-service`.
//!
//! This module exposes a single top-level error type [`VisionError`] for the
//! whole library and groups domain-specific errors in nested enums
//! ([`ConfigError`] for startup, [`VisionCallError`] for provider calls).
//! Small helpers for reading/validating environment variables return the
//! unified [`Result<T>`] alias.
//!
//! All messages include the suffix `[Vision LLM Service]` to simplify
//! attribution in logs.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::config::vision_provider::VisionProvider;

/* ------------------------------------------------------------------------- */
/* Public result alias                                                       */
/* ------------------------------------------------------------------------- */

/// Unified result alias for the entire crate.
pub type Result<T> = std::result::Result<T, VisionError>;

/// HTTP statuses that are worth another attempt.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/* ------------------------------------------------------------------------- */
/* Top-level error                                                           */
/* ------------------------------------------------------------------------- */

/// Top-level error for the `vision-llm-service` crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum VisionError {
    /// Configuration/validation errors (startup/readiness).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A provider call failed.
    #[error(transparent)]
    Call(#[from] VisionCallError),
}

/* ------------------------------------------------------------------------- */
/* Config errors                                                             */
/* ------------------------------------------------------------------------- */

/// Error enum for environment/config-driven setup.
///
/// Keep this focused: only errors that realistically happen at config
/// load/validation time.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A number failed to parse (like timeouts, token limits).
    #[error("[Vision LLM Service] invalid number in {var}: {reason}")]
    InvalidNumber {
        /// Variable name (e.g., `VISION_MAX_TOKENS`).
        var: &'static str,
        /// Human-readable reason (e.g., `expected u32`).
        reason: &'static str,
    },

    /// Value had the wrong format (e.g., invalid URL).
    #[error("[Vision LLM Service] invalid format in {var}: {reason}")]
    InvalidFormat {
        /// Variable name (e.g., `OPENAI_URL`).
        var: &'static str,
        /// Explanation (e.g., `must start with http:// or https://`).
        reason: &'static str,
    },

    /// No provider credentials were found at all.
    #[error("[Vision LLM Service] no vision provider configured: set GOOGLE_API_KEY or OPENAI_API_KEY")]
    NoCredentials,

    /// The config handed to a service belongs to another provider.
    #[error("[Vision LLM Service] config for {found:?} passed to the {expected:?} service")]
    InvalidProvider {
        expected: VisionProvider,
        found: VisionProvider,
    },

    /// Provider requires an API key but none was given.
    #[error("[Vision LLM Service] missing API key for {0:?}")]
    MissingApiKey(VisionProvider),

    /// The endpoint is empty or does not start with http/https.
    #[error("[Vision LLM Service] invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The HTTP client could not be constructed.
    #[error("[Vision LLM Service] http client build failed: {0}")]
    HttpClient(String),
}

/* ------------------------------------------------------------------------- */
/* Call errors                                                               */
/* ------------------------------------------------------------------------- */

/// Failure of a single vision call (or of every configured tier).
///
/// Only [`VisionCallError::HttpStatus`] with a status from
/// [`RETRYABLE_STATUSES`] is retryable; timeouts and client errors are not.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum VisionCallError {
    /// Upstream returned a non-successful HTTP status.
    #[error("[Vision LLM Service] {provider:?} HTTP {status} from {url}: {snippet}")]
    HttpStatus {
        provider: VisionProvider,
        status: StatusCode,
        url: String,
        /// Short snippet of the response body (trimmed).
        snippet: String,
    },

    /// Request exceeded the client timeout.
    #[error("[Vision LLM Service] {provider:?} timed out after {after:?}")]
    Timeout {
        provider: VisionProvider,
        after: Duration,
    },

    /// Network/transport failure without a status (DNS/connect/reset).
    #[error("[Vision LLM Service] {provider:?} transport error: {message}")]
    Transport {
        provider: VisionProvider,
        message: String,
    },

    /// Response payload could not be decoded as expected.
    #[error("[Vision LLM Service] {provider:?} decode error: {reason}")]
    Decode {
        provider: VisionProvider,
        reason: String,
    },

    /// Provider answered without any text content.
    #[error("[Vision LLM Service] {0:?} returned no content")]
    EmptyResponse(VisionProvider),

    /// An input image could not be prepared for the request.
    #[error("[Vision LLM Service] image {index} unusable: {reason}")]
    Image { index: usize, reason: String },

    /// Every configured provider failed; errors in tier order.
    #[error("[Vision LLM Service] all vision providers failed: {}", join_errors(.0))]
    Exhausted(Vec<VisionCallError>),
}

impl VisionCallError {
    /// Whether another attempt against the same provider may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            VisionCallError::HttpStatus { status, .. } => {
                RETRYABLE_STATUSES.contains(&status.as_u16())
            }
            _ => false,
        }
    }

    /// HTTP status, when the failure carried one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            VisionCallError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Maps a transport-level `reqwest` error for `provider`.
    pub(crate) fn from_reqwest(provider: VisionProvider, timeout: Duration, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return VisionCallError::Timeout {
                provider,
                after: timeout,
            };
        }
        if e.is_decode() {
            return VisionCallError::Decode {
                provider,
                reason: e.to_string(),
            };
        }
        VisionCallError::Transport {
            provider,
            message: e.to_string(),
        }
    }
}

fn join_errors(errors: &[VisionCallError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Trims a response body into a single-line snippet for logs and errors.
pub fn make_snippet(text: &str) -> String {
    const MAX: usize = 300;
    let one_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if one_line.chars().count() <= MAX {
        one_line
    } else {
        let mut s: String = one_line.chars().take(MAX).collect();
        s.push('…');
        s
    }
}

/* ------------------------------------------------------------------------- */
/* Env helpers (return unified `Result<T>`)                                  */
/* ------------------------------------------------------------------------- */

/// Reads an optional, non-empty environment variable.
pub fn env_opt(name: &'static str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Parses an optional `u32` from env (`Ok(None)` if unset/empty).
///
/// # Errors
/// Returns [`ConfigError::InvalidNumber`] if the variable is set but not a
/// valid `u32`.
pub fn env_opt_u32(name: &'static str) -> Result<Option<u32>> {
    match env_opt(name) {
        Some(v) => v.parse::<u32>().map(Some).map_err(|_| {
            VisionError::from(ConfigError::InvalidNumber {
                var: name,
                reason: "expected u32",
            })
        }),
        None => Ok(None),
    }
}

/// Parses an optional `u64` from env (`Ok(None)` if unset/empty).
///
/// # Errors
/// Returns [`ConfigError::InvalidNumber`] if the variable is set but not a
/// valid `u64`.
pub fn env_opt_u64(name: &'static str) -> Result<Option<u64>> {
    match env_opt(name) {
        Some(v) => v.parse::<u64>().map(Some).map_err(|_| {
            VisionError::from(ConfigError::InvalidNumber {
                var: name,
                reason: "expected u64",
            })
        }),
        None => Ok(None),
    }
}

/// Reads a boolean flag; only `false`/`0`/`no` (case-insensitive) turn it off.
pub fn env_flag(name: &'static str, default: bool) -> bool {
    match env_opt(name) {
        Some(v) => {
            let v = v.to_ascii_lowercase();
            !(v == "false" || v == "0" || v == "no")
        }
        None => default,
    }
}

/* ------------------------------------------------------------------------- */
/* Validation helpers                                                        */
/* ------------------------------------------------------------------------- */

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
///
/// # Errors
/// Returns [`ConfigError::InvalidFormat`] when the string does not start with
/// a valid HTTP scheme.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_err(code: u16) -> VisionCallError {
        VisionCallError::HttpStatus {
            provider: VisionProvider::OpenAI,
            status: StatusCode::from_u16(code).unwrap(),
            url: "http://localhost/v1/chat/completions".into(),
            snippet: String::new(),
        }
    }

    #[test]
    fn only_server_class_statuses_are_retryable() {
        for code in [429, 500, 502, 503, 504] {
            assert!(status_err(code).is_retryable(), "{code} should retry");
        }
        for code in [400, 401, 403, 404, 501] {
            assert!(!status_err(code).is_retryable(), "{code} should not retry");
        }
    }

    #[test]
    fn timeouts_are_not_retryable() {
        let e = VisionCallError::Timeout {
            provider: VisionProvider::Gemini,
            after: Duration::from_secs(30),
        };
        assert!(!e.is_retryable());
        assert!(e.status().is_none());
    }

    #[test]
    fn snippet_is_single_line_and_bounded() {
        let body = format!("line one\n\nline two {}", "x".repeat(600));
        let s = make_snippet(&body);
        assert!(!s.contains('\n'));
        assert!(s.starts_with("line one line two"));
        assert_eq!(s.chars().count(), 301);
    }

    #[test]
    fn endpoint_scheme_is_checked() {
        assert!(validate_http_endpoint("OPENAI_URL", "https://api.openai.com").is_ok());
        assert!(validate_http_endpoint("OPENAI_URL", "api.openai.com").is_err());
    }
}
