//! Error types for the chat-review pipeline.
//!
//! Only [`ConfigurationError`] escapes analysis; schema, vision and OCR
//! failures are folded into the fallback ladder by the orchestrator.
//! Rendering has its own [`crate::render::RenderError`].

use std::fmt;

use thiserror::Error;
use vision_llm_service::{VisionCallError, VisionError};

/// One problem found while validating a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON-pointer-like path, e.g. `messages[3].bbox`.
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every violation found in one validation pass.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("schema validation failed with {} violation(s): {}", .violations.len(), join(.violations))]
pub struct SchemaError {
    pub violations: Vec<Violation>,
}

fn join(v: &[Violation]) -> String {
    v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join("; ")
}

/// Setup problems; the only error `analyze` returns.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(transparent)]
    Vision(#[from] VisionError),

    #[error("invalid setting {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("http client build failed: {0}")]
    HttpClient(String),

    #[error("no images were supplied")]
    NoImages,
}

/// OCR endpoint failures.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("ocr transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("ocr HTTP {status}: {snippet}")]
    HttpStatus { status: u16, snippet: String },
}

/// Why one page reference could not be loaded or decoded.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("fetch returned HTTP {0}")]
    HttpStatus(u16),

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed data URL")]
    DataUrl,

    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("decode task aborted: {0}")]
    Join(String),
}

/// Why the primary vision path produced no usable review.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Vision(#[from] VisionCallError),

    #[error("no page could be sent to the vision model")]
    NoPageInput,

    #[error("no JSON object found in model reply")]
    NoJson,

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("no message bubbles survived filtering")]
    NoBubbles,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_lists_every_violation() {
        let e = SchemaError {
            violations: vec![
                Violation::new("elo", "must be an integer"),
                Violation::new("messages[0].label", "unknown label `meh`"),
            ],
        };
        let s = e.to_string();
        assert!(s.contains("2 violation(s)"));
        assert!(s.contains("elo: must be an integer"));
        assert!(s.contains("messages[0].label"));
    }
}
