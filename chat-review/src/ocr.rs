//! External OCR line source used by the first fallback tier.
//!
//! Contract: `POST {OCR_URL}` with `{"image": <base64>, "mime", "language"}`
//! answers `{"lines": [{"text", "x0", "y0", "x1", "y1"}]}` in page pixels.

use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use vision_llm_service::error_handler::make_snippet;

use crate::errors::{ConfigurationError, OcrError};
use crate::labels::Label;
use crate::model::{BBox, Detection, PageMeta, Side};

pub const OCR_CONFIDENCE: f32 = 0.4;

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    image: String,
    mime: &'a str,
    language: &'a str,
}

/// One recognized text line, corner coordinates in page pixels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OcrLine {
    pub text: String,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    lines: Vec<OcrLine>,
}

/// HTTP client for the OCR endpoint.
#[derive(Debug, Clone)]
pub struct OcrClient {
    http: reqwest::Client,
    url: String,
}

impl OcrClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ConfigurationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;
        Ok(Self { http, url: url.into() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Recognizes the lines of one encoded page.
    pub async fn recognize(&self, mime: &str, bytes: &[u8], language: &str) -> Result<Vec<OcrLine>, OcrError> {
        let started = Instant::now();
        let body = OcrRequest {
            image: STANDARD.encode(bytes),
            mime,
            language,
        };
        let resp = self.http.post(&self.url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            error!(status = %status, url = %self.url, "ocr non-success");
            return Err(OcrError::HttpStatus {
                status: status.as_u16(),
                snippet: make_snippet(&text),
            });
        }
        let parsed: OcrResponse = resp.json().await?;
        debug!(
            lines = parsed.lines.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "ocr answered"
        );
        Ok(parsed.lines)
    }
}

/// Turns one page's lines into detections: side by page half, fixed
/// `interesting` label. Blank lines are skipped.
pub fn lines_to_detections(lines: &[OcrLine], image_index: u32, page: PageMeta, first_index: u32) -> Vec<Detection> {
    let mid = page.width as f64 / 2.0;
    lines
        .iter()
        .filter(|l| !l.text.trim().is_empty())
        .enumerate()
        .map(|(i, l)| Detection {
            index: first_index + i as u32,
            side: if l.x0 > mid { Side::Sender } else { Side::Receiver },
            text: l.text.trim().to_string(),
            bbox: BBox::new(l.x0, l.y0, l.x1 - l.x0, l.y1 - l.y0),
            image_index,
            label: Label::Interesting,
            confidence: OCR_CONFIDENCE,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str, x0: f64) -> OcrLine {
        OcrLine {
            text: text.into(),
            x0,
            y0: 10.0,
            x1: x0 + 80.0,
            y1: 30.0,
        }
    }

    #[test]
    fn sides_follow_page_half() {
        let page = PageMeta { width: 400, height: 800 };
        let out = lines_to_detections(&[line(" hi there ", 250.0), line("   ", 0.0), line("yo", 200.0)], 1, page, 5);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].side, Side::Sender);
        assert_eq!(out[0].text, "hi there");
        assert_eq!(out[0].bbox, BBox::new(250.0, 10.0, 80.0, 20.0));
        assert_eq!(out[0].index, 5);
        assert_eq!(out[0].image_index, 1);
        // Exactly on the midline is not past it.
        assert_eq!(out[1].side, Side::Receiver);
        assert_eq!(out[1].label, Label::Interesting);
        assert!((out[1].confidence - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn response_tolerates_missing_lines() {
        let r: OcrResponse = serde_json::from_str("{}").unwrap();
        assert!(r.lines.is_empty());
    }
}
