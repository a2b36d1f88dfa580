use serde::Deserialize;

use crate::core::http::response_envelope::ApiErrorDetail;

pub const MAX_IMAGES: usize = 10;
const DEFAULT_LANGUAGE: &str = "en";

/// Request payload for `/review` and `/review/annotated`.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    /// Screenshot references in page order: data URLs, http(s) URLs or
    /// server-local file paths.
    pub images: Vec<String>,
    /// Review language passed to the model, default `en`.
    #[serde(default)]
    pub language: Option<String>,
}

impl ReviewRequest {
    /// Checks image count and references; returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<ApiErrorDetail>> {
        let mut details = Vec::new();
        if self.images.is_empty() || self.images.len() > MAX_IMAGES {
            details.push(ApiErrorDetail {
                path: Some("images".into()),
                hint: Some(format!("Send between 1 and {MAX_IMAGES} images, got {}.", self.images.len())),
            });
        }
        for (i, r) in self.images.iter().enumerate() {
            if r.trim().is_empty() {
                details.push(ApiErrorDetail {
                    path: Some(format!("images[{i}]")),
                    hint: Some("Image reference must not be empty.".into()),
                });
            }
        }
        if details.is_empty() { Ok(()) } else { Err(details) }
    }

    pub fn language(&self) -> &str {
        self.language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE)
    }

    pub fn refs(&self) -> Vec<String> {
        self.images.iter().map(|r| r.trim().to_string()).collect()
    }
}
