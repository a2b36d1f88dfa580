use axum::{
    Json,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chat_review::DegradeReason;
use serde::Serialize;

/// Response header naming the fallback tier behind a degraded review.
pub const DEGRADED_HEADER: &str = "x-review-degraded";

/// Universal response envelope for both success and error.
///
/// Reviews produced by a fallback tier still succeed; `degraded` tells the
/// client which tier answered.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<DegradeReason>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    /// Stable, machine-readable error code (e.g. "BAD_REQUEST", "NO_IMAGES").
    pub code: &'static str,
    /// Human-friendly error message.
    pub message: String,
    /// Optional fine-grained error details (per-field, hints, etc.).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ApiErrorDetail>,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    /// Field path like `images` or `images[2]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Optional hint to help the client fix the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    /// Build a success envelope.
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            degraded: None,
            data: Some(data),
            error: None,
        }
    }

    /// Build an error envelope.
    pub fn error(code: &'static str, message: impl Into<String>, details: Vec<ApiErrorDetail>) -> Self {
        Self {
            success: false,
            degraded: None,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
                details,
            }),
        }
    }

    /// Marks the payload as coming from a fallback tier.
    pub fn with_degraded(mut self, reason: Option<DegradeReason>) -> Self {
        self.degraded = reason;
        self
    }

    /// Convert to axum Response; degraded envelopes also carry
    /// [`DEGRADED_HEADER`].
    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        let degraded = self.degraded;
        let mut res = (status, Json(self)).into_response();
        if let Some(reason) = degraded {
            res.headers_mut()
                .insert(DEGRADED_HEADER, HeaderValue::from_static(reason.as_str()));
        }
        res
    }
}
