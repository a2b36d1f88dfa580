//! Images handed to a vision provider.
//!
//! Callers usually already hold the page bytes (they need them for pixel
//! work), so `Inline` is the common case. `Url` is forwarded as-is to
//! providers that fetch remote images themselves.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// One image attached to a [`crate::VisionRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum ImageInput {
    /// Remote `http(s)` URL.
    Url(String),
    /// Raw encoded bytes (PNG/JPEG/WebP) with their MIME type.
    Inline { mime: String, data: Vec<u8> },
}

impl ImageInput {
    pub fn inline(mime: impl Into<String>, data: Vec<u8>) -> Self {
        ImageInput::Inline {
            mime: mime.into(),
            data,
        }
    }

    /// Value for an OpenAI `image_url.url` field.
    pub fn to_url_string(&self) -> String {
        match self {
            ImageInput::Url(u) => u.clone(),
            ImageInput::Inline { mime, data } => to_data_url(mime, data),
        }
    }
}

/// Encodes bytes as a `data:<mime>;base64,...` URL.
pub fn to_data_url(mime: &str, data: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(data))
}

/// Splits a base64 `data:` URL into `(mime, bytes)`.
///
/// Returns `None` for anything that is not a base64 data URL.
pub fn parse_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let mime = if mime.is_empty() {
        "application/octet-stream"
    } else {
        mime
    };
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    Some((mime.to_string(), bytes))
}

/// Best-effort MIME sniffing from magic bytes; defaults to `image/png`.
pub fn sniff_mime(data: &[u8]) -> &'static str {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "image/webp"
    } else if data.starts_with(b"GIF8") {
        "image/gif"
    } else {
        "image/png"
    }
}
