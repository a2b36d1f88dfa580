//! Page loading: image references to bytes, pixels and dimensions.
//!
//! References may be `data:` URLs, `http(s)` URLs or local file paths. All
//! pages load concurrently and are joined before analysis starts. A page
//! that cannot be fetched or decoded still yields an entry (default 375×667
//! metadata, no pixels) so page indices stay aligned.

use image::RgbImage;
use tracing::{debug, warn};
use vision_llm_service::ImageInput;
use vision_llm_service::image_input::{parse_data_url, sniff_mime};

use crate::errors::PageError;
use crate::model::{DEFAULT_PAGE, PageMeta};

/// One input screenshot after loading.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub meta: PageMeta,
    /// Decoded pixels; `None` when the page could not be decoded.
    pub image: Option<RgbImage>,
    /// What is sent to the vision provider for this page.
    pub input: Option<ImageInput>,
}

impl LoadedPage {
    /// Page built from already decoded pixels; the provider gets a PNG.
    pub fn decoded(image: RgbImage) -> Self {
        let meta = PageMeta {
            width: image.width(),
            height: image.height(),
        };
        let mut png = Vec::new();
        let encoded = image
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .is_ok();
        let input = encoded.then(|| ImageInput::inline("image/png", png));
        Self {
            meta,
            image: Some(image),
            input,
        }
    }

    fn unreadable(input: Option<ImageInput>) -> Self {
        Self {
            meta: DEFAULT_PAGE,
            image: None,
            input,
        }
    }

    /// Raw encoded bytes, if the page has them inline.
    pub fn bytes(&self) -> Option<(&str, &[u8])> {
        match &self.input {
            Some(ImageInput::Inline { mime, data }) => Some((mime.as_str(), data.as_slice())),
            _ => None,
        }
    }
}

fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

async fn fetch(http: &reqwest::Client, reference: &str) -> Result<(String, Vec<u8>), PageError> {
    if reference.starts_with("data:") {
        return parse_data_url(reference).ok_or(PageError::DataUrl);
    }
    let bytes = if is_remote(reference) {
        let resp = http.get(reference).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PageError::HttpStatus(status.as_u16()));
        }
        resp.bytes().await?.to_vec()
    } else {
        tokio::fs::read(reference).await?
    };
    let mime = sniff_mime(&bytes).to_string();
    Ok((mime, bytes))
}

async fn decode(bytes: Vec<u8>) -> Result<RgbImage, PageError> {
    tokio::task::spawn_blocking(move || -> Result<RgbImage, PageError> {
        Ok(image::load_from_memory(&bytes)?.to_rgb8())
    })
    .await
    .map_err(|e| PageError::Join(e.to_string()))?
}

async fn load_one(http: &reqwest::Client, index: usize, reference: &str) -> LoadedPage {
    let (mime, bytes) = match fetch(http, reference).await {
        Ok(v) => v,
        Err(e) => {
            warn!(index, error = %e, "page unreadable, using default size");
            // The provider may still reach a remote URL we could not.
            let input = is_remote(reference).then(|| ImageInput::Url(reference.to_string()));
            return LoadedPage::unreadable(input);
        }
    };

    match decode(bytes.clone()).await {
        Ok(image) => {
            debug!(index, width = image.width(), height = image.height(), %mime, "page decoded");
            LoadedPage {
                meta: PageMeta {
                    width: image.width(),
                    height: image.height(),
                },
                image: Some(image),
                input: Some(ImageInput::inline(mime, bytes)),
            }
        }
        Err(e) => {
            warn!(index, error = %e, "page undecodable, using default size");
            LoadedPage::unreadable(Some(ImageInput::inline(mime, bytes)))
        }
    }
}

/// Loads every reference concurrently, preserving order.
pub async fn load_pages(http: &reqwest::Client, refs: &[String]) -> Vec<LoadedPage> {
    futures::future::join_all(refs.iter().enumerate().map(|(i, r)| load_one(http, i, r))).await
}
