//! Vision analysis orchestrator and its fallback ladder.
//!
//! 1) **Pages**: load every reference concurrently, join before analysis
//! 2) **Vision call**: one structured request through [`VisionProviders`]
//!    (tiered, retried on 429/5xx)
//! 3) **Parse + repair + validate** the raw reply
//! 4) **Normalize**: clamp to pages, drop noise, resolve unknown sides
//! 5) **Group** fragments into bubbles, then recompute counts and rating
//!
//! When steps 2–5 yield nothing usable the ladder degrades to OCR lines
//! (if configured) and finally to an emergency review. Degradation is a
//! value ([`AnalysisOutcome::Degraded`]); only setup problems are errors.

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use vision_llm_service::{VisionProviders, VisionRequest};

use crate::detections::{clamp_to_pages, drop_noise, resolve_sides};
use crate::errors::{AnalysisError, ConfigurationError, OcrError};
use crate::grouping::group_bubbles;
use crate::labels::Label;
use crate::model::{BBox, Detection, LabelCounts, PageMeta, Review, Side};
use crate::ocr::{OcrClient, lines_to_detections};
use crate::pages::{LoadedPage, load_pages};
use crate::parse::extract_json;
use crate::prompt::{build_system_prompt, build_user_prompt};
use crate::render::pixel_cache::PixelCache;
use crate::repair::repair;
use crate::schema::validate;
use crate::settings::ReviewSettings;

const OCR_SUMMARY: &str = "OCR fallback used; text recognition was challenging.";
const OCR_ENDING: &str = "draw";
const OCR_PLACEHOLDER_TEXT: &str = "Chat content could not be read clearly";
const OCR_PLACEHOLDER_BBOX: [f64; 4] = [50.0, 100.0, 200.0, 50.0];
const OCR_PLACEHOLDER_CONFIDENCE: f32 = 0.3;

const EMERGENCY_SUMMARY: &str = "Analysis unavailable due to technical limitations.";
const EMERGENCY_ENDING: &str = "Analysis incomplete";
const EMERGENCY_TEXT: &str = "Unable to analyze chat content - please try uploading a clearer image.";
const EMERGENCY_BBOX: [f64; 4] = [50.0, 100.0, 300.0, 50.0];

/// Which fallback tier produced a degraded review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeReason {
    OcrFallback,
    Emergency,
}

impl DegradeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DegradeReason::OcrFallback => "ocr_fallback",
            DegradeReason::Emergency => "emergency",
        }
    }
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`ReviewerContext::analyze`].
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Success(Review),
    Degraded { review: Review, reason: DegradeReason },
}

impl AnalysisOutcome {
    pub fn review(&self) -> &Review {
        match self {
            AnalysisOutcome::Success(r) | AnalysisOutcome::Degraded { review: r, .. } => r,
        }
    }

    pub fn into_review(self) -> Review {
        match self {
            AnalysisOutcome::Success(r) | AnalysisOutcome::Degraded { review: r, .. } => r,
        }
    }

    pub fn degraded_reason(&self) -> Option<DegradeReason> {
        match self {
            AnalysisOutcome::Success(_) => None,
            AnalysisOutcome::Degraded { reason, .. } => Some(*reason),
        }
    }
}

/// Everything analysis needs, built once at startup and shared via `Arc`.
#[derive(Debug)]
pub struct ReviewerContext {
    providers: VisionProviders,
    http: reqwest::Client,
    ocr: Option<OcrClient>,
    settings: ReviewSettings,
}

impl ReviewerContext {
    pub fn new(providers: VisionProviders, settings: ReviewSettings) -> Result<Self, ConfigurationError> {
        let http = reqwest::Client::builder()
            .timeout(settings.fetch_timeout)
            .build()
            .map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;
        let ocr = settings
            .ocr_endpoint()
            .map(|url| OcrClient::new(url, settings.ocr_timeout))
            .transpose()?;
        Ok(Self {
            providers,
            http,
            ocr,
            settings,
        })
    }

    /// Providers from `GOOGLE_API_KEY` / `OPENAI_API_KEY` plus
    /// [`ReviewSettings::from_env`].
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let providers = VisionProviders::from_env()?;
        let settings = ReviewSettings::from_env()?;
        let this = Self::new(providers, settings)?;
        info!(
            providers = ?this.providers.providers(),
            ocr = this.ocr.as_ref().map(OcrClient::url).unwrap_or("disabled"),
            "reviewer ready"
        );
        Ok(this)
    }

    pub fn settings(&self) -> &ReviewSettings {
        &self.settings
    }

    pub fn providers(&self) -> &VisionProviders {
        &self.providers
    }

    pub async fn load_pages(&self, refs: &[String]) -> Vec<LoadedPage> {
        load_pages(&self.http, refs).await
    }

    /// Loads `refs` and analyzes them.
    ///
    /// # Errors
    /// [`ConfigurationError::NoImages`] for an empty reference list. Every
    /// other failure degrades instead of erroring.
    pub async fn analyze(&self, refs: &[String], language: &str) -> Result<AnalysisOutcome, ConfigurationError> {
        if refs.is_empty() {
            return Err(ConfigurationError::NoImages);
        }
        let pages = self.load_pages(refs).await;
        self.analyze_pages(&pages, language).await
    }

    /// Analyzes already loaded pages; see [`Self::analyze`].
    pub async fn analyze_pages(
        &self,
        pages: &[LoadedPage],
        language: &str,
    ) -> Result<AnalysisOutcome, ConfigurationError> {
        if pages.is_empty() {
            return Err(ConfigurationError::NoImages);
        }
        let started = Instant::now();
        let metas: Vec<PageMeta> = pages.iter().map(|p| p.meta).collect();
        let cache = PixelCache::from_images(pages.iter().map(|p| p.image.as_ref()));
        debug!(pages = metas.len(), decoded = pages.iter().filter(|p| p.image.is_some()).count(), "step1: pages ready");

        let outcome = match self.vision_review(pages, &metas, &cache, language).await {
            Ok(review) => AnalysisOutcome::Success(review),
            Err(e) => {
                warn!(error = %e, "vision analysis failed, degrading");
                self.degrade(pages, &metas, &cache, language).await
            }
        };

        let outcome = finalize(outcome, metas);
        let review = outcome.review();
        info!(
            bubbles = review.messages.len(),
            elo = review.elo,
            degraded = outcome.degraded_reason().map(DegradeReason::as_str).unwrap_or("no"),
            latency_ms = started.elapsed().as_millis() as u64,
            "analysis complete"
        );
        Ok(outcome)
    }

    async fn vision_review(
        &self,
        pages: &[LoadedPage],
        metas: &[PageMeta],
        cache: &PixelCache,
        language: &str,
    ) -> Result<Review, AnalysisError> {
        let sent: Vec<usize> = pages
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.input.as_ref().map(|_| i))
            .collect();
        if sent.is_empty() {
            return Err(AnalysisError::NoPageInput);
        }
        let sent_metas: Vec<PageMeta> = sent.iter().map(|&i| metas[i]).collect();
        let req = VisionRequest {
            system: build_system_prompt(language),
            prompt: build_user_prompt(&sent_metas),
            images: sent.iter().filter_map(|&i| pages[i].input.clone()).collect(),
        };
        let reply = self.providers.analyze(&req).await?;
        debug!(provider = %reply.provider, chars = reply.text.len(), "step2: vision reply received");

        let raw = extract_json(&reply.text).ok_or(AnalysisError::NoJson)?;
        let repaired = repair(raw);
        let mut review = validate(&Value::Object(repaired))?;
        debug!(messages = review.messages.len(), "step3: reply validated");

        let mut messages = std::mem::take(&mut review.messages);
        remap_image_indices(&mut messages, &sent);
        review.messages = normalize(messages, metas, cache);
        if review.messages.is_empty() {
            return Err(AnalysisError::NoBubbles);
        }
        debug!(bubbles = review.messages.len(), "step4: bubbles grouped");
        Ok(review)
    }

    async fn degrade(
        &self,
        pages: &[LoadedPage],
        metas: &[PageMeta],
        cache: &PixelCache,
        language: &str,
    ) -> AnalysisOutcome {
        if let Some(ocr) = &self.ocr {
            match ocr_review(ocr, pages, metas, cache, language).await {
                Ok(review) => {
                    return AnalysisOutcome::Degraded {
                        review,
                        reason: DegradeReason::OcrFallback,
                    };
                }
                Err(e) => warn!(error = %e, "ocr fallback failed"),
            }
        } else {
            debug!("ocr fallback unavailable");
        }
        AnalysisOutcome::Degraded {
            review: emergency_review(),
            reason: DegradeReason::Emergency,
        }
    }
}

/// Maps `image_index` from the request's image list back to page positions.
/// Out-of-range indices go to the last page sent.
fn remap_image_indices(dets: &mut [Detection], sent: &[usize]) {
    let Some(&last) = sent.last() else { return };
    for d in dets {
        d.image_index = sent.get(d.image_index as usize).copied().unwrap_or(last) as u32;
    }
}

/// Clamp, filter, resolve sides and group.
fn normalize(dets: Vec<Detection>, metas: &[PageMeta], cache: &PixelCache) -> Vec<Detection> {
    let mut dets = drop_noise(clamp_to_pages(dets, metas));
    resolve_sides(&mut dets, metas, cache);
    group_bubbles(dets)
}

fn finalize(outcome: AnalysisOutcome, metas: Vec<PageMeta>) -> AnalysisOutcome {
    let apply = |mut r: Review| {
        r.messages = clamp_to_pages(r.messages, &metas);
        r.refresh_derived();
        r.pages = metas.clone();
        r
    };
    match outcome {
        AnalysisOutcome::Success(r) => AnalysisOutcome::Success(apply(r)),
        AnalysisOutcome::Degraded { review, reason } => AnalysisOutcome::Degraded {
            review: apply(review),
            reason,
        },
    }
}

async fn ocr_review(
    ocr: &OcrClient,
    pages: &[LoadedPage],
    metas: &[PageMeta],
    cache: &PixelCache,
    language: &str,
) -> Result<Review, OcrError> {
    let mut dets = Vec::new();
    let mut attempted = 0usize;
    let mut failures = Vec::new();
    for (i, page) in pages.iter().enumerate() {
        let Some((mime, bytes)) = page.bytes() else {
            debug!(page = i, "no bytes for ocr, skipping page");
            continue;
        };
        attempted += 1;
        match ocr.recognize(mime, bytes, language).await {
            Ok(lines) => dets.extend(lines_to_detections(&lines, i as u32, page.meta, dets.len() as u32)),
            Err(e) => {
                warn!(page = i, error = %e, "ocr failed for page, skipping");
                failures.push(e);
            }
        }
    }
    if failures.len() == attempted {
        if let Some(e) = failures.pop() {
            return Err(e);
        }
    }
    debug!(lines = dets.len(), "ocr lines collected");

    let mut messages = normalize(dets, metas, cache);
    if messages.is_empty() {
        warn!("ocr found no readable text, using placeholder");
        messages.push(placeholder(OCR_PLACEHOLDER_TEXT, OCR_PLACEHOLDER_BBOX, OCR_PLACEHOLDER_CONFIDENCE));
    }
    Ok(Review {
        summary_line: OCR_SUMMARY.into(),
        elo: 0,
        ending: OCR_ENDING.into(),
        messages,
        counts: LabelCounts::default(),
        pages: Vec::new(),
    })
}

fn placeholder(text: &str, bbox: [f64; 4], confidence: f32) -> Detection {
    Detection {
        index: 0,
        side: Side::Unknown,
        text: text.into(),
        bbox: BBox::from(bbox),
        image_index: 0,
        label: Label::Interesting,
        confidence,
    }
}

/// Last-resort review: one neutral placeholder bubble.
pub fn emergency_review() -> Review {
    let messages = vec![placeholder(EMERGENCY_TEXT, EMERGENCY_BBOX, 0.3)];
    let mut review = Review {
        summary_line: EMERGENCY_SUMMARY.into(),
        elo: 0,
        ending: EMERGENCY_ENDING.into(),
        messages,
        counts: LabelCounts::default(),
        pages: Vec::new(),
    };
    review.refresh_derived();
    review
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::BASE_RATING;
    use vision_llm_service::{RetryPolicy, VisionModelConfig, VisionProvider};

    fn unreachable_providers() -> VisionProviders {
        let cfg = VisionModelConfig {
            provider: VisionProvider::OpenAI,
            model: "m".into(),
            endpoint: "http://127.0.0.1:9".into(),
            api_key: Some("k".into()),
            max_tokens: None,
            temperature: None,
            top_p: None,
            top_k: None,
            timeout_secs: Some(1),
        };
        VisionProviders::new(vec![cfg], RetryPolicy::default()).unwrap()
    }

    #[test]
    fn emergency_review_is_neutral() {
        let r = emergency_review();
        assert_eq!(r.messages.len(), 1);
        assert_eq!(r.elo, BASE_RATING as u32);
        assert_eq!(r.counts.get(Label::Interesting), 1);
        assert_eq!(r.ending, "Analysis incomplete");
        assert_eq!(r.messages[0].bbox, BBox::new(50.0, 100.0, 300.0, 50.0));
    }

    #[tokio::test]
    async fn empty_reference_list_is_a_configuration_error() {
        let ctx = ReviewerContext::new(unreachable_providers(), ReviewSettings::default()).unwrap();
        assert!(matches!(ctx.analyze(&[], "en").await, Err(ConfigurationError::NoImages)));
    }

    #[tokio::test]
    async fn unreachable_provider_degrades_to_emergency() {
        let ctx = ReviewerContext::new(unreachable_providers(), ReviewSettings::default()).unwrap();
        let out = ctx.analyze(&["/missing/page.png".to_string()], "en").await.unwrap();
        assert_eq!(out.degraded_reason(), Some(DegradeReason::Emergency));
        let r = out.review();
        assert_eq!(r.pages, vec![crate::model::DEFAULT_PAGE]);
        assert_eq!(r.counts.total(), 1);
        // 50 + 300 fits inside the 375 px default page.
        assert_eq!(r.messages[0].bbox, BBox::new(50.0, 100.0, 300.0, 50.0));
    }

    #[test]
    fn image_indices_map_back_to_sent_pages() {
        let mut dets = vec![emergency_review().messages.remove(0); 3];
        dets[1].image_index = 1;
        dets[2].image_index = 7;
        remap_image_indices(&mut dets, &[1, 3]);
        let pages: Vec<u32> = dets.iter().map(|d| d.image_index).collect();
        assert_eq!(pages, vec![1, 3, 3]);
    }

    #[test]
    fn finalize_recomputes_counts_and_rating() {
        let mut r = emergency_review();
        r.messages[0].label = Label::Brilliant;
        r.elo = 5;
        let out = finalize(AnalysisOutcome::Success(r), vec![PageMeta { width: 200, height: 120 }]);
        let r = out.review();
        assert_eq!(r.elo, 1260);
        assert_eq!(r.counts.get(Label::Brilliant), 1);
        assert_eq!(r.messages[0].bbox, BBox::new(50.0, 100.0, 150.0, 20.0));
    }
}
