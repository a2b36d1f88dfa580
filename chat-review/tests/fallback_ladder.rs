//! End-to-end analysis against local mock vision and OCR endpoints.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use chat_review::model::{DEFAULT_PAGE, y_offsets};
use chat_review::{
    DegradeReason, GlyphSet, Label, PageMeta, ReviewSettings, ReviewerContext, Side, render,
};
use image::{Rgb, RgbImage};
use serde_json::{Value, json};
use vision_llm_service::image_input::to_data_url;
use vision_llm_service::{RetryPolicy, VisionModelConfig, VisionProvider, VisionProviders};

#[derive(Clone)]
struct Canned {
    status: StatusCode,
    body: Value,
    hits: Arc<AtomicUsize>,
}

async fn reply(State(c): State<Canned>) -> (StatusCode, Json<Value>) {
    c.hits.fetch_add(1, Ordering::SeqCst);
    (c.status, Json(c.body.clone()))
}

/// Serves `body` with `status` on `POST path`; returns base URL and hit counter.
async fn spawn_mock(path: &str, status: u16, body: Value) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = Canned {
        status: StatusCode::from_u16(status).unwrap(),
        body,
        hits: hits.clone(),
    };
    let app = Router::new().route(path, post(reply)).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), hits)
}

#[derive(Clone)]
struct Recorder {
    content: String,
    seen: Arc<Mutex<Vec<Value>>>,
}

async fn record(State(r): State<Recorder>, Json(body): Json<Value>) -> Json<Value> {
    if let Ok(mut seen) = r.seen.lock() {
        seen.push(body);
    }
    Json(json!({"choices": [{"message": {"role": "assistant", "content": r.content}}]}))
}

/// Vision mock answering `content` and keeping every request body.
async fn spawn_recording_vision(content: &str) -> (String, Arc<Mutex<Vec<Value>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let state = Recorder {
        content: content.to_string(),
        seen: seen.clone(),
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(record))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

/// OCR mock failing the first request with 502 and answering `body` after.
async fn spawn_flaky_ocr(body: Value) -> (String, Arc<AtomicUsize>) {
    async fn flaky(State(c): State<Canned>) -> (StatusCode, Json<Value>) {
        if c.hits.fetch_add(1, Ordering::SeqCst) == 0 {
            (StatusCode::BAD_GATEWAY, Json(json!({})))
        } else {
            (c.status, Json(c.body.clone()))
        }
    }
    let hits = Arc::new(AtomicUsize::new(0));
    let state = Canned {
        status: StatusCode::OK,
        body,
        hits: hits.clone(),
    };
    let app = Router::new().route("/ocr", post(flaky)).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/ocr"), hits)
}

async fn spawn_vision(status: u16, content: &str) -> (String, Arc<AtomicUsize>) {
    let body = if status == 200 {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
    } else {
        json!({"error": {"message": "upstream unavailable"}})
    };
    spawn_mock("/v1/chat/completions", status, body).await
}

fn openai(endpoint: &str) -> VisionModelConfig {
    VisionModelConfig {
        provider: VisionProvider::OpenAI,
        model: "gpt-4o-mini".into(),
        endpoint: endpoint.into(),
        api_key: Some("test-key".into()),
        max_tokens: Some(1500),
        temperature: Some(0.2),
        top_p: None,
        top_k: None,
        timeout_secs: Some(5),
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        retries: 2,
        base_delay: Duration::from_millis(5),
    }
}

fn context(endpoints: &[&str], ocr_url: Option<String>) -> ReviewerContext {
    let providers = VisionProviders::new(endpoints.iter().map(|e| openai(e)).collect(), fast_retry()).unwrap();
    let settings = ReviewSettings {
        ocr_url,
        ..ReviewSettings::default()
    };
    ReviewerContext::new(providers, settings).unwrap()
}

/// White 400x300 screenshot as a data URL.
fn screenshot() -> String {
    screenshot_sized(400, 300)
}

fn screenshot_sized(width: u32, height: u32) -> String {
    let img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    to_data_url("image/png", &png)
}

const LEGACY_REPLY: &str = r#"Here is the review:
```json
{
  "summary": "Bold opener, shaky finish.",
  "ending": "draw",
  "counts_per_label": {"good": 9},
  "overall_elo": 2900,
  "bubbles": [
    {"index": 0, "side": "sender", "text": "hey are you free", "box": [250, 40, 120, 30], "quality": "good", "confidence": 0.9},
    {"index": 1, "side": "sender", "text": "tonight?", "box": [250, 74, 110, 26], "quality": " Brilliant "},
    {"index": 2, "side": "receiver", "text": "maybe", "box": [20, 150, 100, 30], "quality": "blunder", "confidence": 0.8},
    {"index": 3, "side": "receiver", "text": ".", "box": [20, 200, 5, 5], "quality": "great"}
  ]
}
```"#;

#[tokio::test]
async fn legacy_fenced_reply_is_repaired_grouped_and_rendered() {
    let (url, hits) = spawn_vision(200, LEGACY_REPLY).await;
    let ctx = context(&[&url], None);

    let pages = ctx.load_pages(&[screenshot()]).await;
    let outcome = ctx.analyze_pages(&pages, "en").await.unwrap();
    assert_eq!(outcome.degraded_reason(), None);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let r = outcome.review();
    assert_eq!(r.summary_line, "Bold opener, shaky finish.");
    assert_eq!(r.pages, vec![PageMeta { width: 400, height: 300 }]);
    assert_eq!(r.messages.len(), 2);

    let first = &r.messages[0];
    assert_eq!(first.index, 0);
    assert_eq!(first.side, Side::Sender);
    assert_eq!(first.text, "hey are you free\ntonight?");
    assert_eq!(first.bbox.to_array(), [250.0, 40.0, 120.0, 60.0]);
    assert_eq!(first.label, Label::Good);

    assert_eq!(r.messages[1].label, Label::Blunder);
    assert_eq!(r.counts.total(), 2);
    assert_eq!(r.elo, 1200 + 10 - 60);

    let out = render(r, &pages, &GlyphSet::builtin()).unwrap();
    assert_eq!(out.badges.len(), 2);
    assert_eq!((out.width, out.height), (400, 300));
    assert!(out.png.starts_with(&[0x89, b'P', b'N', b'G']));
}

#[tokio::test]
async fn server_errors_everywhere_yield_emergency_review() {
    let (url, hits) = spawn_vision(500, "").await;
    let ctx = context(&[&url], None);

    let outcome = ctx.analyze(&[screenshot()], "en").await.unwrap();
    assert_eq!(outcome.degraded_reason(), Some(DegradeReason::Emergency));
    // First attempt plus two retries.
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    let r = outcome.review();
    assert_eq!(r.messages.len(), 1);
    assert_eq!(r.elo, 1200);
    assert_eq!(r.ending, "Analysis incomplete");
    assert_eq!(r.counts.get(Label::Interesting), 1);
}

#[tokio::test]
async fn fallback_tier_answers_after_preferred_fails() {
    let (bad, bad_hits) = spawn_vision(503, "").await;
    let (good, good_hits) = spawn_vision(
        200,
        r#"{"summary_line": "Solid.", "elo": 1210, "ending": "win",
            "messages": [{"index": 0, "side": "receiver", "text": "hello there", "bbox": [10, 10, 150, 40], "label": "good"}]}"#,
    )
    .await;
    let ctx = context(&[&bad, &good], None);

    let outcome = ctx.analyze(&[screenshot()], "en").await.unwrap();
    assert_eq!(outcome.degraded_reason(), None);
    assert_eq!(bad_hits.load(Ordering::SeqCst), 3);
    assert_eq!(good_hits.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.review().elo, 1210);
}

#[tokio::test]
async fn unparseable_reply_is_not_retried_and_degrades() {
    let (url, hits) = spawn_vision(200, "Sorry, I can't help with that.").await;
    let ctx = context(&[&url], None);

    let outcome = ctx.analyze(&[screenshot()], "en").await.unwrap();
    assert_eq!(outcome.degraded_reason(), Some(DegradeReason::Emergency));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn ocr_lines_replace_a_failed_vision_call() {
    let (vision, _) = spawn_vision(500, "").await;
    let (ocr, ocr_hits) = spawn_mock(
        "/ocr",
        200,
        json!({"lines": [
            {"text": "hey there", "x0": 250, "y0": 40, "x1": 370, "y1": 70},
            {"text": "tonight?", "x0": 250, "y0": 74, "x1": 360, "y1": 100},
            {"text": "  ", "x0": 20, "y0": 120, "x1": 60, "y1": 140},
            {"text": "sure", "x0": 20, "y0": 150, "x1": 120, "y1": 180}
        ]}),
    )
    .await;
    let ctx = context(&[&vision], Some(format!("{ocr}/ocr")));

    let outcome = ctx.analyze(&[screenshot()], "en").await.unwrap();
    assert_eq!(outcome.degraded_reason(), Some(DegradeReason::OcrFallback));
    assert_eq!(ocr_hits.load(Ordering::SeqCst), 1);

    let r = outcome.review();
    assert_eq!(r.summary_line, "OCR fallback used; text recognition was challenging.");
    assert_eq!(r.ending, "draw");
    assert_eq!(r.messages.len(), 2);
    assert_eq!(r.messages[0].side, Side::Sender);
    assert_eq!(r.messages[0].text, "hey there\ntonight?");
    assert_eq!(r.messages[1].side, Side::Receiver);
    assert!(r.messages.iter().all(|m| m.label == Label::Interesting));
    assert_eq!(r.elo, 1200);
}

#[tokio::test]
async fn ocr_without_text_yields_placeholder() {
    let (vision, _) = spawn_vision(500, "").await;
    let (ocr, _) = spawn_mock("/ocr", 200, json!({"lines": []})).await;
    let ctx = context(&[&vision], Some(format!("{ocr}/ocr")));

    let outcome = ctx.analyze(&[screenshot()], "en").await.unwrap();
    assert_eq!(outcome.degraded_reason(), Some(DegradeReason::OcrFallback));
    let r = outcome.review();
    assert_eq!(r.messages.len(), 1);
    assert_eq!(r.messages[0].text, "Chat content could not be read clearly");
    assert_eq!(r.messages[0].bbox.to_array(), [50.0, 100.0, 200.0, 50.0]);
}

#[tokio::test]
async fn failing_or_disabled_ocr_falls_through_to_emergency() {
    let (vision, _) = spawn_vision(500, "").await;
    let (ocr, ocr_hits) = spawn_mock("/ocr", 502, json!({})).await;

    let ctx = context(&[&vision], Some(format!("{ocr}/ocr")));
    let outcome = ctx.analyze(&[screenshot()], "en").await.unwrap();
    assert_eq!(outcome.degraded_reason(), Some(DegradeReason::Emergency));
    assert_eq!(ocr_hits.load(Ordering::SeqCst), 1);

    let providers = VisionProviders::new(vec![openai(&vision)], fast_retry()).unwrap();
    let settings = ReviewSettings {
        ocr_fallback: false,
        ocr_url: Some(format!("{ocr}/ocr")),
        ..ReviewSettings::default()
    };
    let ctx = ReviewerContext::new(providers, settings).unwrap();
    let outcome = ctx.analyze(&[screenshot()], "en").await.unwrap();
    assert_eq!(outcome.degraded_reason(), Some(DegradeReason::Emergency));
    assert_eq!(ocr_hits.load(Ordering::SeqCst), 1);
}

const SINGLE_BUBBLE_REPLY: &str = r#"{"summary_line": "Short.", "elo": 1210, "ending": "win",
    "messages": [{"index": 0, "side": "receiver", "text": "hello there", "bbox": [20, 40, 150, 40],
                  "image_index": 0, "label": "good"}]}"#;

#[tokio::test]
async fn unreadable_leading_page_keeps_bubbles_on_the_right_page() {
    let (url, seen) = spawn_recording_vision(SINGLE_BUBBLE_REPLY).await;
    let ctx = context(&[&url], None);

    let refs = ["/missing/page.png".to_string(), screenshot()];
    let outcome = ctx.analyze(&refs, "en").await.unwrap();
    assert_eq!(outcome.degraded_reason(), None);

    let r = outcome.review();
    assert_eq!(r.pages, vec![DEFAULT_PAGE, PageMeta { width: 400, height: 300 }]);
    assert_eq!(r.messages.len(), 1);
    // The model saw one image, so its index 0 is the second page.
    assert_eq!(r.messages[0].image_index, 1);
    assert_eq!(r.messages[0].bbox.to_array(), [20.0, 40.0, 150.0, 40.0]);

    let bodies = seen.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    let sent = bodies[0].to_string();
    assert_eq!(sent.matches(r#""type":"image_url""#).count(), 1);
    assert!(sent.contains("image_index 0: 400x300 px"));
    assert!(!sent.contains("image_index 1:"));
}

#[tokio::test]
async fn no_sendable_page_skips_the_vision_call() {
    let (url, seen) = spawn_recording_vision(SINGLE_BUBBLE_REPLY).await;
    let ctx = context(&[&url], None);

    let refs = ["/missing/a.png".to_string(), "/missing/b.png".to_string()];
    let outcome = ctx.analyze(&refs, "en").await.unwrap();
    assert_eq!(outcome.degraded_reason(), Some(DegradeReason::Emergency));
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(outcome.review().pages, vec![DEFAULT_PAGE, DEFAULT_PAGE]);
}

#[tokio::test]
async fn multi_page_review_stays_inside_each_page_and_stitches() {
    let (url, _) = spawn_recording_vision(
        r#"{"summary_line": "Two pages.", "elo": 1200, "ending": "draw",
            "messages": [
              {"index": 0, "side": "receiver", "text": "first page", "bbox": [20, 40, 150, 40], "image_index": 0, "label": "good"},
              {"index": 1, "side": "sender", "text": "second page", "bbox": [200, 150, 300, 80], "image_index": 1, "label": "mistake"}
            ]}"#,
    )
    .await;
    let ctx = context(&[&url], None);

    let pages = ctx.load_pages(&[screenshot(), screenshot_sized(400, 200)]).await;
    let outcome = ctx.analyze_pages(&pages, "en").await.unwrap();
    assert_eq!(outcome.degraded_reason(), None);

    let r = outcome.review();
    assert_eq!(r.pages, vec![PageMeta { width: 400, height: 300 }, PageMeta { width: 400, height: 200 }]);
    assert_eq!(r.messages.len(), 2);
    for m in &r.messages {
        let page = r.pages[m.image_index as usize];
        assert!(m.bbox.x >= 0.0 && m.bbox.y >= 0.0);
        assert!(m.bbox.right() <= page.width as f64, "{:?} overflows {:?}", m.bbox, page);
        assert!(m.bbox.bottom() <= page.height as f64, "{:?} overflows {:?}", m.bbox, page);
    }
    assert_eq!(r.messages[1].image_index, 1);
    assert_eq!(r.messages[1].bbox.to_array(), [200.0, 150.0, 200.0, 50.0]);

    assert_eq!(y_offsets(&r.pages), vec![0, 300]);
    let out = render(r, &pages, &GlyphSet::builtin()).unwrap();
    assert_eq!((out.width, out.height), (400, 500));
    assert_eq!(out.badges.len(), 2);
    assert!(out.badges[0].y < 300.0);
    // Midline of the clamped second-page bubble, shifted by the first page.
    assert_eq!(out.badges[1].y, 300.0 + 175.0);
}

#[tokio::test]
async fn ocr_failure_on_one_page_keeps_the_others() {
    let (vision, _) = spawn_vision(500, "").await;
    let (ocr, hits) = spawn_flaky_ocr(json!({"lines": [
        {"text": "still readable", "x0": 20, "y0": 40, "x1": 180, "y1": 80}
    ]}))
    .await;
    let ctx = context(&[&vision], Some(ocr));

    let outcome = ctx.analyze(&[screenshot(), screenshot()], "en").await.unwrap();
    assert_eq!(outcome.degraded_reason(), Some(DegradeReason::OcrFallback));
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    let r = outcome.review();
    assert_eq!(r.messages.len(), 1);
    assert_eq!(r.messages[0].text, "still readable");
    assert_eq!(r.messages[0].image_index, 1);
}
