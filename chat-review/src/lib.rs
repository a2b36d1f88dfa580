//! Chat screenshot reviewer.
//!
//! Turns one or more chat screenshots into a [`Review`]: every message
//! bubble transcribed, labelled on a ten-step quality scale and located in
//! page pixels, plus a summary line, an ending and a derived rating. The
//! review can then be rendered as an annotated PNG with one badge per bubble.
//!
//! ```no_run
//! use std::sync::Arc;
//! use chat_review::{GlyphSet, ReviewerContext, render};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = Arc::new(ReviewerContext::from_env()?);
//! let pages = ctx.load_pages(&["shot.png".to_string()]).await;
//! let outcome = ctx.analyze_pages(&pages, "en").await?;
//! let png = render(outcome.review(), &pages, &GlyphSet::builtin())?.png;
//! # let _ = png;
//! # Ok(())
//! # }
//! ```
//!
//! The pipeline never fails on bad model output or unreachable providers;
//! it degrades through OCR lines to an emergency review and reports which
//! tier answered via [`AnalysisOutcome`].

pub mod detections;
pub mod errors;
pub mod grouping;
pub mod labels;
pub mod model;
pub mod ocr;
pub mod orchestrator;
pub mod pages;
pub mod parse;
pub mod prompt;
pub mod rating;
pub mod render;
pub mod repair;
pub mod schema;
pub mod settings;

pub use errors::{AnalysisError, ConfigurationError, OcrError, PageError, SchemaError, Violation};
pub use grouping::group_bubbles;
pub use labels::{Label, worse};
pub use model::{BBox, Detection, LabelCounts, PageMeta, Review, Side};
pub use orchestrator::{AnalysisOutcome, DegradeReason, ReviewerContext};
pub use pages::LoadedPage;
pub use rating::rating;
pub use render::{GlyphSet, RenderError, RenderedImage, render};
pub use settings::ReviewSettings;
