use std::sync::Arc;

use chat_review::{ConfigurationError, GlyphSet, ReviewerContext};

/// Shared state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub reviewer: Arc<ReviewerContext>,
    /// Badge glyphs, validated once at startup.
    pub glyphs: Arc<GlyphSet>,
}

impl AppState {
    pub fn new(reviewer: ReviewerContext) -> Self {
        let glyphs = GlyphSet::load(reviewer.settings().badge_font_path.as_deref());
        Self {
            reviewer: Arc::new(reviewer),
            glyphs: Arc::new(glyphs),
        }
    }

    /// Builds the reviewer (providers, OCR, settings) from environment variables.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Ok(Self::new(ReviewerContext::from_env()?))
    }
}
