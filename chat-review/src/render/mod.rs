//! Annotated rendering: stitched pages plus one quality badge per bubble.
//!
//! - [`composite`]: vertical stitching on a dark canvas
//! - [`pixel_cache`]: per-page RGB snapshots for sampling
//! - [`edge`]: pixel edge locator used to snap badges to bubble borders
//! - [`badges`]: placement, clamping and collision nudging
//! - [`glyphs`]: badge glyphs with font / vector / dot fallbacks

pub mod badges;
pub mod composite;
pub mod edge;
pub mod error;
pub mod glyphs;
pub mod pixel_cache;

use std::time::Instant;

use tracing::{debug, info, warn};

pub use badges::Badge;
pub use error::RenderError;
pub use glyphs::GlyphSet;

use crate::model::{PageMeta, Review};
use crate::pages::LoadedPage;
use crate::render::pixel_cache::PixelCache;

/// PNG output and where each badge ended up.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub badges: Vec<Badge>,
}

/// Renders `review` over `pages`.
///
/// # Errors
/// Only when no canvas can be produced, a page image disagrees with its
/// metadata, the badge count does not match the bubble count, or PNG
/// encoding fails. Glyph problems degrade silently to simpler marks.
pub fn render(review: &Review, pages: &[LoadedPage], glyphs: &GlyphSet) -> error::Result<RenderedImage> {
    let started = Instant::now();
    let metas: Vec<PageMeta> = pages.iter().map(|p| p.meta).collect();
    let images: Vec<_> = pages.iter().map(|p| p.image.as_ref()).collect();

    let mut canvas = composite::compose(&metas, &images)?;
    let (width, height) = (canvas.width(), canvas.height());
    debug!(width, height, pages = metas.len(), "step1: composite ready");

    let cache = PixelCache::from_composite(&canvas, &metas);
    let placed = badges::place_badges(&review.messages, &metas, &cache, (width, height));
    if placed.len() != review.messages.len() {
        return Err(RenderError::BadgeCountMismatch {
            bubbles: review.messages.len(),
            badges: placed.len(),
        });
    }
    debug!(badges = placed.len(), "step2: badges placed");

    let mut fallbacks = 0usize;
    for b in &placed {
        let style = glyphs.style(b.label);
        let (x, y, r) = (b.x as f32, b.y as f32, b.r as f32);
        if !glyphs::draw_disc(&mut canvas, x, y, r, style.color) {
            warn!(index = b.message_index, "badge disc could not be drawn");
        }
        if !glyphs.draw(&mut canvas, b.label, x, y + 1.0, r) {
            fallbacks += 1;
        }
    }
    if fallbacks > 0 {
        warn!(fallbacks, "some badge glyphs fell back to plain marks");
    }

    let png = canvas
        .encode_png()
        .map_err(|e| RenderError::Encode(e.to_string()))?;

    info!(
        bubbles = review.messages.len(),
        snapped = placed.iter().filter(|b| b.snapped).count(),
        bytes = png.len(),
        latency_ms = started.elapsed().as_millis() as u64,
        "annotated image rendered"
    );

    Ok(RenderedImage {
        png,
        width,
        height,
        badges: placed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Label;
    use crate::model::{Detection, LabelCounts, Side};
    use image::{Rgb, RgbImage};

    fn page() -> LoadedPage {
        let mut img = RgbImage::from_pixel(400, 300, Rgb([255, 255, 255]));
        for y in 100..160 {
            for x in 40..220 {
                img.put_pixel(x, y, Rgb([225, 225, 230]));
            }
        }
        LoadedPage::decoded(img)
    }

    fn review(messages: Vec<Detection>) -> Review {
        let counts = LabelCounts::from_messages(&messages);
        Review {
            summary_line: "fine".into(),
            elo: 1210,
            ending: "draw".into(),
            messages,
            counts,
            pages: vec![],
        }
    }

    #[test]
    fn renders_one_badge_per_bubble() {
        let r = review(vec![Detection {
            index: 0,
            side: Side::Receiver,
            text: "hello".into(),
            bbox: [40.0, 100.0, 170.0, 60.0].into(),
            image_index: 0,
            label: Label::Good,
            confidence: 0.9,
        }]);
        let out = render(&r, &[page()], &GlyphSet::builtin()).unwrap();
        assert_eq!(out.badges.len(), 1);
        assert_eq!((out.width, out.height), (400, 300));

        let b = &out.badges[0];
        // Edge snapped from the loose box edge (210) to the painted one.
        assert!(b.snapped);
        assert!(b.x > 210.0 + 20.0);

        let decoded = image::load_from_memory(&out.png).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (400, 300));
        let rim = decoded.get_pixel((b.x + b.r * 0.8) as u32, b.y as u32);
        assert_eq!(rim.0, [0x6B, 0x72, 0x80]);
    }

    #[test]
    fn badge_count_matches_bubbles_up_to_twelve() {
        let pages = [LoadedPage::decoded(RgbImage::from_pixel(400, 1000, Rgb([255, 255, 255])))];
        for n in 1..=12u32 {
            let messages = (0..n)
                .map(|i| Detection {
                    index: i,
                    side: if i % 2 == 0 { Side::Sender } else { Side::Receiver },
                    text: format!("message {i}"),
                    bbox: [if i % 2 == 0 { 200.0 } else { 20.0 }, 20.0 + i as f64 * 80.0, 170.0, 40.0].into(),
                    image_index: 0,
                    label: Label::ALL[i as usize % Label::ALL.len()],
                    confidence: 0.8,
                })
                .collect();
            let out = render(&review(messages), &pages, &GlyphSet::builtin()).unwrap();
            assert_eq!(out.badges.len(), n as usize);
            let indices: Vec<u32> = out.badges.iter().map(|b| b.message_index).collect();
            assert_eq!(indices, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn no_pages_is_an_error() {
        let r = review(vec![]);
        assert!(matches!(render(&r, &[], &GlyphSet::builtin()), Err(RenderError::NoPages)));
    }
}
