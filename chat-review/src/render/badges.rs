//! Badge placement: edge-snapped, clamped and nudged apart.

use tracing::debug;

use crate::labels::Label;
use crate::model::{Detection, PageMeta, Side, y_offsets};
use crate::render::edge::{ScanDirection, locate_edge};
use crate::render::pixel_cache::PixelCache;

/// Minimum gap between two badge rims.
pub const BADGE_SPACING: f64 = 6.0;
/// Vertical nudges tried from the original position, in order.
pub const NUDGES: [f64; 3] = [12.0, -24.0, 36.0];

/// One placed badge in composite coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub message_index: u32,
    pub label: Label,
    pub x: f64,
    pub y: f64,
    pub r: f64,
    /// Whether the pixel edge was found rather than the box edge used.
    pub snapped: bool,
}

impl Badge {
    fn collides(&self, x: f64, y: f64, r: f64) -> bool {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt() < self.r + r + BADGE_SPACING
    }
}

pub fn badge_radius(bubble_height: f64) -> f64 {
    (bubble_height / 3.0).round().clamp(18.0, 28.0)
}

pub fn badge_margin(r: f64) -> f64 {
    (r * 0.9).round().max(20.0)
}

/// Keeps a badge of radius `r` inside `[r+2, size-r-2]`; a too-small canvas
/// pins it to the low bound.
fn clamp_axis(v: f64, r: f64, size: f64) -> f64 {
    v.min(size - r - 2.0).max(r + 2.0)
}

/// Which bubble edge the badge hangs off.
///
/// Sender bubbles are right-aligned, so their free side is the left edge:
/// the scan starts just inside it and walks toward smaller x, and the badge
/// goes `margin` further left. Receiver and unknown bubbles mirror this on
/// the right edge, walking toward larger x.
fn direction_for(side: Side) -> ScanDirection {
    match side {
        Side::Sender => ScanDirection::Decreasing,
        Side::Receiver | Side::Unknown => ScanDirection::Increasing,
    }
}

/// Places one badge per message, in message order.
pub fn place_badges(
    messages: &[Detection],
    pages: &[PageMeta],
    cache: &PixelCache,
    canvas: (u32, u32),
) -> Vec<Badge> {
    let (cw, ch) = (canvas.0 as f64, canvas.1 as f64);
    let offsets = y_offsets(pages);
    let last_page = pages.len().saturating_sub(1);
    let mut placed: Vec<Badge> = Vec::with_capacity(messages.len());

    for m in messages {
        let page = (m.image_index as usize).min(last_page);
        let offset = offsets.get(page).copied().unwrap_or(0) as f64;
        let r = badge_radius(m.bbox.h);
        let margin = badge_margin(r);

        let direction = direction_for(m.side);
        let hit = locate_edge(cache, page, &m.bbox, direction);
        let x = match direction {
            ScanDirection::Decreasing => hit.x - margin,
            ScanDirection::Increasing => hit.x + margin,
        };
        let x = clamp_axis(x, r, cw);
        let original_y = clamp_axis(hit.y + offset, r, ch);

        let mut y = original_y;
        for nudge in NUDGES {
            if !placed.iter().any(|b| b.collides(x, y, r)) {
                break;
            }
            y = clamp_axis(original_y + nudge, r, ch);
        }

        debug!(
            index = m.index,
            side = m.side.as_str(),
            x,
            y,
            snapped = hit.snapped,
            "badge placed"
        );
        placed.push(Badge {
            message_index: m.index,
            label: m.label,
            x,
            y,
            r,
            snapped: hit.snapped,
        });
    }
    placed
}
