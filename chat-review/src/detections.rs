//! Per-detection cleanup between validation and grouping.

use tracing::debug;

use crate::model::{Detection, PageMeta, Side};
use crate::render::edge::bubble_color;
use crate::render::pixel_cache::PixelCache;

pub const MIN_TEXT_CHARS: usize = 2;
pub const MIN_BOX_SIDE: f64 = 10.0;
/// HSV saturation above which a bubble counts as colored.
pub const SENDER_SATURATION: f64 = 0.25;

/// Clamps `image_index` to an existing page and the box into that page.
pub fn clamp_to_pages(dets: Vec<Detection>, pages: &[PageMeta]) -> Vec<Detection> {
    let Some(last) = pages.len().checked_sub(1) else {
        return dets;
    };
    dets.into_iter()
        .map(|mut d| {
            let page = (d.image_index as usize).min(last);
            d.image_index = page as u32;
            d.bbox = d.bbox.clamp_to(pages[page]);
            d
        })
        .collect()
}

/// Short text or a tiny box.
pub fn is_noise(d: &Detection) -> bool {
    d.text.trim().chars().count() < MIN_TEXT_CHARS || d.bbox.w < MIN_BOX_SIDE || d.bbox.h < MIN_BOX_SIDE
}

pub fn drop_noise(dets: Vec<Detection>) -> Vec<Detection> {
    let before = dets.len();
    let kept: Vec<Detection> = dets.into_iter().filter(|d| !is_noise(d)).collect();
    debug!(before, kept = kept.len(), "noise filtered");
    kept
}

fn saturation(c: [u8; 3]) -> f64 {
    let max = c.iter().copied().max().unwrap_or(0) as f64;
    let min = c.iter().copied().min().unwrap_or(0) as f64;
    if max == 0.0 { 0.0 } else { (max - min) / max }
}

/// Replaces `unknown` sides. With pixels, a saturated bubble fill is the
/// sender (own messages are tinted), a neutral one the receiver; without
/// pixels the bubble's center decides by page half. Explicit sides are kept.
pub fn resolve_sides(dets: &mut [Detection], pages: &[PageMeta], cache: &PixelCache) {
    for d in dets.iter_mut().filter(|d| d.side == Side::Unknown) {
        let page = d.image_index as usize;
        let side = match cache.page(page) {
            Some(px) => {
                if saturation(bubble_color(px, &d.bbox)) > SENDER_SATURATION {
                    Side::Sender
                } else {
                    Side::Receiver
                }
            }
            None => {
                let width = pages.get(page).map(|p| p.width).unwrap_or(0) as f64;
                if d.bbox.center_x() > width / 2.0 {
                    Side::Sender
                } else {
                    Side::Receiver
                }
            }
        };
        debug!(index = d.index, side = side.as_str(), "side resolved");
        d.side = side;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Label;
    use crate::model::BBox;
    use image::{Rgb, RgbImage};

    fn det(side: Side, text: &str, bbox: [f64; 4], image_index: u32) -> Detection {
        Detection {
            index: 0,
            side,
            text: text.into(),
            bbox: bbox.into(),
            image_index,
            label: Label::Interesting,
            confidence: 0.5,
        }
    }

    #[test]
    fn clamping_pins_page_and_box() {
        let pages = [PageMeta { width: 100, height: 200 }];
        let out = clamp_to_pages(vec![det(Side::Sender, "hey", [90.4, -5.0, 50.0, 300.0], 4)], &pages);
        assert_eq!(out[0].image_index, 0);
        assert_eq!(out[0].bbox, BBox::new(90.0, 0.0, 10.0, 200.0));
    }

    #[test]
    fn noise_rules() {
        assert!(is_noise(&det(Side::Sender, " a ", [0.0, 0.0, 50.0, 50.0], 0)));
        assert!(is_noise(&det(Side::Sender, "ok", [0.0, 0.0, 9.0, 50.0], 0)));
        assert!(is_noise(&det(Side::Sender, "ok", [0.0, 0.0, 50.0, 9.5], 0)));
        assert!(!is_noise(&det(Side::Sender, "ok", [0.0, 0.0, 10.0, 10.0], 0)));
        assert_eq!(drop_noise(vec![det(Side::Sender, "", [0.0, 0.0, 50.0, 50.0], 0)]).len(), 0);
    }

    #[test]
    fn unknown_side_from_position_without_pixels() {
        let pages = [PageMeta { width: 400, height: 800 }];
        let mut dets = vec![
            det(Side::Unknown, "right", [250.0, 10.0, 100.0, 30.0], 0),
            det(Side::Unknown, "left", [20.0, 60.0, 100.0, 30.0], 0),
            det(Side::Receiver, "kept", [250.0, 110.0, 100.0, 30.0], 0),
        ];
        resolve_sides(&mut dets, &pages, &PixelCache::default());
        assert_eq!(dets[0].side, Side::Sender);
        assert_eq!(dets[1].side, Side::Receiver);
        assert_eq!(dets[2].side, Side::Receiver);
    }

    #[test]
    fn unknown_side_from_bubble_tint() {
        let mut img = RgbImage::from_pixel(400, 200, Rgb([255, 255, 255]));
        for y in 20..60 {
            for x in 20..150 {
                img.put_pixel(x, y, Rgb([30, 130, 250]));
            }
        }
        for y in 100..140 {
            for x in 250..380 {
                img.put_pixel(x, y, Rgb([232, 232, 236]));
            }
        }
        let cache = PixelCache::from_images([Some(&img)]);
        let pages = [PageMeta { width: 400, height: 200 }];
        let mut dets = vec![
            det(Side::Unknown, "blue", [20.0, 20.0, 130.0, 40.0], 0),
            det(Side::Unknown, "gray", [250.0, 100.0, 130.0, 40.0], 0),
        ];
        resolve_sides(&mut dets, &pages, &cache);
        assert_eq!(dets[0].side, Side::Sender);
        assert_eq!(dets[1].side, Side::Receiver);
    }
}
