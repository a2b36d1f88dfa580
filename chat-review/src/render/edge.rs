//! Pixel edge locator: finds the true side boundary of a bubble.
//!
//! The bubble's fill color is estimated from a 3×3 interior grid. Up to
//! three horizontal scanlines then walk outward from just inside one side
//! edge, scoring each pixel by luma gradient plus distance from the fill
//! color. The strongest hit over all scanlines wins; a weak signal falls back
//! to the literal box edge.

use crate::model::BBox;
use crate::render::pixel_cache::{PagePixels, PixelCache};

/// Scores below this are treated as "no edge found".
pub const MIN_EDGE_SCORE: f64 = 10.0;
const DARK_LUMA: f64 = 60.0;

/// Which side of the box to scan and which way to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    /// Right edge, walking toward larger x.
    Increasing,
    /// Left edge, walking toward smaller x.
    Decreasing,
}

impl ScanDirection {
    fn step(self) -> i64 {
        match self {
            ScanDirection::Increasing => 1,
            ScanDirection::Decreasing => -1,
        }
    }
}

/// Located edge in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeHit {
    pub x: f64,
    pub y: f64,
    pub score: f64,
    /// `false` when the literal box edge was used.
    pub snapped: bool,
}

/// Rec. 709 luma, rounded.
pub fn luma(c: [u8; 3]) -> f64 {
    (0.2126 * c[0] as f64 + 0.7152 * c[1] as f64 + 0.0722 * c[2] as f64).round()
}

fn color_dist2(a: [u8; 3], b: [u8; 3]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum()
}

/// Interior grid sample points, row by row.
fn grid_points(bbox: &BBox) -> Vec<(i64, i64)> {
    let (bx, by) = (bbox.x.round() as i64, bbox.y.round() as i64);
    let (bw, bh) = (bbox.w.round() as i64, bbox.h.round() as i64);
    let inset = ((bw.min(bh) as f64 * 0.15).floor() as i64).min(6);
    let mut pts = Vec::with_capacity(9);
    for gy in 0..3 {
        for gx in 0..3 {
            let x = bx + inset + ((gx as f64 / 2.0) * (bw - 2 * inset) as f64).round() as i64;
            let y = by + inset + ((gy as f64 / 2.0) * (bh - 2 * inset) as f64).round() as i64;
            pts.push((x, y));
        }
    }
    pts
}

/// Representative fill color of the bubble: mean of the bright grid samples
/// when at least five survive, otherwise the luma-median of all nine.
pub fn bubble_color(px: &PagePixels, bbox: &BBox) -> [u8; 3] {
    let all: Vec<[u8; 3]> = grid_points(bbox)
        .into_iter()
        .map(|(x, y)| px.rgb_at(x, y))
        .collect();

    let bright: Vec<[u8; 3]> = all.iter().copied().filter(|c| luma(*c) >= DARK_LUMA).collect();
    if bright.len() >= 5 {
        let n = bright.len() as f64;
        let mean = |ch: usize| (bright.iter().map(|c| c[ch] as f64).sum::<f64>() / n).round() as u8;
        return [mean(0), mean(1), mean(2)];
    }

    let mut sorted = all;
    sorted.sort_by(|a, b| luma(*a).total_cmp(&luma(*b)));
    sorted[sorted.len() / 2]
}

/// Scanline y positions: center and ±25% of height, kept inside the box.
fn scanlines(bbox: &BBox) -> (i64, Vec<i64>) {
    let by = bbox.y.round() as i64;
    let bh = bbox.h.round() as i64;
    let mid = by + (bh as f64 / 2.0).round() as i64;
    let quarter = (bh as f64 * 0.25).round() as i64;
    let lines = [mid, mid - quarter, mid + quarter]
        .into_iter()
        .filter(|y| *y >= by + 2 && *y <= by + bh - 2)
        .collect();
    (mid, lines)
}

fn scan_line(
    px: &PagePixels,
    fill: [u8; 3],
    y: i64,
    bbox: &BBox,
    dir: ScanDirection,
) -> (i64, f64) {
    let (bx, bw) = (bbox.x.round() as i64, bbox.w.round() as i64);
    let bh = bbox.h.round() as i64;
    let pad = ((bw as f64 * 0.05).round() as i64).min(4);
    let range = ((bw.min(bh) as f64 * 0.8).floor() as i64).min(40);
    let step = dir.step();

    let (start, end) = match dir {
        ScanDirection::Decreasing => {
            let s = bx + pad;
            (s, (s - range).max(0))
        }
        ScanDirection::Increasing => {
            let s = bx + bw - pad;
            (s, (s + range).min(px.width as i64 - 1))
        }
    };

    let mut best = (start, 0.0f64);
    let mut x = start;
    while (step > 0 && x <= end) || (step < 0 && x >= end) {
        let grad = (luma(px.rgb_at(x + step, y)) - luma(px.rgb_at(x - step, y))).abs();
        let score = grad * 2.0 + color_dist2(px.rgb_at(x, y), fill).sqrt();
        if score > best.1 {
            best = (x, score);
        }
        x += step;
    }
    best
}

fn literal_edge(bbox: &BBox, dir: ScanDirection, mid: i64) -> EdgeHit {
    let x = match dir {
        ScanDirection::Increasing => bbox.right(),
        ScanDirection::Decreasing => bbox.x,
    };
    EdgeHit {
        x,
        y: mid as f64,
        score: 0.0,
        snapped: false,
    }
}

/// Locates the bubble edge on `direction`'s side. Never fails: missing
/// pixels or a weak signal yield the literal box edge at vertical center.
pub fn locate_edge(cache: &PixelCache, page: usize, bbox: &BBox, direction: ScanDirection) -> EdgeHit {
    let (mid, lines) = scanlines(bbox);
    let Some(px) = cache.page(page) else {
        return literal_edge(bbox, direction, mid);
    };

    let fill = bubble_color(px, bbox);
    let best = lines
        .into_iter()
        .map(|y| (y, scan_line(px, fill, y, bbox, direction)))
        .fold(None::<(i64, i64, f64)>, |acc, (y, (x, score))| match acc {
            Some((_, _, s)) if s >= score => acc,
            _ => Some((y, x, score)),
        });

    match best {
        Some((y, x, score)) if score >= MIN_EDGE_SCORE => EdgeHit {
            x: x as f64,
            y: y as f64,
            score,
            snapped: true,
        },
        _ => literal_edge(bbox, direction, mid),
    }
}
