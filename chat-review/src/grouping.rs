//! Merges fragmentary line detections into message bubbles.
//!
//! Detections are partitioned by `(image_index, side)` and merged greedily
//! in reading order. Two boxes belong to the same bubble when they overlap
//! strongly, sit directly above one another, or are vertically close with a
//! large horizontal overlap. A partition is re-scanned until nothing merges,
//! since a union can reach boxes the first pass skipped. When the result is
//! still implausibly long, a coarser consolidation joins bubbles closer than
//! [`EMERGENCY_GAP`] pixels.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::labels::worse;
use crate::model::{BBox, Detection, Side};

pub const IOU_THRESHOLD: f64 = 0.4;
/// Above this many bubbles the emergency consolidation kicks in.
pub const EMERGENCY_THRESHOLD: usize = 12;
pub const EMERGENCY_GAP: f64 = 100.0;

/// Whether `b` belongs to the bubble whose box is `a`.
pub fn should_merge(a: &BBox, b: &BBox) -> bool {
    if a.iou(b) >= IOU_THRESHOLD {
        return true;
    }
    let min_w = a.w.min(b.w);
    if min_w <= 0.0 {
        return false;
    }
    let overlap = a.horizontal_overlap(b);
    let min_h = a.h.min(b.h);

    let adjacent = overlap >= 0.5 * min_w && a.vertical_gap(b) <= (0.15 * min_h).max(6.0);
    if adjacent {
        return true;
    }

    let avg_h = (a.h + b.h) / 2.0;
    let center_dist = (a.center_y() - b.center_y()).abs();
    overlap / min_w >= 0.6 && center_dist < (0.5 * avg_h).min(20.0)
}

/// Folds `d` into `into`: union box, newline-joined text, worse label,
/// max confidence, min index.
pub fn absorb(into: &mut Detection, d: Detection) {
    into.bbox = into.bbox.union(&d.bbox);
    into.text.push('\n');
    into.text.push_str(&d.text);
    into.label = worse(into.label, d.label);
    into.confidence = into.confidence.max(d.confidence);
    into.index = into.index.min(d.index);
}

fn by_position(a: &Detection, b: &Detection) -> Ordering {
    a.bbox
        .y
        .total_cmp(&b.bbox.y)
        .then(a.bbox.x.total_cmp(&b.bbox.x))
}

fn by_page_position(a: &Detection, b: &Detection) -> Ordering {
    a.image_index.cmp(&b.image_index).then_with(|| by_position(a, b))
}

/// One greedy pass; returns the bubbles and whether anything merged.
fn greedy_pass(items: Vec<Detection>) -> (Vec<Detection>, bool) {
    let mut out: Vec<Detection> = Vec::with_capacity(items.len());
    let mut merged = false;
    for d in items {
        match out.iter_mut().find(|g| should_merge(&g.bbox, &d.bbox)) {
            Some(g) => {
                absorb(g, d);
                merged = true;
            }
            None => out.push(d),
        }
    }
    (out, merged)
}

fn group_partition(mut items: Vec<Detection>) -> Vec<Detection> {
    loop {
        items.sort_by(by_position);
        let (next, merged) = greedy_pass(items);
        items = next;
        if !merged {
            return items;
        }
    }
}

fn partition(dets: Vec<Detection>) -> BTreeMap<(u32, Side), Vec<Detection>> {
    let mut parts: BTreeMap<(u32, Side), Vec<Detection>> = BTreeMap::new();
    for d in dets {
        parts.entry((d.image_index, d.side)).or_default().push(d);
    }
    parts
}

fn group_all(dets: Vec<Detection>) -> Vec<Detection> {
    partition(dets)
        .into_values()
        .flat_map(group_partition)
        .collect()
}

/// Coarse pass: within each `(page, side)`, join a bubble to the open group
/// when its top is at most [`EMERGENCY_GAP`] below the group's bottom.
fn consolidate(dets: Vec<Detection>) -> (Vec<Detection>, bool) {
    let mut out = Vec::new();
    let mut merged = false;
    for (_, mut items) in partition(dets) {
        items.sort_by(by_position);
        let mut open: Option<Detection> = None;
        for d in items {
            match open.as_mut() {
                Some(g) if d.bbox.y - g.bbox.bottom() <= EMERGENCY_GAP => {
                    absorb(g, d);
                    merged = true;
                }
                _ => {
                    if let Some(done) = open.replace(d) {
                        out.push(done);
                    }
                }
            }
        }
        out.extend(open);
    }
    (out, merged)
}

fn finish(mut dets: Vec<Detection>) -> Vec<Detection> {
    dets.sort_by(by_page_position);
    for (i, d) in dets.iter_mut().enumerate() {
        d.index = i as u32;
    }
    dets
}

/// Groups detections into bubbles, sorted by `(image_index, y, x)` and
/// re-indexed from 0. Never fails and never grows the input.
pub fn group_bubbles(dets: Vec<Detection>) -> Vec<Detection> {
    let input = dets.len();
    let mut bubbles = group_all(dets);
    debug!(input, bubbles = bubbles.len(), "bubble grouping pass");

    while bubbles.len() > EMERGENCY_THRESHOLD {
        let before = bubbles.len();
        let (next, merged) = consolidate(bubbles);
        bubbles = group_all(next);
        if !merged {
            break;
        }
        warn!(before, after = bubbles.len(), "emergency consolidation applied");
    }

    finish(bubbles)
}
