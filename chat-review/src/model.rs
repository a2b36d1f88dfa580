//! Core data model: detections/bubbles, pages and the review itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::labels::Label;

/// Metadata used when a page cannot be read.
pub const DEFAULT_PAGE: PageMeta = PageMeta {
    width: 375,
    height: 667,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Sender,
    Receiver,
    Unknown,
}

impl Side {
    /// Lenient parse; anything unrecognized is `Unknown`.
    pub fn parse_loose(s: &str) -> Side {
        match s.trim().to_ascii_lowercase().as_str() {
            "sender" | "me" | "right" | "self" => Side::Sender,
            "receiver" | "them" | "left" | "other" => Side::Receiver,
            _ => Side::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Sender => "sender",
            Side::Receiver => "receiver",
            Side::Unknown => "unknown",
        }
    }
}

/// Axis-aligned box `[x, y, w, h]` in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BBox {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn area(&self) -> f64 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.w / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.h / 2.0
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BBox) -> BBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        BBox {
            x,
            y,
            w: self.right().max(other.right()) - x,
            h: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Length of the horizontal overlap (0 when disjoint).
    pub fn horizontal_overlap(&self, other: &BBox) -> f64 {
        (self.right().min(other.right()) - self.x.max(other.x)).max(0.0)
    }

    /// Vertical distance between the boxes; 0 when they overlap vertically.
    pub fn vertical_gap(&self, other: &BBox) -> f64 {
        (self.y.max(other.y) - self.bottom().min(other.bottom())).max(0.0)
    }

    /// Intersection over union; 0 for degenerate boxes.
    pub fn iou(&self, other: &BBox) -> f64 {
        let ix = self.horizontal_overlap(other);
        let iy = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    /// Clamps into `[0,width]×[0,height]`, one coordinate after another,
    /// and rounds to whole pixels.
    pub fn clamp_to(&self, page: PageMeta) -> BBox {
        let (pw, ph) = (page.width as f64, page.height as f64);
        let x = self.x.min(pw).max(0.0).round();
        let y = self.y.min(ph).max(0.0).round();
        let w = self.w.min(pw - x).max(0.0).round();
        let h = self.h.min(ph - y).max(0.0).round();
        BBox { x, y, w, h }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.x, self.y, self.w, self.h]
    }
}

impl From<[f64; 4]> for BBox {
    fn from(a: [f64; 4]) -> Self {
        BBox::new(a[0], a[1], a[2], a[3])
    }
}

impl Serialize for BBox {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(s)
    }
}

impl<'de> Deserialize<'de> for BBox {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        <[f64; 4]>::deserialize(d).map(BBox::from)
    }
}

/// One transcribed message region. After grouping the same type represents
/// a bubble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub index: u32,
    pub side: Side,
    pub text: String,
    pub bbox: BBox,
    #[serde(default)]
    pub image_index: u32,
    pub label: Label,
    pub confidence: f32,
}

/// Page size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub width: u32,
    pub height: u32,
}

/// Vertical offset of each page in the stitched composite.
pub fn y_offsets(pages: &[PageMeta]) -> Vec<u32> {
    pages
        .iter()
        .scan(0u32, |acc, p| {
            let off = *acc;
            *acc += p.height;
            Some(off)
        })
        .collect()
}

/// Histogram of labels over a set of messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelCounts(pub BTreeMap<Label, u32>);

impl LabelCounts {
    pub fn from_messages(messages: &[Detection]) -> Self {
        let mut map = BTreeMap::new();
        for m in messages {
            *map.entry(m.label).or_insert(0) += 1;
        }
        LabelCounts(map)
    }

    pub fn get(&self, label: Label) -> u32 {
        self.0.get(&label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Label, u32)> + '_ {
        self.0.iter().map(|(l, c)| (*l, *c))
    }
}

impl FromIterator<(Label, u32)> for LabelCounts {
    fn from_iter<I: IntoIterator<Item = (Label, u32)>>(iter: I) -> Self {
        LabelCounts(iter.into_iter().collect())
    }
}

/// A complete analysis of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub summary_line: String,
    pub elo: u32,
    pub ending: String,
    pub messages: Vec<Detection>,
    pub counts: LabelCounts,
    #[serde(default)]
    pub pages: Vec<PageMeta>,
}

impl Review {
    /// Rebuilds `counts` from `messages` and `elo` from the counts.
    pub fn refresh_derived(&mut self) {
        self.counts = LabelCounts::from_messages(&self.messages);
        self.elo = crate::rating::rating(&self.counts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_serializes_as_array() {
        let b = BBox::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(serde_json::to_value(b).unwrap(), serde_json::json!([1.0, 2.0, 3.0, 4.0]));
        let back: BBox = serde_json::from_value(serde_json::json!([5, 6, 7, 8])).unwrap();
        assert_eq!(back, BBox::new(5.0, 6.0, 7.0, 8.0));
    }

    #[test]
    fn clamp_keeps_box_inside_page() {
        let page = PageMeta { width: 400, height: 800 };
        let b = BBox::new(-10.4, 790.2, 500.0, 40.0).clamp_to(page);
        assert_eq!(b, BBox::new(0.0, 790.0, 400.0, 10.0));
        let far = BBox::new(900.0, 900.0, 50.0, 50.0).clamp_to(page);
        assert_eq!(far, BBox::new(400.0, 800.0, 0.0, 0.0));
    }

    #[test]
    fn iou_and_gap() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-9);
        let c = BBox::new(0.0, 14.0, 10.0, 10.0);
        assert_eq!(a.vertical_gap(&c), 4.0);
        assert_eq!(a.vertical_gap(&b), 0.0);
    }

    #[test]
    fn offsets_accumulate_heights() {
        let pages = [
            PageMeta { width: 10, height: 100 },
            PageMeta { width: 20, height: 50 },
            PageMeta { width: 5, height: 7 },
        ];
        assert_eq!(y_offsets(&pages), vec![0, 100, 150]);
    }

    #[test]
    fn counts_histogram() {
        let d = |label| Detection {
            index: 0,
            side: Side::Sender,
            text: "hi".into(),
            bbox: BBox::default(),
            image_index: 0,
            label,
            confidence: 0.5,
        };
        let c = LabelCounts::from_messages(&[d(Label::Good), d(Label::Good), d(Label::Blunder)]);
        assert_eq!(c.get(Label::Good), 2);
        assert_eq!(c.get(Label::Blunder), 1);
        assert_eq!(c.total(), 3);
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["good"], 2);
    }

    #[test]
    fn side_parse_is_lenient() {
        assert_eq!(Side::parse_loose(" Sender "), Side::Sender);
        assert_eq!(Side::parse_loose("left"), Side::Receiver);
        assert_eq!(Side::parse_loose("??"), Side::Unknown);
    }
}
