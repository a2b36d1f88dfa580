//! Derived conversation rating ("elo").

use serde_json::Value;

use crate::labels::Label;
use crate::model::LabelCounts;

pub const BASE_RATING: f64 = 1200.0;
pub const MAX_RATING: f64 = 3500.0;

/// `1200 + Σ weight × count`, clamped to `[0, 3500]` and rounded.
pub fn rating(counts: &LabelCounts) -> u32 {
    let sum: f64 = counts
        .iter()
        .map(|(label, n)| label.weight() as f64 * n as f64)
        .sum();
    finish(BASE_RATING + sum)
}

/// Rating from an untrusted counts object. Unknown keys and non-numeric
/// values contribute nothing; missing/null counts give the base rating.
pub fn rating_from_value(counts: Option<&Value>) -> u32 {
    let Some(Value::Object(map)) = counts else {
        return BASE_RATING as u32;
    };
    let sum: f64 = map
        .iter()
        .filter_map(|(k, v)| Some(Label::parse_name(k)?.weight() as f64 * v.as_f64()?))
        .sum();
    finish(BASE_RATING + sum)
}

fn finish(raw: f64) -> u32 {
    if raw.is_finite() {
        raw.clamp(0.0, MAX_RATING).round() as u32
    } else {
        BASE_RATING as u32
    }
}
