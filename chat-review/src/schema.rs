//! Structural validation of a (repaired) model reply into a [`Review`].
//!
//! Validation never stops at the first problem: every violation is
//! collected so a single log line explains why a reply was rejected.

use serde_json::Value;

use crate::errors::{SchemaError, Violation};
use crate::labels::Label;
use crate::model::{BBox, Detection, LabelCounts, Review, Side};

pub const MAX_TEXT_CHARS: usize = 2000;
pub const MAX_MESSAGES: usize = 300;

struct Collector(Vec<Violation>);

impl Collector {
    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(Violation::new(path, message));
    }
}

fn as_whole_u64(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| {
        v.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u32::MAX as f64)
            .map(|f| f as u64)
    })
}

fn bounded_string(
    c: &mut Collector,
    v: Option<&Value>,
    path: &str,
    min: usize,
    max: usize,
) -> String {
    match v {
        Some(Value::String(s)) => {
            let n = s.chars().count();
            if n < min || n > max {
                c.push(path, format!("length {n} outside {min}..={max}"));
            }
            s.clone()
        }
        Some(_) => {
            c.push(path, "must be a string");
            String::new()
        }
        None => {
            c.push(path, "is required");
            String::new()
        }
    }
}

fn validate_message(c: &mut Collector, i: usize, v: &Value) -> Option<Detection> {
    let p = |field: &str| format!("messages[{i}].{field}");
    let Some(m) = v.as_object() else {
        c.push(format!("messages[{i}]"), "must be an object");
        return None;
    };
    let before = c.0.len();

    let label = match m.get("label") {
        Some(Value::String(s)) => Label::parse_name(s).or_else(|| {
            c.push(p("label"), format!("unknown label `{s}`"));
            None
        }),
        _ => {
            c.push(p("label"), "must be one of the ten labels");
            None
        }
    };

    let bbox = match m.get("bbox") {
        Some(Value::Array(items)) if items.len() == 4 => {
            let nums: Vec<f64> = items
                .iter()
                .filter_map(Value::as_f64)
                .filter(|f| f.is_finite())
                .collect();
            if nums.len() == 4 {
                Some(BBox::new(nums[0], nums[1], nums[2], nums[3]))
            } else {
                c.push(p("bbox"), "must contain 4 finite numbers");
                None
            }
        }
        _ => {
            c.push(p("bbox"), "must be an array of exactly 4 numbers");
            None
        }
    };

    let side = m
        .get("side")
        .and_then(Value::as_str)
        .map(Side::parse_loose)
        .unwrap_or(Side::Unknown);

    let confidence = match m.get("confidence") {
        None | Some(Value::Null) => 0.7,
        Some(v) => match v.as_f64() {
            Some(f) if (0.0..=1.0).contains(&f) => f,
            _ => {
                c.push(p("confidence"), "must be a number in [0,1]");
                0.0
            }
        },
    };

    let index = match m.get("index") {
        Some(v) => as_whole_u64(v).unwrap_or_else(|| {
            c.push(p("index"), "must be a non-negative integer");
            0
        }),
        None => {
            c.push(p("index"), "is required");
            0
        }
    };

    let image_index = match m.get("image_index") {
        None | Some(Value::Null) => 0,
        Some(v) => as_whole_u64(v).unwrap_or_else(|| {
            c.push(p("image_index"), "must be a non-negative integer");
            0
        }),
    };

    let text = bounded_string(c, m.get("text"), &p("text"), 1, MAX_TEXT_CHARS);

    if c.0.len() != before {
        return None;
    }
    Some(Detection {
        index: index as u32,
        side,
        text,
        bbox: bbox?,
        image_index: image_index as u32,
        label: label?,
        confidence: confidence as f32,
    })
}

/// Validates a repaired reply.
///
/// `counts` is checked for shape only; the returned review always carries
/// the histogram of its messages. `pages` is left empty for the caller.
pub fn validate(value: &Value) -> Result<Review, SchemaError> {
    let mut c = Collector(Vec::new());
    let Some(root) = value.as_object() else {
        return Err(SchemaError {
            violations: vec![Violation::new("$", "must be an object")],
        });
    };

    let summary_line = bounded_string(&mut c, root.get("summary_line"), "summary_line", 3, 200);
    let ending = bounded_string(&mut c, root.get("ending"), "ending", 2, 40);

    let elo = match root.get("elo").and_then(as_whole_u64) {
        Some(e) if e <= 3500 => e as u32,
        _ => {
            c.push("elo", "must be an integer in 0..=3500");
            0
        }
    };

    let mut messages = Vec::new();
    match root.get("messages") {
        Some(Value::Array(items)) => {
            if items.is_empty() || items.len() > MAX_MESSAGES {
                c.push("messages", format!("must hold 1..={MAX_MESSAGES} entries, got {}", items.len()));
            }
            for (i, item) in items.iter().enumerate() {
                if let Some(d) = validate_message(&mut c, i, item) {
                    messages.push(d);
                }
            }
        }
        _ => c.push("messages", "must be an array"),
    }

    match root.get("counts") {
        None | Some(Value::Null) => {}
        Some(Value::Object(m)) => {
            for (k, v) in m {
                if !v.is_number() {
                    c.push(format!("counts.{k}"), "must be a number");
                }
            }
        }
        Some(_) => c.push("counts", "must be an object"),
    }

    if !c.0.is_empty() {
        return Err(SchemaError { violations: c.0 });
    }

    let counts = LabelCounts::from_messages(&messages);
    Ok(Review {
        summary_line,
        elo,
        ending,
        messages,
        counts,
        pages: Vec::new(),
    })
}
