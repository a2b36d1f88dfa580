//! Field-mapping repair for raw model replies.
//!
//! Models answer in several dialects (nested envelopes, renamed fields,
//! missing values). Before validation the reply runs through [`RULES`], an
//! ordered list of pure rewrites. Every rule reports what it changed so the
//! decisions show up in the logs.

use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::rating::rating_from_value;

pub type JsonMap = Map<String, Value>;

/// One named rewrite step.
pub struct RepairRule {
    pub name: &'static str,
    pub apply: fn(JsonMap) -> (JsonMap, Vec<String>),
}

pub const DEFAULT_ENDING: &str = "Analysis complete";
pub const DEFAULT_SUMMARY: &str = "Chat analysis completed successfully.";
pub const DEFAULT_CONFIDENCE: f64 = 0.7;
pub const DEFAULT_BBOX: [f64; 4] = [0.0, 0.0, 100.0, 50.0];

/// Rules in application order.
pub const RULES: [RepairRule; 7] = [
    RepairRule { name: "lift_nested_review", apply: lift_nested_review },
    RepairRule { name: "rename_legacy_fields", apply: rename_legacy_fields },
    RepairRule { name: "sanitize_messages", apply: sanitize_messages },
    RepairRule { name: "synthesize_counts", apply: synthesize_counts },
    RepairRule { name: "synthesize_elo", apply: synthesize_elo },
    RepairRule { name: "clamp_ending", apply: clamp_ending },
    RepairRule { name: "ensure_summary", apply: ensure_summary },
];

/// Runs every rule in order and logs the decisions.
pub fn repair(mut map: JsonMap) -> JsonMap {
    let mut total = 0usize;
    for rule in &RULES {
        let (next, notes) = (rule.apply)(map);
        map = next;
        for note in &notes {
            debug!(rule = rule.name, "{note}");
        }
        total += notes.len();
    }
    if total > 0 {
        info!(changes = total, "model reply repaired");
    }
    map
}

/* ------------------------------------------------------------------------- */
/* Rules                                                                     */
/* ------------------------------------------------------------------------- */

const ENVELOPES: [&str; 3] = ["review", "analysis", "result"];

fn lift_nested_review(mut map: JsonMap) -> (JsonMap, Vec<String>) {
    let mut notes = Vec::new();

    // Legacy two-part layout: conversation.messages + analysis.moves.
    let legacy_messages = map
        .get("conversation")
        .and_then(|c| c.get("messages"))
        .and_then(Value::as_array)
        .cloned();
    if let (false, Some(mut messages)) = (map.contains_key("messages"), legacy_messages) {
        let analysis = map.remove("analysis").and_then(|v| match v {
            Value::Object(m) => Some(m),
            _ => None,
        });
        if let Some(moves) = analysis.as_ref().and_then(|a| a.get("moves")).and_then(Value::as_array) {
            join_moves(&mut messages, moves);
            notes.push(format!("joined {} move(s) onto conversation messages", moves.len()));
        }
        if let Some(a) = analysis {
            for (k, v) in a {
                if k != "moves" && !map.contains_key(&k) {
                    map.insert(k, v);
                }
            }
        }
        map.remove("conversation");
        map.insert("messages".into(), Value::Array(messages));
        notes.push("lifted conversation.messages".into());
        return (map, notes);
    }

    if map.contains_key("messages") || map.contains_key("bubbles") {
        return (map, notes);
    }

    for key in ENVELOPES {
        let holds_review = map
            .get(key)
            .and_then(Value::as_object)
            .is_some_and(|inner| inner.contains_key("messages") || inner.contains_key("bubbles"));
        if !holds_review {
            continue;
        }
        if let Some(Value::Object(inner)) = map.remove(key) {
            let outer = std::mem::replace(&mut map, inner);
            for (k, v) in outer {
                map.entry(k).or_insert(v);
            }
            notes.push(format!("lifted review out of `{key}` envelope"));
        }
        break;
    }
    (map, notes)
}

/// Copies `label`/`confidence` from moves onto messages with the same index
/// (falling back to position when a move has no index).
fn join_moves(messages: &mut [Value], moves: &[Value]) {
    for (pos, mv) in moves.iter().enumerate() {
        let idx = mv.get("index").and_then(Value::as_u64).unwrap_or(pos as u64);
        let target = messages.iter_mut().enumerate().find(|(i, m)| {
            m.get("index")
                .and_then(Value::as_u64)
                .unwrap_or(*i as u64)
                == idx
        });
        if let Some((_, Value::Object(msg))) = target {
            for field in ["label", "confidence"] {
                if let Some(v) = mv.get(field) {
                    msg.entry(field).or_insert_with(|| v.clone());
                }
            }
        }
    }
}

fn rename_key(map: &mut JsonMap, from: &str, to: &str) -> Option<String> {
    let v = map.remove(from)?;
    if map.contains_key(to) {
        Some(format!("dropped `{from}` (kept existing `{to}`)"))
    } else {
        map.insert(to.to_string(), v);
        Some(format!("renamed `{from}` to `{to}`"))
    }
}

fn rename_legacy_fields(mut map: JsonMap) -> (JsonMap, Vec<String>) {
    let mut notes = Vec::new();
    for (from, to) in [
        ("counts_per_label", "counts"),
        ("summary", "summary_line"),
        ("bubbles", "messages"),
    ] {
        notes.extend(rename_key(&mut map, from, to));
    }
    for legacy in ["overall_elo", "elo_estimate"] {
        if map.remove(legacy).is_some() {
            notes.push(format!("dropped `{legacy}` in favor of computed rating"));
        }
    }

    if let Some(Value::Array(messages)) = map.get_mut("messages") {
        let mut renamed = 0usize;
        for msg in messages.iter_mut().filter_map(Value::as_object_mut) {
            for (from, to) in [
                ("quality", "label"),
                ("box", "bbox"),
                ("bounding_box", "bbox"),
                ("page", "image_index"),
            ] {
                if rename_key(msg, from, to).is_some() {
                    renamed += 1;
                }
            }
        }
        if renamed > 0 {
            notes.push(format!("renamed {renamed} legacy message field(s)"));
        }
    }
    (map, notes)
}

fn number_like(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn sanitize_messages(mut map: JsonMap) -> (JsonMap, Vec<String>) {
    let mut notes = Vec::new();
    let Some(Value::Array(messages)) = map.get_mut("messages") else {
        return (map, notes);
    };

    for (i, msg) in messages.iter_mut().enumerate() {
        let Some(m) = msg.as_object_mut() else {
            continue;
        };

        let text = match m.get("text") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        match text {
            Some(t) if !t.trim().is_empty() => {
                m.insert("text".into(), Value::String(t));
            }
            _ => {
                m.insert("text".into(), Value::String(format!("[Message {}]", i + 1)));
                notes.push(format!("messages[{i}]: empty text replaced"));
            }
        }

        if !m.get("side").is_some_and(Value::is_string) {
            m.insert("side".into(), json!("unknown"));
        }

        match m.get("label") {
            Some(Value::String(s)) => {
                let norm = s.trim().to_ascii_lowercase();
                m.insert("label".into(), Value::String(norm));
            }
            Some(_) => {}
            None => {
                m.insert("label".into(), json!("interesting"));
                notes.push(format!("messages[{i}]: missing label set to interesting"));
            }
        }

        let conf = m.get("confidence").and_then(number_like);
        match conf {
            Some(c) => {
                m.insert("confidence".into(), json!(c));
            }
            None => {
                m.insert("confidence".into(), json!(DEFAULT_CONFIDENCE));
            }
        }

        match m.get_mut("bbox") {
            Some(Value::Array(items)) => {
                for item in items.iter_mut() {
                    if let Value::String(s) = item {
                        if let Ok(n) = s.trim().parse::<f64>() {
                            *item = json!(n);
                        }
                    }
                }
            }
            Some(_) => {}
            None => {
                m.insert("bbox".into(), json!(DEFAULT_BBOX));
                notes.push(format!("messages[{i}]: missing bbox defaulted"));
            }
        }

        if !m.contains_key("index") {
            m.insert("index".into(), json!(i));
        }
    }
    (map, notes)
}

fn synthesize_counts(mut map: JsonMap) -> (JsonMap, Vec<String>) {
    if map.get("counts").is_some_and(Value::is_object) {
        return (map, Vec::new());
    }
    let mut counts = JsonMap::new();
    if let Some(Value::Array(messages)) = map.get("messages") {
        for label in messages.iter().filter_map(|m| m.get("label")?.as_str()) {
            let n = counts.get(label).and_then(Value::as_u64).unwrap_or(0);
            counts.insert(label.to_string(), json!(n + 1));
        }
    }
    map.insert("counts".into(), Value::Object(counts));
    (map, vec!["counts built from messages".into()])
}

fn synthesize_elo(mut map: JsonMap) -> (JsonMap, Vec<String>) {
    let current = map.get("elo").and_then(Value::as_f64);
    match current {
        Some(e) if (0.0..=3500.0).contains(&e) => {
            if e.fract() != 0.0 {
                map.insert("elo".into(), json!(e.round() as u32));
                return (map, vec![format!("elo {e} rounded")]);
            }
            (map, Vec::new())
        }
        _ => {
            let elo = rating_from_value(map.get("counts"));
            map.insert("elo".into(), json!(elo));
            (map, vec![format!("elo computed from counts: {elo}")])
        }
    }
}

fn truncate_chars(s: &str, keep: usize) -> String {
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

fn clamp_ending(mut map: JsonMap) -> (JsonMap, Vec<String>) {
    let ending = map.get("ending").and_then(Value::as_str).map(str::to_string);
    let (value, note) = match ending {
        Some(e) if e.chars().count() > 40 => (truncate_chars(&e, 37), "ending truncated"),
        Some(e) if e.trim().chars().count() >= 2 => return (map, Vec::new()),
        _ => (DEFAULT_ENDING.to_string(), "ending defaulted"),
    };
    map.insert("ending".into(), Value::String(value));
    (map, vec![note.into()])
}

fn ensure_summary(mut map: JsonMap) -> (JsonMap, Vec<String>) {
    let summary = map.get("summary_line").and_then(Value::as_str).map(str::to_string);
    let (value, note) = match summary {
        Some(s) if s.chars().count() > 200 => (truncate_chars(&s, 197), "summary truncated"),
        Some(s) if s.trim().chars().count() >= 3 => return (map, Vec::new()),
        _ => (DEFAULT_SUMMARY.to_string(), "summary defaulted"),
    };
    map.insert("summary_line".into(), Value::String(value));
    (map, vec![note.into()])
}
