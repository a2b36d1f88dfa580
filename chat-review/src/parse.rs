//! Extracts a JSON object from free-form model text.
//!
//! Handles replies wrapped in code fences, preceded or followed by prose,
//! and bare arrays of messages (wrapped as `{"messages": [...]}`).

use serde_json::{Map, Value};

/// Removes a surrounding ```` ```json ```` / ```` ``` ```` fence if present.
fn strip_fences(s: &str) -> &str {
    let t = s.trim();
    let Some(start) = t.find("```") else {
        return t;
    };
    let after = &t[start + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let lang = after[..body_start].trim();
    // Only a language tag may follow the opening fence on its line.
    let body = if lang.is_empty() || lang.chars().all(|c| c.is_ascii_alphanumeric()) {
        &after[body_start..]
    } else {
        after
    };
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// End index (exclusive) of the balanced `{...}` starting at `open`.
fn balanced_end(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_str = false;
    let mut escaped = false;
    for (i, c) in s[open..].char_indices() {
        if in_str {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_str = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn as_object(v: Value) -> Option<Map<String, Value>> {
    match v {
        Value::Object(m) => Some(m),
        Value::Array(items) => {
            let mut m = Map::new();
            m.insert("messages".into(), Value::Array(items));
            Some(m)
        }
        _ => None,
    }
}

/// Best-effort extraction of the reply's top-level JSON object.
pub fn extract_json(raw: &str) -> Option<Map<String, Value>> {
    let cleaned = strip_fences(raw);
    if let Ok(v) = serde_json::from_str::<Value>(cleaned) {
        if let Some(m) = as_object(v) {
            return Some(m);
        }
    }

    // Prose around the payload: try each `{` until a balanced object parses.
    for (open, _) in cleaned.match_indices('{') {
        if let Some(end) = balanced_end(cleaned, open) {
            if let Ok(Value::Object(m)) = serde_json::from_str::<Value>(&cleaned[open..end]) {
                return Some(m);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_object() {
        let m = extract_json(r#"{"elo": 1200}"#).unwrap();
        assert_eq!(m["elo"], 1200);
    }

    #[test]
    fn fenced_with_language_tag() {
        let raw = "Here you go:\n```json\n{\"ending\": \"draw\"}\n```\nThanks!";
        let m = extract_json(raw).unwrap();
        assert_eq!(m["ending"], "draw");
    }

    #[test]
    fn prose_around_object_with_braces_in_strings() {
        let raw = r#"Sure! {"summary_line": "a {weird} one", "n": {"x": 1}} hope it helps"#;
        let m = extract_json(raw).unwrap();
        assert_eq!(m["summary_line"], "a {weird} one");
        assert_eq!(m["n"]["x"], 1);
    }

    #[test]
    fn bare_array_becomes_messages() {
        let m = extract_json(r#"[{"text": "hi"}]"#).unwrap();
        assert_eq!(m["messages"][0]["text"], "hi");
    }

    #[test]
    fn nothing_parseable() {
        assert!(extract_json("I could not read the screenshot.").is_none());
        assert!(extract_json("{ broken").is_none());
    }
}
