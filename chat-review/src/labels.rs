//! Move-quality labels, their severity order and presentation table.
//!
//! Declaration order is the severity order: the derived `Ord` puts
//! `Megablunder` first (priority 0) and `Superbrilliant` last (priority 9).
//! "Worse" always means the lower priority index.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Megablunder,
    Blunder,
    Mistake,
    Inaccuracy,
    Interesting,
    Good,
    Great,
    Excellent,
    Brilliant,
    Superbrilliant,
}

/// Priority used for names that are not a known label.
pub const UNKNOWN_NAME_PRIORITY: u8 = 4;

impl Label {
    /// All labels, worst first.
    pub const ALL: [Label; 10] = [
        Label::Megablunder,
        Label::Blunder,
        Label::Mistake,
        Label::Inaccuracy,
        Label::Interesting,
        Label::Good,
        Label::Great,
        Label::Excellent,
        Label::Brilliant,
        Label::Superbrilliant,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Megablunder => "megablunder",
            Label::Blunder => "blunder",
            Label::Mistake => "mistake",
            Label::Inaccuracy => "inaccuracy",
            Label::Interesting => "interesting",
            Label::Good => "good",
            Label::Great => "great",
            Label::Excellent => "excellent",
            Label::Brilliant => "brilliant",
            Label::Superbrilliant => "superbrilliant",
        }
    }

    /// Position in the severity order, 0 = worst.
    pub fn priority(self) -> u8 {
        self as u8
    }

    /// Rating contribution of one message with this label.
    pub fn weight(self) -> i32 {
        match self {
            Label::Superbrilliant => 80,
            Label::Brilliant => 60,
            Label::Excellent => 40,
            Label::Great => 25,
            Label::Good => 10,
            Label::Interesting => 0,
            Label::Inaccuracy => -10,
            Label::Mistake => -25,
            Label::Blunder => -60,
            Label::Megablunder => -90,
        }
    }

    /// Case-insensitive, whitespace-tolerant lookup.
    pub fn parse_name(name: &str) -> Option<Label> {
        let n = name.trim().to_ascii_lowercase();
        Label::ALL.into_iter().find(|l| l.as_str() == n)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::parse_name(s).ok_or_else(|| format!("unknown label `{s}`"))
    }
}

/// The more severe of two labels; ties return `a`.
pub fn worse(a: Label, b: Label) -> Label {
    if b.priority() < a.priority() { b } else { a }
}

/// Priority of a label name; unknown names rank as `interesting`.
pub fn priority_of_name(name: &str) -> u8 {
    Label::parse_name(name)
        .map(Label::priority)
        .unwrap_or(UNKNOWN_NAME_PRIORITY)
}

/// Name-level variant of [`worse`]; ties return `a`.
pub fn worse_name<'a>(a: &'a str, b: &'a str) -> &'a str {
    if priority_of_name(b) < priority_of_name(a) { b } else { a }
}

/* ------------------------------------------------------------------------- */
/* Presentation table                                                        */
/* ------------------------------------------------------------------------- */

/// Raw presentation entry: glyph text and badge color as authored.
struct RawStyle {
    label: Label,
    glyph: &'static str,
    color: &'static str,
}

const RAW_STYLES: [RawStyle; 10] = [
    RawStyle { label: Label::Superbrilliant, glyph: "🚀", color: "#8B5CF6" },
    RawStyle { label: Label::Brilliant, glyph: "💎", color: "#3B82F6" },
    RawStyle { label: Label::Excellent, glyph: "⭐", color: "#F59E0B" },
    RawStyle { label: Label::Great, glyph: "✅", color: "#10B981" },
    RawStyle { label: Label::Good, glyph: "👍", color: "#6B7280" },
    RawStyle { label: Label::Interesting, glyph: "📖", color: "#D2691E" },
    RawStyle { label: Label::Inaccuracy, glyph: "🤔", color: "#F97316" },
    RawStyle { label: Label::Mistake, glyph: "😅", color: "#FB923C" },
    RawStyle { label: Label::Blunder, glyph: "😬", color: "#EF4444" },
    RawStyle { label: Label::Megablunder, glyph: "❓", color: "#991B1B" },
];

const FALLBACK_COLOR: [u8; 3] = [0x6B, 0x72, 0x80];

/// Validated badge presentation for one label.
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeStyle {
    pub label: Label,
    /// Preferred glyph (may need a font that has it).
    pub glyph: String,
    /// ASCII mark drawn when the glyph cannot be rendered.
    pub mark: &'static str,
    pub color: [u8; 3],
}

/// ASCII mark per label, in chess-annotation style.
pub fn ascii_mark(label: Label) -> &'static str {
    match label {
        Label::Superbrilliant => "!!!",
        Label::Brilliant => "!!",
        Label::Excellent => "*",
        Label::Great => "!",
        Label::Good => "+",
        Label::Interesting => "!?",
        Label::Inaccuracy => "?!",
        Label::Mistake => "?",
        Label::Blunder => "??",
        Label::Megablunder => "???",
    }
}

/// Heuristic for UTF-8 emoji that went through a Latin-1 decode
/// (e.g. `ğŸš€`): a Latin-1 lead byte followed by more Latin-1 or
/// C1/Latin Extended noise.
pub fn looks_like_mojibake(s: &str) -> bool {
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        let lead = matches!(c, 'Ã' | 'Â' | 'â' | 'ð' | 'ğ' | 'ï' | 'Ð' | 'Ñ');
        if lead {
            if let Some(&next) = chars.peek() {
                let code = next as u32;
                if (0x80..=0x24F).contains(&code) || (0x2010..=0x20AC).contains(&code) || next == 'Ÿ' {
                    return true;
                }
            }
        }
    }
    false
}

fn parse_hex_color(hex: &str) -> Option<[u8; 3]> {
    let h = hex.trim().trim_start_matches('#');
    if h.len() != 6 || !h.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&h[i..i + 2], 16).ok();
    Some([byte(0)?, byte(2)?, byte(4)?])
}

fn normalize_style(raw: &RawStyle) -> BadgeStyle {
    let mark = ascii_mark(raw.label);
    let glyph = if raw.glyph.trim().is_empty() || looks_like_mojibake(raw.glyph) {
        tracing::warn!(label = %raw.label, "badge glyph unusable, using ASCII mark");
        mark.to_string()
    } else {
        raw.glyph.to_string()
    };
    let color = parse_hex_color(raw.color).unwrap_or_else(|| {
        tracing::warn!(label = %raw.label, color = raw.color, "badge color invalid, using gray");
        FALLBACK_COLOR
    });
    BadgeStyle {
        label: raw.label,
        glyph,
        mark,
        color,
    }
}

/// Validated presentation table, indexed by [`Label::priority`].
pub fn badge_styles() -> Vec<BadgeStyle> {
    let mut out: Vec<BadgeStyle> = Label::ALL
        .iter()
        .map(|&label| {
            RAW_STYLES
                .iter()
                .find(|r| r.label == label)
                .map(normalize_style)
                .unwrap_or(BadgeStyle {
                    label,
                    glyph: ascii_mark(label).to_string(),
                    mark: ascii_mark(label),
                    color: FALLBACK_COLOR,
                })
        })
        .collect();
    out.sort_by_key(|s| s.label);
    out
}
