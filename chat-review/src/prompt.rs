//! Prompt builders for the single-pass transcribe-and-review call.

use crate::labels::Label;
use crate::model::PageMeta;

/// System instructions: output contract and language.
pub fn build_system_prompt(language: &str) -> String {
    let labels: Vec<&str> = Label::ALL.iter().rev().map(|l| l.as_str()).collect();
    let mut s = String::new();
    s.push_str("You are \"Game Review\" for chat screenshots.\n");
    s.push_str("Perform OCR + analysis in one pass using the images provided.\n");
    s.push_str("Return STRICT JSON only (no prose, no markdown).\n");
    s.push_str(
        "For EACH message bubble, output: index (reading order), side (sender|receiver), text, \
         bbox [x,y,w,h] in pixels of the ORIGINAL image, label, confidence.\n",
    );
    s.push_str(&format!("Valid labels (ordered strength): {}\n", labels.join(", ")));
    s.push_str(
        "Also return summary_line (one witty but safe line), counts per label, ending, and overall elo.\n",
    );
    s.push_str("If unsure about a bbox, estimate; do NOT omit.\n");
    s.push_str(&format!("Language: {language}."));
    s
}

/// Task prompt listing the attached pages in order.
pub fn build_user_prompt(pages: &[PageMeta]) -> String {
    let mut s = String::new();
    s.push_str("TASK:\n");
    s.push_str("- Infer who is sender vs receiver by typical chat layout.\n");
    s.push_str("- BBoxes must be TIGHT rectangles around each bubble.\n");
    s.push_str("- If multiple images are sent, include image_index for each message (0-based).\n");
    s.push_str("- Keep reasons internal; only the fields specified should appear.\n");
    s.push_str("Return ONLY JSON.\n");
    s.push_str("IMAGES:");
    for (i, p) in pages.iter().enumerate() {
        s.push_str(&format!("\n- image_index {i}: {}x{} px", p.width, p.height));
    }
    s
}
