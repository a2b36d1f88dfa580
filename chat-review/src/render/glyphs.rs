//! Badge glyphs: font outlines when a usable font is configured, built-in
//! vector marks otherwise, and a plain dot when neither can be drawn.

use std::path::Path;

use tiny_skia::{FillRule, LineCap, Paint, PathBuilder, Pixmap, Stroke, Transform};
use tracing::{debug, info, warn};
use ttf_parser::{GlyphId, OutlineBuilder};

use crate::labels::{BadgeStyle, Label, badge_styles};

/// Glyph ink color.
pub const GLYPH_COLOR: [u8; 3] = [0x0a, 0x0d, 0x13];

/// How a label's badge glyph is drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum GlyphChoice {
    /// Outline text from the configured font.
    FontText(String),
    /// Built-in vector drawing of an ASCII mark (`!`, `?`, `+`, `*`).
    VectorMark(&'static str),
}

/// Validated styles plus the drawing choice for every label.
#[derive(Debug, Clone)]
pub struct GlyphSet {
    font: Option<Vec<u8>>,
    styles: Vec<BadgeStyle>,
    choices: Vec<GlyphChoice>,
}

impl Default for GlyphSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl GlyphSet {
    /// Vector marks only; no font involved.
    pub fn builtin() -> Self {
        let styles = badge_styles();
        let choices = styles.iter().map(|s| GlyphChoice::VectorMark(s.mark)).collect();
        Self {
            font: None,
            styles,
            choices,
        }
    }

    /// Loads the font at `path` when given, falling back to [`Self::builtin`]
    /// if it cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };
        match std::fs::read(path) {
            Ok(bytes) => Self::from_font_bytes(bytes),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "badge font unreadable, using vector marks");
                Self::builtin()
            }
        }
    }

    /// Picks, per label, the styled glyph if the font has outlines for all
    /// its characters, else the ASCII mark in the font, else a vector mark.
    pub fn from_font_bytes(bytes: Vec<u8>) -> Self {
        let Ok(face) = ttf_parser::Face::parse(&bytes, 0) else {
            warn!("badge font could not be parsed, using vector marks");
            return Self::builtin();
        };
        let styles = badge_styles();
        let choices: Vec<GlyphChoice> = styles
            .iter()
            .map(|s| {
                if has_outlines(&face, &s.glyph) {
                    GlyphChoice::FontText(s.glyph.clone())
                } else if has_outlines(&face, s.mark) {
                    debug!(label = %s.label, "font lacks styled glyph, using ASCII mark");
                    GlyphChoice::FontText(s.mark.to_string())
                } else {
                    GlyphChoice::VectorMark(s.mark)
                }
            })
            .collect();
        let from_font = choices
            .iter()
            .filter(|c| matches!(c, GlyphChoice::FontText(_)))
            .count();
        info!(from_font, total = choices.len(), "badge glyphs loaded");
        drop(face);
        Self {
            font: Some(bytes),
            styles,
            choices,
        }
    }

    pub fn style(&self, label: Label) -> &BadgeStyle {
        &self.styles[label.priority() as usize]
    }

    pub fn choice(&self, label: Label) -> &GlyphChoice {
        &self.choices[label.priority() as usize]
    }

    /// Draws `label`'s glyph centered at `(cx, cy)` inside a badge of
    /// radius `r`. Returns `false` when it had to fall back to a dot.
    pub fn draw(&self, pixmap: &mut Pixmap, label: Label, cx: f32, cy: f32, r: f32) -> bool {
        let size = r * 1.2;
        let drawn = match self.choice(label) {
            GlyphChoice::FontText(text) => self
                .font
                .as_deref()
                .is_some_and(|font| draw_font_text(pixmap, font, text, cx, cy, size)),
            GlyphChoice::VectorMark(mark) => draw_vector_mark(pixmap, mark, cx, cy, size),
        };
        if !drawn {
            draw_dot(pixmap, cx, cy, r * 0.35);
        }
        drawn
    }
}

/* ------------------------------------------------------------------------- */
/* Font outlines                                                             */
/* ------------------------------------------------------------------------- */

/// Maps font units (y up) into pixmap space (y down).
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn pt(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y - y * self.scale)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.pt(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.pt(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.pt(x1, y1);
        let (x, y) = self.pt(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.pt(x1, y1);
        let (x2, y2) = self.pt(x2, y2);
        let (x, y) = self.pt(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn has_outlines(face: &ttf_parser::Face<'_>, text: &str) -> bool {
    !text.is_empty()
        && text.chars().all(|ch| {
            let Some(gid) = face.glyph_index(ch) else {
                return false;
            };
            let mut sink = GlyphPathBuilder::new(0.0, 0.0, 1.0);
            face.outline_glyph(gid, &mut sink).is_some()
        })
}

fn draw_font_text(pixmap: &mut Pixmap, font: &[u8], text: &str, cx: f32, cy: f32, size: f32) -> bool {
    let Ok(face) = ttf_parser::Face::parse(font, 0) else {
        return false;
    };
    let scale = size / face.units_per_em().max(1) as f32;

    let glyphs: Vec<(GlyphId, f32)> = text
        .chars()
        .filter_map(|ch| {
            let gid = face.glyph_index(ch)?;
            let adv = face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale;
            Some((gid, if adv > 0.0 { adv } else { size * 0.5 }))
        })
        .collect();
    if glyphs.is_empty() {
        return false;
    }

    let total: f32 = glyphs.iter().map(|(_, a)| a).sum();
    let baseline = cy + size * 0.35;
    let mut pen_x = cx - total / 2.0;
    let paint = ink();
    let mut drawn = 0usize;
    for (gid, adv) in glyphs {
        let mut b = GlyphPathBuilder::new(pen_x, baseline, scale);
        if face.outline_glyph(gid, &mut b).is_some() {
            if let Some(path) = b.builder.finish() {
                pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
                drawn += 1;
            }
        }
        pen_x += adv;
    }
    drawn > 0
}

/* ------------------------------------------------------------------------- */
/* Vector marks                                                              */
/* ------------------------------------------------------------------------- */

fn ink() -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(GLYPH_COLOR[0], GLYPH_COLOR[1], GLYPH_COLOR[2], 255);
    paint.anti_alias = true;
    paint
}

fn draw_dot(pixmap: &mut Pixmap, cx: f32, cy: f32, r: f32) {
    if let Some(path) = PathBuilder::from_circle(cx, cy, r.max(1.0)) {
        pixmap.fill_path(&path, &ink(), FillRule::Winding, Transform::identity(), None);
    }
}

/// Draws one mark symbol in a cell centered at `cx`; `top` is the cell top.
fn draw_symbol(pixmap: &mut Pixmap, ch: char, cx: f32, top: f32, size: f32) -> bool {
    let paint = ink();
    let id = Transform::identity();
    let stroke = Stroke {
        width: size * 0.13,
        line_cap: LineCap::Round,
        ..Stroke::default()
    };
    match ch {
        '!' => {
            let mut pb = PathBuilder::new();
            pb.move_to(cx, top + size * 0.12);
            pb.line_to(cx, top + size * 0.58);
            let Some(bar) = pb.finish() else { return false };
            pixmap.stroke_path(&bar, &paint, &stroke, id, None);
            draw_dot(pixmap, cx, top + size * 0.82, size * 0.08);
            true
        }
        '?' => {
            let w = size * 0.2;
            let mut pb = PathBuilder::new();
            pb.move_to(cx - w, top + size * 0.28);
            pb.cubic_to(cx - w, top + size * 0.05, cx + w, top + size * 0.05, cx + w, top + size * 0.28);
            pb.cubic_to(cx + w, top + size * 0.42, cx, top + size * 0.42, cx, top + size * 0.6);
            let Some(hook) = pb.finish() else { return false };
            pixmap.stroke_path(&hook, &paint, &stroke, id, None);
            draw_dot(pixmap, cx, top + size * 0.82, size * 0.08);
            true
        }
        '+' => {
            let arm = size * 0.3;
            let cy = top + size * 0.5;
            let mut pb = PathBuilder::new();
            pb.move_to(cx - arm, cy);
            pb.line_to(cx + arm, cy);
            pb.move_to(cx, cy - arm);
            pb.line_to(cx, cy + arm);
            let Some(cross) = pb.finish() else { return false };
            pixmap.stroke_path(&cross, &paint, &stroke, id, None);
            true
        }
        '*' => {
            let cy = top + size * 0.5;
            let (outer, inner) = (size * 0.38, size * 0.16);
            let mut pb = PathBuilder::new();
            for i in 0..10 {
                let rad = if i % 2 == 0 { outer } else { inner };
                let a = -std::f32::consts::FRAC_PI_2 + i as f32 * std::f32::consts::PI / 5.0;
                let (x, y) = (cx + rad * a.cos(), cy + rad * a.sin());
                if i == 0 { pb.move_to(x, y) } else { pb.line_to(x, y) }
            }
            pb.close();
            let Some(star) = pb.finish() else { return false };
            pixmap.fill_path(&star, &paint, FillRule::Winding, id, None);
            true
        }
        _ => false,
    }
}

fn draw_vector_mark(pixmap: &mut Pixmap, mark: &str, cx: f32, cy: f32, size: f32) -> bool {
    let n = mark.chars().count();
    if n == 0 {
        return false;
    }
    // Narrow symbols pack tighter so "!!!" still fits the badge.
    let cell = if n >= 3 { size * 0.32 } else { size * 0.42 };
    let top = cy - size / 2.0;
    let first = cx - cell * (n as f32 - 1.0) / 2.0;
    mark.chars()
        .enumerate()
        .map(|(i, ch)| draw_symbol(pixmap, ch, first + cell * i as f32, top, size))
        .fold(true, |ok, d| ok && d)
}

/// Solid badge disc in `color`.
pub fn draw_disc(pixmap: &mut Pixmap, cx: f32, cy: f32, r: f32, color: [u8; 3]) -> bool {
    let Some(path) = PathBuilder::from_circle(cx, cy, r) else {
        return false;
    };
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], 255);
    paint.anti_alias = true;
    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dark_pixels(pm: &Pixmap) -> usize {
        pm.pixels().iter().filter(|p| p.red() < 60 && p.alpha() > 0).count()
    }

    #[test]
    fn builtin_uses_vector_marks_for_every_label() {
        let g = GlyphSet::builtin();
        for l in Label::ALL {
            assert!(matches!(g.choice(l), GlyphChoice::VectorMark(_)));
        }
        assert_eq!(g.style(Label::Blunder).color, [0xEF, 0x44, 0x44]);
    }

    #[test]
    fn unreadable_font_falls_back_to_builtin() {
        let g = GlyphSet::load(Some(Path::new("/definitely/not/a/font.ttf")));
        assert!(matches!(g.choice(Label::Good), GlyphChoice::VectorMark("+")));
        let g = GlyphSet::from_font_bytes(vec![0, 1, 2, 3]);
        assert!(g.font.is_none());
    }

    #[test]
    fn every_mark_leaves_ink() {
        let g = GlyphSet::builtin();
        for l in Label::ALL {
            let mut pm = Pixmap::new(60, 60).unwrap();
            pm.fill(tiny_skia::Color::WHITE);
            assert!(g.draw(&mut pm, l, 30.0, 30.0, 24.0), "{l} fell back");
            assert!(dark_pixels(&pm) > 0, "{l} drew nothing");
        }
    }

    #[test]
    fn font_text_without_font_draws_a_dot() {
        let mut g = GlyphSet::builtin();
        g.choices[0] = GlyphChoice::FontText("!!!".into());
        let mut pm = Pixmap::new(40, 40).unwrap();
        pm.fill(tiny_skia::Color::WHITE);
        assert!(!g.draw(&mut pm, Label::Megablunder, 20.0, 20.0, 18.0));
        assert!(dark_pixels(&pm) > 0);
    }
}
