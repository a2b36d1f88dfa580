//! Vertical stitching of pages into one canvas.

use image::RgbImage;
use tiny_skia::Pixmap;

use crate::model::{PageMeta, y_offsets};
use crate::render::error::{RenderError, Result};

/// Canvas color behind and between pages.
pub const BACKGROUND: [u8; 3] = [0x0f, 0x11, 0x15];

/// Stitches pages top to bottom. Canvas width is the widest page, height
/// the sum of all heights; pages without pixels leave the background.
pub fn compose(metas: &[PageMeta], images: &[Option<&RgbImage>]) -> Result<Pixmap> {
    if metas.is_empty() {
        return Err(RenderError::NoPages);
    }
    let width = metas.iter().map(|m| m.width).max().unwrap_or(0);
    let height: u32 = metas.iter().map(|m| m.height).sum();
    let mut canvas = Pixmap::new(width, height).ok_or(RenderError::Canvas { width, height })?;
    canvas.fill(tiny_skia::Color::from_rgba8(BACKGROUND[0], BACKGROUND[1], BACKGROUND[2], 255));

    let offsets = y_offsets(metas);
    let stride = width as usize * 4;
    for (index, (meta, off)) in metas.iter().zip(offsets).enumerate() {
        let Some(img) = images.get(index).copied().flatten() else {
            continue;
        };
        if img.width() != meta.width || img.height() != meta.height {
            return Err(RenderError::PageSize {
                index,
                width: meta.width,
                height: meta.height,
                actual_width: img.width(),
                actual_height: img.height(),
            });
        }
        let data = canvas.data_mut();
        for (row, line) in img.rows().enumerate() {
            let start = (off as usize + row) * stride;
            for (col, px) in line.enumerate() {
                let i = start + col * 4;
                data[i..i + 4].copy_from_slice(&[px.0[0], px.0[1], px.0[2], 255]);
            }
        }
    }
    Ok(canvas)
}
