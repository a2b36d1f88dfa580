//! Read-only RGB snapshots of each page for pixel sampling.

use image::RgbImage;
use tiny_skia::Pixmap;

use crate::model::{PageMeta, y_offsets};

/// One page's pixels, tightly packed RGB.
#[derive(Debug, Clone)]
pub struct PagePixels {
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

impl PagePixels {
    pub fn from_rgb(img: &RgbImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            data: img.as_raw().clone(),
        }
    }

    /// Pixel at `(x, y)`, with both coordinates clamped into the page.
    pub fn rgb_at(&self, x: i64, y: i64) -> [u8; 3] {
        if self.width == 0 || self.height == 0 {
            return [0, 0, 0];
        }
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        let i = (y * self.width as usize + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
}

/// Per-page pixels; `None` for pages whose image could not be decoded.
#[derive(Debug, Clone, Default)]
pub struct PixelCache {
    pages: Vec<Option<PagePixels>>,
}

impl PixelCache {
    pub fn from_images<'a>(images: impl IntoIterator<Item = Option<&'a RgbImage>>) -> Self {
        Self {
            pages: images
                .into_iter()
                .map(|img| img.map(PagePixels::from_rgb))
                .collect(),
        }
    }

    /// Slices an opaque composite back into pages using `y_offset[i]`.
    pub fn from_composite(composite: &Pixmap, pages: &[PageMeta]) -> Self {
        let cw = composite.width() as usize;
        let ch = composite.height() as usize;
        let src = composite.data();
        let pages = pages
            .iter()
            .zip(y_offsets(pages))
            .map(|(meta, off)| {
                let w = (meta.width as usize).min(cw);
                let h = (meta.height as usize).min(ch.saturating_sub(off as usize));
                let mut data = Vec::with_capacity(w * h * 3);
                for row in off as usize..off as usize + h {
                    for col in 0..w {
                        let i = (row * cw + col) * 4;
                        data.extend_from_slice(&src[i..i + 3]);
                    }
                }
                Some(PagePixels {
                    width: w as u32,
                    height: h as u32,
                    data,
                })
            })
            .collect();
        Self { pages }
    }

    pub fn page(&self, index: usize) -> Option<&PagePixels> {
        self.pages.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn coordinates_are_clamped() {
        let mut img = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));
        img.put_pixel(3, 2, Rgb([200, 100, 50]));
        let cache = PixelCache::from_images([Some(&img)]);
        let p = cache.page(0).unwrap();
        assert_eq!(p.rgb_at(99, 99), [200, 100, 50]);
        assert_eq!(p.rgb_at(-5, -5), [10, 20, 30]);
        assert!(cache.page(1).is_none());
    }

    #[test]
    fn composite_slices_follow_offsets() {
        let mut pm = Pixmap::new(4, 5).unwrap();
        pm.fill(tiny_skia::Color::from_rgba8(0, 0, 255, 255));
        let metas = [PageMeta { width: 4, height: 2 }, PageMeta { width: 3, height: 3 }];
        let cache = PixelCache::from_composite(&pm, &metas);
        assert_eq!(cache.len(), 2);
        let second = cache.page(1).unwrap();
        assert_eq!((second.width, second.height), (3, 3));
        assert_eq!(second.rgb_at(0, 0), [0, 0, 255]);
    }
}
