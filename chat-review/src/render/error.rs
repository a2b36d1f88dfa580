use thiserror::Error;

pub type Result<T> = std::result::Result<T, RenderError>;

/// Rendering failures. Glyph problems never surface here; they degrade to
/// simpler marks instead.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to render: no pages")]
    NoPages,

    #[error("cannot allocate a {width}x{height} canvas")]
    Canvas { width: u32, height: u32 },

    #[error("page {index} is {width}x{height} but its decoded image is {actual_width}x{actual_height}")]
    PageSize {
        index: usize,
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("placed {badges} badge(s) for {bubbles} bubble(s)")]
    BadgeCountMismatch { bubbles: usize, badges: usize },

    #[error("png encoding failed: {0}")]
    Encode(String),
}
