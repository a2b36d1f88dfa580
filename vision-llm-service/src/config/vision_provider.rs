/// Vision-capable backend used to transcribe chat screenshots.
///
/// Both providers accept one text prompt plus a list of images and answer
/// with free-form text that is expected (but not guaranteed) to be JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisionProvider {
    /// OpenAI chat completions with `image_url` content parts.
    OpenAI,
    /// Google Gemini `generateContent` with `inline_data` parts.
    Gemini,
}

impl VisionProvider {
    /// Short lowercase name used in logs and API payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            VisionProvider::OpenAI => "openai",
            VisionProvider::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for VisionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
