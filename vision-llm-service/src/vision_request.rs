use crate::{config::vision_provider::VisionProvider, image_input::ImageInput};

/// One multimodal request: instructions, a task prompt and the images.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    /// System instructions (output contract, language).
    pub system: String,
    /// User prompt that introduces the attached images.
    pub prompt: String,
    pub images: Vec<ImageInput>,
}

/// Raw text returned by whichever provider answered.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionReply {
    pub text: String,
    pub provider: VisionProvider,
}
