//! Vision-capable LLM providers for screenshot transcription.
//!
//! - [`config`]: provider enum, model config and env-driven defaults
//! - [`services`]: OpenAI and Gemini clients
//! - [`service_profiles`]: tiered [`VisionProviders`] with retry
//! - [`telemetry`]: shared tracing layer for the workspace

pub mod config;
pub mod error_handler;
pub mod image_input;
pub mod retry;
pub mod service_profiles;
pub mod services;
pub mod telemetry;
pub mod vision_request;

pub use config::vision_model_config::VisionModelConfig;
pub use config::vision_provider::VisionProvider;
pub use error_handler::{ConfigError, VisionCallError, VisionError};
pub use image_input::ImageInput;
pub use retry::RetryPolicy;
pub use service_profiles::VisionProviders;
pub use vision_request::{VisionReply, VisionRequest};
