pub mod default_config;
pub mod vision_model_config;
pub mod vision_provider;
