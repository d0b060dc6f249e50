use anyhow::{anyhow, Result};
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct CoincubConfig {
    pub gemini_api_key: String,
    pub memory_dir: PathBuf,
    pub primary_model: String,
    pub fallback_model: String,
}

impl CoincubConfig {
    pub fn from_env() -> Result<Self> {
        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow!("GEMINI_API_KEY environment variable not set"))?;

        let memory_dir = PathBuf::from(
            std::env::var("COINCUB_MEMORY_DIR").unwrap_or_else(|_| "memory".to_string()),
        );

        let primary_model = std::env::var("COINCUB_PRIMARY_MODEL")
            .unwrap_or_else(|_| "gemini-1.5-pro".to_string());

        let fallback_model = std::env::var("COINCUB_FALLBACK_MODEL")
            .unwrap_or_else(|_| "gemini-1.5-flash".to_string());

        Ok(Self {
            gemini_api_key,
            memory_dir,
            primary_model,
            fallback_model,
        })
    }
}
