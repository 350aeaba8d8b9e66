use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmConfig;
use crate::relay::PromptEnvelope;

/// Sampling knobs forwarded to the backend untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl From<&LlmConfig> for GenerationParams {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("No API key configured for the generation backend")]
    MissingApiKey,
    #[error("Request to generation backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Generation backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Generation backend refused the prompt: {0}")]
    Refused(String),
    #[error("Could not read generation backend response: {0}")]
    Malformed(String),
    #[error("Generation backend did not answer within {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Other(String),
}

/// A text-generation service: one envelope in, one text payload out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        envelope: &PromptEnvelope,
        params: &GenerationParams,
    ) -> Result<String, BackendError>;
}
