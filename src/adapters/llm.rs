use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    pub api_key: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl ModelConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model_name: config.model.clone(),
            api_key: config.llm_api_key.clone(),
            base_url: config.llm_base_url.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRequest {
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub model: String,
}

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse>;
    fn model_name(&self) -> &str;
}

/// One endpoint family today (OpenAI-compatible chat completions); the
/// trait stays so a second backend is a new adapter, not a rewrite.
pub fn create_adapter(config: &ModelConfig) -> Result<Box<dyn LLMAdapter>> {
    Ok(Box::new(crate::adapters::OpenAIAdapter::new(
        config.clone(),
    )?))
}
