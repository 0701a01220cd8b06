//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! LLM provider implementations

mod ollama;
mod openai;

use super::types::{LlmConfig, LlmError, LlmRequest, LlmResponse};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Trait for LLM providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a request to the LLM
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get provider name
    fn name(&self) -> &str;
}

/// Build the provider named by `config.provider`
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider: Arc<dyn LlmProvider> = match config.provider.to_ascii_lowercase().as_str() {
        "openai" | "deepseek" => Arc::new(OpenAiProvider::new(config.clone())?),
        "lmstudio" => Arc::new(OpenAiProvider::local(config.clone())?),
        "ollama" => Arc::new(OllamaProvider::new(config.clone())?),
        other => {
            return Err(LlmError::ConfigError(format!(
                "Unknown provider type: {}",
                other
            )));
        }
    };
    tracing::info!(
        "Using {} provider at {} (model {})",
        provider.name(),
        config.endpoint,
        config.default_model
    );
    Ok(provider)
}

/// Run `request`, retrying transient failures up to `max_retries` more times
pub async fn complete_with_retries(
    provider: &dyn LlmProvider,
    request: LlmRequest,
    max_retries: u32,
) -> Result<LlmResponse, LlmError> {
    let mut attempt = 0;
    loop {
        match provider.complete(request.clone()).await {
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                let backoff = Duration::from_millis(250 * u64::from(attempt));
                tracing::warn!(
                    "{} request failed ({}), retry {}/{} in {:?}",
                    provider.name(),
                    e,
                    attempt,
                    max_retries,
                    backoff
                );
                tokio::time::sleep(backoff).await;
            }
            result => return result,
        }
    }
}
