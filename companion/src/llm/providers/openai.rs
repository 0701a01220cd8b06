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

use crate::llm::{LlmConfig, LlmError, LlmMessage, LlmProvider, LlmRequest, LlmResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Provider for OpenAI-compatible chat completion endpoints (OpenAI, DeepSeek, LM Studio)
pub struct OpenAiProvider {
    config: LlmConfig,
    client: reqwest::Client,
    label: &'static str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [LlmMessage],
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    usage: Option<ChatCompletionUsage>,
    #[serde(default)]
    model: String,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: LlmMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionUsage {
    total_tokens: u32,
}

impl OpenAiProvider {
    /// Hosted endpoint; an API key is required
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.is_none() {
            return Err(LlmError::ConfigError(format!(
                "{} requires an API key",
                config.provider
            )));
        }
        Self::build(config, "OpenAI")
    }

    /// Local endpoint such as LM Studio; no API key
    pub fn local(config: LlmConfig) -> Result<Self, LlmError> {
        Self::build(config, "LM Studio")
    }

    fn build(config: LlmConfig, label: &'static str) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LlmError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            label,
        })
    }

    fn parse(response: ChatCompletionResponse, requested: &str) -> Result<LlmResponse, LlmError> {
        let total_tokens = response.usage.map(|u| u.total_tokens);
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ApiError("No choices in response".to_string()))?;

        Ok(LlmResponse {
            content: choice.message.content,
            model: if response.model.is_empty() {
                requested.to_string()
            } else {
                response.model
            },
            total_tokens,
            finish_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
        };

        let mut builder = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(format!("Request timed out: {}", e))
            } else {
                LlmError::NetworkError(format!("Request failed: {}", e))
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::AuthError(format!("API returned {}", status)));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError(format!(
                "API returned {}: {}",
                status, error_text
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ApiError(format!("Failed to parse response: {}", e)))?;

        Self::parse(parsed, &request.model)
    }

    fn name(&self) -> &str {
        self.label
    }
}
