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

/// Ollama `/api/chat` provider
pub struct OllamaProvider {
    config: LlmConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [LlmMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: LlmMessage,
    model: String,
    #[serde(default)]
    done: bool,
    eval_count: Option<u32>,
}

impl OllamaProvider {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LlmError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = OllamaRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(format!("Request timed out: {}", e))
                } else if e.is_connect() {
                    LlmError::ProviderUnavailable(format!("Ollama not reachable: {}", e))
                } else {
                    LlmError::NetworkError(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError(format!(
                "API returned {}: {}",
                status, error_text
            )));
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ApiError(format!("Failed to parse response: {}", e)))?;

        Ok(LlmResponse {
            content: parsed.message.content,
            model: parsed.model,
            total_tokens: parsed.eval_count,
            finish_reason: parsed.done.then(|| "stop".to_string()),
        })
    }

    fn name(&self) -> &str {
        "Ollama"
    }
}
