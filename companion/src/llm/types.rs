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

//! Common types for LLM integration

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// LLM message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for LlmRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmRole::System => write!(f, "system"),
            LlmRole::User => write!(f, "user"),
            LlmRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in a chat completion exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::User,
            content: content.into(),
        }
    }
}

/// Chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<LlmMessage>,
    /// Model to use (provider-specific)
    pub model: String,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            model: model.into(),
        }
    }

    pub fn with_message(mut self, message: LlmMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// The last user message, if any
    pub fn user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == LlmRole::User)
            .map(|m| m.content.as_str())
    }
}

/// Chat completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub total_tokens: Option<u32>,
    pub finish_reason: Option<String>,
}

impl LlmResponse {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            total_tokens: None,
            finish_reason: None,
        }
    }
}

/// LLM error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid request, rate limit and similar
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Error: {0}")]
    Other(String),
}

impl LlmError {
    /// Whether retrying the same request might succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::NetworkError(_) | LlmError::Timeout(_))
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider type (openai, deepseek, ollama, lmstudio)
    pub provider: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub default_model: String,
    pub timeout_seconds: u64,
    /// Extra attempts after a transient failure
    pub max_retries: u32,
}

impl LlmConfig {
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: "openai".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: Some(api_key.into()),
            default_model: model.into(),
            timeout_seconds: 30,
            max_retries: 3,
        }
    }

    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self {
            provider: "deepseek".to_string(),
            endpoint: "https://api.deepseek.com/chat/completions".to_string(),
            api_key: Some(api_key.into()),
            default_model: "deepseek-chat".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
        }
    }

    pub fn ollama(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: "ollama".to_string(),
            endpoint: endpoint.into(),
            api_key: None,
            default_model: model.into(),
            timeout_seconds: 60,
            max_retries: 3,
        }
    }

    pub fn lmstudio(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: "lmstudio".to_string(),
            endpoint: endpoint.into(),
            api_key: None,
            default_model: model.into(),
            timeout_seconds: 60,
            max_retries: 3,
        }
    }
}
