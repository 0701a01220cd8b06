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

//! Chat side-channel
//!
//! A session sends one request at a time on a spawned task. The result comes back
//! as a [`ChatCompletion`] over a channel and is applied by whoever owns the
//! companion, so favorability is only ever written from one task.

use crate::llm::{LlmError, LlmMessage, LlmProvider, LlmRequest, complete_with_retries};
use deskpet_common::PersonaTier;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("A chat request is already in flight")]
    RequestInFlight,
}

/// Result of one chat request, delivered back to the owning task
#[derive(Debug)]
pub struct ChatCompletion {
    pub session: Uuid,
    pub companion: Uuid,
    pub result: Result<String, LlmError>,
}

/// What the companion says back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    Answer(String),
    /// In-character failure text; earns no favorability
    Failure(String),
}

impl ChatReply {
    pub fn text(&self) -> &str {
        match self {
            ChatReply::Answer(text) | ChatReply::Failure(text) => text,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ChatReply::Answer(_))
    }
}

pub struct ChatSession {
    id: Uuid,
    companion: Uuid,
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_retries: u32,
    outstanding: bool,
    completions: mpsc::UnboundedSender<ChatCompletion>,
}

impl ChatSession {
    pub fn new(
        companion: Uuid,
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        max_retries: u32,
        completions: mpsc::UnboundedSender<ChatCompletion>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            companion,
            provider,
            model: model.into(),
            max_retries,
            outstanding: false,
            completions,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn companion(&self) -> Uuid {
        self.companion
    }

    /// True from [`ChatSession::send`] until its completion has been applied
    pub fn is_awaiting_reply(&self) -> bool {
        self.outstanding
    }

    /// Start a request for `text`, speaking in the persona for `favorability`
    pub fn send(&mut self, text: &str, favorability: i64) -> Result<JoinHandle<()>, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if self.outstanding {
            return Err(ChatError::RequestInFlight);
        }

        let tier = PersonaTier::for_favorability(favorability);
        let request = LlmRequest::new(&self.model)
            .with_message(LlmMessage::system(tier.system_prompt()))
            .with_message(LlmMessage::user(text));
        tracing::debug!(
            "Chat session {} sending {} chars as {:?}",
            self.id,
            text.len(),
            tier
        );

        self.outstanding = true;
        let provider = Arc::clone(&self.provider);
        let completions = self.completions.clone();
        let session = self.id;
        let companion = self.companion;
        let max_retries = self.max_retries;
        Ok(tokio::spawn(async move {
            let result = complete_with_retries(provider.as_ref(), request, max_retries)
                .await
                .map(|response| response.content);
            if completions
                .send(ChatCompletion {
                    session,
                    companion,
                    result,
                })
                .is_err()
            {
                tracing::debug!("Chat session {} closed before its reply arrived", session);
            }
        }))
    }

    /// Apply a completion produced by this session's request
    pub fn complete(&mut self, completion: ChatCompletion) -> Option<ChatReply> {
        if completion.session != self.id {
            tracing::warn!(
                "Completion for session {} delivered to session {}",
                completion.session,
                self.id
            );
            return None;
        }
        self.outstanding = false;
        Some(match completion.result {
            Ok(text) => ChatReply::Answer(text),
            Err(e) => {
                tracing::warn!("Chat request failed: {}", e);
                ChatReply::Failure(PersonaTier::failure_message(&e.to_string()))
            }
        })
    }
}
