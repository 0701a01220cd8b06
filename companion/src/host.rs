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

//! Companion host
//!
//! The host owns every companion (the root and its clones) and drives them from a
//! single task. Commands arrive on a channel, chat replies on another, and frame
//! timers are serviced by sleeping until the earliest scheduler deadline.

use crate::assets::AssetProvider;
use crate::behavior::{BehaviorController, BehaviorError, CompanionEvent, EventBus};
use crate::chat::{ChatCompletion, ChatError, ChatReply, ChatSession};
use crate::ledger::{FavorabilityLedger, LedgerStore};
use crate::llm::LlmProvider;
use deskpet_common::Action;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("No companion with id {0}")]
    UnknownCompanion(Uuid),

    #[error("Chat is not configured")]
    ChatDisabled,

    #[error(transparent)]
    Behavior(#[from] BehaviorError),

    #[error(transparent)]
    Chat(#[from] ChatError),
}

/// Request addressed to a companion. `None` targets the root companion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Action {
        target: Option<Uuid>,
        action: Action,
    },
    Interrupt {
        target: Option<Uuid>,
    },
    Finish {
        target: Option<Uuid>,
    },
    Clone {
        target: Option<Uuid>,
    },
    Shutdown {
        target: Option<Uuid>,
    },
    Chat {
        target: Option<Uuid>,
        text: String,
    },
    /// Tear down every companion without playing the shutdown clip
    Close,
}

impl HostCommand {
    /// Parse a console line such as `work`, `finish` or `chat hello there`
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map(|(word, rest)| (word, rest.trim()))
            .unwrap_or((line, ""));

        let command = match word.to_ascii_lowercase().as_str() {
            "" => return Err("Empty command".to_string()),
            "interrupt" => HostCommand::Interrupt { target: None },
            "finish" => HostCommand::Finish { target: None },
            "chat" | "say" => HostCommand::Chat {
                target: None,
                text: rest.to_string(),
            },
            "quit" | "close" => HostCommand::Close,
            other => match other.parse::<Action>().map_err(|e| e.to_string())? {
                Action::Clone => HostCommand::Clone { target: None },
                Action::Shutdown => HostCommand::Shutdown { target: None },
                action => HostCommand::Action {
                    target: None,
                    action,
                },
            },
        };
        Ok(command)
    }
}

/// Provider and model used for every chat session
#[derive(Clone)]
pub struct ChatSettings {
    pub provider: Arc<dyn LlmProvider>,
    pub model: String,
    pub max_retries: u32,
}

pub struct CompanionHost {
    root: Uuid,
    companions: HashMap<Uuid, BehaviorController>,
    chats: HashMap<Uuid, ChatSession>,
    chat: Option<ChatSettings>,
    events: EventBus,
    completions_tx: mpsc::UnboundedSender<ChatCompletion>,
    completions_rx: mpsc::UnboundedReceiver<ChatCompletion>,
    started: Instant,
    closed: bool,
}

impl CompanionHost {
    /// Create the host and its root companion at host time zero
    pub fn new(
        assets: Arc<dyn AssetProvider>,
        store: Arc<dyn LedgerStore>,
        events: EventBus,
        chat: Option<ChatSettings>,
    ) -> Self {
        let root = BehaviorController::new(assets, FavorabilityLedger::open(store), events.clone(), 0);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let root_id = root.id();
        let mut companions = HashMap::new();
        companions.insert(root_id, root);

        Self {
            root: root_id,
            companions,
            chats: HashMap::new(),
            chat,
            events,
            completions_tx,
            completions_rx,
            started: Instant::now(),
            closed: false,
        }
    }

    pub fn root_id(&self) -> Uuid {
        self.root
    }

    pub fn companion(&self, id: Uuid) -> Option<&BehaviorController> {
        self.companions.get(&id)
    }

    pub fn root(&self) -> Option<&BehaviorController> {
        self.companions.get(&self.root)
    }

    pub fn companion_count(&self) -> usize {
        self.companions.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Milliseconds since the host was created
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Earliest scheduler deadline across all companions, in host milliseconds
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.companions
            .values()
            .filter_map(BehaviorController::next_deadline)
            .min()
    }

    fn controller_mut(&mut self, target: Option<Uuid>) -> Result<&mut BehaviorController, HostError> {
        let id = target.unwrap_or(self.root);
        self.companions
            .get_mut(&id)
            .ok_or(HostError::UnknownCompanion(id))
    }

    /// Apply one command, then drop any companion it terminated
    pub fn handle(&mut self, command: HostCommand) -> Result<(), HostError> {
        tracing::debug!("Handling {:?}", command);
        let result = match command {
            HostCommand::Action { target, action } => self
                .controller_mut(target)
                .and_then(|c| c.request_action(action).map_err(HostError::from)),
            HostCommand::Interrupt { target } => self
                .controller_mut(target)
                .and_then(|c| c.interrupt().map_err(HostError::from)),
            HostCommand::Finish { target } => self
                .controller_mut(target)
                .and_then(|c| c.finish().map_err(HostError::from)),
            HostCommand::Shutdown { target } => self
                .controller_mut(target)
                .and_then(|c| c.request_shutdown().map_err(HostError::from)),
            HostCommand::Clone { target } => self.spawn_clone(target),
            HostCommand::Chat { target, text } => self.send_chat(target, &text),
            HostCommand::Close => {
                self.close();
                Ok(())
            }
        };
        self.reap();
        result
    }

    fn spawn_clone(&mut self, target: Option<Uuid>) -> Result<(), HostError> {
        let child = self.controller_mut(target)?.request_clone()?;
        tracing::info!("Spawned clone {} ({} companions)", child.id(), self.companions.len() + 1);
        self.companions.insert(child.id(), child);
        Ok(())
    }

    fn send_chat(&mut self, target: Option<Uuid>, text: &str) -> Result<(), HostError> {
        let settings = self.chat.as_ref().ok_or(HostError::ChatDisabled)?;
        let id = target.unwrap_or(self.root);
        let favorability = self
            .companions
            .get(&id)
            .ok_or(HostError::UnknownCompanion(id))?
            .favorability();

        let session = self.chats.entry(id).or_insert_with(|| {
            ChatSession::new(
                id,
                Arc::clone(&settings.provider),
                settings.model.clone(),
                settings.max_retries,
                self.completions_tx.clone(),
            )
        });
        session.send(text, favorability)?;
        Ok(())
    }

    /// Apply a finished chat request: +1 favorability on success, then report the reply
    pub fn handle_chat_completion(&mut self, completion: ChatCompletion) -> Option<ChatReply> {
        let companion = completion.companion;
        let Some(session) = self.chats.get_mut(&companion) else {
            tracing::debug!("Dropping chat reply for departed companion {}", companion);
            return None;
        };
        let reply = session.complete(completion)?;

        if reply.is_success() {
            if let Some(controller) = self.companions.get_mut(&companion) {
                controller.apply_chat_reward();
            }
        }
        self.events.publish(CompanionEvent::ChatReplied {
            companion,
            text: reply.text().to_string(),
            success: reply.is_success(),
        });
        Some(reply)
    }

    /// Run every companion's scheduler up to `now_ms`
    pub fn advance_to(&mut self, now_ms: u64) {
        for controller in self.companions.values_mut() {
            controller.advance_to(now_ms);
        }
        self.reap();
    }

    /// Collapse frame ticks every companion missed while the loop was not polled
    fn skip_missed_ticks(&mut self, now_ms: u64) {
        for controller in self.companions.values_mut() {
            controller.skip_missed_ticks(now_ms);
        }
    }

    /// A terminated root closes the whole host; a terminated clone just leaves
    fn reap(&mut self) {
        if self.closed {
            return;
        }
        let root_done = self
            .companions
            .get(&self.root)
            .is_none_or(BehaviorController::is_terminated);
        if root_done {
            self.close();
            return;
        }

        let finished: Vec<Uuid> = self
            .companions
            .iter()
            .filter(|(_, c)| c.is_terminated())
            .map(|(id, _)| *id)
            .collect();
        for id in finished {
            let parent = self.companions.remove(&id).and_then(|c| c.parent());
            self.chats.remove(&id);
            if let Some(parent) = parent.and_then(|p| self.companions.get_mut(&p)) {
                parent.forget_child(id);
            }
            tracing::info!("Clone {} left ({} companions)", id, self.companions.len());
        }
    }

    /// Tear down every companion. Clones close first so the root's score is the
    /// last one written.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let root = self.root;
        for (_, controller) in self.companions.iter_mut().filter(|(id, _)| **id != root) {
            controller.close();
        }
        if let Some(controller) = self.companions.get_mut(&root) {
            if controller.is_terminated() {
                controller.persist();
            } else {
                controller.close();
            }
        }
        self.chats.clear();
        tracing::info!("Host closed");
    }

    /// Drive the companions until the root terminates or `commands` closes
    pub async fn run(&mut self, mut commands: mpsc::Receiver<HostCommand>) {
        self.events.process_events();
        while !self.closed {
            let deadline = self
                .next_deadline_ms()
                .map(|ms| self.started + Duration::from_millis(ms));

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        let now = self.elapsed_ms();
                        self.skip_missed_ticks(now);
                        self.advance_to(now);
                        if let Err(e) = self.handle(command) {
                            tracing::warn!("Command rejected: {}", e);
                        }
                    }
                    None => {
                        tracing::info!("Command channel closed");
                        self.close();
                    }
                },
                Some(completion) = self.completions_rx.recv() => {
                    self.handle_chat_completion(completion);
                }
                _ = sleep_until(deadline) => {}
            }

            let now = self.elapsed_ms();
            self.skip_missed_ticks(now);
            self.advance_to(now);
            self.events.process_events();
        }
        self.events.process_events();
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
