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

//! Companion events and the bus that carries them

use crate::assets::FrameHandle;
use deskpet_common::Action;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Everything a rendering collaborator needs to know about a companion
#[derive(Debug, Clone)]
pub enum CompanionEvent {
    ActionStarted {
        companion: Uuid,
        action: Action,
    },
    StageEntered {
        companion: Uuid,
        action: Action,
        stage: usize,
        frame_count: usize,
    },
    FrameChanged {
        companion: Uuid,
        frame: FrameHandle,
        index: usize,
    },
    /// `natural` is false when the action was interrupted or superseded
    ActionFinished {
        companion: Uuid,
        action: Action,
        natural: bool,
    },
    FavorabilityChanged {
        companion: Uuid,
        old: i64,
        new: i64,
        delta: i64,
    },
    ActionBlocked {
        companion: Uuid,
        action: Action,
        reason: String,
    },
    CloneSpawned {
        parent: Uuid,
        child: Uuid,
    },
    ShutdownStarted {
        companion: Uuid,
    },
    Terminated {
        companion: Uuid,
    },
    ChatReplied {
        companion: Uuid,
        text: String,
        success: bool,
    },
}

impl CompanionEvent {
    /// The companion this event concerns
    pub fn companion(&self) -> Uuid {
        match self {
            CompanionEvent::ActionStarted { companion, .. }
            | CompanionEvent::StageEntered { companion, .. }
            | CompanionEvent::FrameChanged { companion, .. }
            | CompanionEvent::ActionFinished { companion, .. }
            | CompanionEvent::FavorabilityChanged { companion, .. }
            | CompanionEvent::ActionBlocked { companion, .. }
            | CompanionEvent::ShutdownStarted { companion }
            | CompanionEvent::Terminated { companion }
            | CompanionEvent::ChatReplied { companion, .. } => *companion,
            CompanionEvent::CloneSpawned { parent, .. } => *parent,
        }
    }
}

pub type EventHandler = Box<dyn Fn(&CompanionEvent) + Send + Sync>;

/// Queued publish/subscribe bus. Clones share handlers and queue.
pub struct EventBus {
    handlers: Arc<RwLock<Vec<EventHandler>>>,
    event_queue: Arc<RwLock<Vec<CompanionEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
            event_queue: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Subscribe to events with a handler function
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&CompanionEvent) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.push(Box::new(handler));
    }

    /// Queue an event for the next [`EventBus::process_events`]
    pub fn publish(&self, event: CompanionEvent) {
        let mut queue = self.event_queue.write().unwrap_or_else(|e| e.into_inner());
        queue.push(event);
    }

    /// Deliver all queued events to every handler, in publish order
    pub fn process_events(&self) -> usize {
        let mut queue = self.event_queue.write().unwrap_or_else(|e| e.into_inner());
        let events: Vec<_> = queue.drain(..).collect();
        drop(queue);

        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        for event in &events {
            for handler in handlers.iter() {
                handler(event);
            }
        }
        events.len()
    }

    /// Take the queued events without delivering them
    pub fn drain(&self) -> Vec<CompanionEvent> {
        let mut queue = self.event_queue.write().unwrap_or_else(|e| e.into_inner());
        queue.drain(..).collect()
    }

    /// Clear all queued events without processing
    pub fn clear(&self) {
        let mut queue = self.event_queue.write().unwrap_or_else(|e| e.into_inner());
        queue.clear();
    }

    pub fn queue_len(&self) -> usize {
        let queue = self.event_queue.read().unwrap_or_else(|e| e.into_inner());
        queue.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            handlers: Arc::clone(&self.handlers),
            event_queue: Arc::clone(&self.event_queue),
        }
    }
}
