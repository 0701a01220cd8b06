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

//! Deskpet companion runtime
//!
//! The companion cycles through a fixed set of animated actions. This crate provides:
//! - Frame asset loading from stage directories
//! - A persisted, clamped favorability ledger
//! - A single-handler frame scheduler with cancellable one-shot calls
//! - The behavior controller state machine that ties them together
//! - A chat side-channel whose replies raise favorability
//! - The host event loop that owns every companion instance

pub mod assets;
pub mod behavior;
pub mod chat;
pub mod config;
pub mod host;
pub mod ledger;
pub mod llm;
pub mod scheduler;

pub use deskpet_common as common;
