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

//! Deskpet Common Types
//!
//! This crate defines the static data model shared by the companion runtime:
//! - The closed set of companion actions
//! - Per-action stage definitions (asset key, frame interval, advance policy)
//! - The favorability reward table and thresholds
//! - Chat persona tiers selected by favorability

pub mod action;
pub mod persona;
pub mod reward;
pub mod stage;

pub use action::{Action, ParseActionError};
pub use persona::PersonaTier;
pub use reward::{CHAT_REPLY_REWARD, CLONE_MIN_FAVORABILITY, DEFAULT_FAVORABILITY};
pub use stage::{AdvancePolicy, StageDefinition};
