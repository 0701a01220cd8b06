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

//! Companion actions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A named top-level behavior of the companion.
///
/// Exactly one action is active per companion at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Idle,
    Startup,
    Exercise,
    Study,
    Work,
    Eat,
    Sleep,
    WakeUp,
    Shutdown,
    Clone,
}

impl Action {
    /// Every action, in declaration order
    pub const ALL: [Action; 10] = [
        Action::Idle,
        Action::Startup,
        Action::Exercise,
        Action::Study,
        Action::Work,
        Action::Eat,
        Action::Sleep,
        Action::WakeUp,
        Action::Shutdown,
        Action::Clone,
    ];

    /// Lowercase name used in logs, commands and serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Idle => "idle",
            Action::Startup => "startup",
            Action::Exercise => "exercise",
            Action::Study => "study",
            Action::Work => "work",
            Action::Eat => "eat",
            Action::Sleep => "sleep",
            Action::WakeUp => "wakeup",
            Action::Shutdown => "shutdown",
            Action::Clone => "clone",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown action: {0}")]
pub struct ParseActionError(pub String);

impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" | "stop" => Ok(Action::Idle),
            "startup" => Ok(Action::Startup),
            "exercise" => Ok(Action::Exercise),
            "study" => Ok(Action::Study),
            "work" => Ok(Action::Work),
            "eat" => Ok(Action::Eat),
            "sleep" => Ok(Action::Sleep),
            "wake" | "wakeup" => Ok(Action::WakeUp),
            "shutdown" | "exit" => Ok(Action::Shutdown),
            "clone" => Ok(Action::Clone),
            other => Err(ParseActionError(other.to_string())),
        }
    }
}
