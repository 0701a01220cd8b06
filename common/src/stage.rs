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

//! Static stage definitions
//!
//! Every action plays as an ordered list of stages. A stage names the asset directory
//! its frames come from, how long each frame stays on screen, and whether the stage
//! plays through once or loops until interrupted.

use crate::action::Action;
use serde::{Deserialize, Serialize};

/// How a stage ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvancePolicy {
    /// Play every frame once, then complete
    Once,
    /// Repeat indefinitely until interrupted
    Loop,
}

/// One ordered phase of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDefinition {
    /// Asset directory, relative to the asset root
    pub asset_key: &'static str,
    /// Time each frame is displayed
    pub interval_ms: u64,
    pub policy: AdvancePolicy,
}

impl StageDefinition {
    const fn once(asset_key: &'static str, interval_ms: u64) -> Self {
        Self {
            asset_key,
            interval_ms,
            policy: AdvancePolicy::Once,
        }
    }

    const fn looping(asset_key: &'static str, interval_ms: u64) -> Self {
        Self {
            asset_key,
            interval_ms,
            policy: AdvancePolicy::Loop,
        }
    }

    /// Total play time of a `Once` stage holding `frame_count` frames
    pub fn duration_ms(&self, frame_count: usize) -> u64 {
        frame_count as u64 * self.interval_ms
    }

    pub fn is_loop(&self) -> bool {
        self.policy == AdvancePolicy::Loop
    }
}

const STARTUP: [StageDefinition; 1] = [StageDefinition::once("StartUP/Happy", 100)];

const IDLE: [StageDefinition; 1] = [StageDefinition::looping("BDay/B", 100)];

const EXERCISE: [StageDefinition; 3] = [
    StageDefinition::once("WORK/RopeSkipping/Happy/A", 100),
    StageDefinition::looping("WORK/RopeSkipping/Happy/B/1", 100),
    StageDefinition::once("WORK/RopeSkipping/Happy/C", 100),
];

const STUDY: [StageDefinition; 3] = [
    StageDefinition::once("WORK/Study/A_Nomal", 70),
    StageDefinition::looping("WORK/Study/B_1_Nomal", 70),
    StageDefinition::once("WORK/Study/C_Nomal", 70),
];

const WORK: [StageDefinition; 3] = [
    StageDefinition::once("WORK/WorkTWO/A_Nomal", 100),
    StageDefinition::looping("WORK/WorkTWO/B_2_Nomal", 100),
    StageDefinition::once("WORK/WorkTWO/C_Nomal", 100),
];

const EAT: [StageDefinition; 1] = [StageDefinition::once("Eat/Nomal/back_lay", 100)];

const SLEEP: [StageDefinition; 2] = [
    StageDefinition::once("Sleep/A_Happy", 100),
    StageDefinition::looping("Sleep/B_Nomal", 100),
];

const WAKE_UP: [StageDefinition; 1] = [StageDefinition::once("Sleep/C_PoorCondition", 130)];

const SHUTDOWN: [StageDefinition; 1] = [StageDefinition::once("Shutdown/Happy_1", 100)];

impl Action {
    /// Ordered stages of this action. `Clone` has none; it completes instantly.
    pub fn stages(&self) -> &'static [StageDefinition] {
        match self {
            Action::Idle => &IDLE,
            Action::Startup => &STARTUP,
            Action::Exercise => &EXERCISE,
            Action::Study => &STUDY,
            Action::Work => &WORK,
            Action::Eat => &EAT,
            Action::Sleep => &SLEEP,
            Action::WakeUp => &WAKE_UP,
            Action::Shutdown => &SHUTDOWN,
            Action::Clone => &[],
        }
    }

    /// Stage at `index`, if the action has one there
    pub fn stage(&self, index: usize) -> Option<&'static StageDefinition> {
        self.stages().get(index)
    }

    /// The terminal `Once` stage that follows the loop stage at `loop_index`.
    pub fn exit_stage(&self, loop_index: usize) -> Option<usize> {
        self.stages()
            .iter()
            .enumerate()
            .skip(loop_index + 1)
            .find(|(_, stage)| stage.policy == AdvancePolicy::Once)
            .map(|(index, _)| index)
    }
}
