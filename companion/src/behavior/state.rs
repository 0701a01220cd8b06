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

use crate::assets::{FrameHandle, FrameSet};
use deskpet_common::{Action, StageDefinition};

/// Mutable sequencing state of one companion
#[derive(Debug, Clone)]
pub struct BehaviorState {
    pub current_action: Action,
    pub current_stage_index: usize,
    pub current_frame_index: usize,
    pub current_frame_set: FrameSet,
    pub is_shutdown_locked: bool,
    /// Set when the running action was interrupted; suppresses its reward
    pub(crate) interrupted: bool,
}

impl Default for BehaviorState {
    fn default() -> Self {
        Self {
            current_action: Action::Idle,
            current_stage_index: 0,
            current_frame_index: 0,
            current_frame_set: FrameSet::empty(),
            is_shutdown_locked: false,
            interrupted: false,
        }
    }
}

impl BehaviorState {
    pub fn stage(&self) -> Option<&'static StageDefinition> {
        self.current_action.stage(self.current_stage_index)
    }

    pub fn current_frame(&self) -> Option<&FrameHandle> {
        self.current_frame_set.get(self.current_frame_index)
    }

    pub fn in_loop_stage(&self) -> bool {
        self.stage().is_some_and(StageDefinition::is_loop)
    }

    pub fn is_idle(&self) -> bool {
        self.current_action == Action::Idle
    }

    pub fn was_interrupted(&self) -> bool {
        self.interrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        let state = BehaviorState::default();
        assert!(state.is_idle());
        assert!(state.in_loop_stage());
        assert!(state.current_frame().is_none());
        assert!(!state.is_shutdown_locked);
    }

    #[test]
    fn test_stage_lookup() {
        let state = BehaviorState {
            current_action: Action::Work,
            current_stage_index: 1,
            ..Default::default()
        };
        assert_eq!(state.stage().map(|s| s.asset_key), Some("WORK/WorkTWO/B_2_Nomal"));
        assert!(state.in_loop_stage());
    }
}
